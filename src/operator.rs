//! Operator definitions for filter expressions.

use serde::{Deserialize, Serialize};

/// Binary operators from the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,

    // Logical
    And,
    Or,

    /// Flag test; accepted by the grammar but not implemented by this engine.
    Has,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Gt
                | BinaryOperator::Ge
                | BinaryOperator::Lt
                | BinaryOperator::Le
        )
    }

    /// Ordering comparisons: the subset of comparisons with the
    /// null-operand-is-false policy and existential collection broadcast.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Gt | BinaryOperator::Ge | BinaryOperator::Lt | BinaryOperator::Le
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// The ordering test for this operator, if it is an ordering operator.
    pub fn ordering_fn<T: PartialOrd>(&self) -> Option<fn(&T, &T) -> bool> {
        match self {
            BinaryOperator::Gt => Some(|a, b| a > b),
            BinaryOperator::Ge => Some(|a, b| a >= b),
            BinaryOperator::Lt => Some(|a, b| a < b),
            BinaryOperator::Le => Some(|a, b| a <= b),
            _ => None,
        }
    }

    /// Get the display string for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "eq",
            BinaryOperator::Ne => "ne",
            BinaryOperator::Gt => "gt",
            BinaryOperator::Ge => "ge",
            BinaryOperator::Lt => "lt",
            BinaryOperator::Le => "le",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Has => "has",
        }
    }
}

/// Unary operators from the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "not",
        }
    }
}
