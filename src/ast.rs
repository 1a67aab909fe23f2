//! Filter expression AST.
//!
//! The tree is produced by an external parser and consumed read-only by the
//! interpreter and the compiler; this module only defines its shape and a
//! few construction helpers.

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::value::Value;

/// Literal constant in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self { value: Value::Null }
    }

    pub fn bool(val: bool) -> Self {
        Self {
            value: Value::Bool(val),
        }
    }

    pub fn int(val: i64) -> Self {
        Self {
            value: Value::Int(val),
        }
    }

    pub fn string(val: impl Into<String>) -> Self {
        Self {
            value: Value::String(val.into()),
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal constant value
    Literal(Literal),

    /// Field access ("end path") on the current record
    Field(String),

    /// Range-variable reference inside a quantifier body
    Variable(String),

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// Function call, dispatched through the function library by lowercase name
    FunctionCall { name: String, args: Vec<Expression> },

    /// Membership test against a parenthesized literal list, e.g. `(a,b,c)`
    In {
        operand: Box<Expression>,
        list: String,
    },

    /// Existential quantifier over a multi-valued field; an absent body tests
    /// non-emptiness
    Any {
        source: Box<Expression>,
        variable: String,
        body: Option<Box<Expression>>,
    },

    /// Universal quantifier over a multi-valued field
    All {
        source: Box<Expression>,
        variable: String,
        body: Box<Expression>,
    },
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(Literal::new(value.into()))
    }

    /// Create a null literal expression
    pub fn null() -> Self {
        Expression::Literal(Literal::null())
    }

    /// Create a field access expression
    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    /// Create a range-variable reference
    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create an AND expression
    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::And, left, right)
    }

    /// Create an OR expression
    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Or, left, right)
    }

    /// Create a NOT expression
    pub fn not_expr(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::Not, operand)
    }

    /// Create an equality expression
    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Eq, left, right)
    }

    /// Create a not-equal expression
    pub fn ne(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Ne, left, right)
    }

    /// Create a greater-than expression
    pub fn gt(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Gt, left, right)
    }

    /// Create a greater-than-or-equal expression
    pub fn ge(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Ge, left, right)
    }

    /// Create a less-than expression
    pub fn lt(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Lt, left, right)
    }

    /// Create a less-than-or-equal expression
    pub fn le(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Le, left, right)
    }

    /// Create a function call expression
    pub fn func(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Create a membership test expression
    pub fn is_in(operand: Expression, list: impl Into<String>) -> Self {
        Expression::In {
            operand: Box::new(operand),
            list: list.into(),
        }
    }

    /// Create an `any` quantifier expression
    pub fn any(source: Expression, variable: impl Into<String>, body: Option<Expression>) -> Self {
        Expression::Any {
            source: Box::new(source),
            variable: variable.into(),
            body: body.map(Box::new),
        }
    }

    /// Create an `all` quantifier expression
    pub fn all(source: Expression, variable: impl Into<String>, body: Expression) -> Self {
        Expression::All {
            source: Box::new(source),
            variable: variable.into(),
            body: Box::new(body),
        }
    }

    /// Check if this expression is a constant (contains no field or variable
    /// references)
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::Field(_) | Expression::Variable(_) => false,
            Expression::BinaryOp { left, right, .. } => left.is_constant() && right.is_constant(),
            Expression::UnaryOp { operand, .. } => operand.is_constant(),
            Expression::FunctionCall { args, .. } => args.iter().all(|arg| arg.is_constant()),
            Expression::In { operand, .. } => operand.is_constant(),
            Expression::Any { source, body, .. } => {
                source.is_constant() && body.as_ref().map(|b| b.is_constant()).unwrap_or(true)
            }
            Expression::All { source, body, .. } => source.is_constant() && body.is_constant(),
        }
    }
}

/// Parse a membership literal of the form `(item, item, ...)`.
///
/// Items are trimmed of surrounding whitespace and one layer of matching
/// single or double quotes. Missing parentheses, an empty list, or an empty
/// item are all [`FilterError::InvalidMembershipLiteral`].
pub fn parse_membership_list(literal: &str) -> FilterResult<Vec<String>> {
    let invalid = || FilterError::InvalidMembershipLiteral {
        literal: literal.to_string(),
    };

    let inner = literal
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;

    let mut items = Vec::new();
    for raw in inner.split(',') {
        let item = raw.trim();
        let item = item
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .or_else(|| {
                item.strip_prefix('"')
                    .and_then(|rest| rest.strip_suffix('"'))
            })
            .unwrap_or(item);
        if item.is_empty() {
            return Err(invalid());
        }
        items.push(item.to_string());
    }

    Ok(items)
}
