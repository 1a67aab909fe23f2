//! Error types shared by filter evaluation and compilation.

use thiserror::Error;

/// Errors raised while evaluating or compiling a filter expression.
///
/// The interpreter and the compiler raise the same kind for the same
/// malformed construct wherever both support it, so callers get consistent
/// diagnostics regardless of execution strategy. Null propagation is not an
/// error channel: a null operand producing a null or false result is a
/// normal outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
        context: String,
    },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("unknown field: {name}")]
    UnknownField { name: String },

    /// Operator or function accepted by the grammar but not implemented by
    /// this engine (e.g. `has`, collection-vs-collection ordering).
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("invalid membership literal: {literal}")]
    InvalidMembershipLiteral { literal: String },

    #[error("expression depth exceeded the limit of {limit}")]
    EvaluationDepthExceeded { limit: usize },

    #[error("function {function} expects {expected} arguments, got {actual}")]
    FunctionArgumentCount {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    /// NULL operand reached an operator while null propagation is disabled.
    #[error("unexpected NULL value in {context}")]
    UnexpectedNull { context: String },
}

impl FilterError {
    pub(crate) fn type_mismatch(
        expected: &'static str,
        actual: &'static str,
        context: impl Into<String>,
    ) -> Self {
        FilterError::TypeMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }
}

/// Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterError::type_mismatch("Int", "String", "gt");
        assert_eq!(err.to_string(), "type mismatch in gt: expected Int, got String");

        let err = FilterError::UnknownFunction {
            name: "frobnicate".to_string(),
        };
        assert_eq!(err.to_string(), "unknown function: frobnicate");

        let err = FilterError::UnknownField {
            name: "tenantId".to_string(),
        };
        assert_eq!(err.to_string(), "unknown field: tenantId");

        let err = FilterError::InvalidMembershipLiteral {
            literal: "a,b".to_string(),
        };
        assert_eq!(err.to_string(), "invalid membership literal: a,b");

        let err = FilterError::EvaluationDepthExceeded { limit: 100 };
        assert_eq!(err.to_string(), "expression depth exceeded the limit of 100");

        let err = FilterError::FunctionArgumentCount {
            function: "contains",
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "function contains expects 2 arguments, got 1");

        let err = FilterError::UnexpectedNull {
            context: "and".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected NULL value in and");
    }
}
