//! Dynamic value model for filter evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};

/// Element type tag carried by a [`Value::Collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Bool,
    Int,
    String,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Bool => "Bool",
            ElementKind::Int => "Int",
            ElementKind::String => "String",
        }
    }
}

/// Values flowing through filter evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    /// A field that is syntactically a single string but holds a multi-valued
    /// collection at runtime. String operators apply to it element-wise with
    /// "any element matches" semantics, never literal array semantics.
    Group(Vec<String>),
    /// A generic typed collection, e.g. the result of broadcasting a scalar
    /// operation over a `Group`.
    Collection(Vec<Value>, ElementKind),
}

impl Value {
    /// Name of this value's tag, used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::String(_) => "String",
            Value::Group(_) => "Group",
            Value::Collection(..) => "Collection",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Value::Group(_))
    }

    pub fn is_int_collection(&self) -> bool {
        matches!(self, Value::Collection(_, ElementKind::Int))
    }

    /// String operators accept plain strings and groups.
    pub fn allow_string_ops(&self) -> bool {
        self.is_string() || self.is_group()
    }

    /// Numeric comparisons accept ints and int collections.
    pub fn allow_int_ops(&self) -> bool {
        matches!(self, Value::Int(_)) || self.is_int_collection()
    }

    /// Narrow to a boolean. A boolean collection reduces existentially:
    /// any true element makes the whole collection true.
    pub fn as_bool(&self) -> FilterResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Collection(items, ElementKind::Bool) => {
                for item in items {
                    if item.as_bool()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(FilterError::type_mismatch("Bool", other.kind(), "as_bool")),
        }
    }

    pub fn as_int(&self) -> FilterResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(FilterError::type_mismatch("Int", other.kind(), "as_int")),
        }
    }

    pub fn as_string(&self) -> FilterResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(FilterError::type_mismatch("String", other.kind(), "as_string")),
        }
    }

    pub fn as_group(&self) -> FilterResult<&[String]> {
        match self {
            Value::Group(items) => Ok(items),
            other => Err(FilterError::type_mismatch("Group", other.kind(), "as_group")),
        }
    }

    pub fn as_collection(&self) -> FilterResult<(&[Value], ElementKind)> {
        match self {
            Value::Collection(items, kind) => Ok((items, *kind)),
            other => Err(FilterError::type_mismatch(
                "Collection",
                other.kind(),
                "as_collection",
            )),
        }
    }

    /// Integer payloads of a `Collection<Int>`.
    pub fn as_int_elements(&self) -> FilterResult<Vec<i64>> {
        match self {
            Value::Collection(items, ElementKind::Int) => {
                items.iter().map(|item| item.as_int()).collect()
            }
            other => Err(FilterError::type_mismatch(
                "Collection",
                other.kind(),
                "as_int_elements",
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::Group(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_queries() {
        assert!(Value::Null.is_null());
        assert!(Value::String("a".to_string()).is_string());
        assert!(Value::Group(vec!["a".to_string()]).is_group());

        assert!(Value::String("a".to_string()).allow_string_ops());
        assert!(Value::Group(vec!["a".to_string()]).allow_string_ops());
        assert!(!Value::Int(1).allow_string_ops());

        assert!(Value::Int(1).allow_int_ops());
        assert!(Value::Collection(vec![Value::Int(1)], ElementKind::Int).allow_int_ops());
        assert!(!Value::Collection(vec![Value::Bool(true)], ElementKind::Bool).allow_int_ops());
        assert!(!Value::Null.allow_int_ops());
    }

    #[test]
    fn test_as_bool() {
        assert!(Value::Bool(true).as_bool().unwrap());
        assert!(!Value::Bool(false).as_bool().unwrap());

        // Boolean collections reduce existentially
        let any_true = Value::Collection(
            vec![Value::Bool(false), Value::Bool(true), Value::Bool(false)],
            ElementKind::Bool,
        );
        assert!(any_true.as_bool().unwrap());

        let all_false = Value::Collection(
            vec![Value::Bool(false), Value::Bool(false)],
            ElementKind::Bool,
        );
        assert!(!all_false.as_bool().unwrap());

        let empty = Value::Collection(vec![], ElementKind::Bool);
        assert!(!empty.as_bool().unwrap());

        assert!(matches!(
            Value::Null.as_bool(),
            Err(FilterError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::Collection(vec![Value::Int(1)], ElementKind::Int).as_bool(),
            Err(FilterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_scalar_narrowing() {
        assert_eq!(Value::Int(42).as_int().unwrap(), 42);
        assert_eq!(Value::String("abc".to_string()).as_string().unwrap(), "abc");
        assert_eq!(
            Value::Group(vec!["a".to_string(), "b".to_string()])
                .as_group()
                .unwrap(),
            &["a".to_string(), "b".to_string()]
        );

        // Null never matches a scalar accessor
        assert!(Value::Null.as_int().is_err());
        assert!(Value::Null.as_string().is_err());
        assert!(Value::Null.as_group().is_err());

        // A group is never silently a string
        assert!(Value::Group(vec!["a".to_string()]).as_string().is_err());
    }

    #[test]
    fn test_int_elements() {
        let ints = Value::Collection(vec![Value::Int(1), Value::Int(2)], ElementKind::Int);
        assert_eq!(ints.as_int_elements().unwrap(), vec![1, 2]);
        assert!(Value::Int(1).as_int_elements().is_err());
    }

    #[test]
    fn test_literal_construction() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7i64), Value::Int(7));
        assert_eq!(Value::from("x"), Value::String("x".to_string()));
        assert_eq!(
            Value::from(vec!["a".to_string()]),
            Value::Group(vec!["a".to_string()])
        );
    }
}
