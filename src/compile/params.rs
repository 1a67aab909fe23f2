//! Hoisted constant parameters for compiled predicates.

use crate::error::{FilterError, FilterResult};
use crate::value::Value;

/// Constants hoisted out of a compiled predicate, addressable by slot in the
/// order the literals appear in the expression. Replacing a slot's value
/// lets a predicate be reused across different literal values without
/// recompilation; the replacement must keep the slot's original type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    values: Vec<Value>,
}

impl Params {
    pub(crate) fn push(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replace the constant in `slot` with a value of the same type. An
    /// out-of-range slot is reported as an unknown name in the parameter
    /// table; a type change is a type mismatch.
    pub fn set(&mut self, slot: usize, value: Value) -> FilterResult<()> {
        let current = self.get(slot)?;
        if current.kind() != value.kind() {
            return Err(FilterError::type_mismatch(
                current.kind(),
                value.kind(),
                format!("parameter slot {}", slot),
            ));
        }
        self.values[slot] = value;
        Ok(())
    }

    fn get(&self, slot: usize) -> FilterResult<&Value> {
        self.values.get(slot).ok_or_else(|| FilterError::UnknownField {
            name: format!("parameter slot {}", slot),
        })
    }

    pub(crate) fn bool(&self, slot: usize) -> FilterResult<Option<bool>> {
        match self.get(slot)? {
            Value::Bool(b) => Ok(Some(*b)),
            Value::Null => Ok(None),
            other => Err(FilterError::type_mismatch(
                "Bool",
                other.kind(),
                format!("parameter slot {}", slot),
            )),
        }
    }

    pub(crate) fn int(&self, slot: usize) -> FilterResult<Option<i64>> {
        match self.get(slot)? {
            Value::Int(i) => Ok(Some(*i)),
            Value::Null => Ok(None),
            other => Err(FilterError::type_mismatch(
                "Int",
                other.kind(),
                format!("parameter slot {}", slot),
            )),
        }
    }

    pub(crate) fn string(&self, slot: usize) -> FilterResult<Option<String>> {
        match self.get(slot)? {
            Value::String(s) => Ok(Some(s.clone())),
            Value::Null => Ok(None),
            other => Err(FilterError::type_mismatch(
                "String",
                other.kind(),
                format!("parameter slot {}", slot),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read() {
        let mut params = Params::default();
        let a = params.push(Value::Int(5));
        let b = params.push(Value::String("x".to_string()));
        assert_eq!(params.len(), 2);

        assert_eq!(params.int(a).unwrap(), Some(5));
        assert_eq!(params.string(b).unwrap(), Some("x".to_string()));

        // a typed read of the wrong slot fails
        assert!(matches!(
            params.int(b),
            Err(FilterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set() {
        let mut params = Params::default();
        let slot = params.push(Value::String("user1".to_string()));

        params.set(slot, Value::String("user2".to_string())).unwrap();
        assert_eq!(params.string(slot).unwrap(), Some("user2".to_string()));

        assert!(matches!(
            params.set(slot, Value::Int(1)),
            Err(FilterError::TypeMismatch { .. })
        ));
        assert!(matches!(
            params.set(9, Value::Int(1)),
            Err(FilterError::UnknownField { .. })
        ));
    }
}
