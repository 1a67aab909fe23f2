//! Typed member access for compiled predicates.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;

/// Getter for one typed field. `None` is the field's null: absent scalar
/// data or an empty multi-valued field.
pub(crate) type Getter<R, T> = Arc<dyn Fn(&R) -> Option<T> + Send + Sync>;

/// A typed accessor for one declared field.
pub enum FieldAccessor<R> {
    Bool(Getter<R, bool>),
    Int(Getter<R, i64>),
    Float(Getter<R, f64>),
    String(Getter<R, String>),
    /// Multi-valued string field; an empty collection is normalized to null
    /// during compilation.
    Group(Getter<R, Vec<String>>),
    DateTime(Getter<R, NaiveDateTime>),
}

impl<R> FieldAccessor<R> {
    /// Name of this accessor's declared type, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldAccessor::Bool(_) => "Bool",
            FieldAccessor::Int(_) => "Int",
            FieldAccessor::Float(_) => "Float",
            FieldAccessor::String(_) => "String",
            FieldAccessor::Group(_) => "Group",
            FieldAccessor::DateTime(_) => "DateTime",
        }
    }
}

/// Field-access strategy for a record type: maps declared field names to
/// typed getters. An undeclared name is a compile-time binding error.
pub struct FieldTable<R> {
    fields: HashMap<String, FieldAccessor<R>>,
}

impl<R: 'static> FieldTable<R> {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn bool<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&R) -> Option<bool> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldAccessor::Bool(Arc::new(getter)));
        self
    }

    pub fn int<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&R) -> Option<i64> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldAccessor::Int(Arc::new(getter)));
        self
    }

    pub fn float<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&R) -> Option<f64> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldAccessor::Float(Arc::new(getter)));
        self
    }

    pub fn string<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&R) -> Option<String> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldAccessor::String(Arc::new(getter)));
        self
    }

    pub fn group<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&R) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldAccessor::Group(Arc::new(getter)));
        self
    }

    pub fn datetime<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&R) -> Option<NaiveDateTime> + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldAccessor::DateTime(Arc::new(getter)));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&FieldAccessor<R>> {
        self.fields.get(name)
    }
}

impl<R: 'static> Default for FieldTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Record {
        name: Option<String>,
        age: Option<i64>,
    }

    #[test]
    fn test_field_table() {
        let table = FieldTable::<Record>::new()
            .string("name", |r: &Record| r.name.clone())
            .int("age", |r: &Record| r.age);

        assert!(table.contains("name"));
        assert!(table.contains("age"));
        assert!(!table.contains("missing"));

        let record = Record {
            name: Some("alice".to_string()),
            age: None,
        };
        match table.get("name").unwrap() {
            FieldAccessor::String(get) => assert_eq!(get(&record), Some("alice".to_string())),
            other => panic!("wrong accessor kind: {}", other.kind()),
        }
        match table.get("age").unwrap() {
            FieldAccessor::Int(get) => assert_eq!(get(&record), None),
            other => panic!("wrong accessor kind: {}", other.kind()),
        }
    }
}
