//! Filter expression evaluation engine.
//!
//! Evaluates boolean filter expressions (comparisons, boolean connectives,
//! string functions, membership tests, and existential quantifiers over
//! multi-valued fields) against in-memory records.
//!
//! Two execution strategies share one value model and one set of semantics:
//! - [`eval`] interprets the expression tree directly against one record
//!   through a field-resolution callback, producing a [`value::Value`].
//! - [`compile`] transforms the same tree into a reusable, thread-safe
//!   predicate over a typed record, so it can be invoked repeatedly (or
//!   embedded in a larger query pipeline) without re-walking the tree.
//!
//! The tree itself comes from an external parser; see [`ast`] for its shape.
//!
//! A note on null semantics: the boolean connectives follow the SQL
//! three-valued truth table, but an ordering comparison with a null operand
//! is `false`, not null. That deviation from strict SQL logic is deliberate
//! and preserved from the system this engine replaces; the truth-table tests
//! in [`eval`] pin down the exact behavior.

pub mod ast;
pub mod compile;
pub mod error;
pub mod eval;
pub mod function;
pub mod operator;
pub mod value;

pub use ast::{parse_membership_list, Expression, Literal};
pub use compile::{
    compile, CompileOptions, CompiledPredicate, FieldAccessor, FieldTable, NullPropagation, Params,
};
pub use error::{FilterError, FilterResult};
pub use eval::{evaluate_filter, filter_matches, Evaluator, FieldResolver};
pub use function::{Function, Signature};
pub use operator::{BinaryOperator, UnaryOperator};
pub use value::{ElementKind, Value};
