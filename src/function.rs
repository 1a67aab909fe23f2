//! Function library shared by the interpreter and the compiler.
//!
//! A closed, name-keyed table of operation contracts: argument count,
//! argument shapes, return shape, and the scalar evaluation rule. Broadcast
//! over `Group` operands and null propagation are layered on top of the
//! scalar rules here so both execution strategies agree on them.

use std::ops::RangeInclusive;

use crate::error::{FilterError, FilterResult};
use crate::value::{ElementKind, Value};

/// Functions known to the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Length,
    ToLower,
    ToUpper,
    Trim,
    Contains,
    StartsWith,
    EndsWith,
    IndexOf,
    Concat,
    Substring,
    Round,
    Floor,
    Ceiling,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Shape of a function's arguments and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// One string-shaped instance argument.
    StringUnary { returns: ElementKind },
    /// A string-shaped instance argument plus one string argument.
    StringBinary { returns: ElementKind },
    /// One numeric argument, float result. Compiler path only.
    NumericUnary,
    /// One date argument, integer part result. Compiler path only.
    DatePart,
    /// Recognized name with no implementation.
    NotImplemented,
}

/// Lowercase function names, in grammar order.
static NAMES: &[(&str, Function)] = &[
    ("length", Function::Length),
    ("tolower", Function::ToLower),
    ("toupper", Function::ToUpper),
    ("trim", Function::Trim),
    ("contains", Function::Contains),
    ("startswith", Function::StartsWith),
    ("endswith", Function::EndsWith),
    ("indexof", Function::IndexOf),
    ("concat", Function::Concat),
    ("substring", Function::Substring),
    ("round", Function::Round),
    ("floor", Function::Floor),
    ("ceiling", Function::Ceiling),
    ("year", Function::Year),
    ("month", Function::Month),
    ("day", Function::Day),
    ("hour", Function::Hour),
    ("minute", Function::Minute),
    ("second", Function::Second),
];

impl Function {
    /// Look up a function by its lowercase grammar name.
    pub fn resolve(name: &str) -> Option<Function> {
        NAMES
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, func)| *func)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Length => "length",
            Function::ToLower => "tolower",
            Function::ToUpper => "toupper",
            Function::Trim => "trim",
            Function::Contains => "contains",
            Function::StartsWith => "startswith",
            Function::EndsWith => "endswith",
            Function::IndexOf => "indexof",
            Function::Concat => "concat",
            Function::Substring => "substring",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::Hour => "hour",
            Function::Minute => "minute",
            Function::Second => "second",
        }
    }

    pub fn signature(&self) -> Signature {
        match self {
            Function::Length => Signature::StringUnary {
                returns: ElementKind::Int,
            },
            Function::ToLower | Function::ToUpper | Function::Trim => Signature::StringUnary {
                returns: ElementKind::String,
            },
            Function::Contains | Function::StartsWith | Function::EndsWith => {
                Signature::StringBinary {
                    returns: ElementKind::Bool,
                }
            }
            Function::IndexOf => Signature::StringBinary {
                returns: ElementKind::Int,
            },
            Function::Concat => Signature::StringBinary {
                returns: ElementKind::String,
            },
            Function::Substring => Signature::NotImplemented,
            Function::Round | Function::Floor | Function::Ceiling => Signature::NumericUnary,
            Function::Year
            | Function::Month
            | Function::Day
            | Function::Hour
            | Function::Minute
            | Function::Second => Signature::DatePart,
        }
    }

    /// Accepted argument counts.
    pub fn arity(&self) -> RangeInclusive<usize> {
        match self.signature() {
            Signature::StringUnary { .. } | Signature::NumericUnary | Signature::DatePart => 1..=1,
            Signature::StringBinary { .. } => 2..=2,
            // substring takes a start index and an optional length
            Signature::NotImplemented => 2..=3,
        }
    }

    /// Whether the interpreter path evaluates this function. Numeric and
    /// date-part helpers exist only on the compiler path.
    pub fn interpretable(&self) -> bool {
        matches!(
            self.signature(),
            Signature::StringUnary { .. } | Signature::StringBinary { .. }
        )
    }

    /// Scalar rule for unary string functions returning an int.
    pub(crate) fn unary_string_int(self, s: &str) -> i64 {
        match self {
            Function::Length => s.chars().count() as i64,
            other => unreachable!("not an int-valued unary string function: {}", other.name()),
        }
    }

    /// Scalar rule for unary string functions returning a string.
    pub(crate) fn unary_string_string(self, s: &str) -> String {
        match self {
            Function::ToLower => s.to_lowercase(),
            Function::ToUpper => s.to_uppercase(),
            Function::Trim => s.trim().to_string(),
            other => unreachable!(
                "not a string-valued unary string function: {}",
                other.name()
            ),
        }
    }

    /// Scalar rule for binary string functions returning a bool.
    pub(crate) fn binary_string_bool(self, first: &str, second: &str) -> bool {
        match self {
            Function::Contains => first.contains(second),
            Function::StartsWith => first.starts_with(second),
            Function::EndsWith => first.ends_with(second),
            other => unreachable!("not a bool-valued binary string function: {}", other.name()),
        }
    }

    /// Scalar rule for binary string functions returning an int.
    pub(crate) fn binary_string_int(self, first: &str, second: &str) -> i64 {
        match self {
            Function::IndexOf => char_index_of(first, second),
            other => unreachable!("not an int-valued binary string function: {}", other.name()),
        }
    }

    /// Scalar rule for binary string functions returning a string.
    pub(crate) fn binary_string_string(self, first: &str, second: &str) -> String {
        match self {
            Function::Concat => format!("{}{}", first, second),
            other => unreachable!(
                "not a string-valued binary string function: {}",
                other.name()
            ),
        }
    }

    fn apply_unary(self, returns: ElementKind, s: &str) -> Value {
        match returns {
            ElementKind::Int => Value::Int(self.unary_string_int(s)),
            ElementKind::String => Value::String(self.unary_string_string(s)),
            ElementKind::Bool => unreachable!("no unary string function returns Bool"),
        }
    }

    fn apply_binary(self, returns: ElementKind, first: &str, second: &str) -> Value {
        match returns {
            ElementKind::Bool => Value::Bool(self.binary_string_bool(first, second)),
            ElementKind::Int => Value::Int(self.binary_string_int(first, second)),
            ElementKind::String => Value::String(self.binary_string_string(first, second)),
        }
    }
}

/// Character index of the first occurrence of `needle`, or -1 when absent.
fn char_index_of(haystack: &str, needle: &str) -> i64 {
    match haystack.find(needle) {
        Some(byte_idx) => haystack[..byte_idx].chars().count() as i64,
        None => -1,
    }
}

/// Evaluate a function over already-evaluated arguments on the interpreter
/// path. Arity must have been checked by the caller; compiler-only functions
/// are rejected here.
pub fn eval_function(func: Function, args: &[Value]) -> FilterResult<Value> {
    match func.signature() {
        Signature::StringUnary { returns } => eval_string_unary(func, returns, &args[0]),
        Signature::StringBinary { returns } => eval_string_binary(func, returns, &args[0], &args[1]),
        Signature::NumericUnary | Signature::DatePart | Signature::NotImplemented => {
            Err(FilterError::UnsupportedOperator(func.name().to_string()))
        }
    }
}

/// Unary string function with broadcast over `Group` and null propagation:
/// a `Null` instance short-circuits to `Null` without invoking the function,
/// a `Group` instance yields a `Collection` of the function's return kind.
fn eval_string_unary(func: Function, returns: ElementKind, instance: &Value) -> FilterResult<Value> {
    match instance {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(func.apply_unary(returns, s)),
        Value::Group(items) => Ok(Value::Collection(
            items.iter().map(|g| func.apply_unary(returns, g)).collect(),
            returns,
        )),
        other => Err(FilterError::type_mismatch(
            "String",
            other.kind(),
            func.name(),
        )),
    }
}

/// Binary string function with broadcast and null propagation. A `Group`
/// instance is applied element-wise; a `Group` second argument is applied
/// across the cross product with a scalar instance; either operand being
/// `Null` short-circuits to `Null`.
fn eval_string_binary(
    func: Function,
    returns: ElementKind,
    first: &Value,
    second: &Value,
) -> FilterResult<Value> {
    if first.is_null() || second.is_null() {
        return Ok(Value::Null);
    }

    if let Value::String(s) = second {
        match first {
            Value::String(f) => return Ok(func.apply_binary(returns, f, s)),
            Value::Group(items) => {
                return Ok(Value::Collection(
                    items
                        .iter()
                        .map(|g| func.apply_binary(returns, g, s))
                        .collect(),
                    returns,
                ))
            }
            _ => {}
        }
    }

    if let (Value::String(f), Value::Group(items)) = (first, second) {
        return Ok(Value::Collection(
            items
                .iter()
                .map(|g| func.apply_binary(returns, f, g))
                .collect(),
            returns,
        ));
    }

    let actual = if first.allow_string_ops() {
        second.kind()
    } else {
        first.kind()
    };
    Err(FilterError::type_mismatch("String", actual, func.name()))
}
