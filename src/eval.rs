//! Tree-walking interpreter for filter expressions.
//!
//! Walks an expression against one record through a field-resolution
//! callback and produces a [`Value`], applying SQL-style three-valued logic
//! for the boolean connectives and existential broadcast over multi-valued
//! fields.

use log::trace;

use crate::ast::{parse_membership_list, Expression};
use crate::error::{FilterError, FilterResult};
use crate::function::{eval_function, Function};
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::value::{ElementKind, Value};

/// Default bound on expression nesting, matching the limit the upstream
/// filter parser is configured with.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Supplies field values for one record.
///
/// Implementations must be total over the declared schema: an undeclared
/// field name is an [`FilterError::UnknownField`] error, never a silent
/// null. Absent scalar fields and empty multi-valued fields both resolve to
/// `Value::Null` (never an empty `Group`), so downstream comparisons
/// short-circuit correctly.
pub trait FieldResolver {
    fn resolve(&self, field: &str) -> FilterResult<Value>;
}

impl<F> FieldResolver for F
where
    F: Fn(&str) -> FilterResult<Value>,
{
    fn resolve(&self, field: &str) -> FilterResult<Value> {
        self(field)
    }
}

/// Interpreter for filter expressions.
pub struct Evaluator<'a, R: FieldResolver> {
    resolver: &'a R,
    max_depth: usize,
}

impl<'a, R: FieldResolver> Evaluator<'a, R> {
    /// Create a new evaluator over one record's resolver.
    pub fn new(resolver: &'a R) -> Self {
        Self {
            resolver,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Create an evaluator with an explicit recursion bound.
    pub fn with_max_depth(resolver: &'a R, max_depth: usize) -> Self {
        Self {
            resolver,
            max_depth,
        }
    }

    /// Evaluate an expression and return the resulting value.
    pub fn evaluate(&self, expr: &Expression) -> FilterResult<Value> {
        trace!("evaluating filter expression");
        self.eval_node(expr, 0)
    }

    /// Evaluate an expression and narrow it to a match decision. A `Null`
    /// result is a non-match.
    pub fn matches(&self, expr: &Expression) -> FilterResult<bool> {
        match self.evaluate(expr)? {
            Value::Null => Ok(false),
            value => value.as_bool(),
        }
    }

    fn eval_node(&self, expr: &Expression, depth: usize) -> FilterResult<Value> {
        if depth > self.max_depth {
            return Err(FilterError::EvaluationDepthExceeded {
                limit: self.max_depth,
            });
        }

        match expr {
            Expression::Literal(lit) => Ok(lit.value.clone()),

            Expression::Field(name) => self.resolver.resolve(name),

            Expression::BinaryOp { op, left, right } => {
                let left_val = self.eval_node(left, depth + 1)?;
                let right_val = self.eval_node(right, depth + 1)?;
                self.eval_binary(*op, left_val, right_val)
            }

            Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => match self.eval_node(operand, depth + 1)? {
                Value::Null => Ok(Value::Null),
                value => Ok(Value::Bool(!value.as_bool()?)),
            },

            Expression::FunctionCall { name, args } => {
                let func = Function::resolve(name).ok_or_else(|| FilterError::UnknownFunction {
                    name: name.clone(),
                })?;
                if !func.arity().contains(&args.len()) {
                    return Err(FilterError::FunctionArgumentCount {
                        function: func.name(),
                        expected: *func.arity().start(),
                        actual: args.len(),
                    });
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_node(arg, depth + 1)?);
                }
                eval_function(func, &values)
            }

            Expression::In { operand, list } => {
                let left = self.eval_node(operand, depth + 1)?;
                eval_membership(left, list)
            }

            // Quantifiers and their range variables are compiler-path
            // constructs
            Expression::Variable(_) => Err(FilterError::UnsupportedOperator(
                "range variable".to_string(),
            )),
            Expression::Any { .. } => Err(FilterError::UnsupportedOperator("any".to_string())),
            Expression::All { .. } => Err(FilterError::UnsupportedOperator("all".to_string())),
        }
    }

    fn eval_binary(&self, op: BinaryOperator, left: Value, right: Value) -> FilterResult<Value> {
        match op {
            BinaryOperator::And => {
                // SQL three-valued table: a false operand wins, a null
                // operand otherwise makes the result null
                let (l, r) = (truth(&left)?, truth(&right)?);
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }

            BinaryOperator::Or => {
                let (l, r) = (truth(&left)?, truth(&right)?);
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }

            BinaryOperator::Eq => Ok(Value::Bool(values_equal(&left, &right)?)),
            BinaryOperator::Ne => Ok(Value::Bool(!values_equal(&left, &right)?)),

            BinaryOperator::Gt | BinaryOperator::Ge | BinaryOperator::Lt | BinaryOperator::Le => {
                self.eval_ordering(op, left, right)
            }

            BinaryOperator::Has => Err(FilterError::UnsupportedOperator(
                BinaryOperator::Has.as_str().to_string(),
            )),
        }
    }

    fn eval_ordering(&self, op: BinaryOperator, left: Value, right: Value) -> FilterResult<Value> {
        // an unknown operand never matches an ordering comparison; this is a
        // deliberate deviation from strict SQL null semantics
        if left.is_null() || right.is_null() {
            return Ok(Value::Bool(false));
        }

        if !(left.allow_int_ops() && right.allow_int_ops()) {
            let actual = if left.allow_int_ops() {
                right.kind()
            } else {
                left.kind()
            };
            return Err(FilterError::type_mismatch("Int", actual, op.as_str()));
        }

        let cmp = op
            .ordering_fn::<i64>()
            .ok_or_else(|| FilterError::UnsupportedOperator(op.as_str().to_string()))?;

        // collection operands broadcast existentially: any element matching
        // makes the comparison true; two collections are ambiguous
        let matched = match (left.is_int_collection(), right.is_int_collection()) {
            (true, true) => {
                return Err(FilterError::UnsupportedOperator(format!(
                    "{} between two collections",
                    op.as_str()
                )))
            }
            (true, false) => {
                let r = right.as_int()?;
                left.as_int_elements()?.iter().any(|l| cmp(l, &r))
            }
            (false, true) => {
                let l = left.as_int()?;
                right.as_int_elements()?.iter().any(|r| cmp(&l, r))
            }
            (false, false) => cmp(&left.as_int()?, &right.as_int()?),
        };
        Ok(Value::Bool(matched))
    }
}

/// Narrow a value for the boolean connectives: null stays unknown, anything
/// else must narrow to a boolean.
fn truth(value: &Value) -> FilterResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        other => other.as_bool().map(Some),
    }
}

/// Value equality with existential broadcast: a group (or string collection)
/// compared to a string matches if any element does. Everything else is
/// plain value equality on the tags and payloads, so `Null = Null` is true
/// and mismatched tags compare unequal without error.
fn values_equal(left: &Value, right: &Value) -> FilterResult<bool> {
    if let Some(result) = existential_eq(left, right)? {
        return Ok(result);
    }
    if let Some(result) = existential_eq(right, left)? {
        return Ok(result);
    }
    Ok(left == right)
}

fn existential_eq(collection: &Value, scalar: &Value) -> FilterResult<Option<bool>> {
    let Value::String(s) = scalar else {
        return Ok(None);
    };
    match collection {
        Value::Group(items) => Ok(Some(items.iter().any(|item| item == s))),
        Value::Collection(items, ElementKind::String) => {
            for item in items {
                if item.as_string()? == s {
                    return Ok(Some(true));
                }
            }
            Ok(Some(false))
        }
        _ => Ok(None),
    }
}

/// Membership test against a parenthesized literal list. A null operand is a
/// non-match; a group operand matches if any element is in the list.
fn eval_membership(left: Value, list: &str) -> FilterResult<Value> {
    if left.is_null() {
        return Ok(Value::Bool(false));
    }
    let items = parse_membership_list(list)?;
    match &left {
        Value::String(s) => Ok(Value::Bool(items.iter().any(|item| item == s))),
        Value::Group(group) => Ok(Value::Bool(group.iter().any(|g| items.contains(g)))),
        Value::Collection(elements, ElementKind::String) => {
            for element in elements {
                let element = element.as_string()?;
                if items.iter().any(|item| item == element) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        other => Err(FilterError::type_mismatch("String", other.kind(), "in")),
    }
}

/// Helper function to evaluate an expression against one record's resolver.
pub fn evaluate_filter<R: FieldResolver>(expr: &Expression, resolver: &R) -> FilterResult<Value> {
    Evaluator::new(resolver).evaluate(expr)
}

/// Helper function to test an expression as a predicate over one record.
pub fn filter_matches<R: FieldResolver>(expr: &Expression, resolver: &R) -> FilterResult<bool> {
    Evaluator::new(resolver).matches(expr)
}
