//! Tree-to-closure transform producing reusable predicates.
//!
//! Every sub-expression compiles to a typed boxed closure over the record;
//! operators are composed from the lifted nullable helpers so the
//! three-valued semantics match the interpreter without re-walking the tree
//! at invoke time. Binding errors (unknown fields, shape mismatches,
//! malformed membership literals) surface at compile time.

use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::debug;

use crate::ast::{parse_membership_list, Expression};
use crate::compile::accessor::{FieldAccessor, FieldTable};
use crate::compile::lifted::{and3, cmp_opt, not3, or3};
use crate::compile::params::Params;
use crate::compile::{CompileOptions, NullPropagation};
use crate::error::{FilterError, FilterResult};
use crate::function::{Function, Signature};
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::value::{ElementKind, Value};

/// Runtime state for one predicate invocation: parameter slots plus the
/// quantifier variable bindings currently in scope.
pub struct EvalCtx<'a> {
    params: &'a Params,
    bindings: Vec<(String, String)>,
}

impl<'a> EvalCtx<'a> {
    fn new(params: &'a Params) -> Self {
        Self {
            params,
            bindings: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value.clone())
    }
}

/// One compiled evaluation step. `None` is the nullable representation of a
/// missing value.
type Step<R, T> = Box<dyn Fn(&R, &mut EvalCtx<'_>) -> FilterResult<Option<T>> + Send + Sync>;

/// A compiled sub-expression, tagged with its runtime shape.
enum Compiled<R> {
    Bool(Step<R, bool>),
    Int(Step<R, i64>),
    Float(Step<R, f64>),
    Str(Step<R, String>),
    Date(Step<R, NaiveDateTime>),
    /// Multi-valued string field, or element-wise string results.
    Group(Step<R, Vec<String>>),
    /// Element-wise booleans produced by broadcasting.
    Bools(Step<R, Vec<bool>>),
    /// Element-wise integers produced by broadcasting.
    Ints(Step<R, Vec<i64>>),
    /// The `null` literal, typeless until combined.
    Null,
}

impl<R> Compiled<R> {
    fn kind(&self) -> &'static str {
        match self {
            Compiled::Bool(_) => "Bool",
            Compiled::Int(_) => "Int",
            Compiled::Float(_) => "Float",
            Compiled::Str(_) => "String",
            Compiled::Date(_) => "DateTime",
            Compiled::Group(_) => "Group",
            Compiled::Bools(_) | Compiled::Ints(_) => "Collection",
            Compiled::Null => "Null",
        }
    }
}

/// A reusable predicate compiled from a filter expression. Immutable after
/// compilation and safe to invoke from multiple threads concurrently.
pub struct CompiledPredicate<R> {
    pred: Step<R, bool>,
    params: Params,
}

impl<R> CompiledPredicate<R> {
    /// Evaluate against one record using the compiled-in constants. A null
    /// root result is a non-match.
    pub fn evaluate(&self, record: &R) -> FilterResult<bool> {
        self.evaluate_with(record, &self.params)
    }

    /// Evaluate with caller-supplied parameter values; see [`Params::set`].
    pub fn evaluate_with(&self, record: &R, params: &Params) -> FilterResult<bool> {
        let mut ctx = EvalCtx::new(params);
        Ok((self.pred)(record, &mut ctx)?.unwrap_or(false))
    }

    /// The constants hoisted during compilation.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// Compile an expression against a field table into a reusable predicate.
pub fn compile<R: 'static>(
    expr: &Expression,
    fields: &FieldTable<R>,
    options: CompileOptions,
) -> FilterResult<CompiledPredicate<R>> {
    debug!("compiling filter expression");
    let mut compiler = Compiler {
        fields,
        options,
        params: Params::default(),
        scope: Vec::new(),
    };
    let root = compiler.compile_node(expr, 0)?;
    let pred = truth(root)?;
    Ok(CompiledPredicate {
        pred,
        params: compiler.params,
    })
}

/// Null guard for operator operands: with propagation disabled a missing
/// operand is a runtime failure instead of a null result.
fn need<T>(value: Option<T>, mode: NullPropagation, context: &'static str) -> FilterResult<Option<T>> {
    match value {
        None if mode == NullPropagation::Disabled => Err(FilterError::UnexpectedNull {
            context: context.to_string(),
        }),
        value => Ok(value),
    }
}

/// Narrow a compiled value to a truth step. Boolean collections reduce
/// existentially; the null literal is a constant unknown.
fn truth<R: 'static>(compiled: Compiled<R>) -> FilterResult<Step<R, bool>> {
    match compiled {
        Compiled::Bool(step) => Ok(step),
        Compiled::Bools(step) => Ok(Box::new(move |record, ctx| {
            Ok(step(record, ctx)?.map(|items| items.into_iter().any(|b| b)))
        })),
        Compiled::Null => Ok(Box::new(|_, _| Ok(None))),
        other => Err(FilterError::type_mismatch(
            "Bool",
            other.kind(),
            "condition",
        )),
    }
}

fn is_null_step<R: 'static, T: 'static>(step: Step<R, T>) -> Step<R, bool> {
    Box::new(move |record, ctx| Ok(Some(step(record, ctx)?.is_none())))
}

fn int_to_float_step<R: 'static>(step: Step<R, i64>) -> Step<R, f64> {
    Box::new(move |record, ctx| Ok(step(record, ctx)?.map(|i| i as f64)))
}

fn negate_step<R: 'static>(step: Step<R, bool>, negate: bool) -> Step<R, bool> {
    if !negate {
        return step;
    }
    Box::new(move |record, ctx| Ok(step(record, ctx)?.map(|b| !b)))
}

struct Compiler<'a, R> {
    fields: &'a FieldTable<R>,
    options: CompileOptions,
    params: Params,
    /// Range variables currently in scope, innermost last. All navigation
    /// collections are string-typed, so the names are enough.
    scope: Vec<String>,
}

impl<'a, R: 'static> Compiler<'a, R> {
    fn compile_node(&mut self, expr: &Expression, depth: usize) -> FilterResult<Compiled<R>> {
        if depth > self.options.max_depth {
            return Err(FilterError::EvaluationDepthExceeded {
                limit: self.options.max_depth,
            });
        }

        match expr {
            Expression::Literal(lit) => self.compile_literal(&lit.value),

            Expression::Field(name) => self.compile_field(name),

            Expression::Variable(name) => self.compile_variable(name),

            Expression::BinaryOp { op, left, right } => {
                let left = self.compile_node(left, depth + 1)?;
                let right = self.compile_node(right, depth + 1)?;
                self.compile_binary(*op, left, right)
            }

            Expression::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => {
                let operand = self.compile_node(operand, depth + 1)?;
                self.compile_not(operand)
            }

            Expression::FunctionCall { name, args } => self.compile_function(name, args, depth),

            Expression::In { operand, list } => {
                let operand = self.compile_node(operand, depth + 1)?;
                self.compile_membership(operand, list)
            }

            Expression::Any {
                source,
                variable,
                body,
            } => self.compile_quantifier(source, variable, body.as_deref(), false, depth),

            Expression::All {
                source,
                variable,
                body,
            } => self.compile_quantifier(source, variable, Some(body), true, depth),
        }
    }

    fn compile_literal(&mut self, value: &Value) -> FilterResult<Compiled<R>> {
        // no need to parameterize nulls: there cannot be multiple values
        // for null
        if value.is_null() {
            return Ok(Compiled::Null);
        }

        if self.options.parameterize_constants {
            let slot = self.params.push(value.clone());
            return Ok(match value {
                Value::Bool(_) => Compiled::Bool(Box::new(move |_, ctx| ctx.params.bool(slot))),
                Value::Int(_) => Compiled::Int(Box::new(move |_, ctx| ctx.params.int(slot))),
                Value::String(_) => Compiled::Str(Box::new(move |_, ctx| ctx.params.string(slot))),
                other => {
                    return Err(FilterError::UnsupportedOperator(format!(
                        "{} literal",
                        other.kind()
                    )))
                }
            });
        }

        Ok(match value {
            Value::Bool(b) => {
                let b = *b;
                Compiled::Bool(Box::new(move |_, _| Ok(Some(b))))
            }
            Value::Int(i) => {
                let i = *i;
                Compiled::Int(Box::new(move |_, _| Ok(Some(i))))
            }
            Value::String(s) => {
                let s = s.clone();
                Compiled::Str(Box::new(move |_, _| Ok(Some(s.clone()))))
            }
            other => {
                return Err(FilterError::UnsupportedOperator(format!(
                    "{} literal",
                    other.kind()
                )))
            }
        })
    }

    fn compile_field(&mut self, name: &str) -> FilterResult<Compiled<R>> {
        let accessor = self
            .fields
            .get(name)
            .ok_or_else(|| FilterError::UnknownField {
                name: name.to_string(),
            })?;

        Ok(match accessor {
            FieldAccessor::Bool(get) => {
                let get = Arc::clone(get);
                Compiled::Bool(Box::new(move |record, _| Ok(get(record))))
            }
            FieldAccessor::Int(get) => {
                let get = Arc::clone(get);
                Compiled::Int(Box::new(move |record, _| Ok(get(record))))
            }
            FieldAccessor::Float(get) => {
                let get = Arc::clone(get);
                Compiled::Float(Box::new(move |record, _| Ok(get(record))))
            }
            FieldAccessor::String(get) => {
                let get = Arc::clone(get);
                Compiled::Str(Box::new(move |record, _| Ok(get(record))))
            }
            FieldAccessor::Group(get) => {
                let get = Arc::clone(get);
                // an empty multi-valued field is null, not an empty group
                Compiled::Group(Box::new(move |record, _| {
                    Ok(get(record).filter(|items| !items.is_empty()))
                }))
            }
            FieldAccessor::DateTime(get) => {
                let get = Arc::clone(get);
                Compiled::Date(Box::new(move |record, _| Ok(get(record))))
            }
        })
    }

    fn compile_variable(&mut self, name: &str) -> FilterResult<Compiled<R>> {
        if !self.scope.iter().any(|bound| bound == name) {
            return Err(FilterError::UnknownField {
                name: name.to_string(),
            });
        }
        let name = name.to_string();
        Ok(Compiled::Str(Box::new(move |_, ctx| Ok(ctx.lookup(&name)))))
    }

    fn compile_binary(
        &mut self,
        op: BinaryOperator,
        left: Compiled<R>,
        right: Compiled<R>,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = op.as_str();

        match op {
            BinaryOperator::And | BinaryOperator::Or => {
                let combine: fn(Option<bool>, Option<bool>) -> Option<bool> = match op {
                    BinaryOperator::And => and3,
                    _ => or3,
                };
                let left = truth(left)?;
                let right = truth(right)?;
                Ok(Compiled::Bool(Box::new(move |record, ctx| {
                    let l = need(left(record, ctx)?, mode, name)?;
                    let r = need(right(record, ctx)?, mode, name)?;
                    Ok(combine(l, r))
                })))
            }

            BinaryOperator::Eq => self.compile_equality(left, right, false),
            BinaryOperator::Ne => self.compile_equality(left, right, true),

            BinaryOperator::Gt | BinaryOperator::Ge | BinaryOperator::Lt | BinaryOperator::Le => {
                self.compile_ordering(op, left, right)
            }

            BinaryOperator::Has => Err(FilterError::UnsupportedOperator(name.to_string())),
        }
    }

    fn compile_equality(
        &mut self,
        left: Compiled<R>,
        right: Compiled<R>,
        negate: bool,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = if negate { "ne" } else { "eq" };

        // comparing against the null literal is an is-null test
        match (left, right) {
            (Compiled::Null, Compiled::Null) => {
                let result = !negate;
                return Ok(Compiled::Bool(Box::new(move |_, _| Ok(Some(result)))));
            }
            (Compiled::Null, other) | (other, Compiled::Null) => {
                let step = self.null_test(other)?;
                return Ok(Compiled::Bool(negate_step(step, negate)));
            }
            (left, right) => {
                let step = self.compile_value_equality(left, right, mode, name)?;
                Ok(Compiled::Bool(negate_step(step, negate)))
            }
        }
    }

    fn null_test(&self, compiled: Compiled<R>) -> FilterResult<Step<R, bool>> {
        Ok(match compiled {
            Compiled::Bool(step) => is_null_step(step),
            Compiled::Int(step) => is_null_step(step),
            Compiled::Float(step) => is_null_step(step),
            Compiled::Str(step) => is_null_step(step),
            Compiled::Date(step) => is_null_step(step),
            Compiled::Group(step) => is_null_step(step),
            Compiled::Bools(step) => is_null_step(step),
            Compiled::Ints(step) => is_null_step(step),
            Compiled::Null => Box::new(|_, _| Ok(Some(true))),
        })
    }

    /// Value equality on the narrowed operands: two missing values compare
    /// equal, a missing value never equals a present one, and a group
    /// compared to a string matches if any element does.
    fn compile_value_equality(
        &self,
        left: Compiled<R>,
        right: Compiled<R>,
        mode: NullPropagation,
        name: &'static str,
    ) -> FilterResult<Step<R, bool>> {
        match (left, right) {
            (Compiled::Bool(l), Compiled::Bool(r)) => Ok(Box::new(move |record, ctx| {
                let lv = need(l(record, ctx)?, mode, name)?;
                let rv = need(r(record, ctx)?, mode, name)?;
                Ok(Some(lv == rv))
            })),
            (Compiled::Int(l), Compiled::Int(r)) => Ok(Box::new(move |record, ctx| {
                let lv = need(l(record, ctx)?, mode, name)?;
                let rv = need(r(record, ctx)?, mode, name)?;
                Ok(Some(lv == rv))
            })),
            (Compiled::Str(l), Compiled::Str(r)) => Ok(Box::new(move |record, ctx| {
                let lv = need(l(record, ctx)?, mode, name)?;
                let rv = need(r(record, ctx)?, mode, name)?;
                Ok(Some(lv == rv))
            })),
            (Compiled::Date(l), Compiled::Date(r)) => Ok(Box::new(move |record, ctx| {
                let lv = need(l(record, ctx)?, mode, name)?;
                let rv = need(r(record, ctx)?, mode, name)?;
                Ok(Some(lv == rv))
            })),
            (Compiled::Float(l), Compiled::Float(r)) => Ok(Box::new(move |record, ctx| {
                let lv = need(l(record, ctx)?, mode, name)?;
                let rv = need(r(record, ctx)?, mode, name)?;
                Ok(Some(lv == rv))
            })),
            (Compiled::Float(l), Compiled::Int(r)) => {
                let r = int_to_float_step(r);
                Ok(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(lv == rv))
                }))
            }
            (Compiled::Int(l), Compiled::Float(r)) => {
                let l = int_to_float_step(l);
                Ok(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(lv == rv))
                }))
            }
            (Compiled::Group(l), Compiled::Str(r)) | (Compiled::Str(r), Compiled::Group(l)) => {
                Ok(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(match (lv, rv) {
                        (Some(items), Some(s)) => items.iter().any(|item| *item == s),
                        (None, None) => true,
                        _ => false,
                    }))
                }))
            }
            (l, r) => Err(FilterError::type_mismatch(l.kind(), r.kind(), name)),
        }
    }

    fn compile_ordering(
        &mut self,
        op: BinaryOperator,
        left: Compiled<R>,
        right: Compiled<R>,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = op.as_str();

        // an unknown operand never matches an ordering comparison
        if matches!(&left, Compiled::Null) || matches!(&right, Compiled::Null) {
            return Ok(Compiled::Bool(Box::new(|_, _| Ok(Some(false)))));
        }

        match (left, right) {
            (Compiled::Int(l), Compiled::Int(r)) => {
                let cmp = self.ordering_fn::<i64>(op)?;
                Ok(Compiled::Bool(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(cmp_opt(cmp, lv, rv)))
                })))
            }

            (Compiled::Float(l), Compiled::Float(r)) => {
                self.float_ordering(op, l, r, mode, name)
            }
            (Compiled::Float(l), Compiled::Int(r)) => {
                let r = int_to_float_step(r);
                self.float_ordering(op, l, r, mode, name)
            }
            (Compiled::Int(l), Compiled::Float(r)) => {
                let l = int_to_float_step(l);
                self.float_ordering(op, l, r, mode, name)
            }

            (Compiled::Date(l), Compiled::Date(r)) => {
                let cmp = self.ordering_fn::<NaiveDateTime>(op)?;
                Ok(Compiled::Bool(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(cmp_opt(cmp, lv, rv)))
                })))
            }

            // collection operands broadcast existentially
            (Compiled::Ints(l), Compiled::Int(r)) => {
                let cmp = self.ordering_fn::<i64>(op)?;
                Ok(Compiled::Bool(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(match (lv, rv) {
                        (Some(items), Some(r)) => items.iter().any(|item| cmp(item, &r)),
                        _ => false,
                    }))
                })))
            }
            (Compiled::Int(l), Compiled::Ints(r)) => {
                let cmp = self.ordering_fn::<i64>(op)?;
                Ok(Compiled::Bool(Box::new(move |record, ctx| {
                    let lv = need(l(record, ctx)?, mode, name)?;
                    let rv = need(r(record, ctx)?, mode, name)?;
                    Ok(Some(match (lv, rv) {
                        (Some(l), Some(items)) => items.iter().any(|item| cmp(&l, item)),
                        _ => false,
                    }))
                })))
            }
            (Compiled::Ints(_), Compiled::Ints(_)) => Err(FilterError::UnsupportedOperator(
                format!("{} between two collections", name),
            )),

            (l, r) => {
                let actual = match &l {
                    Compiled::Int(_) | Compiled::Float(_) | Compiled::Date(_) | Compiled::Ints(_) => {
                        r.kind()
                    }
                    _ => l.kind(),
                };
                Err(FilterError::type_mismatch("Int", actual, name))
            }
        }
    }

    fn float_ordering(
        &self,
        op: BinaryOperator,
        left: Step<R, f64>,
        right: Step<R, f64>,
        mode: NullPropagation,
        name: &'static str,
    ) -> FilterResult<Compiled<R>> {
        let cmp = self.ordering_fn::<f64>(op)?;
        Ok(Compiled::Bool(Box::new(move |record, ctx| {
            let lv = need(left(record, ctx)?, mode, name)?;
            let rv = need(right(record, ctx)?, mode, name)?;
            Ok(Some(cmp_opt(cmp, lv, rv)))
        })))
    }

    fn ordering_fn<T: PartialOrd>(&self, op: BinaryOperator) -> FilterResult<fn(&T, &T) -> bool> {
        op.ordering_fn::<T>()
            .ok_or_else(|| FilterError::UnsupportedOperator(op.as_str().to_string()))
    }

    fn compile_not(&mut self, operand: Compiled<R>) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let step = truth(operand)?;
        Ok(Compiled::Bool(Box::new(move |record, ctx| {
            let value = need(step(record, ctx)?, mode, "not")?;
            Ok(not3(value))
        })))
    }

    fn compile_function(
        &mut self,
        name: &str,
        args: &[Expression],
        depth: usize,
    ) -> FilterResult<Compiled<R>> {
        let func = Function::resolve(name).ok_or_else(|| FilterError::UnknownFunction {
            name: name.to_string(),
        })?;
        if !func.arity().contains(&args.len()) {
            return Err(FilterError::FunctionArgumentCount {
                function: func.name(),
                expected: *func.arity().start(),
                actual: args.len(),
            });
        }

        match func.signature() {
            Signature::StringUnary { returns } => {
                let instance = self.compile_node(&args[0], depth + 1)?;
                self.compile_string_unary(func, returns, instance)
            }
            Signature::StringBinary { returns } => {
                let first = self.compile_node(&args[0], depth + 1)?;
                let second = self.compile_node(&args[1], depth + 1)?;
                self.compile_string_binary(func, returns, first, second)
            }
            Signature::NumericUnary => {
                let arg = self.compile_node(&args[0], depth + 1)?;
                self.compile_numeric_unary(func, arg)
            }
            Signature::DatePart => {
                let arg = self.compile_node(&args[0], depth + 1)?;
                self.compile_date_part(func, arg)
            }
            Signature::NotImplemented => {
                Err(FilterError::UnsupportedOperator(func.name().to_string()))
            }
        }
    }

    fn compile_string_unary(
        &mut self,
        func: Function,
        returns: ElementKind,
        instance: Compiled<R>,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = func.name();

        match instance {
            Compiled::Str(step) => Ok(match returns {
                ElementKind::Int => Compiled::Int(Box::new(move |record, ctx| {
                    Ok(need(step(record, ctx)?, mode, name)?.map(|s| func.unary_string_int(&s)))
                })),
                ElementKind::String => Compiled::Str(Box::new(move |record, ctx| {
                    Ok(need(step(record, ctx)?, mode, name)?.map(|s| func.unary_string_string(&s)))
                })),
                ElementKind::Bool => unreachable!("no unary string function returns Bool"),
            }),

            // group instance broadcasts element-wise
            Compiled::Group(step) => Ok(match returns {
                ElementKind::Int => Compiled::Ints(Box::new(move |record, ctx| {
                    Ok(need(step(record, ctx)?, mode, name)?
                        .map(|items| items.iter().map(|s| func.unary_string_int(s)).collect()))
                })),
                ElementKind::String => Compiled::Group(Box::new(move |record, ctx| {
                    Ok(need(step(record, ctx)?, mode, name)?
                        .map(|items| items.iter().map(|s| func.unary_string_string(s)).collect()))
                })),
                ElementKind::Bool => unreachable!("no unary string function returns Bool"),
            }),

            // a null instance short-circuits without invoking the function
            Compiled::Null => Ok(match returns {
                ElementKind::Int => {
                    Compiled::Int(Box::new(move |_, _| need(None, mode, name)))
                }
                ElementKind::String => {
                    Compiled::Str(Box::new(move |_, _| need(None, mode, name)))
                }
                ElementKind::Bool => unreachable!("no unary string function returns Bool"),
            }),

            other => Err(FilterError::type_mismatch("String", other.kind(), name)),
        }
    }

    fn compile_string_binary(
        &mut self,
        func: Function,
        returns: ElementKind,
        first: Compiled<R>,
        second: Compiled<R>,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = func.name();

        match (first, second) {
            (Compiled::Str(first), Compiled::Str(second)) => Ok(match returns {
                ElementKind::Bool => Compiled::Bool(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(f), Some(s)) => Some(func.binary_string_bool(&f, &s)),
                        _ => None,
                    })
                })),
                ElementKind::Int => Compiled::Int(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(f), Some(s)) => Some(func.binary_string_int(&f, &s)),
                        _ => None,
                    })
                })),
                ElementKind::String => Compiled::Str(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(f), Some(s)) => Some(func.binary_string_string(&f, &s)),
                        _ => None,
                    })
                })),
            }),

            // group instance broadcasts element-wise
            (Compiled::Group(first), Compiled::Str(second)) => Ok(match returns {
                ElementKind::Bool => Compiled::Bools(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(items), Some(s)) => Some(
                            items
                                .iter()
                                .map(|item| func.binary_string_bool(item, &s))
                                .collect(),
                        ),
                        _ => None,
                    })
                })),
                ElementKind::Int => Compiled::Ints(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(items), Some(s)) => Some(
                            items
                                .iter()
                                .map(|item| func.binary_string_int(item, &s))
                                .collect(),
                        ),
                        _ => None,
                    })
                })),
                ElementKind::String => Compiled::Group(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(items), Some(s)) => Some(
                            items
                                .iter()
                                .map(|item| func.binary_string_string(item, &s))
                                .collect(),
                        ),
                        _ => None,
                    })
                })),
            }),

            // a group second argument applies across the cross product
            (Compiled::Str(first), Compiled::Group(second)) => Ok(match returns {
                ElementKind::Bool => Compiled::Bools(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(f), Some(items)) => Some(
                            items
                                .iter()
                                .map(|item| func.binary_string_bool(&f, item))
                                .collect(),
                        ),
                        _ => None,
                    })
                })),
                ElementKind::Int => Compiled::Ints(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(f), Some(items)) => Some(
                            items
                                .iter()
                                .map(|item| func.binary_string_int(&f, item))
                                .collect(),
                        ),
                        _ => None,
                    })
                })),
                ElementKind::String => Compiled::Group(Box::new(move |record, ctx| {
                    let f = need(first(record, ctx)?, mode, name)?;
                    let s = need(second(record, ctx)?, mode, name)?;
                    Ok(match (f, s) {
                        (Some(f), Some(items)) => Some(
                            items
                                .iter()
                                .map(|item| func.binary_string_string(&f, item))
                                .collect(),
                        ),
                        _ => None,
                    })
                })),
            }),

            (Compiled::Group(_), Compiled::Group(_)) => {
                Err(FilterError::type_mismatch("String", "Group", name))
            }

            // a null operand short-circuits to a scalar null of the return
            // kind before any shape check, like the interpreter
            (Compiled::Null, _) | (_, Compiled::Null) => Ok(match returns {
                ElementKind::Bool => Compiled::Bool(Box::new(move |_, _| need(None, mode, name))),
                ElementKind::Int => Compiled::Int(Box::new(move |_, _| need(None, mode, name))),
                ElementKind::String => Compiled::Str(Box::new(move |_, _| need(None, mode, name))),
            }),

            (first, second) => {
                let actual = if matches!(&first, Compiled::Str(_) | Compiled::Group(_)) {
                    second.kind()
                } else {
                    first.kind()
                };
                Err(FilterError::type_mismatch("String", actual, name))
            }
        }
    }

    fn compile_numeric_unary(
        &mut self,
        func: Function,
        arg: Compiled<R>,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = func.name();

        let step: Step<R, f64> = match arg {
            Compiled::Float(step) => step,
            Compiled::Int(step) => int_to_float_step(step),
            Compiled::Null => Box::new(|_, _| Ok(None)),
            other => return Err(FilterError::type_mismatch("Float", other.kind(), name)),
        };

        let apply: fn(f64) -> f64 = match func {
            Function::Round => f64::round,
            Function::Floor => f64::floor,
            Function::Ceiling => f64::ceil,
            other => unreachable!("not a numeric function: {}", other.name()),
        };

        Ok(Compiled::Float(Box::new(move |record, ctx| {
            Ok(need(step(record, ctx)?, mode, name)?.map(apply))
        })))
    }

    fn compile_date_part(&mut self, func: Function, arg: Compiled<R>) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = func.name();

        let step: Step<R, NaiveDateTime> = match arg {
            Compiled::Date(step) => step,
            Compiled::Null => Box::new(|_, _| Ok(None)),
            other => return Err(FilterError::type_mismatch("DateTime", other.kind(), name)),
        };

        let part: fn(&NaiveDateTime) -> i64 = match func {
            Function::Year => |d| d.year() as i64,
            Function::Month => |d| d.month() as i64,
            Function::Day => |d| d.day() as i64,
            Function::Hour => |d| d.hour() as i64,
            Function::Minute => |d| d.minute() as i64,
            Function::Second => |d| d.second() as i64,
            other => unreachable!("not a date part: {}", other.name()),
        };

        Ok(Compiled::Int(Box::new(move |record, ctx| {
            Ok(need(step(record, ctx)?, mode, name)?.map(|d| part(&d)))
        })))
    }

    fn compile_membership(
        &mut self,
        operand: Compiled<R>,
        list: &str,
    ) -> FilterResult<Compiled<R>> {
        let items = parse_membership_list(list)?;

        // a null operand is a non-match, not an error, in both propagation
        // modes
        match operand {
            Compiled::Str(step) => Ok(Compiled::Bool(Box::new(move |record, ctx| {
                Ok(Some(match step(record, ctx)? {
                    Some(s) => items.iter().any(|item| *item == s),
                    None => false,
                }))
            }))),
            Compiled::Group(step) => Ok(Compiled::Bool(Box::new(move |record, ctx| {
                Ok(Some(match step(record, ctx)? {
                    Some(group) => group.iter().any(|g| items.contains(g)),
                    None => false,
                }))
            }))),
            Compiled::Null => Ok(Compiled::Bool(Box::new(|_, _| Ok(Some(false))))),
            other => Err(FilterError::type_mismatch("String", other.kind(), "in")),
        }
    }

    fn compile_quantifier(
        &mut self,
        source: &Expression,
        variable: &str,
        body: Option<&Expression>,
        universal: bool,
        depth: usize,
    ) -> FilterResult<Compiled<R>> {
        let mode = self.options.null_propagation;
        let name = if universal { "all" } else { "any" };

        let source = self.compile_node(source, depth + 1)?;
        let source_step: Step<R, Vec<String>> = match source {
            Compiled::Group(step) => step,
            Compiled::Null => Box::new(|_, _| Ok(None)),
            other => return Err(FilterError::type_mismatch("Group", other.kind(), name)),
        };

        let body_step = match body {
            Some(body) => {
                self.scope.push(variable.to_string());
                let compiled = self.compile_node(body, depth + 1);
                self.scope.pop();
                Some(truth(compiled?)?)
            }
            None => None,
        };

        let variable = variable.to_string();
        Ok(Compiled::Bool(Box::new(move |record, ctx| {
            // a null source collection propagates
            let items = match need(source_step(record, ctx)?, mode, name)? {
                Some(items) => items,
                None => return Ok(None),
            };

            let body = match &body_step {
                Some(body) => body,
                // a bodiless `any` tests non-emptiness
                None => return Ok(Some(!items.is_empty())),
            };

            let mut result = universal;
            for item in items {
                ctx.bindings.push((variable.clone(), item));
                let matched = body(record, ctx)?.unwrap_or(false);
                ctx.bindings.pop();
                if universal {
                    if !matched {
                        result = false;
                        break;
                    }
                } else if matched {
                    result = true;
                    break;
                }
            }
            Ok(Some(result))
        })))
    }
}
