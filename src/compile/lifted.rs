//! Lifted nullable operators.
//!
//! Both operands of a binary operator are lifted to an optional
//! representation before the operator is applied, so the three-valued truth
//! tables fall out of these helpers instead of being hand-coded at every
//! call site. Equality needs no helper: `Option<T>` equality is already
//! value equality with two nulls comparing equal.

/// `AND` over nullable booleans, per the SQL truth table: a false operand
/// wins, a null operand otherwise makes the result null.
pub(crate) fn and3(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// `OR` over nullable booleans: a true operand wins.
pub(crate) fn or3(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// `NOT` over a nullable boolean.
pub(crate) fn not3(value: Option<bool>) -> Option<bool> {
    value.map(|b| !b)
}

/// Ordering over nullable operands: a null operand never matches. This
/// deliberately deviates from strict SQL three-valued logic, preserving the
/// engine's observed behavior.
pub(crate) fn cmp_opt<T: PartialOrd>(
    cmp: fn(&T, &T) -> bool,
    left: Option<T>,
    right: Option<T>,
) -> bool {
    match (left, right) {
        (Some(l), Some(r)) => cmp(&l, &r),
        _ => false,
    }
}
