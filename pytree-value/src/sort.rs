//! Canonical total ordering over mapping keys.
//!
//! Plain and defaulting mappings flatten with their keys in a canonical
//! order so that structurally equal mappings produce identical flat forms
//! regardless of insertion order. The chain has three stages:
//!
//! 1. natural ordering of the keys;
//! 2. if some pair has no natural order (heterogeneous types), ordering by
//!    `(fully_qualified_type_name, key)`;
//! 3. if even that fails (same-typed keys with no ordering at all), the
//!    keys stay in insertion order.
//!
//! The sort is stable and never fails; a failed stage leaves the input
//! untouched.

use core::cmp::Ordering;

use crate::value::Value;

/// Natural comparison between two values.
///
/// Numbers (booleans included) are mutually comparable, floats by their
/// numeric total order; strings compare by code point; tuples and lists
/// compare elementwise. Everything else — `None` with itself included —
/// has no natural order and yields `None`.
pub fn try_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Tuple(x), Value::Tuple(y)) | (Value::List(x), Value::List(y)) => {
            compare_sequences(x, y)
        }
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => Some(x.total_cmp(&y)),
            _ => None,
        },
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(v) => Some(u8::from(*v).into()),
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        _ => None,
    }
}

fn compare_sequences(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        match try_compare(x, y)? {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(a.len().cmp(&b.len()))
}

// Stage two: order by qualified type name first; keys of the same type
// fall back to their natural order, and if that is still missing the whole
// stage fails.
fn fallback_compare(a: &Value, b: &Value) -> Option<Ordering> {
    let names = a
        .value_type()
        .qualified_name()
        .cmp(b.value_type().qualified_name());
    match names {
        Ordering::Equal => try_compare(a, b),
        other => Some(other),
    }
}

/// Sort `keys` into the canonical total order, leaving them in insertion
/// order when no stage of the fallback chain applies.
pub fn total_order_sort(keys: &mut [Value]) {
    if let Some(sorted) = try_stable_sort(keys, try_compare) {
        keys.clone_from_slice(&sorted);
    } else if let Some(sorted) = try_stable_sort(keys, fallback_compare) {
        keys.clone_from_slice(&sorted);
    }
}

/// Clone-and-sort convenience over [`total_order_sort`].
pub fn sorted_keys(keys: &[Value]) -> Vec<Value> {
    let mut keys = keys.to_vec();
    total_order_sort(&mut keys);
    keys
}

// Sorts a scratch copy so a failed comparison cannot leave the input
// partially reordered.
fn try_stable_sort(
    keys: &[Value],
    compare: fn(&Value, &Value) -> Option<Ordering>,
) -> Option<Vec<Value>> {
    let mut comparable = true;
    let mut scratch = keys.to_vec();
    scratch.sort_by(|a, b| match compare(a, b) {
        Some(ordering) => ordering,
        None => {
            comparable = false;
            Ordering::Equal
        }
    });
    comparable.then_some(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homogeneous_keys_sort_naturally() {
        let mut keys = vec![Value::from("b"), Value::from("a"), Value::from("c")];
        total_order_sort(&mut keys);
        assert_eq!(keys, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
    }

    #[test]
    fn numbers_and_bools_are_mutually_ordered() {
        let mut keys = vec![Value::from(2.5), Value::from(true), Value::from(2)];
        total_order_sort(&mut keys);
        assert_eq!(keys, vec![Value::from(true), Value::from(2), Value::from(2.5)]);
    }

    #[test]
    fn heterogeneous_keys_fall_back_to_type_names() {
        // builtins.int < builtins.str
        let mut keys = vec![Value::from("a"), Value::from(3), Value::from(1)];
        total_order_sort(&mut keys);
        assert_eq!(keys, vec![Value::from(1), Value::from(3), Value::from("a")]);
    }

    #[test]
    fn unorderable_keys_keep_insertion_order() {
        let mut keys = vec![Value::None, Value::None, Value::from(1)];
        let before = keys.clone();
        total_order_sort(&mut keys);
        assert_eq!(keys, before);
    }

    #[test]
    fn tuples_compare_elementwise() {
        let mut keys = vec![
            Value::Tuple(vec![Value::from(1), Value::from(2)]),
            Value::Tuple(vec![Value::from(1)]),
            Value::Tuple(vec![Value::from(0), Value::from(9)]),
        ];
        total_order_sort(&mut keys);
        assert_eq!(
            keys,
            vec![
                Value::Tuple(vec![Value::from(0), Value::from(9)]),
                Value::Tuple(vec![Value::from(1)]),
                Value::Tuple(vec![Value::from(1), Value::from(2)]),
            ]
        );
    }
}
