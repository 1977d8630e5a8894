//! Immutable value zones.
//!
//! Strings, doubles and JSON are scalar zones with a lazily computed hash.
//! Sets and tuples are sequences of object references; closures and
//! instances are trees made of a connective object and child values.

pub mod double;
pub mod json;
pub mod set;
pub mod string;
pub mod tree;
pub mod tuple;

pub use double::DoubleZone;
pub use json::JsonZone;
pub use set::SetZone;
pub use string::StringZone;
pub use tree::{TreeMetadata, TreeZone};
pub use tuple::TupleZone;

use crate::object::ObjectRef;
use crate::value::Value;

/// Resolve a possibly negative index against a length.
#[inline]
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let idx = if index < 0 { index + len as i64 } else { index };
    (0..len as i64).contains(&idx).then_some(idx as usize)
}

/// Hash of an object sequence with per-family multipliers.
///
/// Two accumulators consume even and odd positions; the result is never zero.
pub(crate) fn hash_object_sequence(k1: u32, k2: u32, k3: u32, objects: &[ObjectRef]) -> u32 {
    let len = objects.len() as u32;
    let mut h0 = 3317u32.wrapping_add(k3 & 0xff);
    let mut h1 = 31u32.wrapping_mul(len);
    let mut ix = 0;
    while ix < objects.len() {
        h0 = h0.wrapping_mul(k1) ^ objects[ix].obhash().wrapping_mul(k2).wrapping_add(ix as u32);
        let Some(next) = objects.get(ix + 1) else {
            break;
        };
        h1 = h1.wrapping_mul(k2) ^ next.obhash().wrapping_mul(k3).wrapping_sub(h0 & 0xfff);
        ix += 2;
    }
    match h0.wrapping_mul(5).wrapping_add(h1.wrapping_mul(11)) {
        0 => ((h0 & 0xfffff) ^ (h1 & 0xfffff)) + (k1 / 128 + (len & 0xff) + 3),
        h => h,
    }
}

/// Gather the objects referenced by values: objects themselves, and the
/// elements of sets and tuples. Other values are ignored.
pub(crate) fn gather_objects(values: &[Value]) -> Vec<ObjectRef> {
    let mut objects = Vec::with_capacity(values.len());
    for value in values {
        if let Ok(ob) = value.as_object() {
            objects.push(ob);
        } else if let Ok(set) = value.as_set() {
            objects.extend(set.elements().iter().cloned());
        } else if let Ok(tuple) = value.as_tuple() {
            objects.extend(tuple.components().iter().cloned());
        }
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(-3, 3), Some(0));
        assert_eq!(normalize_index(-4, 3), None);
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(0, 0), None);
    }

    #[test]
    fn test_empty_sequence_hash_nonzero() {
        assert_ne!(hash_object_sequence(7933, 8963, 19073, &[]), 0);
        assert_ne!(hash_object_sequence(5939, 18917, 6571, &[]), 0);
    }
}
