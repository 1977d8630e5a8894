//! Trees: closures and immutable instances.
//!
//! A tree pairs a connective object with a fixed array of child values.
//! For a closure the connective is the function to apply; for an instance
//! it is the class. Optional metadata (an owning object and a small rank)
//! annotates provenance without taking part in equality or hashing.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::ObjectRef;
use crate::trace::{Trace, Tracer};
use crate::types::normalize_index;
use crate::value::Value;
use crate::zone::{LazyHash, Zone, ZoneHeader, ZoneRef, ZoneType, register_zone};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;

const CLOSURE_K: [u32; 4] = [8161, 9151, 10151, 13171];
const INSTANCE_K: [u32; 4] = [8171, 9157, 10159, 13177];

/// Provenance metadata of a tree.
#[derive(Debug, Clone, Default)]
pub struct TreeMetadata {
    /// Metadata that should not be persisted.
    pub transient: bool,
    /// Small rank inside the owning object.
    pub metarank: i32,
    /// Owning object, if any.
    pub metaobject: Option<ObjectRef>,
}

/// A closure or an instance.
pub struct TreeZone {
    hdr: ZoneHeader,
    connective: ObjectRef,
    sons: Box<[Value]>,
    hash: LazyHash,
    meta: Mutex<TreeMetadata>,
}

impl TreeZone {
    fn make(ztype: ZoneType, connective: ObjectRef, sons: Vec<Value>) -> Arc<Self> {
        let zone = Self {
            hdr: ZoneHeader::new(ztype),
            connective,
            sons: sons.into_boxed_slice(),
            hash: LazyHash::new(),
            meta: Mutex::new(TreeMetadata::default()),
        };
        let wrap: fn(Arc<Self>) -> ZoneRef = if ztype == ZoneType::Instance {
            ZoneRef::Instance
        } else {
            ZoneRef::Closure
        };
        register_zone(Arc::new(zone), wrap)
    }

    /// Build a closure applying `connective` with closed values `sons`.
    pub fn make_closure<I: IntoIterator<Item = Value>>(connective: &ObjectRef, sons: I) -> Arc<Self> {
        Self::make(ZoneType::Closure, connective.clone(), sons.into_iter().collect())
    }

    /// Build an instance of `class` with components `sons`.
    pub fn make_instance<I: IntoIterator<Item = Value>>(class: &ObjectRef, sons: I) -> Arc<Self> {
        Self::make(ZoneType::Instance, class.clone(), sons.into_iter().collect())
    }

    /// Whether this tree is a closure.
    #[inline]
    pub fn is_closure(&self) -> bool {
        self.hdr.ztype() == ZoneType::Closure
    }

    /// Whether this tree is an instance.
    #[inline]
    pub fn is_instance(&self) -> bool {
        self.hdr.ztype() == ZoneType::Instance
    }

    /// The connective object.
    #[inline]
    pub fn connective(&self) -> &ObjectRef {
        &self.connective
    }

    /// The class of an instance, which is its connective.
    #[inline]
    pub fn instance_class(&self) -> &ObjectRef {
        &self.connective
    }

    /// Child values.
    #[inline]
    pub fn sons(&self) -> &[Value] {
        &self.sons
    }

    /// Number of children.
    #[inline]
    pub fn nb_sons(&self) -> usize {
        self.sons.len()
    }

    /// Child at `index`, negative indices counting from the end.
    ///
    /// With `dont_fail`, an out of range index gives the empty value.
    pub fn at(&self, index: i64, dont_fail: bool) -> RuntimeResult<Value> {
        match normalize_index(index, self.sons.len()) {
            Some(ix) => Ok(self.sons[ix].clone()),
            None if dont_fail => Ok(Value::Empty),
            None => Err(RuntimeError::IndexOutOfRange {
                index,
                len: self.sons.len(),
            }),
        }
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Snapshot of the metadata.
    pub fn metadata(&self) -> TreeMetadata {
        self.meta.lock().clone()
    }

    /// Owning object and rank.
    pub fn metaobject(&self) -> (Option<ObjectRef>, i32) {
        let meta = self.meta.lock();
        (meta.metaobject.clone(), meta.metarank)
    }

    /// Replace the metadata.
    pub fn put_metadata(&self, metaobject: Option<ObjectRef>, metarank: i32, transient: bool) {
        let mut meta = self.meta.lock();
        meta.metaobject = metaobject;
        meta.metarank = metarank;
        meta.transient = transient;
    }

    /// Set the metadata only if no owning object was recorded yet.
    ///
    /// Returns `true` when the metadata was set.
    pub fn put_metadata_if_empty(&self, metaobject: &ObjectRef, metarank: i32) -> bool {
        let mut meta = self.meta.lock();
        if meta.metaobject.is_some() {
            return false;
        }
        meta.metaobject = Some(metaobject.clone());
        meta.metarank = metarank;
        true
    }

    /// Whether the metadata is transient.
    pub fn is_metatransient(&self) -> bool {
        self.meta.lock().transient
    }

    // =========================================================================
    // Hashing and Ordering
    // =========================================================================

    /// Cached hash, seeded by the connective.
    pub fn hash(&self) -> u32 {
        self.hash.get_or_compute(|| {
            let [k1, k2, k3, k4] = if self.is_instance() { INSTANCE_K } else { CLOSURE_K };
            let conn_hash = self.connective.obhash();
            let len = self.sons.len() as u32;
            let mut h0 = 3317u32
                .wrapping_add(k1 & 0xff)
                .wrapping_add(conn_hash.wrapping_mul(k3));
            let mut h1 = 211u32.wrapping_mul(len);
            let mut ix = 0;
            while ix < self.sons.len() {
                let son = &self.sons[ix];
                if !son.is_empty() {
                    h0 = h0.wrapping_mul(k1) ^ son.valhash().wrapping_mul(k2).wrapping_add(ix as u32);
                }
                let Some(next) = self.sons.get(ix + 1) else {
                    break;
                };
                if !next.is_empty() {
                    h1 = h1.wrapping_mul(k3) ^ next.valhash().wrapping_mul(k4).wrapping_sub(h0 & 0xfff);
                }
                ix += 2;
            }
            match h0.wrapping_mul(53).wrapping_add(h1.wrapping_mul(17)) {
                0 => ((h0 & 0xfffff) ^ (h1 & 0xfffff)) + (k3 / 128 + conn_hash % 65353 + (len & 0xff) + 13),
                h => h,
            }
        })
    }

    /// Compare connectives, then children lexicographically.
    pub fn compare(&self, other: &TreeZone) -> Ordering {
        self.connective
            .cmp(&other.connective)
            .then_with(|| self.sons.cmp(&other.sons))
    }
}

impl Zone for TreeZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        std::mem::size_of::<Self>().div_ceil(8) + 2 * self.sons.len()
    }
}

impl Trace for TreeZone {
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_object(&self.connective);
        self.sons.trace(tracer);
        if let Some(owner) = self.meta.lock().metaobject.clone() {
            tracer.trace_object(&owner);
        }
    }
}

impl std::fmt::Debug for TreeZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(if self.is_instance() { "Instance" } else { "Closure" })
            .field("connective", &self.connective)
            .field("sons", &self.sons)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectZone;

    #[test]
    fn test_closure_and_instance_are_distinct() {
        let conn = ObjectZone::make();
        let sons = [Value::from_int(1), Value::string("two")];
        let closure = TreeZone::make_closure(&conn, sons.clone());
        let instance = TreeZone::make_instance(&conn, sons);
        assert!(closure.is_closure() && instance.is_instance());
        assert_ne!(closure.hash(), instance.hash());
        assert_ne!(Value::from(closure), Value::from(instance));
    }

    #[test]
    fn test_equal_trees_hash_alike() {
        let conn = ObjectZone::make();
        let a = TreeZone::make_closure(&conn, [Value::from_int(3), Value::Empty]);
        let b = TreeZone::make_closure(&conn, [Value::from_int(3), Value::Empty]);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_eq!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_at_dont_fail() {
        let conn = ObjectZone::make();
        let tree = TreeZone::make_instance(&conn, [Value::from_int(5)]);
        assert_eq!(tree.at(-1, false).unwrap(), Value::from_int(5));
        assert!(tree.at(1, true).unwrap().is_empty());
        assert!(tree.at(1, false).is_err());
    }

    #[test]
    fn test_metadata_ignored_by_equality() {
        let conn = ObjectZone::make();
        let owner = ObjectZone::make();
        let a = TreeZone::make_closure(&conn, [Value::from_int(1)]);
        let b = TreeZone::make_closure(&conn, [Value::from_int(1)]);
        let before = a.hash();
        assert!(a.put_metadata_if_empty(&owner, 4));
        assert!(!a.put_metadata_if_empty(&conn, 5));
        assert_eq!(a.metaobject(), (Some(owner), 4));
        assert_eq!(a.hash(), before);
        assert_eq!(a.compare(&b), Ordering::Equal);
    }
}
