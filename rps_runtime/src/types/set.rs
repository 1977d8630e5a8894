//! Immutable ordered sets of objects.
//!
//! The backing array is kept strictly increasing by oid, so membership is
//! a binary search.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::ObjectRef;
use crate::trace::{Trace, Tracer};
use crate::types::{gather_objects, hash_object_sequence, normalize_index};
use crate::value::Value;
use crate::zone::{LazyHash, Zone, ZoneHeader, ZoneRef, ZoneType, register_zone};
use std::sync::Arc;

const SET_K1: u32 = 7933;
const SET_K2: u32 = 8963;
const SET_K3: u32 = 19073;

/// Below this window size, membership falls back to a linear scan.
const LINEAR_SCAN_WINDOW: usize = 4;

/// An immutable set of objects, sorted by oid.
pub struct SetZone {
    hdr: ZoneHeader,
    elems: Box<[ObjectRef]>,
    hash: LazyHash,
}

impl SetZone {
    fn from_sorted(elems: Vec<ObjectRef>) -> Arc<Self> {
        debug_assert!(elems.windows(2).all(|w| w[0] < w[1]), "set not strictly increasing");
        let zone = Self {
            hdr: ZoneHeader::new(ZoneType::Set),
            elems: elems.into_boxed_slice(),
            hash: LazyHash::new(),
        };
        register_zone(Arc::new(zone), ZoneRef::Set)
    }

    /// Build a set from any collection of objects, sorting and removing
    /// duplicates.
    pub fn make<I: IntoIterator<Item = ObjectRef>>(objects: I) -> Arc<Self> {
        let mut elems: Vec<ObjectRef> = objects.into_iter().collect();
        elems.sort_unstable();
        elems.dedup();
        Self::from_sorted(elems)
    }

    /// Build a set from the objects of several values: objects, and the
    /// elements of sets or tuples.
    pub fn collect(values: &[Value]) -> Arc<Self> {
        Self::make(gather_objects(values))
    }

    /// The empty set.
    pub fn empty() -> Arc<Self> {
        Self::from_sorted(Vec::new())
    }

    /// The elements in increasing oid order.
    #[inline]
    pub fn elements(&self) -> &[ObjectRef] {
        &self.elems
    }

    /// Number of elements.
    #[inline]
    pub fn cardinal(&self) -> usize {
        self.elems.len()
    }

    /// Whether the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Index of `ob` in the backing array.
    pub fn element_index(&self, ob: &ObjectRef) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.elems.len();
        while hi - lo > LINEAR_SCAN_WINDOW {
            let mid = lo + (hi - lo) / 2;
            match self.elems[mid].cmp(ob) {
                std::cmp::Ordering::Equal => return Some(mid),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        (lo..hi).find(|&ix| self.elems[ix] == *ob)
    }

    /// Whether `ob` belongs to the set.
    #[inline]
    pub fn contains(&self, ob: &ObjectRef) -> bool {
        self.element_index(ob).is_some()
    }

    /// Element at `index`, negative indices counting from the end.
    pub fn at(&self, index: i64) -> RuntimeResult<ObjectRef> {
        normalize_index(index, self.elems.len())
            .map(|ix| self.elems[ix].clone())
            .ok_or(RuntimeError::IndexOutOfRange {
                index,
                len: self.elems.len(),
            })
    }

    /// Iterate over the elements in order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ObjectRef> {
        self.elems.iter()
    }

    /// Cached hash.
    pub fn hash(&self) -> u32 {
        self.hash
            .get_or_compute(|| hash_object_sequence(SET_K1, SET_K2, SET_K3, &self.elems))
    }
}

impl Zone for SetZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        std::mem::size_of::<Self>().div_ceil(8) + self.elems.len()
    }
}

impl Trace for SetZone {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.elems.trace(tracer);
    }
}

impl<'a> IntoIterator for &'a SetZone {
    type Item = &'a ObjectRef;
    type IntoIter = std::slice::Iter<'a, ObjectRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for SetZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.elems.iter()).finish()
    }
}
