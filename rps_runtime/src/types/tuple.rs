//! Immutable tuples of objects.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::ObjectRef;
use crate::trace::{Trace, Tracer};
use crate::types::{gather_objects, hash_object_sequence, normalize_index};
use crate::value::Value;
use crate::zone::{LazyHash, Zone, ZoneHeader, ZoneRef, ZoneType, register_zone};
use std::sync::Arc;

const TUPLE_K1: u32 = 5939;
const TUPLE_K2: u32 = 18917;
const TUPLE_K3: u32 = 6571;

/// An immutable sequence of objects in insertion order.
pub struct TupleZone {
    hdr: ZoneHeader,
    comps: Box<[ObjectRef]>,
    hash: LazyHash,
}

impl TupleZone {
    /// Build a tuple from objects, keeping their order.
    pub fn make<I: IntoIterator<Item = ObjectRef>>(objects: I) -> Arc<Self> {
        let zone = Self {
            hdr: ZoneHeader::new(ZoneType::Tuple),
            comps: objects.into_iter().collect(),
            hash: LazyHash::new(),
        };
        register_zone(Arc::new(zone), ZoneRef::Tuple)
    }

    /// Build a tuple from the objects of several values: objects, and the
    /// elements of sets or tuples.
    pub fn collect(values: &[Value]) -> Arc<Self> {
        Self::make(gather_objects(values))
    }

    /// The components.
    #[inline]
    pub fn components(&self) -> &[ObjectRef] {
        &self.comps
    }

    /// Number of components.
    #[inline]
    pub fn size(&self) -> usize {
        self.comps.len()
    }

    /// Whether the tuple has no component.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    /// Component at `index`, negative indices counting from the end.
    pub fn at(&self, index: i64) -> RuntimeResult<ObjectRef> {
        normalize_index(index, self.comps.len())
            .map(|ix| self.comps[ix].clone())
            .ok_or(RuntimeError::IndexOutOfRange {
                index,
                len: self.comps.len(),
            })
    }

    /// Iterate over the components.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ObjectRef> {
        self.comps.iter()
    }

    /// Cached hash.
    pub fn hash(&self) -> u32 {
        self.hash
            .get_or_compute(|| hash_object_sequence(TUPLE_K1, TUPLE_K2, TUPLE_K3, &self.comps))
    }
}

impl Zone for TupleZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        std::mem::size_of::<Self>().div_ceil(8) + self.comps.len()
    }
}

impl Trace for TupleZone {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.comps.trace(tracer);
    }
}

impl<'a> IntoIterator for &'a TupleZone {
    type Item = &'a ObjectRef;
    type IntoIter = std::slice::Iter<'a, ObjectRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Debug for TupleZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.comps.iter()).finish()
    }
}
