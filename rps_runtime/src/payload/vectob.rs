//! Mutable vectors of objects.

use super::{Payload, payload_any_methods};
use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ObjectRef, ObjectZone};
use crate::persist::{DumpVisitor, object_json};
use crate::trace::Tracer;
use crate::types::{TupleZone, normalize_index};
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};
use std::sync::Arc;

/// Growable vector of objects.
#[derive(Debug, Default)]
pub struct VectOb {
    elements: Vec<ObjectRef>,
}

impl VectOb {
    /// Empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty vector with room for `capacity` objects.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Whether the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `index`; negative indices count from the end.
    pub fn at(&self, index: i64) -> RuntimeResult<&ObjectRef> {
        normalize_index(index, self.elements.len())
            .map(|i| &self.elements[i])
            .ok_or(RuntimeError::IndexOutOfRange {
                index,
                len: self.elements.len(),
            })
    }

    /// Replace the element at `index`, returning the old one.
    pub fn put_at(&mut self, index: i64, ob: ObjectRef) -> RuntimeResult<ObjectRef> {
        let len = self.elements.len();
        let i = normalize_index(index, len).ok_or(RuntimeError::IndexOutOfRange { index, len })?;
        Ok(std::mem::replace(&mut self.elements[i], ob))
    }

    /// Reserve room for `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        self.elements.reserve(additional);
    }

    /// Append `ob` at the end.
    pub fn push_back(&mut self, ob: ObjectRef) {
        self.elements.push(ob);
    }

    /// Remove and return the last element.
    pub fn pop_back(&mut self) -> Option<ObjectRef> {
        self.elements.pop()
    }

    /// Elements in order.
    pub fn as_slice(&self) -> &[ObjectRef] {
        &self.elements
    }

    /// Immutable snapshot as a tuple value.
    pub fn to_tuple(&self) -> Arc<TupleZone> {
        TupleZone::make(self.elements.iter().cloned())
    }
}

impl Payload for VectOb {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylVectOb
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        for ob in &self.elements {
            tracer.trace_object(ob);
        }
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        let elements: Vec<Json> = self
            .elements
            .iter()
            .filter(|ob| visitor.is_dumpable(ob))
            .map(|ob| object_json(ob, visitor))
            .collect();
        map.insert("vectob".into(), Json::Array(elements));
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Give this object a fresh empty [`VectOb`] payload.
    pub fn put_new_vectob_payload(&self) -> RuntimeResult<()> {
        self.put_payload(Box::new(VectOb::new()))
    }
}
