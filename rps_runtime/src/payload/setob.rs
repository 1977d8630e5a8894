//! Mutable ordered sets of objects.

use super::{Payload, payload_any_methods};
use crate::error::RuntimeResult;
use crate::object::{ObjectRef, ObjectZone};
use crate::persist::{DumpVisitor, object_json};
use crate::trace::Tracer;
use crate::types::{SetZone, TupleZone};
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Mutable set of objects, ordered by oid.
#[derive(Debug, Default)]
pub struct SetOb {
    elements: BTreeSet<ObjectRef>,
}

impl SetOb {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ob` belongs to the set.
    #[inline]
    pub fn contains(&self, ob: &ObjectRef) -> bool {
        self.elements.contains(ob)
    }

    /// Number of elements.
    #[inline]
    pub fn cardinal(&self) -> usize {
        self.elements.len()
    }

    /// Whether the set has no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Add `ob`; returns false when it was already present.
    pub fn add(&mut self, ob: ObjectRef) -> bool {
        self.elements.insert(ob)
    }

    /// Remove `ob`; returns false when it was absent.
    pub fn remove(&mut self, ob: &ObjectRef) -> bool {
        self.elements.remove(ob)
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Elements in ascending oid order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectRef> {
        self.elements.iter()
    }

    /// Immutable snapshot as a set value.
    pub fn to_set(&self) -> Arc<SetZone> {
        SetZone::make(self.elements.iter().cloned())
    }

    /// Immutable snapshot as a tuple value, in ascending oid order.
    pub fn to_tuple(&self) -> Arc<TupleZone> {
        TupleZone::make(self.elements.iter().cloned())
    }
}

impl Payload for SetOb {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylSetOb
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
        map.insert("setob".into(), Json::Array(elements));
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Give this object a fresh empty [`SetOb`] payload.
    pub fn put_new_setob_payload(&self) -> RuntimeResult<()> {
        self.put_payload(Box::new(SetOb::new()))
    }
}
