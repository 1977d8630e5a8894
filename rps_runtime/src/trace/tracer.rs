//! Tracer interface for object graph traversal.

use crate::object::ObjectRef;
use crate::value::Value;

/// Visitor receiving the references of traced zones.
///
/// The collector implements it to set mark bits and queue objects; the
/// dumper and diagnostics implement it to enumerate reachable objects.
pub trait Tracer {
    /// Trace a value that may reference a zone.
    fn trace_value(&mut self, value: &Value);

    /// Trace an object reference.
    fn trace_object(&mut self, object: &ObjectRef);
}

/// A tracer that does nothing (for testing).
pub struct NullTracer;

impl Tracer for NullTracer {
    #[inline]
    fn trace_value(&mut self, _value: &Value) {}

    #[inline]
    fn trace_object(&mut self, _object: &ObjectRef) {}
}

/// A counting tracer for debugging and statistics.
pub struct CountingTracer {
    /// Number of values traced.
    pub value_count: usize,
    /// Number of objects traced.
    pub object_count: usize,
}

impl CountingTracer {
    /// Create a new counting tracer.
    pub fn new() -> Self {
        Self {
            value_count: 0,
            object_count: 0,
        }
    }

    /// Get total number of references traced.
    pub fn total(&self) -> usize {
        self.value_count + self.object_count
    }
}

impl Default for CountingTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for CountingTracer {
    fn trace_value(&mut self, _value: &Value) {
        self.value_count += 1;
    }

    fn trace_object(&mut self, _object: &ObjectRef) {
        self.object_count += 1;
    }
}

/// Collects traced objects in visiting order.
#[derive(Default)]
pub struct CollectingTracer {
    /// Objects seen, including duplicates.
    pub objects: Vec<ObjectRef>,
}

impl Tracer for CollectingTracer {
    fn trace_value(&mut self, value: &Value) {
        if let Some(ob) = value.to_object(None) {
            self.objects.push(ob);
        }
    }

    fn trace_object(&mut self, object: &ObjectRef) {
        self.objects.push(object.clone());
    }
}
