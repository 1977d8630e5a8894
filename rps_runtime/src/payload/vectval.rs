//! Mutable vectors of arbitrary values.

use super::{Payload, payload_any_methods};
use crate::error::{RuntimeError, RuntimeResult};
use crate::object::ObjectZone;
use crate::persist::DumpVisitor;
use crate::trace::{Trace, Tracer};
use crate::types::normalize_index;
use crate::value::Value;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};

/// Growable vector of values.
#[derive(Debug, Default)]
pub struct VectVal {
    values: Vec<Value>,
}

impl VectVal {
    /// Empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values.
    #[inline]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`; negative indices count from the end.
    pub fn at(&self, index: i64) -> RuntimeResult<&Value> {
        normalize_index(index, self.values.len())
            .map(|i| &self.values[i])
            .ok_or(RuntimeError::IndexOutOfRange {
                index,
                len: self.values.len(),
            })
    }

    /// Replace the value at `index`, returning the old one.
    pub fn put_at(&mut self, index: i64, value: Value) -> RuntimeResult<Value> {
        let len = self.values.len();
        let i = normalize_index(index, len).ok_or(RuntimeError::IndexOutOfRange { index, len })?;
        Ok(std::mem::replace(&mut self.values[i], value))
    }

    /// Reserve room for `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
    }

    /// Append `value` at the end.
    pub fn push_back(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Remove and return the last value.
    pub fn pop_back(&mut self) -> Option<Value> {
        self.values.pop()
    }

    /// Values in order.
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Copy of the values in order.
    pub fn to_values(&self) -> Vec<Value> {
        self.values.clone()
    }
}

impl Payload for VectVal {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylVectVal
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        self.values.trace(tracer);
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        let values: Vec<Json> = self.values.iter().map(|v| v.dump_json(visitor)).collect();
        map.insert("vectval".into(), Json::Array(values));
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Give this object a fresh empty [`VectVal`] payload.
    pub fn put_new_vectval_payload(&self) -> RuntimeResult<()> {
        self.put_payload(Box::new(VectVal::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::CountingTracer;

    #[test]
    fn test_values_and_marking() {
        let mut vect = VectVal::new();
        vect.push_back(Value::from_int(3));
        vect.push_back(Value::string("three"));
        vect.push_back(Value::empty());
        assert_eq!(vect.size(), 3);
        assert_eq!(vect.at(-2).unwrap().as_cstr().unwrap(), "three");
        let old = vect.put_at(0, Value::from_double(3.0)).unwrap();
        assert_eq!(old, Value::from_int(3));
        assert_eq!(vect.to_values().len(), 3);
        assert_eq!(vect.pop_back(), Some(Value::empty()));
        vect.push_back(Value::empty());

        let mut tracer = CountingTracer::new();
        vect.gc_mark(&mut tracer);
        assert_eq!(tracer.value_count, 3);
    }
}
