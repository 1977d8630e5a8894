//! Environments: object to value maps chained to a parent.
//!
//! ```text
//!   child env ──parent──► outer env ──parent──► global env
//!   { x: 1 }              { y: 2 }              { x: 9, z: 3 }
//! ```
//!
//! Lookup of `x` from the child finds `1`; of `z` finds `3`. Only one
//! environment is locked at a time during a walk.

use super::{Payload, payload_any_methods};
use crate::MAX_ENVIRONMENT_DEPTH;
use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ObjectRef, ObjectZone};
use crate::persist::{DumpVisitor, object_json};
use crate::trace::{Trace, Tracer};
use crate::value::Value;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json, json};
use std::collections::BTreeMap;

/// One level of bindings.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: BTreeMap<ObjectRef, Value>,
    parent: Option<ObjectRef>,
}

impl Environment {
    /// Empty environment under `parent`.
    pub fn new(parent: Option<ObjectRef>) -> Self {
        Self {
            bindings: BTreeMap::new(),
            parent,
        }
    }

    /// The enclosing environment object.
    #[inline]
    pub fn parent(&self) -> Option<&ObjectRef> {
        self.parent.as_ref()
    }

    /// Change the enclosing environment.
    pub fn put_parent(&mut self, parent: Option<ObjectRef>) {
        self.parent = parent;
    }

    /// Local binding of `key`.
    pub fn get(&self, key: &ObjectRef) -> Option<&Value> {
        self.bindings.get(key)
    }

    /// Bind `key` locally; an empty value removes the binding. Returns the
    /// previous local value or empty.
    pub fn put(&mut self, key: &ObjectRef, value: Value) -> Value {
        let old = if value.is_empty() {
            self.bindings.remove(key)
        } else {
            self.bindings.insert(key.clone(), value)
        };
        old.unwrap_or_default()
    }

    /// Remove the local binding of `key`.
    pub fn remove(&mut self, key: &ObjectRef) -> Value {
        self.bindings.remove(key).unwrap_or_default()
    }

    /// Number of local bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether there is no local binding.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Locally bound keys in oid order.
    pub fn keys(&self) -> impl Iterator<Item = &ObjectRef> {
        self.bindings.keys()
    }
}

impl Payload for Environment {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylEnvironment
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        for (key, value) in &self.bindings {
            tracer.trace_object(key);
            value.trace(tracer);
        }
        self.parent.trace(tracer);
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        let bindings: Vec<Json> = self
            .bindings
            .iter()
            .filter(|(key, _)| visitor.is_dumpable(key))
            .map(|(key, value)| json!({"key": object_json(key, visitor), "val": value.dump_json(visitor)}))
            .collect();
        map.insert("env_map".into(), Json::Array(bindings));
        if let Some(parent) = &self.parent {
            map.insert("env_parent".into(), object_json(parent, visitor));
        }
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Give this object a fresh empty [`Environment`] payload.
    pub fn put_new_environment_payload(&self, parent: Option<&ObjectRef>) -> RuntimeResult<()> {
        self.put_payload(Box::new(Environment::new(parent.cloned())))
    }

    /// Find `key` in this environment or its ancestors.
    ///
    /// Returns `Ok(None)` when no level binds `key`. Fails when this object
    /// or an ancestor has no [`Environment`] payload, or when the chain is
    /// deeper than [`MAX_ENVIRONMENT_DEPTH`].
    pub fn environment_lookup(&self, key: &ObjectRef) -> RuntimeResult<Option<Value>> {
        let (found, mut next) =
            self.with_payload::<Environment, _>(|env| (env.get(key).cloned(), env.parent().cloned()))?;
        if found.is_some() {
            return Ok(found);
        }
        for _ in 1..MAX_ENVIRONMENT_DEPTH {
            let Some(current) = next else {
                return Ok(None);
            };
            let (found, parent) =
                current.with_payload::<Environment, _>(|env| (env.get(key).cloned(), env.parent().cloned()))?;
            if found.is_some() {
                return Ok(found);
            }
            next = parent;
        }
        match next {
            None => Ok(None),
            Some(_) => Err(RuntimeError::DepthExceeded {
                what: "environment",
                limit: MAX_ENVIRONMENT_DEPTH,
            }),
        }
    }
}
