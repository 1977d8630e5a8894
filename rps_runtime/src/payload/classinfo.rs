//! Class metadata.

use super::{Payload, payload_any_methods};
use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ObjectRef, ObjectZone};
use crate::persist::{DumpVisitor, object_json};
use crate::trace::{Trace, Tracer};
use crate::types::{SetZone, TreeZone};
use crate::value::Value;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Payload making its owner a class.
#[derive(Debug, Default)]
pub struct ClassInfo {
    superclass: Option<ObjectRef>,
    methods: BTreeMap<ObjectRef, Arc<TreeZone>>,
    symbol: Option<ObjectRef>,
    attrset: Option<Arc<SetZone>>,
}

impl ClassInfo {
    /// Class metadata with the given superclass.
    pub fn new(superclass: Option<ObjectRef>) -> Self {
        Self {
            superclass,
            ..Self::default()
        }
    }

    /// The direct superclass.
    #[inline]
    pub fn superclass(&self) -> Option<&ObjectRef> {
        self.superclass.as_ref()
    }

    /// Change the superclass.
    pub fn put_superclass(&mut self, superclass: Option<ObjectRef>) {
        self.superclass = superclass;
    }

    /// Method closure for `selector` defined by this very class.
    pub fn get_own_method(&self, selector: &ObjectRef) -> Option<Arc<TreeZone>> {
        self.methods.get(selector).cloned()
    }

    /// Define or replace the method for `selector`.
    pub fn put_own_method(&mut self, selector: &ObjectRef, closure: Arc<TreeZone>) -> RuntimeResult<()> {
        if !closure.is_closure() {
            return Err(RuntimeError::mismatch("closure", "instance"));
        }
        self.methods.insert(selector.clone(), closure);
        Ok(())
    }

    /// Remove the method for `selector`, returning it.
    pub fn remove_own_method(&mut self, selector: &ObjectRef) -> Option<Arc<TreeZone>> {
        self.methods.remove(selector)
    }

    /// Number of methods defined by this class.
    pub fn nb_methods(&self) -> usize {
        self.methods.len()
    }

    /// Selectors of the methods defined by this class.
    pub fn selectors(&self) -> Vec<ObjectRef> {
        self.methods.keys().cloned().collect()
    }

    /// The symbol naming this class.
    pub fn symbol(&self) -> Option<&ObjectRef> {
        self.symbol.as_ref()
    }

    /// Set the symbol naming this class.
    pub fn put_symbol(&mut self, symbol: Option<ObjectRef>) {
        self.symbol = symbol;
    }

    /// Attributes expected on instances.
    pub fn attributes_set(&self) -> Option<&Arc<SetZone>> {
        self.attrset.as_ref()
    }

    /// Set the attributes expected on instances.
    pub fn put_attributes_set(&mut self, attrset: Option<Arc<SetZone>>) {
        self.attrset = attrset;
    }
}

impl Payload for ClassInfo {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylClassInfo
    }

    fn is_erasable(&self) -> bool {
        false
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        self.superclass.trace(tracer);
        for (selector, closure) in &self.methods {
            tracer.trace_object(selector);
            tracer.trace_value(&Value::from(Arc::clone(closure)));
        }
        self.symbol.trace(tracer);
        if let Some(attrset) = &self.attrset {
            tracer.trace_value(&Value::from(Arc::clone(attrset)));
        }
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        if let Some(sup) = &self.superclass {
            map.insert("class_super".into(), object_json(sup, visitor));
        }
        let methods: Vec<Json> = self
            .methods
            .iter()
            .filter(|(selector, _)| visitor.is_dumpable(selector))
            .map(|(selector, closure)| {
                json!({
                    "methosel": object_json(selector, visitor),
                    "methclos": Value::from(Arc::clone(closure)).dump_json(visitor),
                })
            })
            .collect();
        if !methods.is_empty() {
            map.insert("class_methodict".into(), Json::Array(methods));
        }
        if let Some(symbol) = &self.symbol {
            map.insert("class_symb".into(), object_json(symbol, visitor));
        }
        if let Some(attrset) = &self.attrset {
            map.insert("class_attrset".into(), Value::from(Arc::clone(attrset)).dump_json(visitor));
        }
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Turn this object into a class inheriting from `superclass`.
    pub fn put_new_classinfo_payload(&self, superclass: Option<&ObjectRef>) -> RuntimeResult<()> {
        self.put_payload(Box::new(ClassInfo::new(superclass.cloned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::ReachableObjects;
    use crate::trace::CollectingTracer;

    #[test]
    fn test_methods_table() {
        let mut info = ClassInfo::new(None);
        let selector = ObjectZone::make();
        let conn = ObjectZone::make();
        let closure = TreeZone::make_closure(&conn, []);
        info.put_own_method(&selector, closure.clone()).unwrap();
        assert_eq!(info.nb_methods(), 1);
        assert!(Arc::ptr_eq(&info.get_own_method(&selector).unwrap(), &closure));
        let instance = TreeZone::make_instance(&conn, []);
        assert!(info.put_own_method(&selector, instance).is_err());
        assert!(info.remove_own_method(&selector).is_some());
        assert_eq!(info.nb_methods(), 0);
    }

    #[test]
    fn test_gc_mark_reports_everything() {
        let sup = ObjectZone::make();
        let selector = ObjectZone::make();
        let symbol = ObjectZone::make();
        let mut info = ClassInfo::new(Some(sup.clone()));
        info.put_own_method(&selector, TreeZone::make_closure(&sup, [])).unwrap();
        info.put_symbol(Some(symbol.clone()));
        let mut tracer = CollectingTracer::default();
        info.gc_mark(&mut tracer);
        for ob in [&sup, &selector, &symbol] {
            assert!(tracer.objects.contains(ob));
        }
    }

    #[test]
    fn test_class_payload_is_permanent() {
        let class = ObjectZone::make();
        class.put_new_classinfo_payload(None).unwrap();
        assert!(class.is_class());
        assert!(class.put_new_classinfo_payload(None).unwrap_err().is_protocol_violation());
        let dumped = class.dump_json_content(&ReachableObjects::new());
        assert_eq!(dumped["payload"], json!("classinfo"));
    }
}
