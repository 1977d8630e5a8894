//! Persistence hooks.
//!
//! The runtime defines no file format. A dumper implements [`DumpVisitor`]
//! and drives two hooks exposed by every value, object and payload:
//!
//! - a scan hook reporting the objects reachable from it, and
//! - a JSON hook producing a structured description of it.
//!
//! Value shapes:
//!
//! ```text
//! empty     null
//! int       42
//! object    "_41OFI3r0S1t03qdB2E"
//! string    {"string": "..."}
//! double    {"double": 1.5}
//! json      {"json": ...}
//! set       {"vtype": "set", "elem": [...]}
//! tuple     {"vtype": "tuple", "comp": [...]}
//! closure   {"vtype": "closure", "fn": "_oid", "env": [...]}
//! instance  {"vtype": "instance", "class": "_oid", "sons": [...]}
//! ```

use crate::object::{ObjectRef, ObjectZone};
use crate::trace::Tracer;
use crate::value::Value;
use crate::zone::ZoneRef;
use serde_json::{Map, Value as Json, json};
use std::collections::{BTreeSet, VecDeque};

/// Receiver of the scan and serialization hooks.
pub trait DumpVisitor {
    /// Report an object reachable from what is being scanned.
    fn scan_object(&mut self, ob: &ObjectRef);

    /// Whether references to `ob` should be written. Non-dumpable objects
    /// are serialized as `null`.
    fn is_dumpable(&self, _ob: &ObjectRef) -> bool {
        true
    }
}

/// Adapts a [`DumpVisitor`] into a [`Tracer`], so that every GC mark hook
/// doubles as a scan hook.
pub struct ScanTracer<'a> {
    visitor: &'a mut dyn DumpVisitor,
}

impl<'a> ScanTracer<'a> {
    /// Wrap a visitor.
    pub fn new(visitor: &'a mut dyn DumpVisitor) -> Self {
        Self { visitor }
    }
}

impl Tracer for ScanTracer<'_> {
    fn trace_value(&mut self, value: &Value) {
        value.dump_scan(self.visitor);
    }

    fn trace_object(&mut self, object: &ObjectRef) {
        self.visitor.scan_object(object);
    }
}

/// JSON reference to an object, `null` when not dumpable.
pub fn object_json(ob: &ObjectRef, visitor: &dyn DumpVisitor) -> Json {
    if visitor.is_dumpable(ob) {
        Json::String(ob.oid().to_string())
    } else {
        log::warn!("reference to non-dumpable object {} written as null", ob.oid());
        Json::Null
    }
}

impl Value {
    /// Report the objects directly reachable from this value.
    pub fn dump_scan(&self, visitor: &mut dyn DumpVisitor) {
        let Value::Ptr(zone) = self else {
            return;
        };
        match zone {
            ZoneRef::Object(ob) => visitor.scan_object(ob),
            ZoneRef::Set(set) => set.iter().for_each(|ob| visitor.scan_object(ob)),
            ZoneRef::Tuple(tuple) => tuple.iter().for_each(|ob| visitor.scan_object(ob)),
            ZoneRef::Closure(tree) | ZoneRef::Instance(tree) => {
                visitor.scan_object(tree.connective());
                for son in tree.sons() {
                    son.dump_scan(visitor);
                }
            }
            ZoneRef::String(_) | ZoneRef::Double(_) | ZoneRef::Json(_) => {}
        }
    }

    /// Structured description of this value.
    pub fn dump_json(&self, visitor: &dyn DumpVisitor) -> Json {
        let zone = match self {
            Value::Empty => return Json::Null,
            Value::Int(i) => return json!(i),
            Value::Ptr(zone) => zone,
        };
        let objects = |obs: &[ObjectRef]| -> Json {
            obs.iter().map(|ob| object_json(ob, visitor)).collect()
        };
        let values = |vals: &[Value]| -> Json { vals.iter().map(|v| v.dump_json(visitor)).collect() };
        match zone {
            ZoneRef::Object(ob) => object_json(ob, visitor),
            ZoneRef::String(s) => json!({ "string": s.as_str() }),
            ZoneRef::Double(d) => json!({ "double": d.value() }),
            ZoneRef::Json(j) => json!({ "json": j.json() }),
            ZoneRef::Set(set) => json!({ "vtype": "set", "elem": objects(set.elements()) }),
            ZoneRef::Tuple(tuple) => json!({ "vtype": "tuple", "comp": objects(tuple.components()) }),
            ZoneRef::Closure(tree) => json!({
                "vtype": "closure",
                "fn": object_json(tree.connective(), visitor),
                "env": values(tree.sons()),
            }),
            ZoneRef::Instance(tree) => json!({
                "vtype": "instance",
                "class": object_json(tree.connective(), visitor),
                "sons": values(tree.sons()),
            }),
        }
    }
}

impl ObjectZone {
    /// Report the objects reachable from this object's content.
    pub fn dump_scan_content(&self, visitor: &mut dyn DumpVisitor) {
        visitor.scan_object(&self.class());
        if let Some(space) = self.space() {
            visitor.scan_object(&space);
        }
        for (key, val) in self.attributes_snapshot() {
            visitor.scan_object(&key);
            val.dump_scan(visitor);
        }
        for comp in self.components_snapshot() {
            comp.dump_scan(visitor);
        }
        self.with_content(|content| {
            if let Some(payload) = &content.payload {
                payload.dump_scan(visitor);
            }
        });
    }

    /// Structured description of this object's content.
    pub fn dump_json_content(&self, visitor: &dyn DumpVisitor) -> Json {
        let mut map = Map::new();
        map.insert("oid".into(), Json::String(self.oid().to_string()));
        map.insert("class".into(), object_json(&self.class(), visitor));
        if let Some(space) = self.space() {
            map.insert("space".into(), object_json(&space, visitor));
        }
        map.insert("mtime".into(), json!(self.mtime()));
        let attrs: Vec<Json> = self
            .attributes_snapshot()
            .into_iter()
            .filter(|(key, _)| visitor.is_dumpable(key))
            .map(|(key, val)| json!({ "at": object_json(&key, visitor), "va": val.dump_json(visitor) }))
            .collect();
        if !attrs.is_empty() {
            map.insert("attrs".into(), Json::Array(attrs));
        }
        let comps: Vec<Json> = self
            .components_snapshot()
            .iter()
            .map(|comp| comp.dump_json(visitor))
            .collect();
        if !comps.is_empty() {
            map.insert("comps".into(), Json::Array(comps));
        }
        self.with_content(|content| {
            if let Some(payload) = &content.payload {
                map.insert("payload".into(), Json::String(payload.payload_type_name().into()));
                payload.dump_json_content(visitor, &mut map);
            }
        });
        Json::Object(map)
    }
}

/// A visitor gathering every object transitively reachable from some
/// starting objects, the way a dumper discovers what to write.
#[derive(Default)]
pub struct ReachableObjects {
    seen: BTreeSet<ObjectRef>,
    queue: VecDeque<ObjectRef>,
}

impl ReachableObjects {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan from `roots` until no new object is found, returning every
    /// object reached in oid order.
    pub fn scan_from<'a, I>(mut self, roots: I) -> Vec<ObjectRef>
    where
        I: IntoIterator<Item = &'a ObjectRef>,
    {
        for root in roots {
            self.scan_object(root);
        }
        while let Some(ob) = self.queue.pop_front() {
            ob.dump_scan_content(&mut self);
        }
        self.seen.into_iter().collect()
    }
}

impl DumpVisitor for ReachableObjects {
    fn scan_object(&mut self, ob: &ObjectRef) {
        if self.seen.insert(ob.clone()) {
            self.queue.push_back(ob.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SetZone, TreeZone, TupleZone};

    struct NothingDumpable;

    impl DumpVisitor for NothingDumpable {
        fn scan_object(&mut self, _ob: &ObjectRef) {}

        fn is_dumpable(&self, _ob: &ObjectRef) -> bool {
            false
        }
    }

    #[test]
    fn test_scalar_shapes() {
        let mut v = ReachableObjects::new();
        assert_eq!(Value::Empty.dump_json(&v), Json::Null);
        assert_eq!(Value::from_int(-4).dump_json(&v), json!(-4));
        assert_eq!(Value::string("hi").dump_json(&v), json!({"string": "hi"}));
        assert_eq!(Value::from_double(0.5).dump_json(&v), json!({"double": 0.5}));
        assert_eq!(
            Value::from_json(json!([1, "x"])).dump_json(&v),
            json!({"json": [1, "x"]})
        );
        Value::string("no objects").dump_scan(&mut v);
        assert!(v.seen.is_empty());
    }

    #[test]
    fn test_sequence_and_tree_shapes() {
        let v = ReachableObjects::new();
        let a = ObjectZone::make();
        let b = ObjectZone::make();
        let (lo, hi) = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        let set = Value::from(SetZone::make([hi.clone(), lo.clone()]));
        assert_eq!(
            set.dump_json(&v),
            json!({"vtype": "set", "elem": [lo.oid().to_string(), hi.oid().to_string()]})
        );
        let tuple = Value::from(TupleZone::make([a.clone()]));
        assert_eq!(
            tuple.dump_json(&v),
            json!({"vtype": "tuple", "comp": [a.oid().to_string()]})
        );
        let closure = Value::from(TreeZone::make_closure(&a, [Value::from_int(1)]));
        assert_eq!(
            closure.dump_json(&v),
            json!({"vtype": "closure", "fn": a.oid().to_string(), "env": [1]})
        );
        let inst = Value::from(TreeZone::make_instance(&b, [Value::Empty]));
        assert_eq!(
            inst.dump_json(&v),
            json!({"vtype": "instance", "class": b.oid().to_string(), "sons": [null]})
        );
    }

    #[test]
    fn test_non_dumpable_written_as_null() {
        let ob = ObjectZone::make();
        assert_eq!(ob.as_value().dump_json(&NothingDumpable), Json::Null);
    }

    #[test]
    fn test_reachable_objects_follow_content() {
        let root = ObjectZone::make();
        let key = ObjectZone::make();
        let far = ObjectZone::make();
        let comp_target = ObjectZone::make();
        let unrelated = ObjectZone::make();
        key.append_comp1(far.as_value());
        root.put_attr(&key, Value::from(TupleZone::make([comp_target.clone()])))
            .unwrap();
        let reached = ReachableObjects::new().scan_from([&root]);
        for ob in [&root, &key, &far, &comp_target] {
            assert!(reached.contains(ob), "missing {ob}");
        }
        assert!(!reached.contains(&unrelated));
    }

    #[test]
    fn test_object_content_json() {
        let v = ReachableObjects::new();
        let ob = ObjectZone::make();
        let key = ObjectZone::make();
        ob.put_attr(&key, Value::from_int(3)).unwrap();
        ob.append_comp1(Value::string("c"));
        let dumped = ob.dump_json_content(&v);
        assert_eq!(dumped["oid"], json!(ob.oid().to_string()));
        assert_eq!(dumped["attrs"][0]["va"], json!(3));
        assert_eq!(dumped["comps"][0], json!({"string": "c"}));
        assert!(dumped.get("payload").is_none());
    }
}
