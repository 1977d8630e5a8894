//! Marking and sweeping over the zone registry.
//!
//! Objects are queued on a worklist once their mark bit is set, then
//! scanned one by one. Immutable values (sets, tuples, trees) are scanned
//! recursively as soon as they are reached, with a depth ceiling.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MARK                                                                   │
//! │                                                                         │
//! │  roots ──▶ object A ──mark──▶ worklist [A] ──scan A──▶ tuple T          │
//! │                                                    │                    │
//! │                                   recurse (depth+1) ▼                   │
//! │                                             object B ──mark──▶ [B]      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  SWEEP                                                                  │
//! │                                                                         │
//! │  registry: [ _ | A* | T* | C | B* | D ]     * = marked                  │
//! │                         ──▶ C, D unregistered, rank 0, RECLAIMED        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rps_runtime::zone::Zone;
use rps_runtime::{ObjectRef, RuntimeError, Trace, Tracer, Value, ZoneRef, object_table, zone_registry};
use std::collections::VecDeque;

/// Marking state of one collection.
pub(crate) struct Marker {
    worklist: VecDeque<ObjectRef>,
    depth: usize,
    max_depth: usize,
    nb_marks: usize,
    trace: bool,
    failure: Option<RuntimeError>,
}

impl Marker {
    /// Create a marker with the given recursion ceiling.
    pub(crate) fn new(max_depth: usize, trace: bool) -> Self {
        Self {
            worklist: VecDeque::new(),
            depth: 0,
            max_depth,
            nb_marks: 0,
            trace,
            failure: None,
        }
    }

    /// Zones newly marked so far.
    #[cfg(test)]
    pub(crate) fn nb_marks(&self) -> usize {
        self.nb_marks
    }

    /// Scan queued objects until the worklist is empty.
    pub(crate) fn drain(&mut self) {
        while let Some(ob) = self.worklist.pop_front() {
            if self.failure.is_some() {
                self.worklist.clear();
                return;
            }
            Trace::trace(&*ob, self);
        }
    }

    /// The error that aborted marking, if any.
    pub(crate) fn finish(self) -> Result<usize, RuntimeError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.nb_marks),
        }
    }

    fn mark_zone(&mut self, zone: &ZoneRef) {
        if self.failure.is_some() {
            return;
        }
        if let ZoneRef::Object(ob) = zone {
            self.trace_object(ob);
            return;
        }
        if !zone.header().mark() {
            return;
        }
        self.nb_marks += 1;
        if self.depth >= self.max_depth {
            self.failure = Some(RuntimeError::DepthExceeded {
                what: "gc marking",
                limit: self.max_depth,
            });
            return;
        }
        self.depth += 1;
        zone.trace(self);
        self.depth -= 1;
    }
}

impl Tracer for Marker {
    fn trace_value(&mut self, value: &Value) {
        if let Value::Ptr(zone) = value {
            self.mark_zone(zone);
        }
    }

    fn trace_object(&mut self, object: &ObjectRef) {
        if object.header().mark() {
            if self.trace {
                log::trace!("GC marked {}", object.oid());
            }
            self.nb_marks += 1;
            self.worklist.push_back(object.clone());
        }
    }
}

/// Unregister every unmarked zone.
///
/// Swept objects leave the object table, and when `clear` is set they drop
/// everything they reference. Returns the number of zones swept.
pub(crate) fn sweep(clear: bool, trace: bool) -> usize {
    let doomed = zone_registry().sweep_unmarked();
    let count = doomed.len();
    for zone in &doomed {
        let ZoneRef::Object(ob) = zone else {
            continue;
        };
        if trace {
            log::trace!("GC swept {}", ob.oid());
        }
        let table = object_table();
        if table.find(ob.oid()).is_some_and(|found| found.ptr_eq(ob)) {
            table.remove(ob.oid());
        }
        if clear {
            ob.clear_after_reclaim();
        }
    }
    drop(doomed);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_runtime::{ObjectZone, TreeZone};

    // Nothing here calls `sweep`: the other tests of this binary allocate
    // concurrently and their zones would be unmarked.

    fn nested_instances(class: &ObjectRef, levels: usize) -> Value {
        let mut v = Value::string("leaf");
        for _ in 0..levels {
            v = Value::from(TreeZone::make_instance(class, [v]));
        }
        v
    }

    #[test]
    fn test_immutable_value_marked_once() {
        let s = Value::string("leaf");
        let mut marker = Marker::new(8, false);
        marker.trace_value(&s);
        marker.trace_value(&s);
        marker.trace_value(&Value::from_int(4));
        marker.trace_value(&Value::Empty);
        assert_eq!(marker.finish().unwrap(), 1);
    }

    #[test]
    fn test_objects_are_queued_not_recursed() {
        let a = ObjectZone::make();
        let b = ObjectZone::make();
        a.put_attr(&b, Value::from_object(&b)).unwrap();
        a.header().clear_mark();
        b.header().clear_mark();

        let mut marker = Marker::new(8, false);
        marker.trace_object(&a);
        assert_eq!(marker.nb_marks(), 1);
        marker.drain();
        assert_eq!(marker.finish().unwrap(), 2);
        assert!(b.header().is_marked());
    }

    #[test]
    fn test_depth_ceiling_aborts() {
        let class = ObjectZone::make();
        let shallow = nested_instances(&class, 4);
        let mut marker = Marker::new(8, false);
        marker.trace_value(&shallow);
        marker.drain();
        assert!(marker.finish().is_ok());

        let deep = nested_instances(&class, 20);
        let mut marker = Marker::new(8, false);
        marker.trace_value(&deep);
        marker.drain();
        assert!(matches!(
            marker.finish(),
            Err(RuntimeError::DepthExceeded { limit: 8, .. })
        ));
    }
}
