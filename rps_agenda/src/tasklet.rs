//! Tasklets: objects queued on the agenda.
//!
//! A tasklet is an object with a [`TaskletPayload`]. Running it applies
//! its closure to the tasklet object itself. A tasklet may carry an
//! obsolescence time: once that wall-clock time has passed it is skipped
//! instead of run. Only permanent tasklets are written by dumps.

use rps_runtime::object::wallclock_now;
use rps_runtime::{DumpVisitor, ObjectRef, ObjectZone, Payload, RuntimeResult, Tracer, TreeZone, Value, ZoneType};
use serde_json::{Map, Value as Json, json};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Payload of a tasklet object.
#[derive(Debug, Clone)]
pub struct TaskletPayload {
    closure: Option<Arc<TreeZone>>,
    obsolescence: Option<f64>,
    permanent: bool,
}

impl TaskletPayload {
    /// A transient tasklet running `closure`, never obsolete.
    pub fn new(closure: Arc<TreeZone>) -> Self {
        Self {
            closure: Some(closure),
            obsolescence: None,
            permanent: false,
        }
    }

    /// The closure to apply.
    #[inline]
    pub fn closure(&self) -> Option<&Arc<TreeZone>> {
        self.closure.as_ref()
    }

    /// Replace the closure.
    pub fn put_closure(&mut self, closure: Option<Arc<TreeZone>>) {
        self.closure = closure;
    }

    /// Wall-clock time (seconds since the epoch) after which the tasklet
    /// is obsolete.
    #[inline]
    pub fn obsolescence(&self) -> Option<f64> {
        self.obsolescence
    }

    /// Set or clear the obsolescence time.
    pub fn put_obsolescence(&mut self, time: Option<f64>) {
        self.obsolescence = time;
    }

    /// Make the tasklet obsolete `delay` from now.
    pub fn obsolete_after(&mut self, delay: Duration) {
        self.obsolescence = Some(wallclock_now() + delay.as_secs_f64());
    }

    /// Whether the tasklet is obsolete at wall-clock time `now`.
    pub fn is_obsolete_at(&self, now: f64) -> bool {
        self.obsolescence.is_some_and(|limit| limit < now)
    }

    /// Whether the tasklet is obsolete now.
    pub fn is_obsolete(&self) -> bool {
        self.is_obsolete_at(wallclock_now())
    }

    /// Whether dumps keep this tasklet.
    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Set the permanent flag.
    pub fn set_permanent(&mut self, permanent: bool) {
        self.permanent = permanent;
    }
}

impl Payload for TaskletPayload {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylTasklet
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        if let Some(closure) = &self.closure {
            tracer.trace_value(&Value::from(Arc::clone(closure)));
        }
    }

    fn dump_scan(&self, visitor: &mut dyn DumpVisitor) {
        if let (true, Some(closure)) = (self.permanent, &self.closure) {
            Value::from(Arc::clone(closure)).dump_scan(visitor);
        }
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        let (true, Some(closure)) = (self.permanent, &self.closure) else {
            return;
        };
        map.insert(
            "tasklet_todo".into(),
            Value::from(Arc::clone(closure)).dump_json(visitor),
        );
        if let Some(limit) = self.obsolescence {
            map.insert(
                "tasklet_obsolete_delay".into(),
                json!(limit - wallclock_now()),
            );
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Create a fresh tasklet object running `closure`.
pub fn make_tasklet(closure: &Arc<TreeZone>) -> RuntimeResult<ObjectRef> {
    let ob = ObjectZone::make();
    ob.put_payload(Box::new(TaskletPayload::new(Arc::clone(closure))))?;
    Ok(ob)
}
