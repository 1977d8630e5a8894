//! Call frames and closure application.
//!
//! A frame holds the GC-visible state of one activation: the descriptor
//! object, a small integer state, the closure being applied, and local
//! values. Frames form a chain through `prev`, newest first:
//!
//! ```text
//!   apply frame ──prev──► caller frame ──prev──► root frame
//!   (closure c)           (closure b)            (no closure)
//! ```
//!
//! The collector marks every frame of every registered chain.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::ObjectRef;
use crate::trace::{Trace, Tracer};
use crate::types::TreeZone;
use crate::value::Value;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

// =============================================================================
// Two Values
// =============================================================================

/// Result of applying a closure: a main value and an optional extra one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoValues {
    /// The primary result.
    pub main: Value,
    /// A secondary result, often empty.
    pub extra: Value,
}

impl TwoValues {
    /// Pair two values.
    #[inline]
    pub fn new(main: Value, extra: Value) -> Self {
        Self { main, extra }
    }

    /// A single result with an empty extra.
    #[inline]
    pub fn single(main: Value) -> Self {
        Self {
            main,
            extra: Value::Empty,
        }
    }
}

impl From<Value> for TwoValues {
    fn from(main: Value) -> Self {
        Self::single(main)
    }
}

// =============================================================================
// Call Frame
// =============================================================================

/// One activation record.
pub struct CallFrame {
    descriptor: Option<ObjectRef>,
    state: AtomicI32,
    closure: Option<Arc<TreeZone>>,
    locals: Mutex<SmallVec<[Value; 8]>>,
    prev: Option<Arc<CallFrame>>,
}

impl CallFrame {
    /// A frame with no caller, as used at the bottom of a worker thread.
    pub fn root() -> Arc<Self> {
        Self::new(None, None, None)
    }

    /// A new frame on top of `prev`.
    pub fn new(descriptor: Option<ObjectRef>, closure: Option<Arc<TreeZone>>, prev: Option<Arc<CallFrame>>) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            state: AtomicI32::new(0),
            closure,
            locals: Mutex::new(SmallVec::new()),
            prev,
        })
    }

    /// The frame applying `closure`, called from `caller`.
    pub fn for_closure(caller: &Arc<CallFrame>, closure: &Arc<TreeZone>) -> Arc<Self> {
        Self::new(
            Some(closure.connective().clone()),
            Some(Arc::clone(closure)),
            Some(Arc::clone(caller)),
        )
    }

    /// The descriptor object.
    #[inline]
    pub fn descriptor(&self) -> Option<&ObjectRef> {
        self.descriptor.as_ref()
    }

    /// The closure applied by this frame.
    #[inline]
    pub fn closure(&self) -> Option<&Arc<TreeZone>> {
        self.closure.as_ref()
    }

    /// The calling frame.
    #[inline]
    pub fn prev(&self) -> Option<&Arc<CallFrame>> {
        self.prev.as_ref()
    }

    /// The current state number.
    #[inline]
    pub fn state(&self) -> i32 {
        self.state.load(Ordering::Relaxed)
    }

    /// Change the state number.
    #[inline]
    pub fn set_state(&self, state: i32) {
        self.state.store(state, Ordering::Relaxed);
    }

    /// Number of frames in the chain, this one included.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// This frame followed by its callers.
    pub fn ancestors(&self) -> impl Iterator<Item = &CallFrame> {
        std::iter::successors(Some(self), |frame| frame.prev.as_deref())
    }

    // =========================================================================
    // Locals
    // =========================================================================

    /// Number of local slots.
    pub fn nb_locals(&self) -> usize {
        self.locals.lock().len()
    }

    /// Local value at `index`, empty when unset.
    pub fn local(&self, index: usize) -> Value {
        self.locals.lock().get(index).cloned().unwrap_or_default()
    }

    /// Set a local, growing the slots with empty values as needed.
    pub fn set_local(&self, index: usize, value: Value) {
        let mut locals = self.locals.lock();
        if index >= locals.len() {
            locals.resize(index + 1, Value::Empty);
        }
        locals[index] = value;
    }

    /// Append a local, returning its index.
    pub fn push_local(&self, value: Value) -> usize {
        let mut locals = self.locals.lock();
        locals.push(value);
        locals.len() - 1
    }

    /// Copy of all locals.
    pub fn locals_snapshot(&self) -> Vec<Value> {
        self.locals.lock().to_vec()
    }

    /// Mark this frame only, not its callers.
    pub fn trace_own(&self, tracer: &mut dyn Tracer) {
        self.descriptor.trace(tracer);
        if let Some(closure) = &self.closure {
            tracer.trace_value(&Value::from(Arc::clone(closure)));
        }
        self.locals.lock().as_slice().trace(tracer);
    }
}

impl Trace for CallFrame {
    /// Marks the whole chain, iteratively.
    fn trace(&self, tracer: &mut dyn Tracer) {
        for frame in self.ancestors() {
            frame.trace_own(tracer);
        }
    }
}

impl fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFrame")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .field("nb_locals", &self.nb_locals())
            .field("depth", &self.depth())
            .finish()
    }
}

// =============================================================================
// Applying Closures
// =============================================================================

impl TreeZone {
    /// Apply this closure to `args` in a new frame above `caller`.
    ///
    /// The connective's applying function does the work; a connective
    /// without one is a protocol violation, as is applying an instance.
    pub fn apply(self: &Arc<Self>, caller: &Arc<CallFrame>, args: &[Value]) -> RuntimeResult<TwoValues> {
        if !self.is_closure() {
            return Err(RuntimeError::mismatch("closure", "instance"));
        }
        let connective = self.connective();
        let Some(applying) = connective.applying_function() else {
            return Err(RuntimeError::protocol(
                "apply",
                Some(connective.oid()),
                "connective has no applying function",
            ));
        };
        let frame = CallFrame::for_closure(caller, self);
        applying(&frame, self, args)
    }

    /// Apply with no argument, keeping the main result.
    pub fn apply0(self: &Arc<Self>, caller: &Arc<CallFrame>) -> RuntimeResult<Value> {
        Ok(self.apply(caller, &[])?.main)
    }

    /// Apply to one argument, keeping the main result.
    pub fn apply1(self: &Arc<Self>, caller: &Arc<CallFrame>, arg: Value) -> RuntimeResult<Value> {
        Ok(self.apply(caller, &[arg])?.main)
    }

    /// Apply to two arguments, keeping the main result.
    pub fn apply2(self: &Arc<Self>, caller: &Arc<CallFrame>, arg0: Value, arg1: Value) -> RuntimeResult<Value> {
        Ok(self.apply(caller, &[arg0, arg1])?.main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ApplyingFn, ObjectZone};
    use crate::trace::{CollectingTracer, CountingTracer};

    // =========================================================================
    // Frames
    // =========================================================================

    #[test]
    fn test_locals_grow_with_empty_values() {
        let frame = CallFrame::root();
        frame.set_local(3, Value::from_int(4));
        assert_eq!(frame.nb_locals(), 4);
        assert!(frame.local(0).is_empty());
        assert_eq!(frame.local(3), Value::from_int(4));
        assert!(frame.local(10).is_empty());
        assert_eq!(frame.push_local(Value::string("x")), 4);
    }

    #[test]
    fn test_chain_trace_visits_every_frame() {
        let a = ObjectZone::make();
        let b = ObjectZone::make();
        let bottom = CallFrame::root();
        bottom.push_local(a.as_value());
        let top = CallFrame::new(Some(b.clone()), None, Some(bottom.clone()));
        assert_eq!(top.depth(), 2);

        let mut tracer = CollectingTracer::default();
        top.trace(&mut tracer);
        assert!(tracer.objects.contains(&a));
        assert!(tracer.objects.contains(&b));

        let mut own = CountingTracer::new();
        top.trace_own(&mut own);
        assert_eq!(own.total(), 1);
    }

    // =========================================================================
    // Application
    // =========================================================================

    #[test]
    fn test_apply_runs_connective_function() {
        let conn = ObjectZone::make();
        let applying: ApplyingFn = Arc::new(|frame: &Arc<CallFrame>, closure: &Arc<TreeZone>, args: &[Value]| {
            assert_eq!(frame.depth(), 2);
            assert!(Arc::ptr_eq(frame.closure().unwrap(), closure));
            let base = closure.sons()[0].as_int()?;
            let sum = args.iter().try_fold(base, |acc, v| v.as_int().map(|i| acc + i))?;
            Ok(TwoValues::single(Value::from_int(sum)))
        });
        conn.put_applying_function(Some(applying));
        let closure = TreeZone::make_closure(&conn, [Value::from_int(100)]);
        let root = CallFrame::root();
        assert_eq!(closure.apply0(&root).unwrap(), Value::from_int(100));
        assert_eq!(closure.apply1(&root, Value::from_int(5)).unwrap(), Value::from_int(105));
        assert_eq!(
            closure.apply2(&root, Value::from_int(1), Value::from_int(2)).unwrap(),
            Value::from_int(103)
        );
        assert!(closure.apply1(&root, Value::string("no")).is_err());
    }

    #[test]
    fn test_apply_without_applying_function() {
        let conn = ObjectZone::make();
        let closure = TreeZone::make_closure(&conn, []);
        let err = closure.apply(&CallFrame::root(), &[]).unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_apply_instance_is_mismatch() {
        let class = ObjectZone::make();
        let instance = TreeZone::make_instance(&class, []);
        let err = instance.apply(&CallFrame::root(), &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }
}
