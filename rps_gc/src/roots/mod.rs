//! Root reporting.
//!
//! GC roots are the starting points for marking:
//! - the global root objects (which include every predefined object)
//! - strongly named symbols
//! - the call frames published by running workers
//! - extra providers passed to a single collection
//! - values pinned in a [`RootSet`]

mod frames;

pub use frames::{FrameGuard, FrameRegistry, frame_registry};

use parking_lot::Mutex;
use rps_runtime::{Tracer, Value};

/// A source of roots outside the runtime's own tables.
///
/// Closures taking a tracer implement it, so a one-off root can be
/// passed straight to a collection:
///
/// ```ignore
/// let keep = Value::from_object(&ob);
/// collector.collect(&[&|t: &mut dyn Tracer| t.trace_value(&keep)])?;
/// ```
pub trait RootProvider: Sync {
    /// Report every root to `tracer`.
    fn trace_roots(&self, tracer: &mut dyn Tracer);
}

impl<F> RootProvider for F
where
    F: Fn(&mut dyn Tracer) + Sync,
{
    fn trace_roots(&self, tracer: &mut dyn Tracer) {
        self(tracer)
    }
}

/// Values kept alive by native code.
pub struct RootSet {
    values: Mutex<Vec<Value>>,
}

impl RootSet {
    /// Create a new empty root set.
    pub const fn new() -> Self {
        Self {
            values: Mutex::new(Vec::new()),
        }
    }

    /// Pin a value. Empty and integer values are ignored.
    pub fn add(&self, value: Value) {
        if value.is_ptr() {
            self.values.lock().push(value);
        }
    }

    /// Unpin the first occurrence of a value. Returns whether it was pinned.
    pub fn remove(&self, value: &Value) -> bool {
        let mut values = self.values.lock();
        match values.iter().position(|v| v == value) {
            Some(pos) => {
                values.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Unpin everything.
    pub fn clear(&self) {
        self.values.lock().clear();
    }

    /// Number of pinned values.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Check if nothing is pinned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RootProvider for RootSet {
    fn trace_roots(&self, tracer: &mut dyn Tracer) {
        let values = self.values.lock().clone();
        for value in &values {
            tracer.trace_value(value);
        }
    }
}
