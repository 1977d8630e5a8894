//! Reference tracing for garbage collection.
//!
//! The `Trace` trait is the interface between zones and the collector.
//! Every zone and payload reports the values and objects it holds to a
//! [`Tracer`], which decides what marking means.

pub mod tracer;

pub use tracer::{CollectingTracer, CountingTracer, NullTracer, Tracer};

use crate::object::ObjectRef;
use crate::value::Value;

/// Types that can report their references to a tracer.
///
/// Implementations must report every value and object they hold. Missing
/// one lets the collector reclaim a live zone.
///
/// # Example
///
/// ```ignore
/// use rps_runtime::trace::{Trace, Tracer};
///
/// struct Pair {
///     key: ObjectRef,
///     val: Value,
/// }
///
/// impl Trace for Pair {
///     fn trace(&self, tracer: &mut dyn Tracer) {
///         tracer.trace_object(&self.key);
///         tracer.trace_value(&self.val);
///     }
/// }
/// ```
pub trait Trace {
    /// Visit every reference held by `self`.
    fn trace(&self, tracer: &mut dyn Tracer);
}

impl Trace for Value {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_value(self);
    }
}

impl Trace for ObjectRef {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        tracer.trace_object(self);
    }
}

impl<T: Trace> Trace for Option<T> {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Some(inner) = self {
            inner.trace(tracer);
        }
    }
}

impl<T: Trace> Trace for [T] {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for item in self {
            item.trace(tracer);
        }
    }
}

impl<T: Trace> Trace for Vec<T> {
    #[inline]
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.as_slice().trace(tracer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_and_slice_forwarding() {
        let values = vec![Value::from_int(1), Value::empty(), Value::from_int(3)];
        let mut counter = CountingTracer::new();
        values.trace(&mut counter);
        Some(Value::from_int(4)).trace(&mut counter);
        None::<Value>.trace(&mut counter);
        assert_eq!(counter.value_count, 4);
        assert_eq!(counter.object_count, 0);
    }
}
