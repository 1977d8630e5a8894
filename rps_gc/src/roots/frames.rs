//! Call frames published by running threads.
//!
//! A worker registers its frame chain once and keeps it published while it
//! waits at the collection rendezvous between tasklets. The collector marks
//! every published chain, so the worker's locals stay live across that
//! collection.

use parking_lot::Mutex;
use rps_runtime::{CallFrame, Trace, Tracer};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Registry of published frame chains.
pub struct FrameRegistry {
    frames: Mutex<FxHashMap<u64, Arc<CallFrame>>>,
    next_id: AtomicU64,
}

impl FrameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Publish `frame` until the returned guard is dropped.
    pub fn register_frame(&self, frame: Arc<CallFrame>) -> FrameGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.frames.lock().insert(id, frame);
        FrameGuard { registry: self, id }
    }

    /// Number of published chains.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Check if no chain is published.
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Mark every published chain. Returns the number of chains.
    pub fn gc_mark_frames(&self, tracer: &mut dyn Tracer) -> usize {
        let frames: Vec<Arc<CallFrame>> = self.frames.lock().values().cloned().collect();
        for frame in &frames {
            frame.trace(tracer);
        }
        frames.len()
    }
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a frame chain published. Unpublishes it on drop.
pub struct FrameGuard<'a> {
    registry: &'a FrameRegistry,
    id: u64,
}

impl FrameGuard<'_> {
    /// Replace the published chain, e.g. after pushing a callee frame.
    pub fn update(&self, frame: Arc<CallFrame>) {
        self.registry.frames.lock().insert(self.id, frame);
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.registry.frames.lock().remove(&self.id);
    }
}

/// The process-wide frame registry.
pub fn frame_registry() -> &'static FrameRegistry {
    static FRAMES: OnceLock<FrameRegistry> = OnceLock::new();
    FRAMES.get_or_init(FrameRegistry::new)
}
