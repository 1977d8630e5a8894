//! Compute-once hash cells.

use std::sync::atomic::{AtomicU32, Ordering};

/// A hash computed on first read and cached.
///
/// Zero means "not yet computed", so hash functions stored here must never
/// return zero. Two threads racing on the first read both compute the same
/// value; the second store is harmless.
#[derive(Debug, Default)]
pub struct LazyHash(AtomicU32);

impl LazyHash {
    /// A cell with no hash yet.
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Return the cached hash, computing it with `compute` on first use.
    #[inline]
    pub fn get_or_compute(&self, compute: impl FnOnce() -> u32) -> u32 {
        let cached = self.0.load(Ordering::Acquire);
        if cached != 0 {
            return cached;
        }
        let hash = compute();
        debug_assert_ne!(hash, 0, "lazy hash computed as zero");
        self.0.store(hash, Ordering::Release);
        hash
    }

    /// The cached hash, if already computed.
    #[inline]
    pub fn peek(&self) -> Option<u32> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            h => Some(h),
        }
    }
}
