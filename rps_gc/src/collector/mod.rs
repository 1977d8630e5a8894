//! Full stop-the-world collections.
//!
//! A collection clears every mark bit in the zone registry, marks from the
//! roots, then unregisters whatever stayed unmarked:
//!
//! 1. root objects, including the predefined ones
//! 2. strongly named symbols
//! 3. published call frames
//! 4. providers passed to [`GarbageCollector::collect`]
//!
//! Swept objects disappear from the object table. Weakly named symbols
//! whose object was swept are forgotten afterwards.
//!
//! The caller is responsible for stopping mutators first: a zone allocated
//! while marking is in progress is unmarked and would be swept.

mod mark_sweep;

use crate::config::GcConfig;
use crate::roots::{RootProvider, frame_registry};
use crate::stats::{GcStats, GcTimer};
use mark_sweep::Marker;
use parking_lot::RwLock;
use rps_runtime::{
    RuntimeError, RuntimeResult, predefined, root_objects, symbol_table, zone_registry,
};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Counts and timings of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcOutcome {
    /// Zones whose mark bit was cleared.
    pub nb_scans: usize,
    /// Zones marked live.
    pub nb_marks: usize,
    /// Zones swept.
    pub nb_deletes: usize,
    /// Roots reported: root objects, strong symbols, frame chains and
    /// extra providers.
    pub nb_roots: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// Process CPU time consumed.
    pub cpu_time: Duration,
    /// Zones still registered afterwards.
    pub live_zones: usize,
}

/// The mark-sweep collector.
pub struct GarbageCollector {
    config: RwLock<GcConfig>,
    running: AtomicBool,
    stats: GcStats,
    words_at_last_gc: AtomicU64,
}

/// Clears the running flag, even when marking fails.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GarbageCollector {
    /// Create a collector with the given configuration.
    pub fn new(config: GcConfig) -> Self {
        Self {
            config: RwLock::new(config),
            running: AtomicBool::new(false),
            stats: GcStats::new(),
            words_at_last_gc: AtomicU64::new(0),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> GcConfig {
        self.config.read().clone()
    }

    /// Replace the configuration after validating it.
    pub fn configure(&self, config: GcConfig) -> Result<(), crate::ConfigError> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    /// Cumulative statistics.
    #[inline]
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Check if a collection is in progress.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Words allocated since the last collection.
    pub fn allocated_since_last_collection(&self) -> u64 {
        zone_registry()
            .allocated_words()
            .saturating_sub(self.words_at_last_gc.load(Ordering::Relaxed))
    }

    /// Check if enough was allocated to warrant a collection.
    pub fn should_collect(&self) -> bool {
        self.allocated_since_last_collection() >= self.config.read().collection_threshold_words
    }

    /// Run a full collection.
    ///
    /// # Arguments
    ///
    /// * `extra_roots` - providers marked in addition to the global roots
    ///
    /// # Errors
    ///
    /// A protocol violation when another collection is running, a depth
    /// error when marking nests too deep (nothing is swept then), or a
    /// corruption error when registry verification fails.
    pub fn collect(&self, extra_roots: &[&dyn RootProvider]) -> RuntimeResult<GcOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RuntimeError::protocol(
                "garbage collection",
                None,
                "a collection is already running",
            ));
        }
        let _running = RunningGuard(&self.running);
        let config = self.config();
        let timer = GcTimer::start("full collection");

        // Installs the predefined objects and their roots on first use.
        predefined();
        let registry = zone_registry();
        let nb_scans = registry.clear_marks();

        let mut marker = Marker::new(config.max_mark_depth, config.trace);
        let mut nb_roots = root_objects().gc_mark_roots(&mut marker);
        nb_roots += symbol_table().gc_mark_strong_symbols(&mut marker);
        nb_roots += frame_registry().gc_mark_frames(&mut marker);
        for provider in extra_roots {
            provider.trace_roots(&mut marker);
            nb_roots += 1;
        }
        marker.drain();
        let nb_marks = marker.finish()?;

        let nb_deletes = mark_sweep::sweep(config.clear_reclaimed_objects, config.trace);
        let nb_pruned = symbol_table().prune_reclaimed();
        if nb_pruned > 0 {
            log::debug!("GC forgot {nb_pruned} weak symbols");
        }
        if config.verify_registry {
            registry.verify().map_err(RuntimeError::Corrupted)?;
        }
        self.words_at_last_gc
            .store(registry.allocated_words(), Ordering::Relaxed);

        let (elapsed, cpu_time) = timer.stop();
        let outcome = GcOutcome {
            nb_scans,
            nb_marks,
            nb_deletes,
            nb_roots,
            elapsed,
            cpu_time,
            live_zones: registry.nb_live(),
        };
        self.stats.record(&outcome);
        log::info!(
            "GC #{}: {} scanned, {} marked, {} deleted, {} roots, {:?} ({:?} cpu)",
            self.stats.nb_collections(),
            nb_scans,
            nb_marks,
            nb_deletes,
            nb_roots,
            elapsed,
            cpu_time,
        );
        Ok(outcome)
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

/// The process-wide collector.
pub fn garbage_collector() -> &'static GarbageCollector {
    static GC: OnceLock<GarbageCollector> = OnceLock::new();
    GC.get_or_init(GarbageCollector::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Collections themselves run in tests/, one binary with serialized tests.

    #[test]
    fn test_configure_rejects_invalid() {
        let gc = GarbageCollector::default();
        let bad = GcConfig {
            max_mark_depth: 1,
            ..Default::default()
        };
        assert!(gc.configure(bad).is_err());
        assert_eq!(gc.config().max_mark_depth, 100);
        assert!(gc.configure(GcConfig::low_memory()).is_ok());
        assert_eq!(gc.config().collection_threshold_words, 1 << 16);
    }

    #[test]
    fn test_busy_collector_refuses() {
        let gc = GarbageCollector::default();
        gc.running.store(true, Ordering::Release);
        let err = gc.collect(&[]).unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(gc.is_running());
        assert_eq!(gc.stats().nb_collections(), 0);
    }

    #[test]
    fn test_threshold_tracks_allocation() {
        let gc = GarbageCollector::default();
        gc.words_at_last_gc
            .store(zone_registry().allocated_words(), Ordering::Relaxed);
        assert!(!gc.should_collect());
    }
}
