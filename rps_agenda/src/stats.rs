//! Agenda statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of an agenda's activity.
#[derive(Debug, Default)]
pub struct AgendaStats {
    /// Tasklets whose closure returned normally.
    pub tasklets_run: AtomicU64,
    /// Tasklets whose closure failed or panicked, or that had no tasklet payload.
    pub tasklets_failed: AtomicU64,
    /// Tasklets skipped because they were obsolete or had no closure.
    pub tasklets_skipped: AtomicU64,
    /// Collections run by the workers.
    pub collections: AtomicU64,
}

impl AgendaStats {
    /// Create zeroed counters.
    pub const fn new() -> Self {
        Self {
            tasklets_run: AtomicU64::new(0),
            tasklets_failed: AtomicU64::new(0),
            tasklets_skipped: AtomicU64::new(0),
            collections: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasklets run successfully.
    pub fn nb_run(&self) -> u64 {
        self.tasklets_run.load(Ordering::Relaxed)
    }

    /// Tasklets that failed.
    pub fn nb_failed(&self) -> u64 {
        self.tasklets_failed.load(Ordering::Relaxed)
    }

    /// Tasklets skipped.
    pub fn nb_skipped(&self) -> u64 {
        self.tasklets_skipped.load(Ordering::Relaxed)
    }

    /// Collections run.
    pub fn nb_collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    /// Log a one-line summary at info level.
    pub fn log_summary(&self) {
        log::info!(
            "agenda: {} tasklets run, {} failed, {} skipped, {} collections",
            self.nb_run(),
            self.nb_failed(),
            self.nb_skipped(),
            self.nb_collections(),
        );
    }
}
