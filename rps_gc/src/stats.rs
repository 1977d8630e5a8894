//! GC statistics and timing.
//!
//! Tracks how many zones each collection scanned, marked and deleted, the
//! number of roots, and the wall-clock and CPU time spent collecting.

use crate::collector::GcOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cumulative statistics about garbage collection activity.
#[derive(Debug)]
pub struct GcStats {
    // =========================================================================
    // Collection Statistics
    // =========================================================================
    /// Number of completed collections.
    pub collections: AtomicU64,
    /// Zones scanned while clearing marks.
    pub scans: AtomicU64,
    /// Zones newly marked live.
    pub marks: AtomicU64,
    /// Zones swept out of the registry.
    pub deletes: AtomicU64,
    /// Roots reported.
    pub roots: AtomicU64,

    // =========================================================================
    // Time Statistics
    // =========================================================================
    /// Wall-clock time spent collecting (nanoseconds).
    pub gc_time_ns: AtomicU64,
    /// Process CPU time spent collecting (nanoseconds).
    pub cpu_time_ns: AtomicU64,

    // =========================================================================
    // Heap Statistics
    // =========================================================================
    /// Live zones after the last collection.
    pub live_zones: AtomicU64,
}

impl GcStats {
    /// Create new empty statistics.
    pub const fn new() -> Self {
        Self {
            collections: AtomicU64::new(0),
            scans: AtomicU64::new(0),
            marks: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            roots: AtomicU64::new(0),
            gc_time_ns: AtomicU64::new(0),
            cpu_time_ns: AtomicU64::new(0),
            live_zones: AtomicU64::new(0),
        }
    }

    /// Record one finished collection.
    pub fn record(&self, outcome: &GcOutcome) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.scans.fetch_add(outcome.nb_scans as u64, Ordering::Relaxed);
        self.marks.fetch_add(outcome.nb_marks as u64, Ordering::Relaxed);
        self.deletes.fetch_add(outcome.nb_deletes as u64, Ordering::Relaxed);
        self.roots.fetch_add(outcome.nb_roots as u64, Ordering::Relaxed);
        self.gc_time_ns
            .fetch_add(outcome.elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.cpu_time_ns
            .fetch_add(outcome.cpu_time.as_nanos() as u64, Ordering::Relaxed);
        self.live_zones
            .store(outcome.live_zones as u64, Ordering::Relaxed);
    }

    /// Number of completed collections.
    #[inline]
    pub fn nb_collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    /// Get total GC time.
    pub fn total_gc_time(&self) -> Duration {
        Duration::from_nanos(self.gc_time_ns.load(Ordering::Relaxed))
    }

    /// Get average pause time.
    pub fn avg_pause(&self) -> Duration {
        let count = self.collections.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.gc_time_ns.load(Ordering::Relaxed) / count)
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.collections.store(0, Ordering::Relaxed);
        self.scans.store(0, Ordering::Relaxed);
        self.marks.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.roots.store(0, Ordering::Relaxed);
        self.gc_time_ns.store(0, Ordering::Relaxed);
        self.cpu_time_ns.store(0, Ordering::Relaxed);
        self.live_zones.store(0, Ordering::Relaxed);
    }

    /// Log a summary of GC statistics at info level.
    pub fn log_summary(&self, allocated_words: u64) {
        log::info!(
            "GC: {} collections, {} scans, {} marks, {} deletes, {} roots",
            self.collections.load(Ordering::Relaxed),
            self.scans.load(Ordering::Relaxed),
            self.marks.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
            self.roots.load(Ordering::Relaxed),
        );
        log::info!(
            "GC: {:?} total, {:?} avg pause, {:?} cpu, {} allocated",
            self.total_gc_time(),
            self.avg_pause(),
            Duration::from_nanos(self.cpu_time_ns.load(Ordering::Relaxed)),
            format_bytes(allocated_words.saturating_mul(std::mem::size_of::<usize>() as u64)),
        );
    }
}

impl Default for GcStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Format bytes in human-readable form.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// CPU time consumed by the whole process so far.
#[cfg(unix)]
pub fn process_cpu_time() -> Duration {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return Duration::ZERO;
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

/// CPU time consumed by the whole process so far.
#[cfg(not(unix))]
pub fn process_cpu_time() -> Duration {
    Duration::ZERO
}

/// Timer for measuring GC phases, in wall-clock and CPU time.
pub struct GcTimer {
    start: Instant,
    cpu_start: Duration,
    label: &'static str,
}

impl GcTimer {
    /// Start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            cpu_start: process_cpu_time(),
            label,
        }
    }

    /// Wall-clock time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the elapsed wall-clock and CPU durations.
    pub fn stop(self) -> (Duration, Duration) {
        let elapsed = self.start.elapsed();
        let cpu = process_cpu_time().saturating_sub(self.cpu_start);
        log::trace!("GC {}: {:?} ({:?} cpu)", self.label, elapsed, cpu);
        (elapsed, cpu)
    }
}
