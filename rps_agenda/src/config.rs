//! Agenda configuration.

use rps_gc::GcConfig;
use std::time::Duration;

/// Fewest worker threads an agenda runs.
pub const MIN_WORKERS: usize = 1;

/// Most worker threads an agenda runs.
pub const MAX_WORKERS: usize = 32;

/// Configuration of an [`Agenda`](crate::Agenda).
///
/// # Example
///
/// ```
/// use rps_agenda::AgendaConfig;
/// use std::time::Duration;
///
/// let config = AgendaConfig {
///     nb_workers: 4,
///     run_delay: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaConfig {
    // =========================================================================
    // Workers
    // =========================================================================
    /// Number of worker threads.
    ///
    /// Default: available parallelism, clamped to `[1, 32]`
    pub nb_workers: usize,

    /// Longest single wait of an idle worker on the agenda condition.
    ///
    /// Default: 500ms
    pub idle_wait: Duration,

    // =========================================================================
    // Garbage Collection
    // =========================================================================
    /// Words allocated since the previous collection before workers
    /// rendezvous for another one.
    ///
    /// Default: 2^20 words
    pub gc_threshold_words: u64,

    /// Configuration handed to the process-wide collector on start. Its
    /// threshold is replaced by `gc_threshold_words`.
    pub gc: GcConfig,

    // =========================================================================
    // Lifetime
    // =========================================================================
    /// Wall-clock budget after which no further tasklet is dispatched and
    /// the agenda stops.
    ///
    /// Default: None (run until stopped)
    pub run_delay: Option<Duration>,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(MIN_WORKERS, |n| n.get());
        Self {
            nb_workers: parallelism.clamp(MIN_WORKERS, MAX_WORKERS),
            idle_wait: Duration::from_millis(500),
            gc_threshold_words: 1 << 20,
            gc: GcConfig::default(),
            run_delay: None,
        }
    }
}

impl AgendaConfig {
    /// One worker, otherwise default.
    pub fn single_worker() -> Self {
        Self {
            nb_workers: 1,
            ..Default::default()
        }
    }

    /// Two workers with short waits and registry verification.
    pub fn testing() -> Self {
        Self {
            nb_workers: 2,
            idle_wait: Duration::from_millis(20),
            gc: GcConfig {
                verify_registry: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nb_workers < MIN_WORKERS {
            return Err(ConfigError::TooFewWorkers);
        }
        if self.nb_workers > MAX_WORKERS {
            return Err(ConfigError::TooManyWorkers);
        }
        if self.idle_wait.is_zero() {
            return Err(ConfigError::ZeroIdleWait);
        }
        self.collector_config().validate().map_err(ConfigError::Gc)
    }

    /// The collector configuration installed by `start`.
    pub fn collector_config(&self) -> GcConfig {
        GcConfig {
            collection_threshold_words: self.gc_threshold_words,
            ..self.gc.clone()
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Fewer than [`MIN_WORKERS`] workers.
    TooFewWorkers,
    /// More than [`MAX_WORKERS`] workers.
    TooManyWorkers,
    /// Idle wait of zero, which would spin.
    ZeroIdleWait,
    /// Invalid collector configuration.
    Gc(rps_gc::ConfigError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::TooFewWorkers => write!(f, "at least {MIN_WORKERS} worker is needed"),
            ConfigError::TooManyWorkers => write!(f, "at most {MAX_WORKERS} workers are allowed"),
            ConfigError::ZeroIdleWait => write!(f, "idle wait must not be zero"),
            ConfigError::Gc(err) => write!(f, "gc: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Gc(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgendaConfig::default();
        assert!(config.validate().is_ok());
        assert!((MIN_WORKERS..=MAX_WORKERS).contains(&config.nb_workers));
        assert_eq!(config.idle_wait, Duration::from_millis(500));
    }

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(AgendaConfig::single_worker().nb_workers, 1);
        assert!(AgendaConfig::single_worker().validate().is_ok());
        assert!(AgendaConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_worker_bounds() {
        let none = AgendaConfig {
            nb_workers: 0,
            ..Default::default()
        };
        assert_eq!(none.validate(), Err(ConfigError::TooFewWorkers));
        let many = AgendaConfig {
            nb_workers: 33,
            ..Default::default()
        };
        assert_eq!(many.validate(), Err(ConfigError::TooManyWorkers));
    }

    #[test]
    fn test_gc_errors_are_wrapped() {
        let config = AgendaConfig {
            gc: GcConfig {
                max_mark_depth: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err, ConfigError::Gc(rps_gc::ConfigError::MarkDepthTooSmall));
        assert!(err.to_string().starts_with("gc: "));
    }

    #[test]
    fn test_threshold_goes_to_collector() {
        let config = AgendaConfig {
            gc_threshold_words: 4096,
            gc: GcConfig {
                collection_threshold_words: 1 << 30,
                trace: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let gc = config.collector_config();
        assert_eq!(gc.collection_threshold_words, 4096);
        assert!(gc.trace);

        let tiny = AgendaConfig {
            gc_threshold_words: 1,
            ..Default::default()
        };
        assert_eq!(tiny.validate(), Err(ConfigError::Gc(rps_gc::ConfigError::ThresholdTooSmall)));
    }
}
