//! GC configuration parameters.
//!
//! Thresholds are counted in machine words, the unit the zone registry
//! uses for its allocation counter.

use rps_runtime::MAX_GC_MARK_DEPTH;

/// Configuration for the garbage collector.
///
/// # Example
///
/// ```
/// use rps_gc::GcConfig;
///
/// // Collect more often, and keep swept objects intact for inspection
/// let config = GcConfig {
///     collection_threshold_words: 64 * 1024,
///     clear_reclaimed_objects: false,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    // =========================================================================
    // Marking
    // =========================================================================
    /// Deepest nesting of immutable values followed while marking.
    ///
    /// Objects are queued rather than recursed into, so only chains of
    /// sets, tuples and trees count. Hitting the ceiling aborts the
    /// collection with a depth error.
    ///
    /// Default: 100
    pub max_mark_depth: usize,

    // =========================================================================
    // Collection Triggers
    // =========================================================================
    /// Words allocated since the last collection before another one is
    /// requested.
    ///
    /// Default: 2^20 words
    pub collection_threshold_words: u64,

    // =========================================================================
    // Sweeping
    // =========================================================================
    /// Drop the attributes, components and payload of swept objects so
    /// that cycles through them are broken.
    ///
    /// Default: true
    pub clear_reclaimed_objects: bool,

    // =========================================================================
    // Debugging
    // =========================================================================
    /// Log every root and every swept object at trace level.
    ///
    /// Default: false
    pub trace: bool,

    /// Check the zone registry after each collection.
    ///
    /// Default: false (enabled in debug builds)
    pub verify_registry: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            max_mark_depth: MAX_GC_MARK_DEPTH,
            collection_threshold_words: 1 << 20,
            clear_reclaimed_objects: true,
            trace: false,
            verify_registry: cfg!(debug_assertions),
        }
    }
}

impl GcConfig {
    /// Smallest accepted collection threshold.
    pub const MIN_THRESHOLD_WORDS: u64 = 1024;

    /// Create a configuration that collects often.
    pub fn low_memory() -> Self {
        Self {
            collection_threshold_words: 1 << 16,
            ..Default::default()
        }
    }

    /// Create a configuration that collects rarely.
    pub fn high_throughput() -> Self {
        Self {
            collection_threshold_words: 1 << 23,
            verify_registry: false,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_mark_depth < 8 {
            return Err(ConfigError::MarkDepthTooSmall);
        }
        if self.max_mark_depth > 100_000 {
            return Err(ConfigError::MarkDepthTooLarge);
        }
        if self.collection_threshold_words < Self::MIN_THRESHOLD_WORDS {
            return Err(ConfigError::ThresholdTooSmall);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Mark depth below 8.
    MarkDepthTooSmall,
    /// Mark depth above 100000, which risks overflowing the thread stack.
    MarkDepthTooLarge,
    /// Collection threshold below 1024 words.
    ThresholdTooSmall,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MarkDepthTooSmall => write!(f, "mark depth must be at least 8"),
            ConfigError::MarkDepthTooLarge => write!(f, "mark depth must be at most 100000"),
            ConfigError::ThresholdTooSmall => {
                write!(f, "collection threshold must be at least 1024 words")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
