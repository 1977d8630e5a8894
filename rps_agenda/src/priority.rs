//! Tasklet priorities.

use std::fmt;

/// Priority of a queued tasklet. Higher priorities always run first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Background work, run when nothing else is queued.
    Idle = 0,
    /// Low priority.
    Low = 1,
    /// Normal priority.
    #[default]
    Normal = 2,
    /// High priority.
    High = 3,
}

impl Priority {
    /// Number of priority levels.
    pub const COUNT: usize = 4;

    /// Every level, lowest first.
    pub const ALL: [Priority; Self::COUNT] = [Priority::Idle, Priority::Low, Priority::Normal, Priority::High];

    /// Queue index.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used in dumps.
    pub const fn name(self) -> &'static str {
        match self {
            Priority::Idle => "idle_priority",
            Priority::Low => "low_priority",
            Priority::Normal => "normal_priority",
            Priority::High => "high_priority",
        }
    }

    /// Parse a dump name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prio| prio.name() == name)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
