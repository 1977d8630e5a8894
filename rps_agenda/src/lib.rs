//! RefPerSys agenda: prioritized tasklet scheduling over a pool of worker
//! threads, cooperating with the garbage collector.
//!
//! # Usage
//!
//! ```ignore
//! use rps_agenda::{Agenda, AgendaConfig, Priority, make_tasklet};
//!
//! let agenda = Agenda::new(AgendaConfig::default())?;
//! let tasklet = make_tasklet(&closure)?;
//! agenda.add_tasklet(Priority::Normal, &tasklet);
//! agenda.start()?;
//! // ...
//! agenda.stop();
//! agenda.join();
//! ```
//!
//! Workers only park for a collection between tasklets, so a tasklet never
//! observes a collection while it runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agenda;
pub mod config;
pub mod priority;
pub mod stats;
pub mod tasklet;
pub mod worker;

pub use agenda::{Agenda, AgendaPayload, agenda};
pub use config::{AgendaConfig, ConfigError, MAX_WORKERS, MIN_WORKERS};
pub use priority::Priority;
pub use stats::AgendaStats;
pub use tasklet::{TaskletPayload, make_tasklet};
pub use worker::WorkerState;
