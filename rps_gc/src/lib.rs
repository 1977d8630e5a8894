//! RefPerSys Garbage Collector
//!
//! A precise, stop-the-world mark-sweep collector over the runtime's zone
//! registry.
//!
//! # Architecture
//!
//! Every zone (object or immutable value) is registered under a rank when
//! created. A collection:
//!
//! - **Clears** the mark bit of every registered zone.
//!
//! - **Marks** from the roots. Objects go through a worklist; immutable
//!   values are scanned as soon as they are reached, up to a depth ceiling.
//!
//! - **Sweeps** every zone left unmarked. A swept zone loses its rank,
//!   carries the `RECLAIMED` flag, and a swept object leaves the object
//!   table so it can no longer be found by oid.
//!
//! # Usage
//!
//! ```ignore
//! use rps_gc::garbage_collector;
//!
//! // With all mutators stopped
//! let outcome = garbage_collector().collect(&[])?;
//! log::info!("{} zones reclaimed", outcome.nb_deletes);
//! ```
//!
//! # Safety
//!
//! Marking is only as precise as the roots. Native code holding a value
//! across a collection must publish it: as a root object, in a
//! [`RootSet`], in a published [`CallFrame`](rps_runtime::CallFrame), or
//! through an extra [`RootProvider`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod roots;
pub mod stats;

pub use collector::{GarbageCollector, GcOutcome, garbage_collector};
pub use config::{ConfigError, GcConfig};
pub use roots::{FrameGuard, FrameRegistry, RootProvider, RootSet, frame_registry};
pub use stats::{GcStats, GcTimer};
