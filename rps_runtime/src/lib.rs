//! Value and object model of the reflective object runtime.
//!
//! This crate provides:
//! - Tagged values (`Value`) over immutable zones and mutable objects
//! - Object ids, the global object table and the zone registry
//! - Lazily hashed strings, doubles and JSON values
//! - Immutable sets, tuples, closures and instances
//! - The mutable object record with attributes, components and payloads
//! - Built-in payload kinds (class metadata, mutable sets and vectors, ...)
//! - The symbol table, root objects and predefined objects
//! - Call frames and closure application
//! - Tracing hooks for the collector and scan/serialize hooks for dumpers
//!
//! The collector lives in `rps_gc` and the scheduler in `rps_agenda`.

#![warn(missing_docs)]

pub mod callframe;
pub mod error;
pub mod object;
pub mod oid;
pub mod payload;
pub mod persist;
pub mod roots;
pub mod symbols;
pub mod trace;
pub mod types;
pub mod value;
pub mod zone;

// Re-export commonly used items
pub use callframe::{CallFrame, TwoValues};
pub use error::{RuntimeError, RuntimeResult};
pub use object::{ApplyingFn, MagicGetterFn, ObjectRef, ObjectZone, object_table};
pub use oid::Oid;
pub use payload::Payload;
pub use persist::DumpVisitor;
pub use roots::{Predefined, RootObjects, predefined, root_objects};
pub use symbols::{SymbolTable, symbol_table};
pub use trace::{Trace, Tracer};
pub use types::{DoubleZone, JsonZone, SetZone, StringZone, TreeZone, TupleZone};
pub use value::Value;
pub use zone::{ZoneRef, ZoneType, zone_registry};

/// Longest superclass chain walked before reporting a corrupted class graph.
pub const MAX_INHERITANCE_DEPTH: usize = 32;

/// Deepest nesting of values the collector follows recursively.
pub const MAX_GC_MARK_DEPTH: usize = 100;

/// Longest environment chain walked by a lookup.
pub const MAX_ENVIRONMENT_DEPTH: usize = 64;
