//! Payloads: polymorphic extensions of objects.
//!
//! An object owns at most one payload, which gives it specialized mutable
//! state. The built-in kinds are:
//!
//! | payload         | kind          | erasable       |
//! |-----------------|---------------|----------------|
//! | [`ClassInfo`]   | `classinfo`   | no             |
//! | [`SetOb`]       | `setob`       | yes            |
//! | [`VectOb`]      | `vectob`      | yes            |
//! | [`VectVal`]     | `vectval`     | yes            |
//! | [`SymbolInfo`]  | `symbol`      | only when weak |
//! | [`SpaceInfo`]   | `space`       | no             |
//! | [`Environment`] | `environment` | yes            |
//! | [`StrBuf`]      | `strbuf`      | yes            |
//!
//! The scheduler crate adds the `agenda` and `tasklet` kinds. Embedders may
//! add their own by implementing [`Payload`].

pub mod classinfo;
pub mod environment;
pub mod setob;
pub mod space;
pub mod strbuf;
pub mod symbol;
pub mod vectob;
pub mod vectval;

pub use classinfo::ClassInfo;
pub use environment::Environment;
pub use setob::SetOb;
pub use space::SpaceInfo;
pub use strbuf::StrBuf;
pub use symbol::SymbolInfo;
pub use vectob::VectOb;
pub use vectval::VectVal;

use crate::persist::{DumpVisitor, ScanTracer};
use crate::trace::Tracer;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};
use std::any::Any;
use std::fmt;

/// Contract of every payload kind.
pub trait Payload: Any + Send + Sync + fmt::Debug {
    /// Kind tag, one of the negative [`ZoneType`] values.
    fn payload_type(&self) -> ZoneType;

    /// Human readable kind name.
    fn payload_type_name(&self) -> &'static str {
        self.payload_type().name()
    }

    /// Whether the owner may replace or clear this payload.
    fn is_erasable(&self) -> bool {
        true
    }

    /// Report every value and object held by the payload.
    fn gc_mark(&self, tracer: &mut dyn Tracer);

    /// Report the objects reachable from the payload to a dumper.
    fn dump_scan(&self, visitor: &mut dyn DumpVisitor) {
        self.gc_mark(&mut ScanTracer::new(visitor));
    }

    /// Add the payload's own entries to its owner's JSON description.
    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>);

    /// Upcast for downcasting to the concrete kind.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete kind.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implements the two `Any` upcasts of [`Payload`].
macro_rules! payload_any_methods {
    () => {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub(crate) use payload_any_methods;
