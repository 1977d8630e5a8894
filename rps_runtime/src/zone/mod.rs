//! Zones: every garbage-collected allocation of the runtime.
//!
//! A zone is an immutable value (string, double, JSON, set, tuple, closure,
//! instance) or a mutable object. Each one embeds a [`ZoneHeader`] holding
//! its type tag, its GC flags and the rank it received from the global
//! [`ZoneRegistry`](registry::ZoneRegistry).
//!
//! ```text
//! ZoneRef ──► Arc<StringZone>  ┐
//!         ──► Arc<SetZone>     │ each starts with a ZoneHeader
//!         ──► ObjectRef        ┘   { ztype, gcinfo, rank }
//! ```

pub mod lazy_hash;
pub mod registry;

pub use lazy_hash::LazyHash;
pub use registry::{ZoneRegistry, zone_registry};

use crate::object::ObjectRef;
use crate::trace::{Trace, Tracer};
use crate::types::{DoubleZone, JsonZone, SetZone, StringZone, TreeZone, TupleZone};
use bitflags::bitflags;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

// =============================================================================
// Zone Types
// =============================================================================

/// Runtime type tag of a zone.
///
/// Negative tags are reserved for payload kinds, non-negative ones for
/// first-class values. The order of value tags is the order used when
/// comparing values of different kinds.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ZoneType {
    /// A call frame.
    CallFrame = i16::MIN,
    /// Tasklet payload.
    PaylTasklet = -13,
    /// Agenda payload.
    PaylAgenda = -12,
    /// Environment payload.
    PaylEnvironment = -11,
    /// Symbol payload.
    PaylSymbol = -10,
    /// Space payload.
    PaylSpace = -9,
    /// String buffer payload.
    PaylStrBuf = -8,
    /// Mutable value vector payload.
    PaylVectVal = -5,
    /// Mutable object vector payload.
    PaylVectOb = -4,
    /// Mutable object set payload.
    PaylSetOb = -3,
    /// Class metadata payload.
    PaylClassInfo = -2,
    /// Tagged integers, never allocated.
    Int = -1,
    /// No type.
    None = 0,
    /// Immutable string.
    String = 1,
    /// Boxed double.
    Double = 2,
    /// Ordered set of objects.
    Set = 3,
    /// Tuple of objects.
    Tuple = 4,
    /// Mutable object.
    Object = 5,
    /// Closure tree.
    Closure = 6,
    /// Immutable instance tree.
    Instance = 7,
    /// Boxed JSON value.
    Json = 8,
}

impl ZoneType {
    /// Whether this tag names a payload kind.
    #[inline]
    pub fn is_payload(self) -> bool {
        (self as i16) < ZoneType::Int as i16 && self != ZoneType::CallFrame
    }

    /// Whether this tag names a first-class value kind.
    #[inline]
    pub fn is_value(self) -> bool {
        (self as i16) > 0
    }

    /// Lower case name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            ZoneType::CallFrame => "callframe",
            ZoneType::PaylTasklet => "tasklet",
            ZoneType::PaylAgenda => "agenda",
            ZoneType::PaylEnvironment => "environment",
            ZoneType::PaylSymbol => "symbol",
            ZoneType::PaylSpace => "space",
            ZoneType::PaylStrBuf => "strbuf",
            ZoneType::PaylVectVal => "vectval",
            ZoneType::PaylVectOb => "vectob",
            ZoneType::PaylSetOb => "setob",
            ZoneType::PaylClassInfo => "classinfo",
            ZoneType::Int => "int",
            ZoneType::None => "none",
            ZoneType::String => "string",
            ZoneType::Double => "double",
            ZoneType::Set => "set",
            ZoneType::Tuple => "tuple",
            ZoneType::Object => "object",
            ZoneType::Closure => "closure",
            ZoneType::Instance => "instance",
            ZoneType::Json => "json",
        }
    }
}

// =============================================================================
// Zone Header
// =============================================================================

bitflags! {
    /// GC state bits stored in every zone header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcFlags: u16 {
        /// Reached during the current mark phase.
        const MARKED = 1 << 0;
        /// Swept out of the registry.
        const RECLAIMED = 1 << 1;
    }
}

/// Header embedded at the start of every zone.
#[derive(Debug)]
pub struct ZoneHeader {
    ztype: ZoneType,
    gcinfo: AtomicU16,
    rank: AtomicU32,
}

impl ZoneHeader {
    /// Create an unregistered header.
    #[inline]
    pub const fn new(ztype: ZoneType) -> Self {
        Self {
            ztype,
            gcinfo: AtomicU16::new(0),
            rank: AtomicU32::new(0),
        }
    }

    /// The type tag.
    #[inline]
    pub fn ztype(&self) -> ZoneType {
        self.ztype
    }

    /// Registry rank, 0 when not registered.
    #[inline]
    pub fn rank(&self) -> u32 {
        self.rank.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_rank(&self, rank: u32) {
        self.rank.store(rank, Ordering::Release);
    }

    /// Current GC flags.
    #[inline]
    pub fn flags(&self) -> GcFlags {
        GcFlags::from_bits_truncate(self.gcinfo.load(Ordering::Acquire))
    }

    /// Whether the mark bit is set.
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.flags().contains(GcFlags::MARKED)
    }

    /// Set the mark bit, returning `true` if it was not set before.
    #[inline]
    pub fn mark(&self) -> bool {
        let old = self.gcinfo.fetch_or(GcFlags::MARKED.bits(), Ordering::AcqRel);
        old & GcFlags::MARKED.bits() == 0
    }

    /// Clear the mark bit.
    #[inline]
    pub fn clear_mark(&self) {
        self.gcinfo.fetch_and(!GcFlags::MARKED.bits(), Ordering::AcqRel);
    }

    /// Whether the zone was swept.
    #[inline]
    pub fn is_reclaimed(&self) -> bool {
        self.flags().contains(GcFlags::RECLAIMED)
    }

    #[inline]
    pub(crate) fn set_reclaimed(&self) {
        self.gcinfo.fetch_or(GcFlags::RECLAIMED.bits(), Ordering::AcqRel);
    }
}

/// Common interface of zone structs.
pub trait Zone: Trace + Send + Sync {
    /// The embedded header.
    fn header(&self) -> &ZoneHeader;

    /// Approximate size in machine words, counted against the GC threshold.
    fn word_size(&self) -> usize;
}

// =============================================================================
// Zone References
// =============================================================================

/// A shared reference to any zone.
#[derive(Clone)]
pub enum ZoneRef {
    /// Immutable string.
    String(Arc<StringZone>),
    /// Boxed double.
    Double(Arc<DoubleZone>),
    /// Boxed JSON value.
    Json(Arc<JsonZone>),
    /// Ordered set of objects.
    Set(Arc<SetZone>),
    /// Tuple of objects.
    Tuple(Arc<TupleZone>),
    /// Closure tree.
    Closure(Arc<TreeZone>),
    /// Immutable instance tree.
    Instance(Arc<TreeZone>),
    /// Mutable object.
    Object(ObjectRef),
}

impl ZoneRef {
    fn as_zone(&self) -> &dyn Zone {
        match self {
            ZoneRef::String(z) => z.as_ref(),
            ZoneRef::Double(z) => z.as_ref(),
            ZoneRef::Json(z) => z.as_ref(),
            ZoneRef::Set(z) => z.as_ref(),
            ZoneRef::Tuple(z) => z.as_ref(),
            ZoneRef::Closure(z) | ZoneRef::Instance(z) => z.as_ref(),
            ZoneRef::Object(ob) => &**ob,
        }
    }

    /// The zone header.
    #[inline]
    pub fn header(&self) -> &ZoneHeader {
        self.as_zone().header()
    }

    /// The zone type tag.
    #[inline]
    pub fn ztype(&self) -> ZoneType {
        self.header().ztype()
    }

    /// Registry rank.
    #[inline]
    pub fn rank(&self) -> u32 {
        self.header().rank()
    }

    /// Approximate size in words.
    #[inline]
    pub fn word_size(&self) -> usize {
        self.as_zone().word_size()
    }

    /// The referenced object, if this is an object zone.
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            ZoneRef::Object(ob) => Some(ob),
            _ => None,
        }
    }

    /// Whether both references designate the same allocation.
    pub fn ptr_eq(&self, other: &ZoneRef) -> bool {
        match (self, other) {
            (ZoneRef::String(a), ZoneRef::String(b)) => Arc::ptr_eq(a, b),
            (ZoneRef::Double(a), ZoneRef::Double(b)) => Arc::ptr_eq(a, b),
            (ZoneRef::Json(a), ZoneRef::Json(b)) => Arc::ptr_eq(a, b),
            (ZoneRef::Set(a), ZoneRef::Set(b)) => Arc::ptr_eq(a, b),
            (ZoneRef::Tuple(a), ZoneRef::Tuple(b)) => Arc::ptr_eq(a, b),
            (ZoneRef::Closure(a), ZoneRef::Closure(b))
            | (ZoneRef::Instance(a), ZoneRef::Instance(b)) => Arc::ptr_eq(a, b),
            (ZoneRef::Object(a), ZoneRef::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural hash, never zero.
    pub fn valhash(&self) -> u32 {
        match self {
            ZoneRef::String(z) => z.hash(),
            ZoneRef::Double(z) => z.hash(),
            ZoneRef::Json(z) => z.hash(),
            ZoneRef::Set(z) => z.hash(),
            ZoneRef::Tuple(z) => z.hash(),
            ZoneRef::Closure(z) | ZoneRef::Instance(z) => z.hash(),
            ZoneRef::Object(ob) => ob.oid().hash(),
        }
    }

    /// Total order: type tag first, then the kind-specific comparison.
    pub fn compare(&self, other: &ZoneRef) -> CmpOrdering {
        match (self, other) {
            (ZoneRef::String(a), ZoneRef::String(b)) => a.as_str().cmp(b.as_str()),
            (ZoneRef::Double(a), ZoneRef::Double(b)) => a.value().total_cmp(&b.value()),
            (ZoneRef::Json(a), ZoneRef::Json(b)) => a.compact_text().cmp(b.compact_text()),
            (ZoneRef::Set(a), ZoneRef::Set(b)) => a.elements().cmp(b.elements()),
            (ZoneRef::Tuple(a), ZoneRef::Tuple(b)) => a.components().cmp(b.components()),
            (ZoneRef::Closure(a), ZoneRef::Closure(b))
            | (ZoneRef::Instance(a), ZoneRef::Instance(b)) => a.compare(b),
            (ZoneRef::Object(a), ZoneRef::Object(b)) => a.cmp(b),
            _ => self.ztype().cmp(&other.ztype()),
        }
    }

    /// Structural equality, short-circuited by hash.
    pub fn equal(&self, other: &ZoneRef) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.ztype() != other.ztype() || self.valhash() != other.valhash() {
            return false;
        }
        self.compare(other) == CmpOrdering::Equal
    }
}

impl Trace for ZoneRef {
    fn trace(&self, tracer: &mut dyn Tracer) {
        self.as_zone().trace(tracer)
    }
}

impl fmt::Debug for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneRef::String(z) => write!(f, "{:?}", z.as_str()),
            ZoneRef::Double(z) => write!(f, "{}", z.value()),
            ZoneRef::Json(z) => write!(f, "json{}", z.compact_text()),
            ZoneRef::Set(z) => f.debug_set().entries(z.elements().iter()).finish(),
            ZoneRef::Tuple(z) => f.debug_list().entries(z.components().iter()).finish(),
            ZoneRef::Closure(z) => write!(f, "closure{:?}{:?}", z.connective(), z.sons()),
            ZoneRef::Instance(z) => write!(f, "instance{:?}{:?}", z.connective(), z.sons()),
            ZoneRef::Object(ob) => write!(f, "{:?}", ob),
        }
    }
}

/// Wrap a freshly built zone, register it and account for its size.
pub(crate) fn register_zone<Z: Zone>(zone: Arc<Z>, wrap: fn(Arc<Z>) -> ZoneRef) -> Arc<Z> {
    let words = zone.word_size();
    let rank = zone_registry().register(wrap(Arc::clone(&zone)), words);
    log::trace!("registered {} zone at rank {rank}", zone.header().ztype().name());
    zone
}
