//! Boxed doubles.

use crate::trace::{Trace, Tracer};
use crate::zone::{LazyHash, Zone, ZoneHeader, ZoneRef, ZoneType, register_zone};
use std::sync::Arc;

const DOUBLE_HASH_FALLBACK: u32 = 987_383;

/// An immutable boxed `f64`.
#[derive(Debug)]
pub struct DoubleZone {
    hdr: ZoneHeader,
    dval: f64,
    hash: LazyHash,
}

impl DoubleZone {
    /// Allocate and register a double zone.
    pub fn make(dval: f64) -> Arc<Self> {
        let zone = Self {
            hdr: ZoneHeader::new(ZoneType::Double),
            dval,
            hash: LazyHash::new(),
        };
        register_zone(Arc::new(zone), ZoneRef::Double)
    }

    /// The boxed number.
    #[inline]
    pub fn value(&self) -> f64 {
        self.dval
    }

    /// Cached hash of the bit pattern.
    pub fn hash(&self) -> u32 {
        self.hash.get_or_compute(|| {
            let bits = self.dval.to_bits();
            match (bits ^ (bits >> 32)) as u32 {
                0 => DOUBLE_HASH_FALLBACK,
                h => h,
            }
        })
    }
}

impl Zone for DoubleZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        std::mem::size_of::<Self>().div_ceil(8)
    }
}

impl Trace for DoubleZone {
    #[inline]
    fn trace(&self, _tracer: &mut dyn Tracer) {}
}
