//! Boxed JSON values.

use crate::trace::{Trace, Tracer};
use crate::types::StringZone;
use crate::zone::{LazyHash, Zone, ZoneHeader, ZoneRef, ZoneType, register_zone};
use std::sync::Arc;

/// An immutable JSON document, ordered and hashed by its compact text.
#[derive(Debug)]
pub struct JsonZone {
    hdr: ZoneHeader,
    json: serde_json::Value,
    compact: String,
    hash: LazyHash,
}

impl JsonZone {
    /// Allocate and register a JSON zone.
    pub fn make(json: serde_json::Value) -> Arc<Self> {
        let compact = json.to_string();
        let zone = Self {
            hdr: ZoneHeader::new(ZoneType::Json),
            json,
            compact,
            hash: LazyHash::new(),
        };
        register_zone(Arc::new(zone), ZoneRef::Json)
    }

    /// The document.
    #[inline]
    pub fn json(&self) -> &serde_json::Value {
        &self.json
    }

    /// Compact serialization.
    #[inline]
    pub fn compact_text(&self) -> &str {
        &self.compact
    }

    /// Cached hash of the compact serialization.
    pub fn hash(&self) -> u32 {
        self.hash.get_or_compute(|| StringZone::hash_text(&self.compact))
    }
}

impl Zone for JsonZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        (std::mem::size_of::<Self>() + 2 * self.compact.len()).div_ceil(8)
    }
}

impl Trace for JsonZone {
    #[inline]
    fn trace(&self, _tracer: &mut dyn Tracer) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compact_text_and_hash() {
        let j = JsonZone::make(json!({"name": "rps", "n": [1, 2]}));
        assert_eq!(j.compact_text(), r#"{"n":[1,2],"name":"rps"}"#);
        assert_eq!(j.hash(), StringZone::hash_text(j.compact_text()));
    }
}
