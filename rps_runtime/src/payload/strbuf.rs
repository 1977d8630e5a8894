//! Mutable text buffers.

use super::{Payload, payload_any_methods};
use crate::error::RuntimeResult;
use crate::object::ObjectZone;
use crate::persist::DumpVisitor;
use crate::trace::Tracer;
use crate::types::StringZone;
use crate::zone::ZoneType;
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::Arc;

/// Growable text, frozen into a string value on demand.
#[derive(Debug, Default)]
pub struct StrBuf {
    buffer: String,
}

impl StrBuf {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text.
    pub fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Current content.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no text.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop the content.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Immutable string value with the current content.
    pub fn to_string_value(&self) -> Arc<StringZone> {
        StringZone::make(&self.buffer)
    }
}

impl fmt::Write for StrBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.push_str(s);
        Ok(())
    }
}

impl Payload for StrBuf {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylStrBuf
    }

    fn gc_mark(&self, _tracer: &mut dyn Tracer) {}

    fn dump_json_content(&self, _visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        map.insert("strbuf".into(), Json::String(self.buffer.clone()));
    }

    payload_any_methods!();
}

impl ObjectZone {
    /// Give this object a fresh empty [`StrBuf`] payload.
    pub fn put_new_strbuf_payload(&self) -> RuntimeResult<()> {
        self.put_payload(Box::new(StrBuf::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_write_and_freeze() {
        let mut buf = StrBuf::new();
        buf.push_str("count=");
        write!(buf, "{}", 42).unwrap();
        let frozen = buf.to_string_value();
        buf.clear();
        assert_eq!(frozen.as_str(), "count=42");
        assert!(buf.is_empty());
    }
}
