//! Immutable UTF-8 strings.

use crate::trace::{Trace, Tracer};
use crate::zone::{LazyHash, Zone, ZoneHeader, ZoneRef, ZoneType, register_zone};
use std::fmt;
use std::sync::Arc;

/// An immutable string zone with a lazily computed hash.
pub struct StringZone {
    hdr: ZoneHeader,
    text: Box<str>,
    hash: LazyHash,
}

impl StringZone {
    pub(crate) fn build(text: &str) -> Self {
        Self {
            hdr: ZoneHeader::new(ZoneType::String),
            text: text.into(),
            hash: LazyHash::new(),
        }
    }

    /// Allocate and register a string zone.
    pub fn make(text: &str) -> Arc<Self> {
        register_zone(Arc::new(Self::build(text)), ZoneRef::String)
    }

    /// The contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of Unicode scalar values.
    pub fn nb_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Cached hash.
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash.get_or_compute(|| Self::hash_text(&self.text))
    }

    /// Hash of a text, never zero.
    pub fn hash_text(text: &str) -> u32 {
        let slen = text.len() as u32;
        let mut h1 = slen & 0xfffff;
        let mut h2 = 31u32;
        for (cnt, ch) in text.chars().enumerate() {
            let uc = ch as u32;
            let cnt = cnt as u32;
            if cnt % 2 == 0 {
                h1 = h1.wrapping_mul(5413).wrapping_add(cnt) ^ uc.wrapping_mul(6427).wrapping_add(10);
            } else {
                h2 = h2.wrapping_mul(9419) ^ cnt.wrapping_mul(11).wrapping_add(uc.wrapping_mul(11437));
            }
        }
        match h1 ^ h2 {
            0 => 3 * (h1 & 0xffff) + 17 * (h2 & 0xffff) + (slen & 0xffff) + 2,
            h => h,
        }
    }
}

impl Zone for StringZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        (std::mem::size_of::<Self>() + self.text.len()).div_ceil(8)
    }
}

impl Trace for StringZone {
    #[inline]
    fn trace(&self, _tracer: &mut dyn Tracer) {}
}

impl fmt::Debug for StringZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringZone({:?})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_nonzero() {
        let s = StringZone::build("hello world");
        let h = s.hash();
        assert_ne!(h, 0);
        assert_eq!(s.hash(), h);
        assert_eq!(StringZone::hash_text("hello world"), h);
        assert_ne!(StringZone::hash_text(""), 0);
    }

    #[test]
    fn test_hash_depends_on_content() {
        assert_ne!(StringZone::hash_text("ab"), StringZone::hash_text("ba"));
        assert_ne!(StringZone::hash_text("a"), StringZone::hash_text("aa"));
    }

    #[test]
    fn test_unicode_lengths() {
        let s = StringZone::build("héllo");
        assert_eq!(s.len(), 6);
        assert_eq!(s.nb_chars(), 5);
        assert!(!s.is_empty());
    }

    #[test]
    fn test_make_registers() {
        let s = StringZone::make("registered");
        assert_ne!(s.header().rank(), 0);
        assert_eq!(s.header().ztype(), ZoneType::String);
    }
}
