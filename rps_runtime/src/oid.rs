//! Object identifiers.
//!
//! An [`Oid`] is a pair of integers printed as `_` followed by 11 base-62
//! digits for the high part and 7 for the low part, e.g.
//! `_41OFI3r0S1t03qdB2E`. Ids are generated at random and bucketed by the
//! first two digits of the high part, which gives 620 buckets used for
//! prefix completion.

use crate::error::{RuntimeError, RuntimeResult};
use std::fmt;
use std::str::FromStr;

/// Digit alphabet, in digit order.
pub const B62_DIGITS: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: u64 = 62;

/// A globally unique object identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid {
    hi: u64,
    lo: u64,
}

impl Oid {
    /// Smallest valid high part.
    pub const MIN_HI: u64 = 62 * 62 * 62;
    /// Exclusive bound of the high part, about 8.39e18.
    pub const MAX_HI: u64 = 10 * 62 * (62 * 62 * 62) * (62 * 62 * 62) * (62 * 62 * 62);
    /// Digits used by the high part.
    pub const NB_DIGITS_HI: usize = 11;
    /// Smallest valid low part.
    pub const MIN_LO: u64 = 62 * 62;
    /// Exclusive bound of the low part, about 3.52e12.
    pub const MAX_LO: u64 = 62 * (62 * 62 * 62) * (62 * 62 * 62);
    /// Digits used by the low part.
    pub const NB_DIGITS_LO: usize = 7;
    /// Length of the textual form, leading underscore included.
    pub const NB_CHARS: usize = Self::NB_DIGITS_HI + Self::NB_DIGITS_LO + 1;
    /// Number of prefix buckets.
    pub const MAX_BUCKETS: usize = 10 * 62;

    /// Build an oid from its two parts, checking validity.
    pub fn from_parts(hi: u64, lo: u64) -> RuntimeResult<Self> {
        let oid = Oid { hi, lo };
        if oid.is_valid() {
            Ok(oid)
        } else {
            Err(RuntimeError::InvalidOid(format!("hi={hi} lo={lo}")))
        }
    }

    /// Decode an oid literal in a `const` item; a malformed literal fails
    /// the build.
    ///
    /// # Example
    ///
    /// ```
    /// use rps_runtime::oid::Oid;
    ///
    /// const CLASS_CLASS: Oid = Oid::from_static("_41OFI3r0S1t03qdB2E");
    /// assert_eq!(CLASS_CLASS.to_string(), "_41OFI3r0S1t03qdB2E");
    /// ```
    pub const fn from_static(text: &str) -> Self {
        let bytes = text.as_bytes();
        assert!(bytes.len() == Self::NB_CHARS && bytes[0] == b'_', "malformed oid literal");
        let hi = const_digits(bytes, 1, Self::NB_DIGITS_HI + 1);
        let lo = const_digits(bytes, Self::NB_DIGITS_HI + 1, Self::NB_CHARS);
        assert!(
            hi >= Self::MIN_HI && hi < Self::MAX_HI && lo >= Self::MIN_LO && lo < Self::MAX_LO,
            "oid literal out of range"
        );
        assert!(Self::hash_parts(hi, lo) != 0, "oid literal with zero hash");
        Oid { hi, lo }
    }

    /// Generate a fresh random oid.
    ///
    /// Retries until both parts are in range and the hash is non-zero.
    pub fn random() -> Self {
        Self::random_with(&mut fastrand::Rng::new())
    }

    /// Generate a random oid from the given generator.
    pub fn random_with(rng: &mut fastrand::Rng) -> Self {
        loop {
            let hi = rng.u64(..) % Self::MAX_HI;
            if hi < Self::MIN_HI {
                continue;
            }
            let lo = rng.u64(..) % Self::MAX_LO;
            if lo < Self::MIN_LO {
                continue;
            }
            if Self::hash_parts(hi, lo) == 0 {
                continue;
            }
            return Oid { hi, lo };
        }
    }

    /// The high part.
    #[inline]
    pub fn hi(&self) -> u64 {
        self.hi
    }

    /// The low part.
    #[inline]
    pub fn lo(&self) -> u64 {
        self.lo
    }

    #[inline]
    const fn hash_parts(hi: u64, lo: u64) -> u32 {
        (hi % 2_147_473_837).wrapping_add((hi >> 32) ^ lo.wrapping_mul(17).wrapping_add(201_151)) as u32
    }

    /// The oid hash, never zero for a valid oid.
    #[inline]
    pub fn hash(&self) -> u32 {
        Self::hash_parts(self.hi, self.lo)
    }

    /// Index of the prefix bucket of this oid, in `0..MAX_BUCKETS`.
    #[inline]
    pub fn bucket_num(&self) -> usize {
        (self.hi / (Self::MAX_HI / Self::MAX_BUCKETS as u64)) as usize
    }

    /// Whether both parts are in range and the hash is non-zero.
    pub fn is_valid(&self) -> bool {
        (Self::MIN_HI..Self::MAX_HI).contains(&self.hi)
            && (Self::MIN_LO..Self::MAX_LO).contains(&self.lo)
            && self.hash() != 0
    }

    /// Bucket number designated by the two digits following the underscore
    /// of a textual prefix, if the prefix is long enough.
    pub fn bucket_of_prefix(prefix: &str) -> Option<usize> {
        let bytes = prefix.as_bytes();
        if bytes.len() < 3 || bytes[0] != b'_' {
            return None;
        }
        let d0 = digit_value(bytes[1])?;
        let d1 = digit_value(bytes[2])?;
        if d0 >= 10 {
            return None;
        }
        Some((d0 * BASE + d1) as usize)
    }

    fn write_digits(mut n: u64, out: &mut [u8]) {
        for slot in out.iter_mut().rev() {
            *slot = B62_DIGITS[(n % BASE) as usize];
            n /= BASE;
        }
    }

    /// Write the 19 character textual form into a fixed buffer.
    pub fn to_buf(&self) -> [u8; Self::NB_CHARS] {
        let mut buf = [b'0'; Self::NB_CHARS];
        buf[0] = b'_';
        Self::write_digits(self.hi, &mut buf[1..=Self::NB_DIGITS_HI]);
        Self::write_digits(self.lo, &mut buf[Self::NB_DIGITS_HI + 1..]);
        buf
    }
}

#[inline]
const fn digit_value(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u64),
        b'a'..=b'z' => Some((c - b'a') as u64 + 10),
        b'A'..=b'Z' => Some((c - b'A') as u64 + 36),
        _ => None,
    }
}

const fn const_digits(bytes: &[u8], start: usize, end: usize) -> u64 {
    let mut acc = 0u64;
    let mut ix = start;
    while ix < end {
        let Some(d) = digit_value(bytes[ix]) else {
            panic!("invalid digit in oid literal");
        };
        acc = acc * BASE + d;
        ix += 1;
    }
    acc
}

fn parse_digits(digits: &[u8]) -> Option<u64> {
    digits.iter().try_fold(0u64, |acc, &c| {
        acc.checked_mul(BASE)?.checked_add(digit_value(c)?)
    })
}

impl FromStr for Oid {
    type Err = RuntimeError;

    fn from_str(text: &str) -> RuntimeResult<Self> {
        let bytes = text.as_bytes();
        let invalid = || RuntimeError::InvalidOid(text.to_string());
        if bytes.len() != Self::NB_CHARS || bytes[0] != b'_' || !bytes[1].is_ascii_digit() {
            return Err(invalid());
        }
        let hi = parse_digits(&bytes[1..=Self::NB_DIGITS_HI]).ok_or_else(invalid)?;
        let lo = parse_digits(&bytes[Self::NB_DIGITS_HI + 1..]).ok_or_else(invalid)?;
        let oid = Oid { hi, lo };
        if !oid.is_valid() {
            return Err(invalid());
        }
        Ok(oid)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buf = self.to_buf();
        // The buffer only holds ASCII digits and an underscore.
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}
