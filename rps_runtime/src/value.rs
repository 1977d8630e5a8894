//! Tagged dynamic values.
//!
//! A [`Value`] is either the empty sentinel, a 63-bit integer, or a
//! reference to a zone. Values are cheap to clone (at most one reference
//! count increment) and are totally ordered across kinds:
//!
//! ```text
//! Empty < Int < String < Double < Set < Tuple < Object < Closure < Instance < Json
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::ObjectRef;
use crate::types::{DoubleZone, JsonZone, SetZone, StringZone, TreeZone, TupleZone};
use crate::zone::{Zone, ZoneRef, ZoneType};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Smallest integer a value can hold.
pub const INT_MIN: i64 = -(1 << 62);
/// Largest integer a value can hold.
pub const INT_MAX: i64 = (1 << 62) - 1;

const INT_HASH_FALLBACK: u32 = 414_721;

/// A dynamic value.
///
/// `Int` only ever holds integers in `INT_MIN..=INT_MAX`; use
/// [`Value::int`] or [`Value::from_int`] rather than building the variant
/// by hand.
#[derive(Clone, Default)]
pub enum Value {
    /// The empty sentinel: absent attribute, missing component.
    #[default]
    Empty,
    /// A tagged 63-bit integer.
    Int(i64),
    /// A reference to a zone.
    Ptr(ZoneRef),
}

impl Value {
    // =========================================================================
    // Construction
    // =========================================================================

    /// The empty value.
    #[inline]
    pub const fn empty() -> Self {
        Value::Empty
    }

    /// An integer value, if `i` fits in 63 bits.
    #[inline]
    pub fn int(i: i64) -> Option<Self> {
        (INT_MIN..=INT_MAX).contains(&i).then_some(Value::Int(i))
    }

    /// An integer value, wrapping `i` to 63 bits like the tagged encoding does.
    #[inline]
    pub fn from_int(i: i64) -> Self {
        Value::Int((i << 1) >> 1)
    }

    /// A boxed double.
    pub fn from_double(d: f64) -> Self {
        Value::Ptr(ZoneRef::Double(DoubleZone::make(d)))
    }

    /// An immutable string.
    pub fn string(text: &str) -> Self {
        Value::Ptr(ZoneRef::String(StringZone::make(text)))
    }

    /// A boxed JSON value.
    pub fn from_json(json: serde_json::Value) -> Self {
        Value::Ptr(ZoneRef::Json(JsonZone::make(json)))
    }

    /// A reference to an object.
    #[inline]
    pub fn from_object(ob: &ObjectRef) -> Self {
        Value::Ptr(ZoneRef::Object(ob.clone()))
    }

    // =========================================================================
    // Discrimination
    // =========================================================================

    /// Whether this is the empty sentinel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Whether this is a tagged integer.
    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// Whether this references a zone.
    #[inline]
    pub fn is_ptr(&self) -> bool {
        matches!(self, Value::Ptr(_))
    }

    /// Whether this references an object.
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Object(_)))
    }

    /// Whether this references a string.
    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::String(_)))
    }

    /// Whether this references a double.
    #[inline]
    pub fn is_double(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Double(_)))
    }

    /// Whether this references a set.
    #[inline]
    pub fn is_set(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Set(_)))
    }

    /// Whether this references a tuple.
    #[inline]
    pub fn is_tuple(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Tuple(_)))
    }

    /// Whether this references a closure.
    #[inline]
    pub fn is_closure(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Closure(_)))
    }

    /// Whether this references an instance.
    #[inline]
    pub fn is_instance(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Instance(_)))
    }

    /// Whether this references a JSON value.
    #[inline]
    pub fn is_json(&self) -> bool {
        matches!(self, Value::Ptr(ZoneRef::Json(_)))
    }

    /// Type tag of the value.
    pub fn ztype(&self) -> ZoneType {
        match self {
            Value::Empty => ZoneType::None,
            Value::Int(_) => ZoneType::Int,
            Value::Ptr(zone) => zone.ztype(),
        }
    }

    /// Lower case kind name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            other => other.ztype().name(),
        }
    }

    // =========================================================================
    // Checked Conversion
    // =========================================================================

    fn mismatch<T>(&self, expected: &'static str) -> RuntimeResult<T> {
        Err(RuntimeError::mismatch(expected, self.type_name()))
    }

    /// The integer, or a type mismatch.
    #[inline]
    pub fn as_int(&self) -> RuntimeResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => self.mismatch("int"),
        }
    }

    /// The double, or a type mismatch.
    pub fn as_double(&self) -> RuntimeResult<f64> {
        match self {
            Value::Ptr(ZoneRef::Double(d)) => Ok(d.value()),
            _ => self.mismatch("double"),
        }
    }

    /// The string zone, or a type mismatch.
    pub fn as_string(&self) -> RuntimeResult<&Arc<StringZone>> {
        match self {
            Value::Ptr(ZoneRef::String(s)) => Ok(s),
            _ => self.mismatch("string"),
        }
    }

    /// The string contents, or a type mismatch.
    pub fn as_cstr(&self) -> RuntimeResult<&str> {
        Ok(self.as_string()?.as_str())
    }

    /// The referenced object, or a type mismatch.
    pub fn as_object(&self) -> RuntimeResult<ObjectRef> {
        match self {
            Value::Ptr(ZoneRef::Object(ob)) => Ok(ob.clone()),
            _ => self.mismatch("object"),
        }
    }

    /// The set zone, or a type mismatch.
    pub fn as_set(&self) -> RuntimeResult<&Arc<SetZone>> {
        match self {
            Value::Ptr(ZoneRef::Set(s)) => Ok(s),
            _ => self.mismatch("set"),
        }
    }

    /// The tuple zone, or a type mismatch.
    pub fn as_tuple(&self) -> RuntimeResult<&Arc<TupleZone>> {
        match self {
            Value::Ptr(ZoneRef::Tuple(t)) => Ok(t),
            _ => self.mismatch("tuple"),
        }
    }

    /// The closure tree, or a type mismatch.
    pub fn as_closure(&self) -> RuntimeResult<&Arc<TreeZone>> {
        match self {
            Value::Ptr(ZoneRef::Closure(c)) => Ok(c),
            _ => self.mismatch("closure"),
        }
    }

    /// The instance tree, or a type mismatch.
    pub fn as_instance(&self) -> RuntimeResult<&Arc<TreeZone>> {
        match self {
            Value::Ptr(ZoneRef::Instance(i)) => Ok(i),
            _ => self.mismatch("instance"),
        }
    }

    /// The JSON contents, or a type mismatch.
    pub fn as_json(&self) -> RuntimeResult<&serde_json::Value> {
        match self {
            Value::Ptr(ZoneRef::Json(j)) => Ok(j.json()),
            _ => self.mismatch("json"),
        }
    }

    /// The referenced zone, or a type mismatch for ints and empty.
    pub fn as_zone(&self) -> RuntimeResult<&ZoneRef> {
        match self {
            Value::Ptr(zone) => Ok(zone),
            _ => self.mismatch("zone"),
        }
    }

    // =========================================================================
    // Defaulting Conversion
    // =========================================================================

    /// The integer, or `default`.
    #[inline]
    pub fn to_int(&self, default: i64) -> i64 {
        self.as_int().unwrap_or(default)
    }

    /// The double, or `default`.
    #[inline]
    pub fn to_double(&self, default: f64) -> f64 {
        self.as_double().unwrap_or(default)
    }

    /// The string contents, or `default`.
    #[inline]
    pub fn to_cstr<'a>(&'a self, default: &'a str) -> &'a str {
        self.as_cstr().unwrap_or(default)
    }

    /// The referenced object, or `default`.
    #[inline]
    pub fn to_object(&self, default: Option<ObjectRef>) -> Option<ObjectRef> {
        self.as_object().ok().or(default)
    }

    // =========================================================================
    // Hashing and Ordering
    // =========================================================================

    /// Structural hash. Zero only for the empty value.
    pub fn valhash(&self) -> u32 {
        match self {
            Value::Empty => 0,
            Value::Int(v) => match (v ^ (v >> 27)) as u32 {
                0 => INT_HASH_FALLBACK,
                h => h,
            },
            Value::Ptr(zone) => zone.valhash(),
        }
    }

    /// Total order across all kinds.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Empty, Value::Empty) => Ordering::Equal,
            (Value::Empty, _) => Ordering::Less,
            (_, Value::Empty) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(_), Value::Ptr(_)) => Ordering::Less,
            (Value::Ptr(_), Value::Int(_)) => Ordering::Greater,
            (Value::Ptr(a), Value::Ptr(b)) => a.compare(b),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Ptr(a), Value::Ptr(b)) => a.equal(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    #[inline]
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    #[inline]
    fn cmp(&self, other: &Value) -> Ordering {
        self.compare(other)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.valhash());
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ObjectRef> for Value {
    #[inline]
    fn from(ob: ObjectRef) -> Self {
        Value::Ptr(ZoneRef::Object(ob))
    }
}

impl From<&ObjectRef> for Value {
    #[inline]
    fn from(ob: &ObjectRef) -> Self {
        Value::from_object(ob)
    }
}

impl From<Option<ObjectRef>> for Value {
    #[inline]
    fn from(ob: Option<ObjectRef>) -> Self {
        ob.map(Value::from).unwrap_or_default()
    }
}

impl From<Arc<StringZone>> for Value {
    #[inline]
    fn from(s: Arc<StringZone>) -> Self {
        Value::Ptr(ZoneRef::String(s))
    }
}

impl From<Arc<DoubleZone>> for Value {
    #[inline]
    fn from(d: Arc<DoubleZone>) -> Self {
        Value::Ptr(ZoneRef::Double(d))
    }
}

impl From<Arc<JsonZone>> for Value {
    #[inline]
    fn from(j: Arc<JsonZone>) -> Self {
        Value::Ptr(ZoneRef::Json(j))
    }
}

impl From<Arc<SetZone>> for Value {
    #[inline]
    fn from(s: Arc<SetZone>) -> Self {
        Value::Ptr(ZoneRef::Set(s))
    }
}

impl From<Arc<TupleZone>> for Value {
    #[inline]
    fn from(t: Arc<TupleZone>) -> Self {
        Value::Ptr(ZoneRef::Tuple(t))
    }
}

impl From<Arc<TreeZone>> for Value {
    /// Closure or instance, according to the tree's own tag.
    fn from(tree: Arc<TreeZone>) -> Self {
        if tree.header().ztype() == ZoneType::Instance {
            Value::Ptr(ZoneRef::Instance(tree))
        } else {
            Value::Ptr(ZoneRef::Closure(tree))
        }
    }
}

impl From<ZoneRef> for Value {
    #[inline]
    fn from(zone: ZoneRef) -> Self {
        Value::Ptr(zone)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("Empty"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Ptr(zone) => write!(f, "{zone:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("_"),
            Value::Ptr(ZoneRef::String(s)) => f.write_str(s.as_str()),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Integers
    // =========================================================================

    #[test]
    fn test_int_range_checked() {
        assert_eq!(Value::int(INT_MAX).unwrap().as_int().unwrap(), INT_MAX);
        assert_eq!(Value::int(INT_MIN).unwrap().as_int().unwrap(), INT_MIN);
        assert!(Value::int(INT_MAX + 1).is_none());
        assert!(Value::int(i64::MIN).is_none());
    }

    #[test]
    fn test_from_int_wraps_to_63_bits() {
        assert_eq!(Value::from_int(-5).as_int().unwrap(), -5);
        assert_eq!(Value::from_int(INT_MAX + 1).as_int().unwrap(), INT_MIN);
    }

    #[test]
    fn test_int_hash_never_zero() {
        for i in [-3i64, -1, 0, 1, 2, 1 << 27, INT_MAX, INT_MIN] {
            assert_ne!(Value::from_int(i).valhash(), 0, "hash of {i}");
        }
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    #[test]
    fn test_as_reports_mismatch() {
        let err = Value::from_int(3).as_double().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                expected: "double",
                found: "int"
            }
        );
        assert!(Value::empty().as_object().is_err());
    }

    #[test]
    fn test_to_uses_default() {
        assert_eq!(Value::empty().to_int(9), 9);
        assert_eq!(Value::string("x").to_double(1.5), 1.5);
        assert_eq!(Value::string("abc").to_cstr("d"), "abc");
        assert_eq!(Value::from_int(1).to_cstr("d"), "d");
        assert!(Value::from_int(1).to_object(None).is_none());
    }

    #[test]
    fn test_discriminants() {
        assert!(Value::empty().is_empty());
        assert!(!Value::from_int(0).is_ptr());
        let s = Value::string("hello");
        assert!(s.is_ptr() && s.is_string() && !s.is_int());
        assert!(Value::from_double(0.5).is_double());
        assert!(Value::from_json(serde_json::json!({"a": 1})).is_json());
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn test_cross_kind_order() {
        let ordered = [
            Value::empty(),
            Value::from_int(i64::from(i32::MAX)),
            Value::string("a"),
            Value::from_double(-1.0),
            Value::from_json(serde_json::json!(null)),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{:?} < {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_tree_converts_by_its_own_tag() {
        let connective = crate::object::ObjectZone::make();
        let closure = Value::from(TreeZone::make_closure(&connective, [Value::from_int(1)]));
        let instance = Value::from(TreeZone::make_instance(&connective, [Value::from_int(1)]));
        assert!(closure.is_closure());
        assert!(instance.is_instance());
        assert_ne!(closure, instance);
        assert!(closure < instance);
    }

    #[test]
    fn test_structural_equality_of_strings() {
        let a = Value::string("same");
        let b = Value::string("same");
        assert_eq!(a, b);
        assert_eq!(a.valhash(), b.valhash());
        assert_ne!(a, Value::string("other"));
        assert_eq!(Value::empty(), Value::empty());
        assert!(Value::string("abc") < Value::string("abd"));
    }
}
