//! Mutable objects.
//!
//! An object is the unit of identity of the runtime:
//!
//! ```text
//! ObjectZone
//! ├── ZoneHeader          (type tag, GC flags, registry rank)
//! ├── oid                 (immutable)
//! ├── class, space        (swappable references)
//! ├── mtime               (f64 seconds, atomic)
//! ├── magic getter        (computes reads of this object used as a key)
//! ├── applying function   (makes this object a closure connective)
//! └── content             (per-object reentrant lock)
//!     ├── attributes      (ordered map key object -> value)
//!     ├── components      (vector of values)
//!     └── payload         (at most one extension)
//! ```
//!
//! Objects are shared through [`ObjectRef`], which compares, orders and
//! hashes by oid.

pub mod attributes;
pub mod class;
pub mod components;
pub mod table;

pub use table::{ObjectTable, object_table};

use crate::callframe::{CallFrame, TwoValues};
use crate::error::{RuntimeError, RuntimeResult};
use crate::oid::Oid;
use crate::payload::Payload;
use crate::trace::{Trace, Tracer};
use crate::types::TreeZone;
use crate::value::Value;
use crate::zone::{Zone, ZoneHeader, ZoneRef, ZoneType, zone_registry};
use parking_lot::{ReentrantMutex, RwLock};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Computes the value of an attribute instead of reading the map.
///
/// Installed on the attribute key object; receives the object being
/// queried and the key.
pub type MagicGetterFn = Arc<dyn Fn(&ObjectZone, &ObjectRef) -> RuntimeResult<Value> + Send + Sync>;

/// Native code run when a closure whose connective is this object is applied.
pub type ApplyingFn =
    Arc<dyn Fn(&Arc<CallFrame>, &Arc<TreeZone>, &[Value]) -> RuntimeResult<TwoValues> + Send + Sync>;

/// Wall clock time in seconds since the epoch.
pub fn wallclock_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// =============================================================================
// Object Content
// =============================================================================

/// The lock-protected part of an object.
#[derive(Default)]
pub(crate) struct ObjectContent {
    pub(crate) attrs: BTreeMap<ObjectRef, Value>,
    pub(crate) comps: SmallVec<[Value; 4]>,
    pub(crate) payload: Option<Box<dyn Payload>>,
}

// =============================================================================
// Object Zone
// =============================================================================

/// A mutable object.
pub struct ObjectZone {
    hdr: ZoneHeader,
    oid: Oid,
    class: RwLock<Option<ObjectRef>>,
    space: RwLock<Option<ObjectRef>>,
    mtime: AtomicU64,
    magic_getter: RwLock<Option<MagicGetterFn>>,
    applying: RwLock<Option<ApplyingFn>>,
    content: ReentrantMutex<RefCell<ObjectContent>>,
}

impl ObjectZone {
    /// Allocate an object with the given oid and register its zone.
    ///
    /// The object is not entered in the object table.
    pub(crate) fn build(oid: Oid) -> ObjectRef {
        let zone = Arc::new(ObjectZone {
            hdr: ZoneHeader::new(ZoneType::Object),
            oid,
            class: RwLock::new(None),
            space: RwLock::new(None),
            mtime: AtomicU64::new(wallclock_now().to_bits()),
            magic_getter: RwLock::new(None),
            applying: RwLock::new(None),
            content: ReentrantMutex::new(RefCell::new(ObjectContent::default())),
        });
        let ob = ObjectRef(zone);
        let words = ob.word_size();
        zone_registry().register(ZoneRef::Object(ob.clone()), words);
        ob
    }

    // =========================================================================
    // Creation and Lookup
    // =========================================================================

    /// Create an object with a fresh random oid and the default class.
    pub fn make() -> ObjectRef {
        let ob = object_table().insert_fresh(ObjectZone::build);
        log::debug!("created object {}", ob.oid);
        ob
    }

    /// Create an object of the given class.
    pub fn make_with_class(class: &ObjectRef) -> RuntimeResult<ObjectRef> {
        let ob = Self::make();
        ob.put_class(class)?;
        Ok(ob)
    }

    /// Create an object of the given class inside an optional space.
    pub fn make_new(class: &ObjectRef, space: Option<&ObjectRef>) -> RuntimeResult<ObjectRef> {
        let ob = Self::make_with_class(class)?;
        ob.put_space(space);
        Ok(ob)
    }

    /// Find the object with `oid`, creating it when absent.
    pub fn make_or_find(oid: Oid) -> ObjectRef {
        let (ob, created) = object_table().find_or_insert(oid, ObjectZone::build);
        if created {
            log::debug!("created object {oid} on demand");
        }
        ob
    }

    /// Create or find an object whose oid comes from persistent storage,
    /// and put it in `space`.
    pub fn make_loaded(oid: Oid, space: Option<&ObjectRef>) -> RuntimeResult<ObjectRef> {
        if !oid.is_valid() {
            return Err(RuntimeError::InvalidOid(oid.to_string()));
        }
        let ob = Self::make_or_find(oid);
        ob.put_space(space);
        Ok(ob)
    }

    /// Find a registered object by oid.
    #[inline]
    pub fn find(oid: Oid) -> Option<ObjectRef> {
        object_table().find(oid)
    }

    /// Find a registered object by the textual form of its oid.
    pub fn find_by_text(text: &str) -> RuntimeResult<Option<ObjectRef>> {
        Ok(Self::find(text.parse()?))
    }

    /// Visit registered objects whose oid text starts with `prefix`, in oid
    /// order, until `stop` returns `true`. Returns the number visited.
    ///
    /// The prefix needs the underscore and at least two digits.
    pub fn autocomplete_oid(prefix: &str, stop: impl FnMut(&ObjectRef) -> bool) -> usize {
        object_table().autocomplete(prefix, stop)
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// The object id.
    #[inline]
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Hash of the oid.
    #[inline]
    pub fn obhash(&self) -> u32 {
        self.oid.hash()
    }

    /// Whether the collector swept this object.
    #[inline]
    pub fn is_reclaimed(&self) -> bool {
        self.hdr.is_reclaimed()
    }

    // =========================================================================
    // Class, Space, Modification Time
    // =========================================================================

    /// The class, the predefined `object` class when none was set.
    pub fn class(&self) -> ObjectRef {
        match self.class.read().as_ref() {
            Some(class) => class.clone(),
            None => crate::roots::predefined().object_class().clone(),
        }
    }

    /// The class, if explicitly set.
    pub fn explicit_class(&self) -> Option<ObjectRef> {
        self.class.read().clone()
    }

    /// Change the class, which must be a class object.
    pub fn put_class(&self, class: &ObjectRef) -> RuntimeResult<()> {
        if !class.is_class() {
            return Err(RuntimeError::protocol(
                "put_class",
                Some(self.oid),
                format!("{} is not a class", class.oid()),
            ));
        }
        self.set_class_unchecked(class);
        Ok(())
    }

    /// Change the class without checking it; used while installing the
    /// predefined objects.
    pub(crate) fn set_class_unchecked(&self, class: &ObjectRef) {
        *self.class.write() = Some(class.clone());
        self.touch_now();
    }

    /// The space, if any.
    pub fn space(&self) -> Option<ObjectRef> {
        self.space.read().clone()
    }

    /// Move the object to another space, or out of any space.
    pub fn put_space(&self, space: Option<&ObjectRef>) {
        *self.space.write() = space.cloned();
        self.touch_now();
    }

    /// Modification time in seconds since the epoch.
    #[inline]
    pub fn mtime(&self) -> f64 {
        f64::from_bits(self.mtime.load(Ordering::Acquire))
    }

    /// Set the modification time.
    #[inline]
    pub fn set_mtime(&self, mtime: f64) {
        self.mtime.store(mtime.to_bits(), Ordering::Release);
    }

    /// Set the modification time to now.
    #[inline]
    pub fn touch_now(&self) {
        self.set_mtime(wallclock_now());
    }

    // =========================================================================
    // Native Function Slots
    // =========================================================================

    /// Install or remove the magic getter of this attribute key.
    pub fn put_magic_getter(&self, getter: Option<MagicGetterFn>) {
        *self.magic_getter.write() = getter;
    }

    /// The magic getter, if any.
    pub fn magic_getter(&self) -> Option<MagicGetterFn> {
        self.magic_getter.read().clone()
    }

    /// Whether reads of this key are computed.
    #[inline]
    pub fn has_magic_getter(&self) -> bool {
        self.magic_getter.read().is_some()
    }

    /// Install or remove the applying function.
    pub fn put_applying_function(&self, applying: Option<ApplyingFn>) {
        *self.applying.write() = applying;
    }

    /// The applying function, if any.
    pub fn applying_function(&self) -> Option<ApplyingFn> {
        self.applying.read().clone()
    }

    // =========================================================================
    // Content Access
    // =========================================================================

    /// Run `f` on the content under the object lock.
    pub(crate) fn with_content<R>(&self, f: impl FnOnce(&ObjectContent) -> R) -> R {
        let guard = self.content.lock();
        let content = guard.borrow();
        f(&content)
    }

    /// Run `f` on the mutable content under the object lock.
    pub(crate) fn with_content_mut<R>(&self, f: impl FnOnce(&mut ObjectContent) -> R) -> R {
        let guard = self.content.lock();
        let mut content = guard.borrow_mut();
        f(&mut content)
    }

    // =========================================================================
    // Payload
    // =========================================================================

    /// Attach a payload, replacing an erasable one.
    pub fn put_payload(&self, payload: Box<dyn Payload>) -> RuntimeResult<()> {
        let kind = payload.payload_type_name();
        let old = self.with_content_mut(|content| {
            if let Some(old) = &content.payload {
                if !old.is_erasable() {
                    return Err(RuntimeError::protocol(
                        "put_payload",
                        Some(self.oid),
                        format!("cannot replace non-erasable {} payload", old.payload_type_name()),
                    ));
                }
            }
            Ok(content.payload.replace(payload))
        })?;
        self.touch_now();
        log::debug!("object {} got {kind} payload", self.oid);
        drop(old);
        Ok(())
    }

    /// Detach and return the payload, which must be erasable.
    pub fn clear_payload(&self) -> RuntimeResult<Option<Box<dyn Payload>>> {
        let old = self.with_content_mut(|content| match &content.payload {
            Some(old) if !old.is_erasable() => Err(RuntimeError::protocol(
                "clear_payload",
                Some(self.oid),
                format!("cannot clear non-erasable {} payload", old.payload_type_name()),
            )),
            _ => Ok(content.payload.take()),
        })?;
        if old.is_some() {
            self.touch_now();
        }
        Ok(old)
    }

    /// Whether a payload is attached.
    pub fn has_payload(&self) -> bool {
        self.with_content(|content| content.payload.is_some())
    }

    /// Kind name of the payload.
    pub fn payload_type_name(&self) -> Option<&'static str> {
        self.with_content(|content| content.payload.as_ref().map(|p| p.payload_type_name()))
    }

    /// Kind tag of the payload.
    pub fn payload_type(&self) -> Option<ZoneType> {
        self.with_content(|content| content.payload.as_ref().map(|p| p.payload_type()))
    }

    /// Whether the payload may be replaced or cleared.
    pub fn has_erasable_payload(&self) -> bool {
        self.with_content(|content| content.payload.as_ref().is_some_and(|p| p.is_erasable()))
    }

    /// Whether the payload is a `P`.
    pub fn has_payload_of<P: Payload>(&self) -> bool {
        self.with_content(|content| {
            content
                .payload
                .as_ref()
                .is_some_and(|p| p.as_any().is::<P>())
        })
    }

    /// Run `f` on the payload, which must be a `P`.
    ///
    /// `f` runs under the object lock and must not touch this object's
    /// attributes, components or payload.
    pub fn with_payload<P: Payload, R>(&self, f: impl FnOnce(&P) -> R) -> RuntimeResult<R> {
        self.with_content(|content| {
            let found = content.payload.as_ref().map_or("none", |p| p.payload_type_name());
            match content.payload.as_ref().and_then(|p| p.as_any().downcast_ref::<P>()) {
                Some(payload) => Ok(f(payload)),
                None => Err(RuntimeError::mismatch(short_type_name::<P>(), found)),
            }
        })
    }

    /// Run `f` on the mutable payload, which must be a `P`.
    ///
    /// Same restrictions as [`with_payload`](Self::with_payload).
    pub fn with_payload_mut<P: Payload, R>(&self, f: impl FnOnce(&mut P) -> R) -> RuntimeResult<R> {
        let result = self.with_content_mut(|content| {
            let found = content.payload.as_ref().map_or("none", |p| p.payload_type_name());
            match content.payload.as_mut().and_then(|p| p.as_any_mut().downcast_mut::<P>()) {
                Some(payload) => Ok(f(payload)),
                None => Err(RuntimeError::mismatch(short_type_name::<P>(), found)),
            }
        })?;
        self.touch_now();
        Ok(result)
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    /// Drop every reference held by a swept object so that reference
    /// cycles through it are broken. Called by the collector only.
    #[doc(hidden)]
    pub fn clear_after_reclaim(&self) {
        let content = self.with_content_mut(std::mem::take);
        *self.class.write() = None;
        *self.space.write() = None;
        *self.magic_getter.write() = None;
        *self.applying.write() = None;
        drop(content);
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl Zone for ObjectZone {
    #[inline]
    fn header(&self) -> &ZoneHeader {
        &self.hdr
    }

    fn word_size(&self) -> usize {
        let (nattrs, ncomps) = self.with_content(|c| (c.attrs.len(), c.comps.len()));
        std::mem::size_of::<Self>().div_ceil(8) + 3 * nattrs + 2 * ncomps
    }
}

/// Marks the class, the space, the attribute keys and values, the
/// components and the payload.
impl Trace for ObjectZone {
    fn trace(&self, tracer: &mut dyn Tracer) {
        let class = self.class.read().clone();
        class.trace(tracer);
        let space = self.space.read().clone();
        space.trace(tracer);
        self.with_content(|content| {
            for (key, val) in &content.attrs {
                tracer.trace_object(key);
                tracer.trace_value(val);
            }
            content.comps.as_slice().trace(tracer);
            if let Some(payload) = &content.payload {
                payload.gc_mark(tracer);
            }
        });
    }
}

impl fmt::Debug for ObjectZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.oid)
    }
}

// =============================================================================
// Object References
// =============================================================================

/// A shared reference to an object, compared and hashed by oid.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectZone>);

impl ObjectRef {
    /// Whether both references designate the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The object as a value.
    #[inline]
    pub fn as_value(&self) -> Value {
        Value::from_object(self)
    }
}

impl Deref for ObjectRef {
    type Target = ObjectZone;

    #[inline]
    fn deref(&self) -> &ObjectZone {
        &self.0
    }
}

impl PartialEq for ObjectRef {
    #[inline]
    fn eq(&self, other: &ObjectRef) -> bool {
        self.oid == other.oid
    }
}

impl Eq for ObjectRef {}

impl PartialOrd for ObjectRef {
    #[inline]
    fn partial_cmp(&self, other: &ObjectRef) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectRef {
    #[inline]
    fn cmp(&self, other: &ObjectRef) -> std::cmp::Ordering {
        self.oid.cmp(&other.oid)
    }
}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.oid.hash());
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.oid)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.oid)
    }
}
