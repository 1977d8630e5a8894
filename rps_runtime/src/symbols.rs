//! The global symbol table.
//!
//! Binds names to symbol objects. A symbol object carries a
//! [`SymbolInfo`] payload recording its name. Strong symbols are GC roots;
//! weak ones stay alive only through other references and are pruned from
//! the table once reclaimed.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::{ObjectRef, ObjectZone};
use crate::payload::SymbolInfo;
use crate::trace::Tracer;
use crate::types::SetZone;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone)]
struct SymbolEntry {
    object: ObjectRef,
    weak: bool,
}

/// Name to symbol object table.
pub struct SymbolTable {
    entries: Mutex<BTreeMap<Box<str>, SymbolEntry>>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Whether `name` may name a symbol: an ASCII letter, then letters,
    /// digits or single underscores, not ending with an underscore.
    pub fn valid_name(name: &str) -> bool {
        let bytes = name.as_bytes();
        let Some(first) = bytes.first() else {
            return false;
        };
        if !first.is_ascii_alphabetic() || bytes[bytes.len() - 1] == b'_' {
            return false;
        }
        bytes
            .windows(2)
            .all(|w| (w[1].is_ascii_alphanumeric() || w[1] == b'_') && !(w[0] == b'_' && w[1] == b'_'))
    }

    /// Bind `name` to `object`.
    ///
    /// The object gets a [`SymbolInfo`] payload unless it already has one
    /// for this name. Returns `Ok(false)` when `name` is already bound to
    /// another object. Registering an already bound pair only updates its
    /// weakness.
    pub fn register_name(&self, name: &str, object: &ObjectRef, weak: bool) -> RuntimeResult<bool> {
        if !Self::valid_name(name) {
            return Err(RuntimeError::InvalidArgument(format!("invalid symbol name {name:?}")));
        }
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(name) {
            if !entry.object.ptr_eq(object) {
                return Ok(false);
            }
            entry.weak = weak;
            object.with_payload_mut::<SymbolInfo, _>(|info| info.set_weak(weak))?;
            return Ok(true);
        }
        if object.has_payload() {
            let owned = object.with_payload::<SymbolInfo, _>(|info| info.name().to_owned());
            match owned {
                Ok(other) if other == name => {
                    object.with_payload_mut::<SymbolInfo, _>(|info| info.set_weak(weak))?;
                }
                Ok(other) => {
                    return Err(RuntimeError::protocol(
                        "register_name",
                        Some(object.oid()),
                        format!("object already names symbol {other}"),
                    ));
                }
                Err(_) => {
                    return Err(RuntimeError::protocol(
                        "register_name",
                        Some(object.oid()),
                        format!("object has a {} payload", object.payload_type_name().unwrap_or("none")),
                    ));
                }
            }
        } else {
            object.put_payload(Box::new(SymbolInfo::new(name, weak)))?;
        }
        entries.insert(
            name.into(),
            SymbolEntry {
                object: object.clone(),
                weak,
            },
        );
        log::debug!("registered {} symbol {name} as {}", if weak { "weak" } else { "strong" }, object.oid());
        Ok(true)
    }

    /// Bind `name` strongly.
    pub fn register_strong_name(&self, name: &str, object: &ObjectRef) -> RuntimeResult<bool> {
        self.register_name(name, object, false)
    }

    /// Bind `name` weakly.
    pub fn register_weak_name(&self, name: &str, object: &ObjectRef) -> RuntimeResult<bool> {
        self.register_name(name, object, true)
    }

    /// The object named `name`.
    pub fn find_named_object(&self, name: &str) -> Option<ObjectRef> {
        self.entries.lock().get(name).map(|entry| entry.object.clone())
    }

    /// Whether `name` is bound weakly; `None` when unbound.
    pub fn is_weak_name(&self, name: &str) -> Option<bool> {
        self.entries.lock().get(name).map(|entry| entry.weak)
    }

    /// Unbind `name`. The symbol object keeps its payload, now weak.
    pub fn forget_name(&self, name: &str) -> bool {
        let Some(entry) = self.entries.lock().remove(name) else {
            return false;
        };
        weaken(&entry.object);
        true
    }

    /// Unbind every name bound to `object`.
    pub fn forget_object(&self, object: &ObjectRef) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.object.ptr_eq(object));
        let forgot = entries.len() != before;
        drop(entries);
        if forgot {
            weaken(object);
        }
        forgot
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no name is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// All symbol objects as a set value.
    pub fn set_of_all_symbols(&self) -> Arc<SetZone> {
        let objects: Vec<ObjectRef> = self.entries.lock().values().map(|e| e.object.clone()).collect();
        SetZone::make(objects)
    }

    /// Visit symbols whose name starts with `prefix`, in name order, until
    /// `stop` returns `true`. Returns the number visited.
    pub fn autocomplete_name(&self, prefix: &str, mut stop: impl FnMut(&ObjectRef, &str) -> bool) -> usize {
        if prefix.is_empty() {
            return 0;
        }
        let matches: Vec<(String, ObjectRef)> = self
            .entries
            .lock()
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, entry)| (name.to_string(), entry.object.clone()))
            .collect();
        let mut count = 0;
        for (name, object) in &matches {
            count += 1;
            if stop(object, name) {
                break;
            }
        }
        count
    }

    /// Report every strongly bound symbol object. Returns how many.
    pub fn gc_mark_strong_symbols(&self, tracer: &mut dyn Tracer) -> usize {
        let strong: Vec<ObjectRef> = self
            .entries
            .lock()
            .values()
            .filter(|entry| !entry.weak)
            .map(|entry| entry.object.clone())
            .collect();
        for object in &strong {
            tracer.trace_object(object);
        }
        strong.len()
    }

    /// Drop bindings whose symbol object was reclaimed. Returns how many.
    pub fn prune_reclaimed(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|name, entry| {
            let keep = !entry.object.is_reclaimed();
            if !keep {
                log::debug!("pruned reclaimed symbol {name}");
            }
            keep
        });
        before - entries.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

static SYMBOL_TABLE: OnceLock<SymbolTable> = OnceLock::new();

/// Get the process-wide symbol table.
pub fn symbol_table() -> &'static SymbolTable {
    SYMBOL_TABLE.get_or_init(SymbolTable::new)
}

impl ObjectZone {
    /// Name of this symbol object, if it is one.
    pub fn symbol_name(&self) -> Option<String> {
        self.with_payload::<SymbolInfo, _>(|info| info.name().to_owned()).ok()
    }
}

/// Mark the symbol payload of an unbound object weak, so it becomes erasable.
fn weaken(object: &ObjectRef) {
    if let Err(err) = object.with_payload_mut::<SymbolInfo, _>(|info| info.set_weak(true)) {
        log::debug!("unbound object {} kept its payload: {err}", object.oid());
    }
}
