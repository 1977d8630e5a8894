//! Classes, inheritance and method dispatch.
//!
//! A class is an object with a [`ClassInfo`] payload, except the two root
//! classes `object` and `value` which are recognized by identity first.
//! Inheritance walks follow `ClassInfo` superclasses and stop after
//! [`MAX_INHERITANCE_DEPTH`] steps, so a cyclic chain is reported instead
//! of looping.

use super::{ObjectRef, ObjectZone};
use crate::MAX_INHERITANCE_DEPTH;
use crate::callframe::{CallFrame, TwoValues};
use crate::error::{RuntimeError, RuntimeResult};
use crate::payload::ClassInfo;
use crate::roots::predefined;
use crate::types::TreeZone;
use crate::value::Value;
use crate::zone::ZoneRef;
use std::sync::Arc;

impl ObjectZone {
    /// Whether this object is a class.
    pub fn is_class(&self) -> bool {
        let pre = predefined();
        if self.oid() == pre.object_class().oid() || self.oid() == pre.value_class().oid() {
            return true;
        }
        self.has_payload_of::<ClassInfo>()
    }

    /// Direct superclass of a class.
    pub fn superclass(&self) -> RuntimeResult<Option<ObjectRef>> {
        self.with_payload::<ClassInfo, _>(|info| info.superclass().cloned())
    }

    /// Whether this class is `sup` or inherits from it.
    ///
    /// Fails with [`RuntimeError::DepthExceeded`] on a chain longer than
    /// [`MAX_INHERITANCE_DEPTH`].
    pub fn is_subclass_of(&self, sup: &ObjectRef) -> RuntimeResult<bool> {
        let value_oid = predefined().value_class().oid();
        let mut cur: Option<ObjectRef> = None;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let zone: &ObjectZone = cur.as_deref().unwrap_or(self);
            if zone.oid() == sup.oid() {
                return Ok(true);
            }
            if zone.oid() == value_oid {
                return Ok(false);
            }
            let next = zone
                .with_payload::<ClassInfo, _>(|info| info.superclass().cloned())
                .ok()
                .flatten();
            match next {
                Some(next) => cur = Some(next),
                None => return Ok(false),
            }
        }
        Err(RuntimeError::DepthExceeded {
            what: "inheritance",
            limit: MAX_INHERITANCE_DEPTH,
        })
    }

    /// Whether this object's class is `class` or inherits from it.
    pub fn is_instance_of(&self, class: &ObjectRef) -> RuntimeResult<bool> {
        self.class().is_subclass_of(class)
    }

    /// Find the method for `selector` in this class or its ancestors.
    pub fn lookup_method(&self, selector: &ObjectRef) -> RuntimeResult<Option<Arc<TreeZone>>> {
        let mut cur: Option<ObjectRef> = None;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let zone: &ObjectZone = cur.as_deref().unwrap_or(self);
            let Ok((found, sup)) = zone.with_payload::<ClassInfo, _>(|info| {
                (info.get_own_method(selector), info.superclass().cloned())
            }) else {
                return Ok(None);
            };
            if found.is_some() {
                return Ok(found);
            }
            match sup {
                Some(sup) => cur = Some(sup),
                None => return Ok(None),
            }
        }
        Err(RuntimeError::DepthExceeded {
            what: "method lookup",
            limit: MAX_INHERITANCE_DEPTH,
        })
    }
}

impl Value {
    /// The class of any value.
    ///
    /// Objects report their own class and instances their connective;
    /// JSON and the empty value belong to the `value` class.
    pub fn compute_class(&self) -> ObjectRef {
        let pre = predefined();
        let class = match self {
            Value::Empty => pre.value_class(),
            Value::Int(_) => pre.int_class(),
            Value::Ptr(zone) => match zone {
                ZoneRef::String(_) => pre.string_class(),
                ZoneRef::Double(_) => pre.double_class(),
                ZoneRef::Set(_) => pre.set_class(),
                ZoneRef::Tuple(_) => pre.tuple_class(),
                ZoneRef::Closure(_) => pre.closure_class(),
                ZoneRef::Json(_) => pre.value_class(),
                ZoneRef::Instance(tree) => return tree.instance_class().clone(),
                ZoneRef::Object(ob) => return ob.class(),
            },
        };
        class.clone()
    }

    /// Whether the class of this value is `class` or inherits from it.
    pub fn is_instance_of(&self, class: &ObjectRef) -> RuntimeResult<bool> {
        self.compute_class().is_subclass_of(class)
    }

    /// Send `selector` to this value: find the method in its class and
    /// apply it with the receiver prepended to `args`.
    pub fn send(&self, frame: &Arc<CallFrame>, selector: &ObjectRef, args: &[Value]) -> RuntimeResult<TwoValues> {
        let class = self.compute_class();
        let Some(method) = class.lookup_method(selector)? else {
            return Err(RuntimeError::protocol(
                "send",
                self.as_object().ok().map(|ob| ob.oid()),
                format!("no method {} in class {}", selector.oid(), class.oid()),
            ));
        };
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(self.clone());
        full_args.extend_from_slice(args);
        method.apply(frame, &full_args)
    }
}
