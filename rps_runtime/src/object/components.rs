//! Positional components of objects.

use super::{ObjectRef, ObjectZone};
use crate::error::{RuntimeError, RuntimeResult};
use crate::types::{TreeZone, normalize_index};
use crate::value::Value;
use std::sync::Arc;

impl ObjectZone {
    /// Number of components.
    pub fn nb_components(&self) -> usize {
        self.with_content(|content| content.comps.len())
    }

    /// Component at `rank`, negative ranks counting from the end.
    ///
    /// With `dont_fail`, an out of range rank gives the empty value instead
    /// of an error.
    pub fn component_at(&self, rank: i64, dont_fail: bool) -> RuntimeResult<Value> {
        self.with_content(|content| match normalize_index(rank, content.comps.len()) {
            Some(ix) => Ok(content.comps[ix].clone()),
            None if dont_fail => Ok(Value::Empty),
            None => Err(RuntimeError::IndexOutOfRange {
                index: rank,
                len: content.comps.len(),
            }),
        })
    }

    /// Replace the component at `rank`, returning the previous one.
    pub fn replace_component_at(&self, rank: i64, val: Value) -> RuntimeResult<Value> {
        let old = self.with_content_mut(|content| {
            let len = content.comps.len();
            normalize_index(rank, len)
                .map(|ix| std::mem::replace(&mut content.comps[ix], val))
                .ok_or(RuntimeError::IndexOutOfRange { index: rank, len })
        })?;
        self.touch_now();
        Ok(old)
    }

    /// Append one component.
    pub fn append_comp1(&self, val: Value) {
        self.with_content_mut(|content| content.comps.push(val));
        self.touch_now();
    }

    /// Append two components under one lock.
    pub fn append_comp2(&self, val0: Value, val1: Value) {
        self.append_components([val0, val1]);
    }

    /// Append three components under one lock.
    pub fn append_comp3(&self, val0: Value, val1: Value, val2: Value) {
        self.append_components([val0, val1, val2]);
    }

    /// Append four components under one lock.
    pub fn append_comp4(&self, val0: Value, val1: Value, val2: Value, val3: Value) {
        self.append_components([val0, val1, val2, val3]);
    }

    /// Append any number of components under one lock.
    pub fn append_components<I: IntoIterator<Item = Value>>(&self, vals: I) {
        self.with_content_mut(|content| content.comps.extend(vals));
        self.touch_now();
    }

    /// Grow with empty values or shrink to exactly `len` components.
    pub fn resize_components(&self, len: usize) {
        self.with_content_mut(|content| content.comps.resize(len, Value::Empty));
        self.touch_now();
    }

    /// Reserve room for `additional` more components.
    pub fn reserve_components(&self, additional: usize) {
        self.with_content_mut(|content| content.comps.reserve(additional));
    }

    /// Copy of all components.
    pub fn components_snapshot(&self) -> Vec<Value> {
        self.with_content(|content| content.comps.to_vec())
    }

    /// An immutable instance of `class` whose sons are the current
    /// components.
    pub fn instance_from_components(&self, class: &ObjectRef) -> RuntimeResult<Arc<TreeZone>> {
        if !class.is_class() {
            return Err(RuntimeError::protocol(
                "instance_from_components",
                Some(self.oid()),
                format!("{} is not a class", class.oid()),
            ));
        }
        Ok(TreeZone::make_instance(class, self.components_snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots::predefined;

    #[test]
    fn test_append_and_index() {
        let ob = ObjectZone::make();
        ob.append_comp1(Value::from_int(0));
        ob.append_comp3(Value::from_int(1), Value::from_int(2), Value::from_int(3));
        assert_eq!(ob.nb_components(), 4);
        assert_eq!(ob.component_at(-1, false).unwrap(), Value::from_int(3));
        assert_eq!(ob.component_at(1, false).unwrap(), Value::from_int(1));
        assert!(ob.component_at(4, true).unwrap().is_empty());
        assert!(matches!(
            ob.component_at(-5, false),
            Err(RuntimeError::IndexOutOfRange { index: -5, len: 4 })
        ));
    }

    #[test]
    fn test_replace_and_resize() {
        let ob = ObjectZone::make();
        ob.append_comp2(Value::from_int(1), Value::from_int(2));
        assert_eq!(ob.replace_component_at(0, Value::string("a")).unwrap(), Value::from_int(1));
        assert!(ob.replace_component_at(2, Value::Empty).is_err());
        ob.resize_components(4);
        assert_eq!(ob.nb_components(), 4);
        assert!(ob.component_at(3, false).unwrap().is_empty());
        ob.resize_components(1);
        assert_eq!(ob.components_snapshot(), vec![Value::string("a")]);
    }

    #[test]
    fn test_instance_from_components() {
        let ob = ObjectZone::make();
        ob.append_comp4(Value::from_int(1), Value::from_int(2), Value::Empty, Value::from_int(4));
        let class = predefined().object_class();
        let inst = ob.instance_from_components(class).unwrap();
        assert_eq!(inst.nb_sons(), 4);
        assert_eq!(inst.instance_class(), class);
        assert!(ob.instance_from_components(&ObjectZone::make()).is_err());
    }
}
