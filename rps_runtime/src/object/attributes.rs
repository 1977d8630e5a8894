//! Attribute access and mutation.
//!
//! Attributes map key objects to values. A key carrying a magic getter is
//! never stored: reading it calls the getter, and writing or removing it is
//! a protocol violation. Putting the empty value deletes the key.
//!
//! Batched operations check every key before taking the object lock, then
//! apply all changes under a single acquisition, so concurrent readers see
//! either none or all of them.

use super::{ObjectRef, ObjectZone};
use crate::callframe::TwoValues;
use crate::error::{RuntimeError, RuntimeResult};
use crate::types::SetZone;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

impl ObjectZone {
    fn check_not_magic(&self, operation: &'static str, key: &ObjectRef) -> RuntimeResult<()> {
        if key.has_magic_getter() {
            return Err(RuntimeError::protocol(
                operation,
                Some(self.oid()),
                format!("attribute {} is magic", key.oid()),
            ));
        }
        Ok(())
    }

    /// Apply a batch of puts under one lock, returning the previous values.
    fn put_attr_batch<const N: usize>(
        &self,
        operation: &'static str,
        entries: [(&ObjectRef, Value); N],
    ) -> RuntimeResult<[Value; N]> {
        for (key, _) in &entries {
            self.check_not_magic(operation, key)?;
        }
        let old = self.with_content_mut(|content| {
            entries.map(|(key, val)| store_attr(&mut content.attrs, key, val))
        });
        self.touch_now();
        Ok(old)
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Value of attribute `key`, the empty value when absent.
    pub fn get_attr1(&self, key: &ObjectRef) -> RuntimeResult<Value> {
        if let Some(getter) = key.magic_getter() {
            return getter(self, key);
        }
        Ok(self.with_content(|content| content.attrs.get(key).cloned().unwrap_or_default()))
    }

    /// Values of two attributes, read under one lock.
    pub fn get_attr2(&self, key0: &ObjectRef, key1: &ObjectRef) -> RuntimeResult<TwoValues> {
        if key0.has_magic_getter() || key1.has_magic_getter() {
            return Ok(TwoValues::new(self.get_attr1(key0)?, self.get_attr1(key1)?));
        }
        Ok(self.with_content(|content| {
            TwoValues::new(
                content.attrs.get(key0).cloned().unwrap_or_default(),
                content.attrs.get(key1).cloned().unwrap_or_default(),
            )
        }))
    }

    /// Number of stored attributes.
    pub fn nb_attributes(&self) -> usize {
        self.with_content(|content| content.attrs.len())
    }

    /// The set of stored attribute keys.
    pub fn set_of_attributes(&self) -> Arc<SetZone> {
        let keys: Vec<ObjectRef> = self.with_content(|content| content.attrs.keys().cloned().collect());
        SetZone::make(keys)
    }

    /// All stored attributes in key order.
    pub fn attributes_snapshot(&self) -> Vec<(ObjectRef, Value)> {
        self.with_content(|content| {
            content
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Set attribute `key`; the empty value removes it.
    pub fn put_attr(&self, key: &ObjectRef, val: Value) -> RuntimeResult<()> {
        self.put_attr_batch("put_attr", [(key, val)]).map(drop)
    }

    /// Set two attributes atomically.
    pub fn put_attr2(&self, key0: &ObjectRef, val0: Value, key1: &ObjectRef, val1: Value) -> RuntimeResult<()> {
        self.put_attr_batch("put_attr2", [(key0, val0), (key1, val1)])
            .map(drop)
    }

    /// Set three attributes atomically.
    pub fn put_attr3(
        &self,
        key0: &ObjectRef,
        val0: Value,
        key1: &ObjectRef,
        val1: Value,
        key2: &ObjectRef,
        val2: Value,
    ) -> RuntimeResult<()> {
        self.put_attr_batch("put_attr3", [(key0, val0), (key1, val1), (key2, val2)])
            .map(drop)
    }

    /// Set four attributes atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn put_attr4(
        &self,
        key0: &ObjectRef,
        val0: Value,
        key1: &ObjectRef,
        val1: Value,
        key2: &ObjectRef,
        val2: Value,
        key3: &ObjectRef,
        val3: Value,
    ) -> RuntimeResult<()> {
        self.put_attr_batch(
            "put_attr4",
            [(key0, val0), (key1, val1), (key2, val2), (key3, val3)],
        )
        .map(drop)
    }

    /// Set attribute `key` and return its previous value.
    pub fn exchange_attr(&self, key: &ObjectRef, val: Value) -> RuntimeResult<Value> {
        let [old] = self.put_attr_batch("exchange_attr", [(key, val)])?;
        Ok(old)
    }

    /// Set two attributes atomically, returning each previous value.
    pub fn exchange_attr2(
        &self,
        key0: &ObjectRef,
        val0: Value,
        key1: &ObjectRef,
        val1: Value,
    ) -> RuntimeResult<[Value; 2]> {
        self.put_attr_batch("exchange_attr2", [(key0, val0), (key1, val1)])
    }

    /// Set three attributes atomically, returning each previous value.
    pub fn exchange_attr3(
        &self,
        key0: &ObjectRef,
        val0: Value,
        key1: &ObjectRef,
        val1: Value,
        key2: &ObjectRef,
        val2: Value,
    ) -> RuntimeResult<[Value; 3]> {
        self.put_attr_batch("exchange_attr3", [(key0, val0), (key1, val1), (key2, val2)])
    }

    /// Set four attributes atomically, returning each previous value.
    #[allow(clippy::too_many_arguments)]
    pub fn exchange_attr4(
        &self,
        key0: &ObjectRef,
        val0: Value,
        key1: &ObjectRef,
        val1: Value,
        key2: &ObjectRef,
        val2: Value,
        key3: &ObjectRef,
        val3: Value,
    ) -> RuntimeResult<[Value; 4]> {
        self.put_attr_batch(
            "exchange_attr4",
            [(key0, val0), (key1, val1), (key2, val2), (key3, val3)],
        )
    }

    /// Remove attribute `key`, returning its previous value.
    pub fn remove_attr(&self, key: &ObjectRef) -> RuntimeResult<Value> {
        self.check_not_magic("remove_attr", key)?;
        let old = self.with_content_mut(|content| content.attrs.remove(key));
        if old.is_some() {
            self.touch_now();
        }
        Ok(old.unwrap_or_default())
    }

    /// Set many attributes atomically.
    ///
    /// Fails without changing anything if one key is magic.
    pub fn put_attributes<I>(&self, entries: I) -> RuntimeResult<()>
    where
        I: IntoIterator<Item = (ObjectRef, Value)>,
    {
        let entries: Vec<(ObjectRef, Value)> = entries.into_iter().collect();
        for (key, _) in &entries {
            self.check_not_magic("put_attributes", key)?;
        }
        self.with_content_mut(|content| {
            for (key, val) in entries {
                store_attr(&mut content.attrs, &key, val);
            }
        });
        self.touch_now();
        Ok(())
    }
}

/// Store or delete one entry, returning the previous value.
fn store_attr(attrs: &mut BTreeMap<ObjectRef, Value>, key: &ObjectRef, val: Value) -> Value {
    let old = if val.is_empty() {
        attrs.remove(key)
    } else {
        attrs.insert(key.clone(), val)
    };
    old.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::MagicGetterFn;

    fn keys(n: usize) -> Vec<ObjectRef> {
        (0..n).map(|_| ObjectZone::make()).collect()
    }

    // =========================================================================
    // Single Key
    // =========================================================================

    #[test]
    fn test_put_get_remove() {
        let ob = ObjectZone::make();
        let k = &keys(1)[0];
        assert!(ob.get_attr1(k).unwrap().is_empty());
        ob.put_attr(k, Value::from_int(42)).unwrap();
        assert_eq!(ob.get_attr1(k).unwrap(), Value::from_int(42));
        assert_eq!(ob.remove_attr(k).unwrap(), Value::from_int(42));
        assert!(ob.get_attr1(k).unwrap().is_empty());
        assert!(ob.remove_attr(k).unwrap().is_empty());
    }

    #[test]
    fn test_put_empty_deletes() {
        let ob = ObjectZone::make();
        let k = &keys(1)[0];
        ob.put_attr(k, Value::string("v")).unwrap();
        assert_eq!(ob.nb_attributes(), 1);
        ob.put_attr(k, Value::Empty).unwrap();
        assert_eq!(ob.nb_attributes(), 0);
    }

    #[test]
    fn test_exchange_returns_old() {
        let ob = ObjectZone::make();
        let k = &keys(1)[0];
        assert!(ob.exchange_attr(k, Value::from_int(1)).unwrap().is_empty());
        assert_eq!(ob.exchange_attr(k, Value::from_int(2)).unwrap(), Value::from_int(1));
    }

    // =========================================================================
    // Batches
    // =========================================================================

    #[test]
    fn test_exchange_batches_return_distinct_old_values() {
        let ob = ObjectZone::make();
        let k = keys(4);
        ob.put_attr4(
            &k[0],
            Value::from_int(10),
            &k[1],
            Value::from_int(11),
            &k[2],
            Value::from_int(12),
            &k[3],
            Value::from_int(13),
        )
        .unwrap();
        let old3 = ob
            .exchange_attr3(&k[0], Value::from_int(20), &k[1], Value::from_int(21), &k[2], Value::from_int(22))
            .unwrap();
        assert_eq!(old3, [Value::from_int(10), Value::from_int(11), Value::from_int(12)]);
        let old4 = ob
            .exchange_attr4(
                &k[0],
                Value::Empty,
                &k[1],
                Value::Empty,
                &k[2],
                Value::Empty,
                &k[3],
                Value::Empty,
            )
            .unwrap();
        assert_eq!(
            old4,
            [Value::from_int(20), Value::from_int(21), Value::from_int(22), Value::from_int(13)]
        );
        assert_eq!(ob.nb_attributes(), 0);
        let old2 = ob
            .exchange_attr2(&k[0], Value::from_int(1), &k[1], Value::from_int(2))
            .unwrap();
        assert!(old2.iter().all(Value::is_empty));
    }

    #[test]
    fn test_get_attr2_and_snapshot() {
        let ob = ObjectZone::make();
        let k = keys(3);
        ob.put_attr3(&k[0], Value::from_int(0), &k[1], Value::from_int(1), &k[2], Value::from_int(2))
            .unwrap();
        let two = ob.get_attr2(&k[2], &k[0]).unwrap();
        assert_eq!(two.main, Value::from_int(2));
        assert_eq!(two.extra, Value::from_int(0));
        let snap = ob.attributes_snapshot();
        assert_eq!(snap.len(), 3);
        assert!(snap.windows(2).all(|w| w[0].0 < w[1].0));
        let set = ob.set_of_attributes();
        assert_eq!(set.cardinal(), 3);
        assert!(k.iter().all(|key| set.contains(key)));
    }

    // =========================================================================
    // Magic Attributes
    // =========================================================================

    #[test]
    fn test_magic_key_computed_and_protected() {
        let ob = ObjectZone::make();
        let magic = ObjectZone::make();
        let plain = ObjectZone::make();
        let getter: MagicGetterFn = Arc::new(|owner: &ObjectZone, _key: &ObjectRef| {
            Ok(Value::from_int(owner.nb_attributes() as i64))
        });
        magic.put_magic_getter(Some(getter));

        ob.put_attr(&plain, Value::from_int(5)).unwrap();
        assert_eq!(ob.get_attr1(&magic).unwrap(), Value::from_int(1));
        assert!(ob.put_attr(&magic, Value::from_int(3)).unwrap_err().is_protocol_violation());
        assert!(ob.remove_attr(&magic).unwrap_err().is_protocol_violation());

        // nothing applied when one key of a batch is magic
        let err = ob
            .put_attr2(&plain, Value::from_int(6), &magic, Value::from_int(7))
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(ob.get_attr1(&plain).unwrap(), Value::from_int(5));
        let err = ob
            .put_attributes(vec![(plain.clone(), Value::Empty), (magic.clone(), Value::from_int(1))])
            .unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(ob.nb_attributes(), 1);
    }
}
