//! The global object table.
//!
//! Maps oids to objects through a partitioned hash map for lookups, plus one
//! ordered map per oid bucket for prefix completion. Both are updated under
//! the bucket lock, so they always agree.

use super::ObjectRef;
use crate::oid::Oid;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Registry of live objects by oid.
pub struct ObjectTable {
    by_oid: DashMap<Oid, ObjectRef, FxBuildHasher>,
    buckets: Box<[Mutex<BTreeMap<Oid, ObjectRef>>]>,
}

impl ObjectTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            by_oid: DashMap::with_hasher(FxBuildHasher),
            buckets: (0..Oid::MAX_BUCKETS).map(|_| Mutex::new(BTreeMap::new())).collect(),
        }
    }

    #[inline]
    fn bucket(&self, oid: Oid) -> &Mutex<BTreeMap<Oid, ObjectRef>> {
        &self.buckets[oid.bucket_num()]
    }

    /// Allocate an object under a fresh random oid and register it.
    ///
    /// Random oids colliding with a registered one are retried.
    pub fn insert_fresh(&self, build: impl Fn(Oid) -> ObjectRef) -> ObjectRef {
        let mut rng = fastrand::Rng::new();
        loop {
            let oid = Oid::random_with(&mut rng);
            let mut bucket = self.bucket(oid).lock();
            if bucket.contains_key(&oid) {
                log::warn!("oid collision on {oid}, retrying");
                continue;
            }
            let ob = build(oid);
            bucket.insert(oid, ob.clone());
            self.by_oid.insert(oid, ob.clone());
            return ob;
        }
    }

    /// Find the object with `oid`, building and registering it when absent.
    ///
    /// Returns the object and whether it was created.
    pub fn find_or_insert(&self, oid: Oid, build: impl FnOnce(Oid) -> ObjectRef) -> (ObjectRef, bool) {
        let mut bucket = self.bucket(oid).lock();
        if let Some(ob) = bucket.get(&oid) {
            return (ob.clone(), false);
        }
        let ob = build(oid);
        bucket.insert(oid, ob.clone());
        self.by_oid.insert(oid, ob.clone());
        (ob, true)
    }

    /// Look up an object.
    #[inline]
    pub fn find(&self, oid: Oid) -> Option<ObjectRef> {
        self.by_oid.get(&oid).map(|entry| entry.value().clone())
    }

    /// Whether `oid` is registered.
    #[inline]
    pub fn contains(&self, oid: Oid) -> bool {
        self.by_oid.contains_key(&oid)
    }

    /// Remove an object from both maps.
    pub fn remove(&self, oid: Oid) -> Option<ObjectRef> {
        let mut bucket = self.bucket(oid).lock();
        bucket.remove(&oid);
        self.by_oid.remove(&oid).map(|(_, ob)| ob)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.by_oid.len()
    }

    /// Whether no object is registered.
    pub fn is_empty(&self) -> bool {
        self.by_oid.is_empty()
    }

    /// Number of objects in one bucket.
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets.get(bucket).map_or(0, |b| b.lock().len())
    }

    /// Visit objects whose oid text starts with `prefix` in oid order until
    /// `stop` returns `true`. Returns the number of objects visited.
    pub fn autocomplete(&self, prefix: &str, mut stop: impl FnMut(&ObjectRef) -> bool) -> usize {
        let Some(bucket) = Oid::bucket_of_prefix(prefix) else {
            return 0;
        };
        // Snapshot so that `stop` runs without the bucket lock.
        let candidates: Vec<ObjectRef> = self.buckets[bucket]
            .lock()
            .iter()
            .filter(|(oid, _)| oid.to_string().starts_with(prefix))
            .map(|(_, ob)| ob.clone())
            .collect();
        let mut count = 0;
        for ob in &candidates {
            count += 1;
            if stop(ob) {
                break;
            }
        }
        count
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Global Table Access
// =============================================================================

static OBJECT_TABLE: OnceLock<ObjectTable> = OnceLock::new();

/// Get the process-wide object table.
pub fn object_table() -> &'static ObjectTable {
    OBJECT_TABLE.get_or_init(ObjectTable::new)
}
