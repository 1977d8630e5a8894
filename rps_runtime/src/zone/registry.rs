//! The global zone registry.
//!
//! Every zone is registered once at construction and receives a rank, an
//! index into a slot vector. Rank 0 is never handed out so that it can mean
//! "no rank". Swept ranks go to a free list and are recycled.

use super::ZoneRef;
use parking_lot::Mutex;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

struct RegistryInner {
    /// Slot 0 is always `None`.
    slots: Vec<Option<ZoneRef>>,
    free: Vec<u32>,
    live: usize,
}

/// Rank-indexed table of live zones.
pub struct ZoneRegistry {
    inner: Mutex<RegistryInner>,
    /// Words allocated since the registry was created.
    allocated_words: AtomicU64,
}

impl ZoneRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                slots: vec![None],
                free: Vec::new(),
                live: 0,
            }),
            allocated_words: AtomicU64::new(0),
        }
    }

    /// Register a zone, returning its new rank.
    ///
    /// # Arguments
    ///
    /// * `zone` - The zone to register; its header receives the rank.
    /// * `words` - Its approximate size, added to the allocation counter.
    pub fn register(&self, zone: ZoneRef, words: usize) -> u32 {
        let header_rank;
        {
            let mut inner = self.inner.lock();
            let rank = match inner.free.pop() {
                Some(rank) => rank,
                None => {
                    inner.slots.push(None);
                    (inner.slots.len() - 1) as u32
                }
            };
            zone.header().set_rank(rank);
            inner.slots[rank as usize] = Some(zone);
            inner.live += 1;
            header_rank = rank;
        }
        self.allocated_words.fetch_add(words as u64, Ordering::Relaxed);
        header_rank
    }

    /// Remove the zone at `rank`, marking it reclaimed.
    pub fn unregister(&self, rank: u32) -> Option<ZoneRef> {
        if rank == 0 {
            return None;
        }
        let mut inner = self.inner.lock();
        let zone = inner.slots.get_mut(rank as usize)?.take()?;
        inner.free.push(rank);
        inner.live -= 1;
        zone.header().set_rank(0);
        zone.header().set_reclaimed();
        Some(zone)
    }

    /// The zone registered at `rank`.
    pub fn get(&self, rank: u32) -> Option<ZoneRef> {
        self.inner.lock().slots.get(rank as usize)?.clone()
    }

    /// Number of registered zones.
    pub fn nb_live(&self) -> usize {
        self.inner.lock().live
    }

    /// Highest rank ever handed out, plus one.
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Words allocated since startup.
    #[inline]
    pub fn allocated_words(&self) -> u64 {
        self.allocated_words.load(Ordering::Relaxed)
    }

    /// Visit every live zone while holding the registry lock.
    ///
    /// `visit` must not register or unregister zones.
    pub fn for_each(&self, mut visit: impl FnMut(&ZoneRef)) {
        let inner = self.inner.lock();
        for zone in inner.slots.iter().flatten() {
            visit(zone);
        }
    }

    /// Clone every live zone reference.
    pub fn snapshot(&self) -> Vec<ZoneRef> {
        let inner = self.inner.lock();
        inner.slots.iter().flatten().cloned().collect()
    }

    /// Clear the mark bit of every live zone, returning how many were scanned.
    pub fn clear_marks(&self) -> usize {
        let mut count = 0;
        self.for_each(|zone| {
            zone.header().clear_mark();
            count += 1;
        });
        count
    }

    /// Unregister every unmarked zone and return them.
    ///
    /// The returned zones are dropped by the caller outside the registry lock.
    pub fn sweep_unmarked(&self) -> Vec<ZoneRef> {
        let mut doomed = Vec::new();
        let mut inner = self.inner.lock();
        let RegistryInner { slots, free, live } = &mut *inner;
        for (rank, slot) in slots.iter_mut().enumerate().skip(1) {
            let unmarked = slot.as_ref().is_some_and(|z| !z.header().is_marked());
            if unmarked {
                if let Some(zone) = slot.take() {
                    zone.header().set_rank(0);
                    zone.header().set_reclaimed();
                    free.push(rank as u32);
                    *live -= 1;
                    doomed.push(zone);
                }
            }
        }
        doomed
    }

    /// Check that every live zone knows its own rank.
    pub fn verify(&self) -> Result<(), String> {
        let inner = self.inner.lock();
        if inner.slots.first().is_some_and(Option::is_some) {
            return Err("rank 0 is occupied".to_string());
        }
        for (rank, slot) in inner.slots.iter().enumerate() {
            if let Some(zone) = slot {
                if zone.rank() as usize != rank {
                    return Err(format!("zone at rank {rank} believes it has rank {}", zone.rank()));
                }
            }
        }
        Ok(())
    }
}

impl Default for ZoneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Global Registry Access
// =============================================================================

static ZONE_REGISTRY: OnceLock<ZoneRegistry> = OnceLock::new();

/// Get the process-wide zone registry.
pub fn zone_registry() -> &'static ZoneRegistry {
    ZONE_REGISTRY.get_or_init(ZoneRegistry::new)
}
