//! Concurrent journal-name → entry mapping.
//!
//! Lookups take a shared per-shard lock; inserts and removals take the
//! exclusive one. [`put_if_absent`] resolves the race between threads
//! creating the same slot: exactly one caller installs its entry, everyone
//! else receives the resident one. Iteration is weakly consistent — it
//! snapshots each shard in turn and may miss or duplicate concurrent
//! changes, which is all the sweep requires.
//!
//! [`put_if_absent`]: EntryTable::put_if_absent

use std::collections::hash_map::Entry as MapEntry;
use std::sync::Arc;

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::entry::Entry;

/// Cache-line padding to prevent false sharing between shards.
#[repr(align(64))]
struct Shard<W> {
    map: RwLock<AHashMap<String, Arc<Entry<W>>>>,
}

/// A sharded map from journal name to pool slot.
pub(crate) struct EntryTable<W> {
    shards: Box<[Shard<W>]>,
    /// Always `shards.len() - 1`; shards.len() is a power of two.
    shard_mask: usize,
    /// Hasher used only to compute shard indices.
    build_hasher: RandomState,
}

impl<W> EntryTable<W> {
    pub(crate) fn new(num_shards: usize) -> Self {
        assert!(num_shards.is_power_of_two());
        let shards = (0..num_shards)
            .map(|_| Shard {
                map: RwLock::new(AHashMap::new()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        EntryTable {
            shards,
            shard_mask: num_shards - 1,
            build_hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard_index(&self, name: &str) -> usize {
        let h = self.build_hasher.hash_one(name);
        // Use the high bits (better avalanche from ahash).
        ((h >> 32) as usize) & self.shard_mask
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    pub(crate) fn get(&self, name: &str) -> Option<Arc<Entry<W>>> {
        let idx = self.shard_index(name);
        self.shards[idx].map.read().get(name).map(Arc::clone)
    }

    /// Installs `entry` under `name` unless a slot is already resident.
    ///
    /// Returns `None` if the caller's entry was installed (race won), or the
    /// resident entry (race lost).
    pub(crate) fn put_if_absent(
        &self,
        name: &str,
        entry: Arc<Entry<W>>,
    ) -> Option<Arc<Entry<W>>> {
        let idx = self.shard_index(name);
        match self.shards[idx].map.write().entry(name.to_string()) {
            MapEntry::Occupied(resident) => Some(Arc::clone(resident.get())),
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
                None
            }
        }
    }

    /// Removes the mapping for `name`. Returns `true` if one was present.
    pub(crate) fn remove(&self, name: &str) -> bool {
        let idx = self.shard_index(name);
        self.shards[idx].map.write().remove(name).is_some()
    }

    /// Removes the mapping for `name` only while it still refers to `entry`.
    ///
    /// A sweep works from a snapshot; by the time it decides to drop a slot,
    /// the name may already map to a successor entry, which must survive.
    pub(crate) fn remove_if(&self, name: &str, entry: &Arc<Entry<W>>) -> bool {
        let idx = self.shard_index(name);
        let mut map = self.shards[idx].map.write();
        match map.get(name) {
            Some(resident) if Arc::ptr_eq(resident, entry) => {
                map.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Weakly-consistent snapshot of every `(name, entry)` pair.
    pub(crate) fn entries(&self) -> Vec<(String, Arc<Entry<W>>)> {
        let mut out = Vec::new();
        for shard in self.shards.iter() {
            let map = shard.map.read();
            out.reserve(map.len());
            for (name, entry) in map.iter() {
                out.push((name.clone(), Arc::clone(entry)));
            }
        }
        out
    }

    /// Total number of tracked slots across all shards.
    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.read().len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.map.read().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FREE;

    fn table() -> EntryTable<()> {
        EntryTable::new(8)
    }

    fn entry() -> Arc<Entry<()>> {
        Arc::new(Entry::new(FREE, 0))
    }

    #[test]
    fn put_if_absent_wins_once() {
        let t = table();
        let mine = entry();
        assert!(t.put_if_absent("a", Arc::clone(&mine)).is_none());

        let loser = entry();
        let resident = t.put_if_absent("a", loser).expect("race must be lost");
        assert!(Arc::ptr_eq(&resident, &mine));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn get_returns_resident_entry() {
        let t = table();
        assert!(t.get("missing").is_none());
        let e = entry();
        t.put_if_absent("a", Arc::clone(&e));
        assert!(Arc::ptr_eq(&t.get("a").unwrap(), &e));
    }

    #[test]
    fn remove_if_ignores_successor() {
        let t = table();
        let old = entry();
        t.put_if_absent("a", Arc::clone(&old));
        t.remove("a");

        let successor = entry();
        t.put_if_absent("a", Arc::clone(&successor));

        // A stale snapshot still holding `old` must not evict the successor.
        assert!(!t.remove_if("a", &old));
        assert!(t.get("a").is_some());
        assert!(t.remove_if("a", &successor));
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn entries_snapshots_all_shards() {
        let t = table();
        for name in ["a", "b", "c", "d", "e"] {
            t.put_if_absent(name, entry());
        }
        let mut names: Vec<String> = t.entries().into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
    }
}
