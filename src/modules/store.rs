use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::modules::error::NavError;
use crate::modules::geometry::Position;
use crate::modules::storage::{MemoryStorage, Storage};

/// Cache key: direction matters, so `a -> b` and `b -> a` are distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathKey {
    pub origin: Position,
    pub goal: Position,
    pub range: u32,
}

impl PathKey {
    pub const fn new(origin: Position, goal: Position, range: u32) -> Self {
        Self {
            origin,
            goal,
            range,
        }
    }

    pub fn encode(&self) -> String {
        format!("{}>{}|{}", self.origin.key(), self.goal.key(), self.range)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PathKey {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| NavError::InvalidKey(format!("{s}: {why}"));
        let (route, range) = s
            .trim()
            .rsplit_once('|')
            .ok_or_else(|| invalid("expected origin>goal|range"))?;
        let (origin, goal) = route
            .split_once('>')
            .ok_or_else(|| invalid("expected origin>goal|range"))?;
        let origin = origin.parse::<Position>().map_err(|e| invalid(e.as_str()))?;
        let goal = goal.parse::<Position>().map_err(|e| invalid(e.as_str()))?;
        let range = range
            .parse::<u32>()
            .map_err(|_| invalid("range must be a non-negative integer"))?;
        Ok(PathKey::new(origin, goal, range))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCacheEntry {
    pub steps: Vec<Position>,
    /// First tick at which the entry is no longer served.
    pub expiry: u64,
    pub last_touch: u64,
}

impl PathCacheEntry {
    /// Every consecutive pair of steps is adjacent.
    pub fn is_contiguous(&self) -> bool {
        is_contiguous(&self.steps)
    }
}

pub fn is_contiguous(steps: &[Position]) -> bool {
    steps.windows(2).all(|w| w[0].is_adjacent(w[1]))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss { evicted: usize },
}

/// Durable path cache with TTL expiry and least-recently-touched eviction.
#[derive(Debug)]
pub struct PathStore<S = MemoryStorage<PathCacheEntry>> {
    storage: S,
    max_entries: usize,
    default_ttl: u64,
}

impl PathStore {
    pub fn in_memory(max_entries: usize, default_ttl: u64) -> Self {
        Self::new(MemoryStorage::new(), max_entries, default_ttl)
    }
}

impl<S: Storage<PathCacheEntry>> PathStore<S> {
    pub fn new(storage: S, max_entries: usize, default_ttl: u64) -> Self {
        Self {
            storage,
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Serve a live entry and touch it. Expired or broken entries are
    /// removed on the way out.
    pub fn lookup(&mut self, key: &PathKey, tick: u64) -> Option<Vec<Position>> {
        let encoded = key.encode();
        let (expired, broken) = match self.storage.get(&encoded) {
            None => return None,
            Some(entry) => (entry.expiry <= tick, !entry.is_contiguous()),
        };
        if expired || broken {
            self.storage.delete(&encoded);
            debug!(
                target: "waypath::store",
                key = %encoded,
                expired,
                broken,
                "dropped cached path"
            );
            return None;
        }

        let entry = self.storage.get_mut(&encoded)?;
        entry.last_touch = tick;
        Some(entry.steps.clone())
    }

    /// Store a path, returning how many entries were evicted to make room.
    /// Empty or non-contiguous paths are not stored.
    pub fn insert(&mut self, key: &PathKey, steps: Vec<Position>, tick: u64, ttl: Option<u64>) -> usize {
        if steps.is_empty() || !is_contiguous(&steps) {
            return 0;
        }
        let ttl = ttl.unwrap_or(self.default_ttl).max(1);
        self.storage.set(
            key.encode(),
            PathCacheEntry {
                steps,
                expiry: tick.saturating_add(ttl),
                last_touch: tick,
            },
        );
        self.evict_over_capacity()
    }

    pub fn get_or_compute<F>(
        &mut self,
        key: &PathKey,
        tick: u64,
        ttl: Option<u64>,
        compute: F,
    ) -> (Vec<Position>, CacheLookup)
    where
        F: FnOnce() -> Vec<Position>,
    {
        if let Some(steps) = self.lookup(key, tick) {
            return (steps, CacheLookup::Hit);
        }
        let steps = compute();
        let evicted = self.insert(key, steps.clone(), tick, ttl);
        (steps, CacheLookup::Miss { evicted })
    }

    pub fn invalidate(&mut self, key: &PathKey) -> bool {
        self.invalidate_raw(&key.encode())
    }

    pub fn invalidate_raw(&mut self, key: &str) -> bool {
        let removed = self.storage.delete(key).is_some();
        if removed {
            debug!(target: "waypath::store", key, "invalidated cached path");
        }
        removed
    }

    /// Drop every entry whose expiry has passed.
    pub fn purge_expired(&mut self, tick: u64) -> usize {
        let stale: Vec<String> = self
            .storage
            .iter()
            .filter(|(_, entry)| entry.expiry <= tick)
            .map(|(key, _)| key.to_string())
            .collect();
        for key in &stale {
            self.storage.delete(key);
        }
        stale.len()
    }

    pub fn clear(&mut self) -> usize {
        let keys = self.storage.keys();
        for key in &keys {
            self.storage.delete(key);
        }
        keys.len()
    }

    fn evict_over_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.storage.len() > self.max_entries {
            let oldest = self
                .storage
                .iter()
                .min_by_key(|(_, entry)| entry.last_touch)
                .map(|(key, _)| key.to_string());
            let Some(oldest) = oldest else {
                break;
            };
            self.storage.delete(&oldest);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(target: "waypath::store", evicted, "evicted cached paths");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::geometry::AreaId;

    fn pos(x: i32, y: i32) -> Position {
        Position::new(AreaId(0), x, y)
    }

    fn line(from: i32, to: i32) -> Vec<Position> {
        (from..=to).map(|x| pos(x, 5)).collect()
    }

    fn key(n: i32) -> PathKey {
        PathKey::new(pos(1, 1), pos(n, 5), 1)
    }

    #[test]
    fn key_encodes_and_parses() {
        let key = PathKey::new(pos(3, 4), Position::new(AreaId(2), 10, 11), 1);
        assert_eq!(key.encode(), "0:3,4>2:10,11|1");
        assert_eq!(key.encode().parse::<PathKey>().unwrap(), key);
        assert!("0:3,4|1".parse::<PathKey>().is_err());
        assert!("0:3,4>0:1,1|x".parse::<PathKey>().is_err());
    }

    #[test]
    fn keys_are_directional() {
        let ab = PathKey::new(pos(1, 1), pos(5, 5), 1);
        let ba = PathKey::new(pos(5, 5), pos(1, 1), 1);
        assert_ne!(ab.encode(), ba.encode());
    }

    #[test]
    fn ttl_window_is_honoured() {
        let mut store = PathStore::in_memory(10, 180);
        let k = key(9);
        let (_, lookup) = store.get_or_compute(&k, 100, None, || line(2, 9));
        assert_eq!(lookup, CacheLookup::Miss { evicted: 0 });

        let mut computed = false;
        let (steps, lookup) = store.get_or_compute(&k, 279, None, || {
            computed = true;
            Vec::new()
        });
        assert_eq!(lookup, CacheLookup::Hit);
        assert!(!computed);
        assert_eq!(steps, line(2, 9));

        let (_, lookup) = store.get_or_compute(&k, 281, None, || {
            computed = true;
            line(2, 9)
        });
        assert!(computed);
        assert!(matches!(lookup, CacheLookup::Miss { .. }));
    }

    #[test]
    fn expired_entry_is_removed_on_access() {
        let mut store = PathStore::in_memory(10, 5);
        store.insert(&key(9), line(2, 9), 10, None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup(&key(9), 15), None);
        assert!(store.is_empty());
    }

    #[test]
    fn broken_entries_are_never_served() {
        let mut store = PathStore::in_memory(10, 100);
        store.storage_mut().set(
            key(9).encode(),
            PathCacheEntry {
                steps: vec![pos(2, 5), pos(4, 5)],
                expiry: 1000,
                last_touch: 0,
            },
        );
        assert_eq!(store.lookup(&key(9), 1), None);
        assert!(store.is_empty());

        assert_eq!(store.insert(&key(9), vec![pos(2, 5), pos(4, 5)], 1, None), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_touched() {
        let mut store = PathStore::in_memory(3, 1000);
        store.insert(&key(5), line(2, 5), 1, None);
        store.insert(&key(6), line(2, 6), 2, None);
        store.insert(&key(7), line(2, 7), 3, None);

        // Touching the oldest entry protects it.
        assert!(store.lookup(&key(5), 4).is_some());

        let evicted = store.insert(&key(8), line(2, 8), 5, None);
        assert_eq!(evicted, 1);
        assert_eq!(store.len(), 3);
        assert!(store.lookup(&key(6), 6).is_none());
        assert!(store.lookup(&key(5), 6).is_some());
    }

    #[test]
    fn empty_results_are_not_cached() {
        let mut store = PathStore::in_memory(3, 1000);
        let (steps, _) = store.get_or_compute(&key(5), 1, None, Vec::new);
        assert!(steps.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn invalidate_is_immediate() {
        let mut store = PathStore::in_memory(3, 1000);
        store.insert(&key(5), line(2, 5), 1, None);
        assert!(store.invalidate(&key(5)));
        assert!(!store.invalidate(&key(5)));
        assert!(store.lookup(&key(5), 1).is_none());
    }

    #[test]
    fn purge_and_clear() {
        let mut store = PathStore::in_memory(10, 10);
        store.insert(&key(5), line(2, 5), 1, None);
        store.insert(&key(6), line(2, 6), 1, Some(100));
        assert_eq!(store.purge_expired(20), 1);
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
    }
}
