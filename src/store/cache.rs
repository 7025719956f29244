//! Bounded in-memory cache with pluggable load and evict hooks.
//!
//! [`BoundedCache`] keeps at most `capacity` entries. A miss asks the
//! [`CacheBacking`] to load the value; when the cache is full, the least
//! recently *accessed* entry is handed to the backing's `evict` hook and then
//! dropped. Nothing is flushed in the background: persistence happens either on
//! eviction or on an explicit [`BoundedCache::flush`].
//!
//! The backing is passed per call rather than owned, so a loader may itself read
//! through another cache (snapshots load from archives this way).

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use crate::error::Result;

/// Default number of entries held in memory.
pub const DEFAULT_CAPACITY: usize = 10;

/// Load/evict hooks for a [`BoundedCache`].
pub trait CacheBacking<K, V> {
    /// Produce the value for a key that is not in memory.
    fn load(&mut self, key: &K) -> Result<V>;

    /// Persist (or discard) a value leaving memory. The entry is only dropped
    /// once this returns `Ok`.
    fn evict(&mut self, key: &K, value: &V) -> Result<()>;
}

/// Backing built from a loader closure; evictions are discarded.
pub struct LoadOnly<F>(pub F);

impl<K, V, F> CacheBacking<K, V> for LoadOnly<F>
where
    F: FnMut(&K) -> Result<V>,
{
    fn load(&mut self, key: &K) -> Result<V> {
        (self.0)(key)
    }

    fn evict(&mut self, _key: &K, _value: &V) -> Result<()> {
        Ok(())
    }
}

/// Capped key-value cache with least-recently-used eviction.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    /// Front is least recently used.
    recency: VecDeque<K>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in recency order, least recently used first.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.recency.iter()
    }

    /// Returns the value for `key`, loading it through `backing` on a miss.
    ///
    /// A miss may evict the least recently used entry, which can itself cause
    /// I/O through the backing.
    pub fn get_with<B>(&mut self, key: &K, backing: &mut B) -> Result<&mut V>
    where
        B: CacheBacking<K, V>,
    {
        let value = match self.take(key) {
            Some(value) => value,
            None => backing.load(key)?,
        };
        self.admit(key.clone(), value, backing)
    }

    /// Stores `value` under `key`, replacing any cached value without evicting it.
    pub fn insert_with<B>(&mut self, key: K, value: V, backing: &mut B) -> Result<&mut V>
    where
        B: CacheBacking<K, V>,
    {
        self.take(&key);
        self.admit(key, value, backing)
    }

    /// Evicts entries, least recently used first, until at most `size` remain.
    pub fn shrink_to<B>(&mut self, size: usize, backing: &mut B) -> Result<()>
    where
        B: CacheBacking<K, V>,
    {
        while self.entries.len() > size {
            let Some(key) = self.recency.front().cloned() else {
                break;
            };
            if let Some(value) = self.entries.get(&key) {
                backing.evict(&key, value)?;
            }
            self.entries.remove(&key);
            self.recency.pop_front();
        }
        Ok(())
    }

    /// Evicts every entry, guaranteeing each has passed through `evict`.
    pub fn flush<B>(&mut self, backing: &mut B) -> Result<()>
    where
        B: CacheBacking<K, V>,
    {
        self.shrink_to(0, backing)
    }

    /// Removes an entry without passing it through `evict`.
    fn take(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        if let Some(position) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(position);
        }
        Some(value)
    }

    fn admit<B>(&mut self, key: K, value: V, backing: &mut B) -> Result<&mut V>
    where
        B: CacheBacking<K, V>,
    {
        if let Err(err) = self.shrink_to(self.capacity - 1, backing) {
            // Put the entry back as most recent so a failed eviction loses nothing.
            self.recency.push_back(key.clone());
            self.entries.insert(key, value);
            return Err(err);
        }
        self.recency.push_back(key.clone());
        Ok(self.entries.entry(key).or_insert(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::BTreeMap;

    /// Backing over an in-memory "disk" that records every hook call.
    #[derive(Default)]
    struct Recording {
        disk: BTreeMap<u32, String>,
        loads: Vec<u32>,
        evictions: Vec<u32>,
    }

    impl CacheBacking<u32, String> for Recording {
        fn load(&mut self, key: &u32) -> Result<String> {
            self.loads.push(*key);
            Ok(self.disk.get(key).cloned().unwrap_or_default())
        }

        fn evict(&mut self, key: &u32, value: &String) -> Result<()> {
            self.evictions.push(*key);
            self.disk.insert(*key, value.clone());
            Ok(())
        }
    }

    #[test]
    fn miss_loads_and_hit_does_not() {
        let mut cache = BoundedCache::new(2);
        let mut backing = Recording::default();
        backing.disk.insert(1, "one".into());

        assert_eq!(cache.get_with(&1, &mut backing).unwrap(), "one");
        assert_eq!(cache.get_with(&1, &mut backing).unwrap(), "one");
        assert_eq!(backing.loads, vec![1]);
    }

    #[test]
    fn evicts_least_recently_accessed_not_least_recently_inserted() {
        let mut cache = BoundedCache::new(2);
        let mut backing = Recording::default();

        cache.get_with(&1, &mut backing).unwrap();
        cache.get_with(&2, &mut backing).unwrap();
        // Touch 1 so that 2 becomes least recently used.
        cache.get_with(&1, &mut backing).unwrap();
        cache.get_with(&3, &mut backing).unwrap();

        assert_eq!(backing.evictions, vec![2]);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn flush_evicts_everything_in_recency_order() {
        let mut cache = BoundedCache::new(5);
        let mut backing = Recording::default();
        for key in [4, 2, 9] {
            cache.get_with(&key, &mut backing).unwrap().push('x');
        }

        cache.flush(&mut backing).unwrap();

        assert!(cache.is_empty());
        assert_eq!(backing.evictions, vec![4, 2, 9]);
        assert_eq!(backing.disk.get(&9).map(String::as_str), Some("x"));
    }

    #[test]
    fn insert_replaces_without_evicting_old_value() {
        let mut cache = BoundedCache::new(2);
        let mut backing = Recording::default();
        cache.insert_with(7, "a".to_string(), &mut backing).unwrap();
        cache.insert_with(7, "b".to_string(), &mut backing).unwrap();

        assert!(backing.evictions.is_empty());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_with(&7, &mut backing).unwrap(), "b");
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut cache = BoundedCache::new(0);
        let mut backing = Recording::default();
        assert_eq!(cache.capacity(), 1);
        cache.get_with(&1, &mut backing).unwrap().push_str("kept");
        assert_eq!(cache.get_with(&1, &mut backing).unwrap(), "kept");
    }

    #[test]
    fn capacity_does_not_change_observed_values() {
        let run = |capacity: usize| {
            let mut cache = BoundedCache::new(capacity);
            let mut backing = Recording::default();
            let mut observed = Vec::new();
            for step in 0..60u32 {
                let key = (step * 7) % 11;
                let value = cache.get_with(&key, &mut backing).unwrap();
                value.push(char::from(b'a' + (step % 26) as u8));
                observed.push(value.clone());
            }
            cache.flush(&mut backing).unwrap();
            (observed, backing.disk)
        };

        assert_eq!(run(1), run(1000));
    }

    #[test]
    fn failed_eviction_keeps_entries() {
        struct Failing;
        impl CacheBacking<u32, u32> for Failing {
            fn load(&mut self, key: &u32) -> Result<u32> {
                Ok(*key)
            }
            fn evict(&mut self, _key: &u32, _value: &u32) -> Result<()> {
                Err(Error::io("/dev/full", std::io::Error::other("disk full")))
            }
        }

        let mut cache = BoundedCache::new(1);
        cache.get_with(&1, &mut Failing).unwrap();
        assert!(cache.get_with(&2, &mut Failing).is_err());
        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.flush(&mut Failing).is_err());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn load_only_discards_evictions() {
        let mut cache = BoundedCache::new(1);
        let mut loads = 0;
        let mut backing = LoadOnly(|key: &u32| -> Result<u32> {
            loads += 1;
            Ok(key * 10)
        });
        assert_eq!(*cache.get_with(&1, &mut backing).unwrap(), 10);
        assert_eq!(*cache.get_with(&2, &mut backing).unwrap(), 20);
        assert_eq!(*cache.get_with(&1, &mut backing).unwrap(), 10);
        drop(backing);
        assert_eq!(loads, 3);
    }
}
