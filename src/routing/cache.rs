//! Copy-on-write lookup cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A map that readers consult without contention and writers replace wholesale.
///
/// Readers clone the current `Arc` snapshot and never observe a partially
/// updated map. Writers copy the map, modify the copy and swap it in; two
/// writers racing on the same key both compute a value and one of them is
/// kept. Values are usually `Arc`s so a cached entry is returned as the
/// identical instance on every hit.
pub struct CopyOnWriteMap<K, V> {
    current: RwLock<Arc<HashMap<K, V>>>,
}

impl<K, V> Default for CopyOnWriteMap<K, V> {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(HashMap::new())),
        }
    }
}

impl<K, V> CopyOnWriteMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<HashMap<K, V>> {
        Arc::clone(&self.read())
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().contains_key(key)
    }

    /// Publish a new snapshot with `key` set to `value`.
    pub fn insert(&self, key: K, value: V) {
        let mut current = self.write();
        let mut next = HashMap::clone(&current);
        next.insert(key, value);
        *current = Arc::new(next);
    }

    /// Return the cached value for `key`, publishing `value` if there is none.
    pub fn get_or_insert(&self, key: K, value: V) -> V {
        let mut current = self.write();
        if let Some(existing) = current.get(&key) {
            return existing.clone();
        }
        let mut next = HashMap::clone(&current);
        next.insert(key, value.clone());
        *current = Arc::new(next);
        value
    }

    /// Publish an empty snapshot.
    pub fn clear(&self) {
        *self.write() = Arc::new(HashMap::new());
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Snapshots are swapped whole, so a poisoned lock still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, Arc<HashMap<K, V>>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<HashMap<K, V>>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
