//! Keyed lookup-or-insert cache shared across worker threads.
//!
//! Each key owns a slot guarded by its own mutex, so concurrent requests for
//! the same key wait for one computation while different keys proceed in
//! parallel. A failed computation is not cached: the next caller retries, and
//! a slot nobody else is waiting on is dropped from the map.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

type Slot<V> = Arc<Mutex<Option<Arc<V>>>>;

pub struct KeyedCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> KeyedCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Cached value for `key`, computing it with `init` at most once.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        init: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let slot = self.slot(key);
        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = value.as_ref() {
            return Ok(Arc::clone(v));
        }
        match init() {
            Ok(v) => {
                let v = Arc::new(v);
                *value = Some(Arc::clone(&v));
                Ok(v)
            }
            Err(err) => {
                drop(value);
                self.discard_empty(key, &slot);
                Err(err)
            }
        }
    }

    /// Remove `slot` if it is still empty and only the map and the caller hold it.
    fn discard_empty(&self, key: &K, slot: &Slot<V>) {
        // Lock order: map, then slot.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let unshared = slots
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s, slot) && Arc::strong_count(slot) == 2);
        if unshared && slot.lock().unwrap_or_else(PoisonError::into_inner).is_none() {
            slots.remove(key);
        }
    }

    /// Value for `key` if it has been computed.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.get(key)?)
        };
        let value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        value.clone()
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let slot = self.slot(&key);
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&value));
        value
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|s| s.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
