//! Bounded TTL cache keyed by geohash-prefix strings.
//!
//! Shared by the zone classifier and the home feed engine. Entries expire after
//! `ttl`; when full, the oldest-inserted entry is evicted. Concurrent writers for
//! the same key are last-write-wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    seq: u64,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
}

pub struct GeoCache<V> {
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> GeoCache<V> {
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            clock,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Returns a live entry, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if now - entry.inserted_at <= self.ttl => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, value: V) {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut inner = self.lock();
        inner.entries.retain(|_, e| now - e.inserted_at <= ttl);

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.seq)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                inner.entries.remove(&victim);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                seq,
            },
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner<V>> {
        // A poisoned cache still holds valid entries.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
