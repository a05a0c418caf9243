//! In-memory memoization for expensive computations.
//!
//! Keyed results live for a per-entry TTL and the cache evicts the oldest
//! insertion once it grows past its capacity. Not a source of truth, just a
//! way to avoid recomputing a decomposition or forecast for an unchanged
//! `(series_id, window, params)` tuple.

use crate::error::Result;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    // Insertion order; the front is the eviction candidate.
    order: VecDeque<K>,
    hits: u64,
    misses: u64,
}

/// Thread-safe TTL cache with insertion-order eviction.
pub struct ComputationCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    default_ttl: Duration,
    capacity: usize,
}

impl<K, V> Default for ComputationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl<K, V> ComputationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
            default_ttl,
            capacity: capacity.max(1),
        }
    }

    /// Clone out a live entry; expired entries are removed on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();
        // Live entry, expired entry, or nothing at all.
        let found = inner
            .map
            .get(key)
            .map(|e| (e.expires_at > now).then(|| e.value.clone()));
        match found {
            Some(Some(value)) => {
                inner.hits += 1;
                Some(value)
            }
            Some(None) => {
                inner.map.remove(key);
                inner.order.retain(|k| k != key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.lock();
        Self::store(&mut inner, key, value, ttl, self.capacity);
    }

    /// Return the cached value or run `compute` and store its result.
    ///
    /// The lock is held across `compute`, so the closure runs at most once
    /// per live key even under concurrent callers.
    pub fn get_or_compute<F>(&self, key: K, ttl: Option<Duration>, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        let mut inner = self.lock();
        let now = Instant::now();
        let cached = inner
            .map
            .get(&key)
            .and_then(|e| (e.expires_at > now).then(|| e.value.clone()));
        if let Some(value) = cached {
            inner.hits += 1;
            return value;
        }
        inner.misses += 1;
        let value = compute();
        Self::store(
            &mut inner,
            key,
            value.clone(),
            ttl.unwrap_or(self.default_ttl),
            self.capacity,
        );
        value
    }

    /// Fallible variant of [`get_or_compute`]; errors are not cached.
    ///
    /// [`get_or_compute`]: Self::get_or_compute
    pub fn try_get_or_compute<F>(&self, key: K, ttl: Option<Duration>, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let mut inner = self.lock();
        let now = Instant::now();
        let cached = inner
            .map
            .get(&key)
            .and_then(|e| (e.expires_at > now).then(|| e.value.clone()));
        if let Some(value) = cached {
            inner.hits += 1;
            return Ok(value);
        }
        inner.misses += 1;
        let value = compute()?;
        Self::store(
            &mut inner,
            key,
            value.clone(),
            ttl.unwrap_or(self.default_ttl),
            self.capacity,
        );
        Ok(value)
    }

    /// Drop every expired entry. Expiry is otherwise lazy, so long-idle
    /// caches can call this to release memory.
    pub fn prune_expired(&self) {
        let mut inner = self.lock();
        let now = Instant::now();
        let expired: Vec<K> = inner
            .map
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            inner.map.remove(&key);
            inner.order.retain(|k| *k != key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.map.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    fn store(inner: &mut Inner<K, V>, key: K, value: V, ttl: Duration, capacity: usize) {
        if inner.map.contains_key(&key) {
            inner.order.retain(|k| *k != key);
        }
        inner.order.push_back(key.clone());
        inner.map.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        while inner.map.len() > capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
