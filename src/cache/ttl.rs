//! In-memory key/value cache with per-entry expiry and a size bound

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheSettings;
use crate::types::{CharacterStats, UserId};

/// Cache of the latest known score and item level per Discord user
pub type StatsCache = TtlCache<UserId, CharacterStats>;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct CacheInner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Insertion order; stale tuples are skipped by comparing `seq`
    order: VecDeque<(K, u64)>,
    next_seq: u64,
}

/// Thread-safe TTL cache.
///
/// Expired entries are dropped lazily on read and by [`TtlCache::purge_expired`].
/// When a bound is configured and a new key arrives at capacity, the entry
/// inserted earliest is evicted. Overwriting an existing key never evicts and
/// moves the key to the back of the eviction order.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    default_ttl: Duration,
    max_entries: Option<usize>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an unbounded cache
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            default_ttl,
            max_entries: None,
        }
    }

    /// Create a cache holding at most `max_entries` keys
    pub fn with_capacity(default_ttl: Duration, max_entries: usize) -> Self {
        let mut cache = Self::new(default_ttl);
        cache.max_entries = Some(max_entries.max(1));
        cache
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::with_capacity(
            Duration::from_secs(settings.default_ttl_seconds),
            settings.max_entries,
        )
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<K, V>> {
        // A panic while holding the lock cannot leave the maps half-updated
        // in a way that matters for a cache, so keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a value with the default TTL
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value that expires after `ttl`
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.lock();

        let is_new = !inner.entries.contains_key(&key);
        if is_new {
            if let Some(max) = self.max_entries {
                if inner.entries.len() >= max {
                    Self::evict_oldest(&mut inner);
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((key.clone(), seq));
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
                seq,
            },
        );

        Self::compact(&mut inner);
    }

    /// Return the live value for `key`, removing it if it has expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove a key; returns whether it was present
    pub fn delete(&self, key: &K) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| now < entry.expires_at);
        let removed = before - inner.entries.len();
        Self::compact(&mut inner);

        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    fn evict_oldest(inner: &mut CacheInner<K, V>) {
        while let Some((key, seq)) = inner.order.pop_front() {
            let current = inner.entries.get(&key).map(|entry| entry.seq);
            if current == Some(seq) {
                inner.entries.remove(&key);
                return;
            }
        }
    }

    /// Keep the order queue from growing without bound under repeated overwrites
    fn compact(inner: &mut CacheInner<K, V>) {
        if inner.order.len() <= inner.entries.len() * 2 + 16 {
            return;
        }
        let CacheInner { entries, order, .. } = inner;
        order.retain(|(key, seq)| entries.get(key).map(|entry| entry.seq) == Some(*seq));
    }
}
