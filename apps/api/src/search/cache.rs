//! Bounded TTL cache in front of count/search queries.
//!
//! Entries live on `dashmap` shards, so readers never wait on a global lock.
//! Concurrent writers to the same key resolve as last-write-wins.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_CAPACITY: usize = 128;

/// Time source for expiry checks. Injected so tests can move time forward.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: std::sync::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: std::sync::Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.start + offset
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

struct Entry<V> {
    stored_at: Instant,
    value: V,
}

pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::with_capacity(settings.capacity.min(DEFAULT_CAPACITY)),
            settings,
            clock,
        }
    }

    /// Returns the value while `now - stored_at < ttl`; a miss otherwise.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let hit = self.entries.get(key).map(|entry| {
            let fresh = now.saturating_duration_since(entry.stored_at) < self.settings.ttl;
            (fresh, entry.value.clone())
        });
        match hit {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, entry| {
                    now.saturating_duration_since(entry.stored_at) >= self.settings.ttl
                });
                None
            }
            None => None,
        }
    }

    /// Stores `value`, then trims the oldest entries down to capacity.
    pub fn set(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries.insert(key, Entry { stored_at, value });
        self.prune();
    }

    /// Drops expired entries and anything beyond capacity.
    pub fn evict(&self) {
        let now = self.clock.now();
        let ttl = self.settings.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        self.prune();
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&self) {
        let excess = self.entries.len().saturating_sub(self.settings.capacity);
        if excess == 0 {
            return;
        }
        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stored_at))
            .collect();
        by_age.sort_by_key(|(_, stored_at)| *stored_at);
        for (key, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
    }
}
