//! TTL Cache
//!
//! Process-wide caches for token metadata, pool state and gas prices. They are
//! constructed once at startup and handed to the providers that use them.
//!
//! Entries expire on a fixed time-to-live; nothing on-chain invalidates them.
//! A miss followed by fetch-and-store may race between concurrent requests:
//! both fetches produce equivalent values, so the last write wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Expired entries are swept once the map grows past this size. After a
/// sweep the next one waits until the map doubles what survived it.
const SWEEP_THRESHOLD: usize = 4096;

// ============================================
// CLOCK
// ============================================

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

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================
// CACHE
// ============================================

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// Map size that triggers the next sweep; only touched under the write lock
    sweep_at: AtomicUsize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_clock(name, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            sweep_at: AtomicUsize::new(SWEEP_THRESHOLD),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                trace!("{} cache hit: {:?}", self.name, key);
                Some(entry.value.clone())
            }
            _ => {
                trace!("{} cache miss: {:?}", self.name, key);
                None
            }
        }
    }

    /// Live values for every key present; absent keys are left out.
    pub async fn get_many<'a, I>(&self, keys: I) -> HashMap<K, V>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        keys.into_iter()
            .filter_map(|key| match entries.get(key) {
                Some(entry) if entry.expires_at > now => Some((key.clone(), entry.value.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn insert(&self, key: K, value: V) {
        self.insert_many(std::iter::once((key, value))).await;
    }

    pub async fn insert_many<I>(&self, items: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let mut entries = self.entries.write().await;
        for (key, value) in items {
            entries.insert(key, CacheEntry { value, expires_at });
        }
        if entries.len() > self.sweep_at.load(Ordering::Relaxed) {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            let next = SWEEP_THRESHOLD.max(entries.len() * 2);
            self.sweep_at.store(next, Ordering::Relaxed);
            debug!(
                "{} cache swept {} expired entries; next sweep above {}",
                self.name,
                before - entries.len(),
                next
            );
        }
    }

    /// Number of stored entries, expired ones included until the next sweep.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// ============================================
// TESTS
// ============================================
