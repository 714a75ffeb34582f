

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;


/// LRU cache whose entries also expire after a fixed time-to-live.
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    stats: Mutex<CacheStats>,
}

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
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

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, ttl_secs: u64) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(ttl_secs),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.lock();

        let is_fresh = entries
            .peek(key)
            .map(|entry| entry.created_at.elapsed() < self.ttl);

        let fresh = match is_fresh {
            Some(true) => entries.get(key).map(|entry| entry.value.clone()),
            Some(false) => {
                entries.pop(key);
                None
            }
            None => None,
        };

        match fresh {
            Some(value) => {
                stats.hits += 1;
                Some(value)
            }
            None => {
                stats.misses += 1;
                stats.size = entries.len();
                None
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock();
        entries.put(
            key.into(),
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
        self.stats.lock().size = entries.len();
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock();
        entries.pop(key);
        self.stats.lock().size = entries.len();
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.stats.lock().size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}
