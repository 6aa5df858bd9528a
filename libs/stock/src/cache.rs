use std::{collections::HashMap, future::Future, hash::Hash, sync::Mutex, time::Duration};

use tokio::time::Instant;

use crate::series::Period;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Quote,
    Series,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub kind: DataKind,
    pub period: Option<Period>,
}

impl CacheKey {
    pub fn quote(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            kind: DataKind::Quote,
            period: None,
        }
    }

    pub fn series(symbol: &str, period: Period) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            kind: DataKind::Series,
            period: Some(period),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// In-memory cache that serves an entry only while it is younger than the
/// caller's TTL.
///
/// The lock is held for lookups and whole-entry inserts only, never while a
/// fetch is in flight. Concurrent misses on the same key each fetch.
pub struct FreshnessCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for FreshnessCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> FreshnessCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key` if it is fresh, otherwise runs
    /// `fetch` and stores its success. A failed fetch leaves any expired
    /// entry in place but does not return it.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get_fresh(&key, ttl) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn get_fresh(&self, key: &K, ttl: Duration) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
