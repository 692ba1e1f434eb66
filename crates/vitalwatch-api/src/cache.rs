//! Time-boxed response cache for idempotent reads.
//!
//! Entries are keyed by `"METHOD:path"` and stay fresh for one cache
//! window after they are stored. A stale entry is treated as absent and
//! is overwritten by the next successful read; nothing is persisted.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use reqwest::Method;
use serde_json::Value;

/// Build the cache key for a `(method, path)` pair.
pub(crate) fn cache_key(method: &Method, path: &str) -> String {
    format!("{method}:{path}")
}

struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

/// Response cache owned by a single [`ApiClient`](crate::ApiClient).
pub(crate) struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    window: Duration,
}

impl ResponseCache {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    /// Return the cached payload if it is still inside the window.
    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.window {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store (or overwrite) a payload for `key`.
    pub(crate) fn insert(&self, key: String, payload: Value) {
        self.insert_at(key, payload, Instant::now());
    }

    pub(crate) fn insert_at(&self, key: String, payload: Value, stored_at: Instant) {
        self.entries.insert(key, CacheEntry { payload, stored_at });
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
