use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use crate::clock::Clock;

// Cache key for a requested URL.
// The key is the exact URL string, so two byte-distinct URLs never share an
// entry and the same URL always lands on the same one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &str) -> Self {
        Self(url.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Short sha256 prefix, safe to put in logs instead of the URL itself
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub stored_at: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit { payload: Value, age: f64 },
    Miss,
}

// Time-bounded response cache.
// Stale entries stay in the map and read as misses until the janitor
// removes them; `lookup` never deletes.
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: f64, // seconds
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: ttl_secs as f64,
            clock,
        }
    }

    pub fn ttl_secs(&self) -> f64 {
        self.ttl
    }

    pub fn lookup(&self, key: &CacheKey) -> Lookup {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) => {
                let age = (now - entry.stored_at).max(0.0);
                // exactly at TTL counts as expired
                if age >= self.ttl {
                    Lookup::Miss
                } else {
                    Lookup::Hit {
                        payload: entry.payload.clone(),
                        age,
                    }
                }
            }
            None => Lookup::Miss,
        }
    }

    pub fn store(&self, key: CacheKey, payload: Value) {
        let stored_at = self.clock.now();
        self.entries.insert(key, CacheEntry { payload, stored_at });
    }

    // Remove entries older than the TTL, returns how many were dropped
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now - entry.stored_at <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    // Physical entry count, stale entries included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest_stored_at(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|entry| entry.stored_at)
            .min_by(|a, b| a.total_cmp(b))
    }
}
