//! In-process answer cache with a fixed TTL.
//!
//! Keys are content hashes of the normalized question, the asking user, and
//! any filters, so the same question from the same user is answered once per
//! TTL window. Expired entries are treated as absent on read and removed
//! lazily; [`AnswerCache::sweep_expired`] drops them eagerly.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::models::{Answer, Query};

const KEY_PREFIX: &str = "navo:query:";

/// Stable cache key for a query.
///
/// Question text is lowercased and whitespace-collapsed first, so
/// `"How  do I deploy?"` and `"how do i deploy?"` share a key.
pub fn cache_key(query: &Query) -> String {
    let normalized = query
        .text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    hasher.update(query.user_id.as_bytes());
    for (key, value) in &query.filters {
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize()))
}

struct Entry {
    answer: Answer,
    inserted_at: Instant,
}

pub struct AnswerCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    max_entries: usize,
}

impl AnswerCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(Duration::from_secs(config.ttl_secs), config.max_entries))
    }

    pub fn get(&self, key: &str) -> Option<Answer> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<Answer> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|e| now.duration_since(e.inserted_at) < self.ttl)
            .map(|e| e.answer.clone())
    }

    pub fn insert(&self, key: String, answer: Answer) {
        self.insert_at(key, answer, Instant::now());
    }

    /// Store an answer, replacing any entry under the same key. At capacity,
    /// expired entries go first, then the oldest one.
    pub fn insert_at(&self, key: String, answer: Answer, now: Instant) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| now.duration_since(e.inserted_at) < ttl);
            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                answer,
                inserted_at: now,
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.inserted_at) < self.ttl);
        before - entries.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
