//! In-memory LRU entry store
//!
//! Pure bookkeeping: callers pass the current time in, which keeps expiry
//! and eviction deterministic under test.

use super::{AudioBytes, CachePolicy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub bytes: AudioBytes,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Monotonic access sequence; LRU order without timestamp ties
    pub access_seq: u64,
}

/// Result of a put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored { evicted: usize },
    /// Already present; recency refreshed, content unchanged
    Refreshed,
    /// Larger than the per-entry cap; not cached
    TooLarge,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_size: usize,
    pub entry_count: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    entries: HashMap<String, CacheEntry>,
    total_size: usize,
    hits: u64,
    misses: u64,
    next_seq: u64,
}

impl MemoryStore {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn is_expired(entry: &CacheEntry, now: DateTime<Utc>, policy: &CachePolicy) -> bool {
        now - entry.created_at > policy.max_age
    }

    /// Look up and refresh recency; expired entries are removed and miss
    pub fn get(&mut self, url: &str, now: DateTime<Utc>, policy: &CachePolicy) -> Option<AudioBytes> {
        let expired = match self.entries.get(url) {
            Some(entry) => Self::is_expired(entry, now, policy),
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired {
            self.remove(url);
            self.misses += 1;
            return None;
        }

        let seq = self.bump();
        self.hits += 1;
        self.entries.get_mut(url).map(|entry| {
            entry.last_accessed = now;
            entry.access_seq = seq;
            entry.bytes.clone()
        })
    }

    /// Undo the miss recorded by a memory lookup that a lower tier served
    pub fn convert_miss_to_hit(&mut self) {
        self.misses = self.misses.saturating_sub(1);
        self.hits += 1;
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn insert(&mut self, url: &str, bytes: AudioBytes, now: DateTime<Utc>, policy: &CachePolicy) -> PutOutcome {
        let size = bytes.len();
        if size > policy.max_entry_bytes {
            return PutOutcome::TooLarge;
        }

        let seq = self.bump();
        if let Some(entry) = self.entries.get_mut(url) {
            entry.last_accessed = now;
            entry.access_seq = seq;
            return PutOutcome::Refreshed;
        }

        let mut evicted = 0;
        while !self.entries.is_empty()
            && (self.entries.len() + 1 > policy.max_entries || self.total_size + size > policy.max_total_bytes)
        {
            evicted += self.evict_lru(policy.eviction_fraction);
        }

        self.total_size += size;
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                bytes,
                size,
                created_at: now,
                last_accessed: now,
                access_seq: seq,
            },
        );
        PutOutcome::Stored { evicted }
    }

    /// Evict the least recently accessed share of entries (at least one)
    pub fn evict_lru(&mut self, fraction: f64) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let count = ((self.entries.len() as f64 * fraction).ceil() as usize).clamp(1, self.entries.len());

        let mut order: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(url, entry)| (entry.access_seq, url.clone()))
            .collect();
        order.sort_unstable();

        for (_, url) in order.into_iter().take(count) {
            self.remove(&url);
        }
        count
    }

    pub fn remove(&mut self, url: &str) -> bool {
        match self.entries.remove(url) {
            Some(entry) => {
                self.total_size -= entry.size;
                true
            }
            None => false,
        }
    }

    pub fn remove_expired(&mut self, now: DateTime<Utc>, policy: &CachePolicy) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| Self::is_expired(entry, now, policy))
            .map(|(url, _)| url.clone())
            .collect();
        for url in &expired {
            self.remove(url);
        }
        expired.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        let (hit_rate, miss_rate) = if lookups == 0 {
            (0.0, 0.0)
        } else {
            (self.hits as f64 / lookups as f64, self.misses as f64 / lookups as f64)
        };
        CacheStats {
            total_size: self.total_size,
            entry_count: self.entries.len(),
            hit_rate,
            miss_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bytes(len: usize) -> AudioBytes {
        AudioBytes::from(vec![0u8; len])
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy::default();
        let now = Utc::now();

        assert_eq!(store.insert("u", bytes(10), now, &policy), PutOutcome::Stored { evicted: 0 });
        assert_eq!(store.insert("u", bytes(10), now, &policy), PutOutcome::Refreshed);

        let stats = store.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 10);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy {
            max_entry_bytes: 8,
            ..Default::default()
        };
        assert_eq!(store.insert("u", bytes(9), Utc::now(), &policy), PutOutcome::TooLarge);
        assert_eq!(store.stats().entry_count, 0);
    }

    #[test]
    fn test_entry_limit_evicts_least_recent_fifth() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy {
            max_entries: 10,
            ..Default::default()
        };
        let now = Utc::now();
        for i in 0..10 {
            store.insert(&format!("u{i}"), bytes(1), now, &policy);
        }
        // Touch the two oldest so u2 and u3 become least recent
        store.get("u0", now, &policy);
        store.get("u1", now, &policy);

        let outcome = store.insert("u10", bytes(1), now, &policy);

        assert_eq!(outcome, PutOutcome::Stored { evicted: 2 });
        assert!(store.contains("u0"));
        assert!(store.contains("u1"));
        assert!(!store.contains("u2"));
        assert!(!store.contains("u3"));
        assert_eq!(store.stats().entry_count, 9);
    }

    #[test]
    fn test_size_limit_evicts_until_fit() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy {
            max_total_bytes: 100,
            max_entry_bytes: 100,
            ..Default::default()
        };
        let now = Utc::now();
        store.insert("a", bytes(40), now, &policy);
        store.insert("b", bytes(40), now, &policy);

        store.insert("c", bytes(90), now, &policy);

        let stats = store.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_size, 90);
    }

    #[test]
    fn test_expired_entries_miss_and_are_removed() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy::default();
        let created = Utc::now();
        store.insert("old", bytes(4), created, &policy);

        let later = created + Duration::days(15);
        assert!(store.get("old", later, &policy).is_none());
        assert!(!store.contains("old"));
        assert_eq!(store.stats().total_size, 0);
    }

    #[test]
    fn test_remove_expired_counts() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy::default();
        let created = Utc::now();
        store.insert("a", bytes(1), created, &policy);
        store.insert("b", bytes(1), created + Duration::days(10), &policy);

        assert_eq!(store.remove_expired(created + Duration::days(15), &policy), 1);
        assert!(store.contains("b"));
    }

    #[test]
    fn test_hit_and_miss_rates() {
        let mut store = MemoryStore::default();
        let policy = CachePolicy::default();
        let now = Utc::now();
        store.insert("a", bytes(1), now, &policy);
        store.get("a", now, &policy);
        store.get("a", now, &policy);
        store.get("a", now, &policy);
        store.get("missing", now, &policy);

        let stats = store.stats();
        assert!((stats.hit_rate - 0.75).abs() < 1e-9);
        assert!((stats.miss_rate - 0.25).abs() < 1e-9);
    }
}
