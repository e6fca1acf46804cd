//! Audio byte and waveform caches
//!
//! The byte cache is content-addressable by exact URL: entries are
//! immutable, upserts are idempotent and any entry may be evicted by
//! policy. Reads never block playback start; a miss degrades to a network
//! load by the caller.

mod disk;
mod memory;
mod network;
mod offline;
mod store;
mod waveform;

pub use disk::DiskAudioCache;
pub use memory::{MemoryAudioCache, MemoryAudioCacheBuilder};
pub use network::{AudioQuality, NetworkConditions};
pub use offline::{AlwaysOnline, OfflineStatus, StaticOfflineStatus};
pub use store::{CacheStats, PutOutcome};
pub use waveform::{MemoryWaveformCache, WaveformCache, WaveformData, DEFAULT_WAVEFORM_CAPACITY};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Raw audio payload shared between cache, loader and handles
pub type AudioBytes = Arc<[u8]>;

const MB: usize = 1024 * 1024;

/// Limits applied by the byte cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    pub max_entries: usize,
    pub max_total_bytes: usize,
    /// Payloads larger than this are not cached
    pub max_entry_bytes: usize,
    /// Entries older than this are treated as misses
    pub max_age: chrono::Duration,
    /// Share of entries evicted when a limit is hit (at least one)
    pub eviction_fraction: f64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_total_bytes: 500 * MB,
            max_entry_bytes: 50 * MB,
            max_age: stemsync_common::time::days(14),
            eviction_fraction: 0.2,
        }
    }
}

impl CachePolicy {
    pub fn from_megabytes(max_entries: usize, max_size_mb: usize, max_entry_mb: usize, max_age_days: u32, eviction_fraction: f64) -> Self {
        Self {
            max_entries,
            max_total_bytes: max_size_mb * MB,
            max_entry_bytes: max_entry_mb * MB,
            max_age: stemsync_common::time::days(max_age_days),
            eviction_fraction,
        }
    }
}

/// URL-keyed store of previously downloaded audio payloads
#[async_trait]
pub trait AudioByteCache: Send + Sync {
    /// Cached payload for `url`, or `None` on miss
    async fn get(&self, url: &str) -> Option<AudioBytes>;

    /// Idempotent upsert
    async fn put(&self, url: &str, bytes: AudioBytes) -> Result<()>;

    /// Whether background prefetch should be attempted at all
    fn should_prefetch(&self) -> bool;

    /// Fire-and-forget background fetch into the cache
    fn prefetch(&self, url: &str);

    /// Resolve once no prefetch of `url` is queued or running
    async fn wait_for_prefetch(&self, _url: &str) {}
}
