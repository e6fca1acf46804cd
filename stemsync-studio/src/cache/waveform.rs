//! Waveform summary cache

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_WAVEFORM_CAPACITY: usize = 20;

/// Downsampled peak summary of one stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformData {
    /// Max-abs amplitude per bucket, in [0, 1]
    pub peaks: Vec<f32>,
    /// Decoded duration in seconds
    pub duration: f64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait WaveformCache: Send + Sync {
    async fn get(&self, url: &str) -> Option<WaveformData>;
    async fn put(&self, url: &str, data: WaveformData);
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<String, (WaveformData, u64)>,
    next_seq: u64,
}

/// Bounded in-memory LRU of waveform summaries
#[derive(Debug)]
pub struct MemoryWaveformCache {
    capacity: usize,
    slots: Mutex<Slots>,
}

impl MemoryWaveformCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).entries.clear();
    }
}

impl Default for MemoryWaveformCache {
    fn default() -> Self {
        Self::new(DEFAULT_WAVEFORM_CAPACITY)
    }
}

#[async_trait]
impl WaveformCache for MemoryWaveformCache {
    async fn get(&self, url: &str) -> Option<WaveformData> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.next_seq += 1;
        let seq = slots.next_seq;
        slots.entries.get_mut(url).map(|(data, last)| {
            *last = seq;
            data.clone()
        })
    }

    async fn put(&self, url: &str, data: WaveformData) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.next_seq += 1;
        let seq = slots.next_seq;
        slots.entries.insert(url.to_string(), (data, seq));

        while slots.entries.len() > self.capacity {
            let oldest = slots
                .entries
                .iter()
                .min_by_key(|(_, (_, last))| *last)
                .map(|(url, _)| url.clone());
            match oldest {
                Some(url) => {
                    slots.entries.remove(&url);
                }
                None => break,
            }
        }
    }
}
