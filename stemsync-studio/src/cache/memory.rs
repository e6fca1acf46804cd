//! Tiered byte cache: in-memory LRU in front of an optional disk store

use super::disk::DiskAudioCache;
use super::network::{AudioQuality, NetworkConditions};
use super::store::{CacheStats, MemoryStore, PutOutcome};
use super::{AudioByteCache, AudioBytes, CachePolicy};
use crate::error::{Error, Result};
use crate::fetch::AudioFetcher;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use stemsync_common::events::{EventBus, StudioEvent};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_PREFETCH_AHEAD: usize = 2;

struct CacheInner {
    policy: CachePolicy,
    store: Mutex<MemoryStore>,
    disk: Option<DiskAudioCache>,
    fetcher: Option<Arc<dyn AudioFetcher>>,
    network: RwLock<NetworkConditions>,
    prefetch_enabled: bool,
    prefetch_ahead: usize,
    /// URLs queued for or being fetched by the prefetch worker
    in_flight: Mutex<HashSet<String>>,
    /// Signalled whenever an in-flight URL settles
    settled: Notify,
    worker: Mutex<Option<PrefetchWorker>>,
    events: Option<Arc<EventBus>>,
}

/// Single background task draining the prefetch queue in FIFO order
struct PrefetchWorker {
    queue: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// Builder for [`MemoryAudioCache`]
pub struct MemoryAudioCacheBuilder {
    policy: CachePolicy,
    disk: Option<DiskAudioCache>,
    fetcher: Option<Arc<dyn AudioFetcher>>,
    network: NetworkConditions,
    prefetch_enabled: bool,
    prefetch_ahead: usize,
    events: Option<Arc<EventBus>>,
}

impl MemoryAudioCacheBuilder {
    pub fn disk(mut self, disk: DiskAudioCache) -> Self {
        self.disk = Some(disk);
        self
    }

    /// Fetcher used by `prefetch`; without one prefetch is a no-op
    pub fn fetcher(mut self, fetcher: Arc<dyn AudioFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn network(mut self, network: NetworkConditions) -> Self {
        self.network = network;
        self
    }

    pub fn prefetch_enabled(mut self, enabled: bool) -> Self {
        self.prefetch_enabled = enabled;
        self
    }

    /// Number of upcoming URLs prefetched by `prefetch_queue`
    pub fn prefetch_ahead(mut self, count: usize) -> Self {
        self.prefetch_ahead = count;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> MemoryAudioCache {
        MemoryAudioCache {
            inner: Arc::new(CacheInner {
                policy: self.policy,
                store: Mutex::new(MemoryStore::default()),
                disk: self.disk,
                fetcher: self.fetcher,
                network: RwLock::new(self.network),
                prefetch_enabled: self.prefetch_enabled,
                prefetch_ahead: self.prefetch_ahead,
                in_flight: Mutex::new(HashSet::new()),
                settled: Notify::new(),
                worker: Mutex::new(None),
                events: self.events,
            }),
        }
    }
}

/// URL-keyed byte cache with LRU eviction, expiry and an optional disk tier
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct MemoryAudioCache {
    inner: Arc<CacheInner>,
}

impl MemoryAudioCache {
    pub fn builder(policy: CachePolicy) -> MemoryAudioCacheBuilder {
        MemoryAudioCacheBuilder {
            policy,
            disk: None,
            fetcher: None,
            network: NetworkConditions::default(),
            prefetch_enabled: true,
            prefetch_ahead: DEFAULT_PREFETCH_AHEAD,
            events: None,
        }
    }

    /// Memory-only cache with default limits and no fetcher
    pub fn new() -> Self {
        Self::builder(CachePolicy::default()).build()
    }

    fn store(&self) -> MutexGuard<'_, MemoryStore> {
        self.inner.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Whether the memory tier holds `url` (no recency update)
    pub fn contains(&self, url: &str) -> bool {
        self.store().contains(url)
    }

    pub fn stats(&self) -> CacheStats {
        self.store().stats()
    }

    pub fn set_network_conditions(&self, network: NetworkConditions) {
        debug!(?network, "Network conditions updated");
        *self.inner.network.write().unwrap_or_else(PoisonError::into_inner) = network;
    }

    pub fn network_conditions(&self) -> NetworkConditions {
        self.inner.network.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn recommended_quality(&self) -> AudioQuality {
        self.network_conditions().recommended_quality()
    }

    /// Drop every entry from both tiers
    pub async fn clear(&self) -> Result<()> {
        self.store().clear();
        if let Some(disk) = &self.inner.disk {
            let removed = disk.clear().await?;
            debug!(removed, "Disk cache cleared");
        }
        info!("Audio cache cleared");
        Ok(())
    }

    /// Remove expired entries from both tiers; returns the number removed
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let mut removed = self.store().remove_expired(Utc::now(), &self.inner.policy);
        if let Some(disk) = &self.inner.disk {
            removed += disk.cleanup_expired(self.inner.policy.max_age).await?;
        }
        if removed > 0 {
            info!(removed, "Expired cache entries removed");
        }
        Ok(removed)
    }

    /// Prefetch the URLs following `current_index` in a play queue
    pub fn prefetch_queue(&self, urls: &[String], current_index: usize) {
        if !self.should_prefetch() {
            debug!("Prefetch disabled by network policy, queue skipped");
            return;
        }
        for url in urls.iter().skip(current_index + 1).take(self.inner.prefetch_ahead) {
            self.prefetch(url);
        }
    }

    /// Await every prefetch queued so far
    pub async fn wait_for_prefetches(&self) {
        loop {
            let settled = self.inner.settled.notified();
            let idle = self.in_flight().is_empty();
            if idle {
                return;
            }
            settled.await;
        }
    }

    /// Abort the prefetch worker and drop everything queued
    pub fn cancel_prefetches(&self) {
        let worker = self.inner.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            worker.task.abort();
        }
        self.in_flight().clear();
        self.inner.settled.notify_waiters();
    }

    /// Hand a URL to the worker, starting it if needed
    ///
    /// Gives the URL back when no async runtime is available.
    fn enqueue(&self, url: String) -> std::result::Result<(), String> {
        let mut worker = self.inner.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let url = match worker.as_ref() {
            Some(running) if !running.task.is_finished() => match running.queue.send(url) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(url)) => url,
            },
            _ => url,
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Err(url);
        };
        let (queue, receiver) = mpsc::unbounded_channel();
        if let Err(mpsc::error::SendError(url)) = queue.send(url) {
            return Err(url);
        }
        let task = runtime.spawn(run_prefetch_worker(Arc::downgrade(&self.inner), receiver));
        *worker = Some(PrefetchWorker { queue, task });
        Ok(())
    }

    async fn fetch_into_cache(&self, url: &str) {
        let Some(fetcher) = self.inner.fetcher.clone() else {
            return;
        };
        if self.contains(url) {
            return;
        }
        match fetcher.fetch(url).await {
            Ok(bytes) => {
                if let Err(e) = self.put(url, bytes).await {
                    debug!(url = %url, error = %e, "Prefetch store failed");
                }
            }
            Err(e) => debug!(url = %url, error = %e, "Prefetch fetch failed"),
        }
    }

    fn settle(&self, url: &str) {
        self.in_flight().remove(url);
        self.inner.settled.notify_waiters();
    }
}

/// Fetch queued URLs one at a time so requests start in queue order
async fn run_prefetch_worker(inner: Weak<CacheInner>, mut queue: mpsc::UnboundedReceiver<String>) {
    while let Some(url) = queue.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let cache = MemoryAudioCache { inner };
        cache.fetch_into_cache(&url).await;
        cache.settle(&url);
    }
    debug!("Prefetch worker exited");
}

impl Default for MemoryAudioCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioByteCache for MemoryAudioCache {
    async fn get(&self, url: &str) -> Option<AudioBytes> {
        let now = Utc::now();
        let cached = self.store().get(url, now, &self.inner.policy);
        if cached.is_some() {
            return cached;
        }

        let disk = self.inner.disk.as_ref()?;
        match disk.get(url, self.inner.policy.max_age).await {
            Ok(Some(bytes)) => {
                let mut store = self.store();
                store.convert_miss_to_hit();
                store.insert(url, bytes.clone(), now, &self.inner.policy);
                debug!(url = %url, "Served from disk cache");
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(url = %url, error = %e, "Disk cache read failed, treating as miss");
                None
            }
        }
    }

    async fn put(&self, url: &str, bytes: AudioBytes) -> Result<()> {
        let size = bytes.len();
        let outcome = self.store().insert(url, bytes.clone(), Utc::now(), &self.inner.policy);

        match outcome {
            PutOutcome::TooLarge => {
                warn!(
                    url = %url,
                    size,
                    limit = self.inner.policy.max_entry_bytes,
                    "Payload exceeds per-entry cache limit, not cached"
                );
                return Ok(());
            }
            PutOutcome::Refreshed => {
                debug!(url = %url, "Already cached");
                return Ok(());
            }
            PutOutcome::Stored { evicted } => {
                if evicted > 0 {
                    debug!(evicted, "Evicted least recently used cache entries");
                }
            }
        }

        if let Some(disk) = &self.inner.disk {
            disk.put(url, &bytes)
                .await
                .map_err(|e| Error::Cache(format!("Disk write failed for {}: {}", url, e)))?;
            match disk.enforce_limits(&self.inner.policy).await {
                Ok(0) => {}
                Ok(evicted) => debug!(evicted, "Evicted least recently used disk cache entries"),
                Err(e) => warn!(error = %e, "Disk cache limit enforcement failed"),
            }
        }

        if let Some(events) = &self.inner.events {
            events.emit_lossy(StudioEvent::CacheStored {
                url: url.to_string(),
                size_bytes: size,
            });
        }
        debug!(url = %url, size, "Cached audio payload");
        Ok(())
    }

    fn should_prefetch(&self) -> bool {
        self.inner.prefetch_enabled && self.network_conditions().should_prefetch()
    }

    fn prefetch(&self, url: &str) {
        if self.inner.fetcher.is_none() {
            debug!(url = %url, "No fetcher configured, prefetch skipped");
            return;
        }
        if self.contains(url) || !self.in_flight().insert(url.to_string()) {
            return;
        }
        if let Err(url) = self.enqueue(url.to_string()) {
            debug!(url = %url, "No async runtime, prefetch skipped");
            self.settle(&url);
        }
    }

    async fn wait_for_prefetch(&self, url: &str) {
        loop {
            let settled = self.inner.settled.notified();
            let pending = self.in_flight().contains(url);
            if !pending {
                return;
            }
            settled.await;
        }
    }
}
