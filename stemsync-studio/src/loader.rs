//! Cache-first stem loading and prefetch
//!
//! A stem is assigned a playable source immediately: cached bytes on a hit,
//! the network URL on a miss. On a miss the payload is fetched in the
//! background and stored for next time. Nothing on this path can fail the
//! caller except a malformed stem descriptor.

use crate::cache::{AudioByteCache, OfflineStatus, WaveformCache};
use crate::fetch::AudioFetcher;
use crate::media::{MediaSource, ReadyState, SharedHandle};
use crate::peaks::{compute_waveform, DEFAULT_BUCKETS};
use crate::stem::{order_by_priority, Stem, StemId};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stemsync_common::events::{EventBus, StudioEvent};
use stemsync_common::keys::url_extension;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Loader tuning
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub waveform_buckets: usize,
    /// How often a pending handle is polled for metadata
    pub metadata_poll_interval: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            waveform_buckets: DEFAULT_BUCKETS,
            metadata_poll_interval: Duration::from_millis(50),
        }
    }
}

/// Collaborators used by the loader
#[derive(Clone)]
pub struct LoaderDeps {
    pub cache: Arc<dyn AudioByteCache>,
    pub fetcher: Arc<dyn AudioFetcher>,
    pub waveforms: Arc<dyn WaveformCache>,
    pub offline: Arc<dyn OfflineStatus>,
    pub events: Arc<EventBus>,
}

struct LoaderInner {
    deps: LoaderDeps,
    options: LoaderOptions,
    loaded: Mutex<HashSet<StemId>>,
    /// URLs already handed to prefetch in this session
    prefetched: Mutex<HashSet<String>>,
    /// Cache population and waveform tasks
    background: Mutex<Vec<JoinHandle<()>>>,
    /// Metadata watchers; may never finish for a handle that never loads
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

/// Resolves stems to playable handles and warms the caches
#[derive(Clone)]
pub struct StemLoader {
    inner: Arc<LoaderInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StemLoader {
    pub fn new(deps: LoaderDeps, options: LoaderOptions) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                deps,
                options,
                loaded: Mutex::new(HashSet::new()),
                prefetched: Mutex::new(HashSet::new()),
                background: Mutex::new(Vec::new()),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Assign a source to `handle`, cache first
    ///
    /// # Returns
    /// `false` only when the stem has an empty id or URL; `true` otherwise,
    /// including when background caching later fails.
    pub async fn load_stem_with_cache(&self, stem: &Stem, handle: &SharedHandle) -> bool {
        if let Err(e) = stem.validate() {
            warn!(stem = %stem.id, error = %e, "Malformed stem descriptor, not loaded");
            return false;
        }

        let url = stem.source_url.clone();
        let from_cache = match self.inner.deps.cache.get(&url).await {
            Some(bytes) => {
                debug!(stem = %stem.id, url = %url, size = bytes.len(), "Cache hit");
                handle.set_source(MediaSource::Cached { url, bytes });
                true
            }
            None => {
                debug!(stem = %stem.id, url = %url, "Cache miss, streaming from network");
                handle.set_source(MediaSource::Network(url.clone()));
                self.spawn_background(Self::populate(self.inner.deps.clone(), url));
                false
            }
        };

        self.watch_metadata(stem.id.clone(), Arc::clone(handle), from_cache);
        true
    }

    /// Fetch a payload and store it in the byte cache; failures discarded
    async fn populate(deps: LoaderDeps, url: String) {
        deps.cache.wait_for_prefetch(&url).await;
        if deps.cache.get(&url).await.is_some() {
            return;
        }
        match deps.fetcher.fetch(&url).await {
            Ok(bytes) => {
                if let Err(e) = deps.cache.put(&url, bytes).await {
                    debug!(url = %url, error = %e, "Background cache store failed");
                }
            }
            Err(e) => debug!(url = %url, error = %e, "Background fetch failed"),
        }
    }

    fn watch_metadata(&self, stem_id: StemId, handle: SharedHandle, from_cache: bool) {
        if handle.ready_state() >= ReadyState::HaveMetadata {
            self.mark_loaded(stem_id, from_cache);
            return;
        }

        let loader = self.clone();
        let period = self.inner.options.metadata_poll_interval.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut poll = tokio::time::interval(period);
            loop {
                poll.tick().await;
                if handle.has_error() {
                    warn!(stem = %stem_id, "Handle reported an error while loading");
                    return;
                }
                if handle.ready_state() >= ReadyState::HaveMetadata {
                    loader.mark_loaded(stem_id, from_cache);
                    return;
                }
            }
        });
        let mut watchers = lock(&self.inner.watchers);
        watchers.retain(|t| !t.is_finished());
        watchers.push(task);
    }

    fn mark_loaded(&self, stem_id: StemId, from_cache: bool) {
        info!(stem = %stem_id, from_cache, "Stem loaded");
        self.inner.deps.events.emit_lossy(StudioEvent::StemLoaded {
            stem_id: stem_id.to_string(),
            from_cache,
        });
        lock(&self.inner.loaded).insert(stem_id);
    }

    pub fn is_stem_loaded(&self, stem_id: &str) -> bool {
        lock(&self.inner.loaded).contains(stem_id)
    }

    /// Issue best-effort background prefetches in priority order
    ///
    /// Skipped entirely when the cache policy or connectivity says no. Also
    /// starts a separate task computing waveform summaries for stems that
    /// lack one.
    ///
    /// # Returns
    /// URLs handed to the byte cache, in the order they were issued
    pub async fn prefetch_stems(&self, stems: &[Stem]) -> Vec<String> {
        let deps = &self.inner.deps;
        if !deps.cache.should_prefetch() {
            debug!("Prefetch skipped by cache policy");
            return Vec::new();
        }
        if !deps.offline.is_online() {
            debug!("Prefetch skipped while offline");
            return Vec::new();
        }

        let ordered: Vec<Stem> = order_by_priority(stems)
            .into_iter()
            .filter(Stem::is_well_formed)
            .collect();

        let mut requested = Vec::new();
        for stem in &ordered {
            let url = &stem.source_url;
            if deps.offline.is_available_offline(url).await {
                continue;
            }
            let first_time = lock(&self.inner.prefetched).insert(url.clone());
            if !first_time {
                continue;
            }
            deps.cache.prefetch(url);
            requested.push(url.clone());
        }

        self.spawn_background(Self::prefetch_waveforms(
            deps.clone(),
            ordered,
            self.inner.options.waveform_buckets,
            requested.len(),
        ));

        debug!(count = requested.len(), "Prefetch issued");
        requested
    }

    async fn prefetch_waveforms(deps: LoaderDeps, stems: Vec<Stem>, buckets: usize, requested: usize) {
        let mut computed = 0;
        for stem in stems {
            let url = stem.source_url.as_str();
            if deps.waveforms.get(url).await.is_some() {
                continue;
            }

            deps.cache.wait_for_prefetch(url).await;
            let bytes = match deps.cache.get(url).await {
                Some(bytes) => bytes,
                None => match deps.fetcher.fetch(url).await {
                    Ok(bytes) => {
                        if let Err(e) = deps.cache.put(url, bytes.clone()).await {
                            debug!(url = %url, error = %e, "Waveform source not cached");
                        }
                        bytes
                    }
                    Err(e) => {
                        debug!(url = %url, error = %e, "Waveform fetch failed");
                        continue;
                    }
                },
            };

            match compute_waveform(bytes, url_extension(url), buckets).await {
                Ok(waveform) => {
                    deps.waveforms.put(url, waveform).await;
                    computed += 1;
                }
                Err(e) => debug!(url = %url, error = %e, "Waveform computation failed"),
            }
        }

        deps.events.emit_lossy(StudioEvent::PrefetchCompleted {
            requested,
            waveforms: computed,
        });
    }

    fn spawn_background<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(future);
        let mut background = lock(&self.inner.background);
        background.retain(|t| !t.is_finished());
        background.push(task);
    }

    /// Await cache population and waveform tasks spawned so far
    pub async fn wait_for_background(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inner.background));
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "Background task did not complete");
            }
        }
    }

    /// Abort every task the loader started
    pub fn shutdown(&self) {
        let background: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inner.background));
        let watchers: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.inner.watchers));
        for task in background.into_iter().chain(watchers) {
            task.abort();
        }
    }
}
