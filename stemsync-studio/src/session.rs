//! Studio session: composition root of the engine
//!
//! Wires one clock, one transport, one loader, one mixer and one control
//! surface together for a set of caller-owned handles. The session owns no
//! handle; `shutdown` cancels every loop and timer, pauses the handles and
//! drops the mapping.

use crate::cache::{
    AlwaysOnline, AudioByteCache, DiskAudioCache, MemoryAudioCache, MemoryWaveformCache, OfflineStatus,
    WaveformCache,
};
use crate::clock::{shared_clock, ClockSource};
use crate::config::StudioConfig;
use crate::controls::{DebouncedControlSurface, EndedFn, MasterVolumeFn, SeekFn, StemVolumeFn, TimeUpdateFn};
use crate::error::Result;
use crate::fetch::{AudioFetcher, HttpFetcher};
use crate::loader::{LoaderDeps, StemLoader};
use crate::media::SharedHandle;
use crate::mixer::Mixer;
use crate::stem::Stem;
use crate::transport::MasterTransport;
use std::sync::Arc;
use stemsync_common::events::{EventBus, StudioEvent, TransportState};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Builder for [`StudioSession`]
///
/// Every collaborator is optional; defaults are the process-wide clock, an
/// HTTP fetcher, a memory (plus optional disk) byte cache, an in-memory
/// waveform cache and an always-online status.
pub struct StudioSessionBuilder {
    config: StudioConfig,
    clock: Option<Arc<dyn ClockSource>>,
    cache: Option<Arc<dyn AudioByteCache>>,
    waveforms: Option<Arc<dyn WaveformCache>>,
    fetcher: Option<Arc<dyn AudioFetcher>>,
    offline: Option<Arc<dyn OfflineStatus>>,
    events: Option<Arc<EventBus>>,
    drive_frames: bool,
}

impl StudioSessionBuilder {
    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn AudioByteCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn waveforms(mut self, waveforms: Arc<dyn WaveformCache>) -> Self {
        self.waveforms = Some(waveforms);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn AudioFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn offline(mut self, offline: Arc<dyn OfflineStatus>) -> Self {
        self.offline = Some(offline);
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Do not spawn the frame loop; the owner calls
    /// [`MasterTransport::run_correction_cycle`] itself
    pub fn external_frames(mut self) -> Self {
        self.drive_frames = false;
        self
    }

    pub async fn build(self) -> Result<StudioSession> {
        self.config.validate()?;
        let config = self.config;

        let events = self.events.unwrap_or_default();
        let clock: Arc<dyn ClockSource> = match self.clock {
            Some(clock) => clock,
            None => shared_clock(),
        };
        let fetcher: Arc<dyn AudioFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };
        let cache: Arc<dyn AudioByteCache> = match self.cache {
            Some(cache) => cache,
            None => {
                let mut builder = MemoryAudioCache::builder(config.cache_policy())
                    .fetcher(Arc::clone(&fetcher))
                    .prefetch_enabled(config.prefetch.enabled)
                    .prefetch_ahead(config.prefetch.queue_ahead)
                    .events(Arc::clone(&events));
                if let Some(dir) = &config.cache.directory {
                    builder = builder.disk(DiskAudioCache::open(dir).await?);
                }
                Arc::new(builder.build())
            }
        };
        let waveforms: Arc<dyn WaveformCache> = match self.waveforms {
            Some(waveforms) => waveforms,
            None => Arc::new(MemoryWaveformCache::default()),
        };
        let offline: Arc<dyn OfflineStatus> = match self.offline {
            Some(offline) => offline,
            None => Arc::new(AlwaysOnline),
        };

        let mut transport_options = config.transport_options();
        transport_options.drive_frames = self.drive_frames;
        let transport = MasterTransport::new(clock, transport_options, Arc::clone(&events));

        let loader = StemLoader::new(
            LoaderDeps {
                cache,
                fetcher,
                waveforms,
                offline,
                events: Arc::clone(&events),
            },
            config.loader_options(),
        );

        let mixer = Arc::new(Mixer::new());
        let controls = DebouncedControlSurface::new(config.control_options());

        let session = StudioSession {
            transport,
            loader,
            mixer,
            controls,
            events,
        };
        session.install_default_targets();

        info!(session_id = %session.session_id(), "Studio session created");
        Ok(session)
    }
}

/// One studio editing session over a set of stems
pub struct StudioSession {
    transport: MasterTransport,
    loader: StemLoader,
    mixer: Arc<Mixer>,
    controls: DebouncedControlSurface,
    events: Arc<EventBus>,
}

impl StudioSession {
    pub fn builder(config: StudioConfig) -> StudioSessionBuilder {
        StudioSessionBuilder {
            config,
            clock: None,
            cache: None,
            waveforms: None,
            fetcher: None,
            offline: None,
            events: None,
            drive_frames: true,
        }
    }

    /// Route control-surface propagation into the mixer and transport
    fn install_default_targets(&self) {
        let mixer = Arc::clone(&self.mixer);
        let transport = self.transport.clone();
        self.controls.set_stem_volume_target(Arc::new(move |stem_id: &str, volume: f32| {
            mixer.set_volume(stem_id, volume);
            mixer.apply(&transport.handles());
        }));

        let mixer = Arc::clone(&self.mixer);
        let transport = self.transport.clone();
        self.controls.set_master_volume_target(Arc::new(move |volume: f32| {
            mixer.set_master_volume(volume);
            mixer.apply(&transport.handles());
        }));

        let transport = self.transport.clone();
        self.controls.set_seek_target(Arc::new(move |position: f64| {
            transport.seek(position);
        }));
    }

    pub fn session_id(&self) -> Uuid {
        self.transport.session_id()
    }

    pub fn transport(&self) -> &MasterTransport {
        &self.transport
    }

    pub fn loader(&self) -> &StemLoader {
        &self.loader
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn controls(&self) -> &DebouncedControlSurface {
        &self.controls
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Stems
    // ========================================================================

    /// Register handles (in the given order) and load each stem cache-first
    ///
    /// # Returns
    /// Number of stems accepted; malformed descriptors are skipped.
    pub async fn attach(&self, stems: &[(Stem, SharedHandle)]) -> usize {
        let mut accepted = 0;
        for (stem, handle) in stems {
            if !self.loader.load_stem_with_cache(stem, handle).await {
                continue;
            }
            self.transport.register(stem.id.clone(), Arc::clone(handle));
            accepted += 1;
        }
        self.mixer.apply(&self.transport.handles());
        debug!(accepted, total = stems.len(), "Stems attached");
        accepted
    }

    /// Remove a stem; the handle is paused, not destroyed
    pub fn detach(&self, stem_id: &str) -> bool {
        match self.transport.unregister(stem_id) {
            Some(handle) => {
                handle.pause();
                true
            }
            None => false,
        }
    }

    pub async fn prefetch_stems(&self, stems: &[Stem]) -> Vec<String> {
        self.loader.prefetch_stems(stems).await
    }

    pub fn is_stem_loaded(&self, stem_id: &str) -> bool {
        self.loader.is_stem_loaded(stem_id)
    }

    /// Await background cache population and waveform work
    pub async fn wait_for_background(&self) {
        self.loader.wait_for_background().await;
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub async fn play(&self, from_time: Option<f64>) -> Result<()> {
        self.transport.play(from_time).await
    }

    pub fn pause(&self) {
        self.transport.pause();
    }

    pub async fn toggle(&self) -> Result<()> {
        self.transport.toggle().await
    }

    pub fn stop(&self) {
        self.transport.stop();
    }

    /// Throttled seek through the control surface
    pub fn seek(&self, time: f64) {
        self.controls.seek(time);
    }

    pub fn current_time(&self) -> f64 {
        self.transport.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn on_time_update(&self, target: Arc<TimeUpdateFn>) {
        self.transport.set_on_time_update(target);
    }

    pub fn on_ended(&self, target: Arc<EndedFn>) {
        self.transport.set_on_ended(target);
    }

    // ========================================================================
    // Mixer
    // ========================================================================

    /// Debounced stem volume
    pub fn set_stem_volume(&self, stem_id: &str, volume: f32) {
        self.controls.set_stem_volume(stem_id, volume);
    }

    /// Debounced master volume
    pub fn set_master_volume(&self, volume: f32) {
        self.controls.set_master_volume(volume);
    }

    pub fn toggle_mute(&self, stem_id: &str) -> bool {
        let muted = self.mixer.toggle_mute(stem_id);
        self.mixer.apply(&self.transport.handles());
        muted
    }

    pub fn toggle_solo(&self, stem_id: &str) -> bool {
        let soloed = self.mixer.toggle_solo(stem_id);
        self.mixer.apply(&self.transport.handles());
        soloed
    }

    /// Replace the default volume/seek propagation targets
    pub fn set_stem_volume_target(&self, target: Arc<StemVolumeFn>) {
        self.controls.set_stem_volume_target(target);
    }

    pub fn set_master_volume_target(&self, target: Arc<MasterVolumeFn>) {
        self.controls.set_master_volume_target(target);
    }

    pub fn set_seek_target(&self, target: Arc<SeekFn>) {
        self.controls.set_seek_target(target);
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Cancel all loops and timers, pause every handle, release the mapping
    pub fn shutdown(&self) {
        self.controls.cancel();
        self.loader.shutdown();
        let handles = self.transport.handle_count();
        self.transport.teardown();
        info!(session_id = %self.session_id(), handles, "Studio session shut down");
    }
}

impl Drop for StudioSession {
    fn drop(&mut self) {
        if self.transport.handle_count() > 0 {
            warn!(session_id = %self.session_id(), "Studio session dropped without shutdown");
            self.shutdown();
        }
    }
}
