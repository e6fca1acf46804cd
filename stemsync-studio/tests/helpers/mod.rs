//! Shared fixtures for stemsync-studio integration tests
//!
//! - Transport rigs driven by a manual clock with external frame cycles
//! - Simulated handles, optionally sharing a journal
//! - Session builders over in-memory fetchers and caches

#![allow(dead_code)]

use std::sync::Arc;

use stemsync_common::events::{EventBus, StudioEvent};
use stemsync_studio::cache::MemoryAudioCache;
use stemsync_studio::clock::{ClockSource, ManualClock};
use stemsync_studio::fetch::StaticFetcher;
use stemsync_studio::media::{MediaJournal, SimulatedMedia};
use stemsync_studio::transport::TransportOptions;
use stemsync_studio::{MasterTransport, Stem, StudioConfig, StudioSession};
use tokio::sync::broadcast;

/// One frame at 60 Hz
pub const FRAME: f64 = 0.016;

pub struct TransportRig {
    pub clock: Arc<ManualClock>,
    pub transport: MasterTransport,
    pub events: Arc<EventBus>,
}

impl TransportRig {
    /// Transport whose cycles are run by the test
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new());
        let events = Arc::new(EventBus::new(1024));
        let options = TransportOptions {
            drive_frames: false,
            ..Default::default()
        };
        let transport = MasterTransport::new(clock.clone(), options, Arc::clone(&events));
        Self { clock, transport, events }
    }

    /// Add a ready handle with the given playback rate
    pub fn add(&self, name: &str, duration: f64, rate: f64) -> Arc<SimulatedMedia> {
        let media = Arc::new(loaded(name, self.clock.clone(), duration).with_rate(rate));
        self.transport.register(name, media.clone());
        media
    }

    /// Add a ready handle that records into `journal`
    pub fn add_journaled(&self, name: &str, duration: f64, journal: &MediaJournal) -> Arc<SimulatedMedia> {
        let media = Arc::new(loaded(name, self.clock.clone(), duration).with_journal(journal.clone()));
        self.transport.register(name, media.clone());
        media
    }

    /// Add a handle that never reaches a usable ready state
    pub fn add_stalled(&self, name: &str, duration: f64) -> Arc<SimulatedMedia> {
        let media = Arc::new(SimulatedMedia::new(name, self.clock.clone(), duration).never_ready());
        self.transport.register(name, media.clone());
        media
    }

    /// Advance one frame and run a correction cycle
    pub fn frame(&self) -> Option<stemsync_studio::sync::CorrectionReport> {
        self.clock.advance(FRAME);
        self.transport.run_correction_cycle()
    }
}

pub fn loaded(name: &str, clock: Arc<dyn ClockSource>, duration: f64) -> SimulatedMedia {
    SimulatedMedia::new(name, clock, duration).loaded()
}

/// Stems with URLs under a fake CDN host
pub fn stems(names: &[&str]) -> Vec<Stem> {
    names
        .iter()
        .map(|name| Stem::from_type_name(*name, name, stem_url(name)))
        .collect()
}

pub fn stem_url(name: &str) -> String {
    format!("https://cdn.test/stems/{}.wav", name)
}

/// Fetcher that serves a small payload for every stem URL
pub fn fetcher_for(names: &[&str]) -> Arc<StaticFetcher> {
    let fetcher = Arc::new(StaticFetcher::new());
    for name in names {
        fetcher.insert(stem_url(name), vec![7u8; 256]);
    }
    fetcher
}

/// Session over a manual clock, run with external frames
pub async fn manual_session(
    clock: Arc<ManualClock>,
    fetcher: Arc<StaticFetcher>,
    cache: MemoryAudioCache,
) -> StudioSession {
    StudioSession::builder(StudioConfig::default())
        .clock(clock)
        .fetcher(fetcher)
        .cache(Arc::new(cache))
        .external_frames()
        .build()
        .await
        .expect("session builds with default config")
}

/// Collect every event currently queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<StudioEvent>) -> Vec<StudioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} within {} of {}",
        actual,
        tolerance,
        expected
    );
}
