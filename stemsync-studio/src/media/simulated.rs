//! Simulated media endpoint
//!
//! Plays nothing; reports a position derived from a clock and a playback
//! rate. A rate other than 1.0 makes the endpoint drift away from master
//! time the way real decoders do. Used by the simulator binary and tests.

use super::{MediaHandle, MediaSource, ReadyState};
use crate::clock::ClockSource;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operation recorded by a [`MediaJournal`]
#[derive(Debug, Clone, PartialEq)]
pub enum MediaOp {
    SetPosition { stem: String, position: f64 },
    Play { stem: String },
    Pause { stem: String },
    SetSource { stem: String, cached: bool },
    Release { stem: String },
}

/// Ordered log of operations shared by several simulated handles
#[derive(Debug, Clone, Default)]
pub struct MediaJournal {
    ops: Arc<Mutex<Vec<MediaOp>>>,
}

impl MediaJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, op: MediaOp) {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).push(op);
    }

    pub fn ops(&self) -> Vec<MediaOp> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[derive(Debug)]
struct SimState {
    source: Option<MediaSource>,
    ready: ReadyState,
    duration: f64,
    error: bool,
    playing: bool,
    /// Position at the last anchor point
    anchor_position: f64,
    /// Clock time at the last anchor point
    anchor_clock: f64,
    rate: f64,
    volume: f32,
    fail_play: bool,
    auto_ready: bool,
    play_calls: u32,
}

/// Clock-driven stand-in for a browser media element
pub struct SimulatedMedia {
    name: String,
    clock: Arc<dyn ClockSource>,
    state: Mutex<SimState>,
    journal: Option<MediaJournal>,
}

impl SimulatedMedia {
    /// New endpoint with no source; becomes ready when a source is assigned
    pub fn new(name: impl Into<String>, clock: Arc<dyn ClockSource>, duration: f64) -> Self {
        Self {
            name: name.into(),
            clock,
            state: Mutex::new(SimState {
                source: None,
                ready: ReadyState::HaveNothing,
                duration,
                error: false,
                playing: false,
                anchor_position: 0.0,
                anchor_clock: 0.0,
                rate: 1.0,
                volume: 1.0,
                fail_play: false,
                auto_ready: true,
                play_calls: 0,
            }),
            journal: None,
        }
    }

    /// Record operations into a shared journal
    pub fn with_journal(mut self, journal: MediaJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Playback rate relative to the clock (1.0 = in sync)
    pub fn with_rate(self, rate: f64) -> Self {
        self.lock().rate = rate;
        self
    }

    /// Mark ready immediately, as if a source had already loaded
    pub fn loaded(self) -> Self {
        self.lock().ready = ReadyState::HaveEnoughData;
        self
    }

    /// Keep readiness at `HaveNothing` even after a source is assigned
    pub fn never_ready(self) -> Self {
        {
            let mut state = self.lock();
            state.auto_ready = false;
            state.ready = ReadyState::HaveNothing;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: MediaOp) {
        if let Some(journal) = &self.journal {
            journal.record(op);
        }
    }

    fn position_of(state: &SimState, now: f64) -> f64 {
        let raw = if state.playing {
            state.anchor_position + (now - state.anchor_clock) * state.rate
        } else {
            state.anchor_position
        };
        Self::clamp_to(state, raw)
    }

    fn clamp_to(state: &SimState, position: f64) -> f64 {
        if state.duration > 0.0 {
            position.clamp(0.0, state.duration)
        } else {
            position.max(0.0)
        }
    }

    pub fn set_ready_state(&self, ready: ReadyState) {
        self.lock().ready = ready;
    }

    pub fn set_rate(&self, rate: f64) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.anchor_position = Self::position_of(&state, now);
        state.anchor_clock = now;
        state.rate = rate;
    }

    /// Shift the reported position without journaling (drift injection)
    pub fn nudge(&self, delta: f64) {
        let now = self.clock.now();
        let mut state = self.lock();
        let current = Self::position_of(&state, now);
        state.anchor_position = Self::clamp_to(&state, current + delta);
        state.anchor_clock = now;
    }

    pub fn set_error(&self, error: bool) {
        self.lock().error = error;
    }

    /// Reject subsequent `play()` calls
    pub fn set_fail_play(&self, fail: bool) {
        self.lock().fail_play = fail;
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn play_calls(&self) -> u32 {
        self.lock().play_calls
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.lock().source.clone()
    }
}

#[async_trait]
impl MediaHandle for SimulatedMedia {
    fn duration(&self) -> f64 {
        let state = self.lock();
        if state.ready >= ReadyState::HaveMetadata {
            state.duration
        } else {
            0.0
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.lock().ready
    }

    fn has_error(&self) -> bool {
        self.lock().error
    }

    fn position(&self) -> f64 {
        let now = self.clock.now();
        Self::position_of(&self.lock(), now)
    }

    fn set_position(&self, seconds: f64) {
        let now = self.clock.now();
        {
            let mut state = self.lock();
            state.anchor_position = Self::clamp_to(&state, seconds);
            state.anchor_clock = now;
        }
        self.record(MediaOp::SetPosition { stem: self.name.clone(), position: seconds });
    }

    fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        self.lock().volume = volume.clamp(0.0, 1.0);
    }

    async fn play(&self) -> Result<()> {
        let now = self.clock.now();
        {
            let mut state = self.lock();
            state.play_calls += 1;
            if state.fail_play {
                return Err(Error::Handle {
                    stem_id: self.name.clone(),
                    message: "play() rejected".to_string(),
                });
            }
            if !state.playing {
                state.anchor_position = Self::position_of(&state, now);
                state.anchor_clock = now;
                state.playing = true;
            }
        }
        self.record(MediaOp::Play { stem: self.name.clone() });
        Ok(())
    }

    fn pause(&self) {
        let now = self.clock.now();
        {
            let mut state = self.lock();
            if state.playing {
                state.anchor_position = Self::position_of(&state, now);
                state.anchor_clock = now;
                state.playing = false;
            }
        }
        self.record(MediaOp::Pause { stem: self.name.clone() });
    }

    fn set_source(&self, source: MediaSource) {
        let cached = source.is_cached();
        {
            let mut state = self.lock();
            state.source = Some(source);
            state.error = false;
            state.playing = false;
            state.anchor_position = 0.0;
            state.ready = if state.auto_ready {
                ReadyState::HaveEnoughData
            } else {
                ReadyState::HaveNothing
            };
        }
        self.record(MediaOp::SetSource { stem: self.name.clone(), cached });
    }

    fn release(&self) {
        {
            let mut state = self.lock();
            state.source = None;
            state.playing = false;
            state.ready = ReadyState::HaveNothing;
        }
        self.record(MediaOp::Release { stem: self.name.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new())
    }

    #[tokio::test]
    async fn test_position_follows_clock_and_rate() {
        let clock = clock();
        let media = SimulatedMedia::new("bass", clock.clone(), 60.0).loaded().with_rate(1.01);

        media.play().await.unwrap();
        clock.advance(10.0);

        assert!((media.position() - 10.1).abs() < 1e-9);
        media.pause();
        clock.advance(5.0);
        assert!((media.position() - 10.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_position_clamped_to_duration() {
        let clock = clock();
        let media = SimulatedMedia::new("drums", clock.clone(), 5.0).loaded();
        media.play().await.unwrap();
        clock.advance(10.0);
        assert_eq!(media.position(), 5.0);
    }

    #[test]
    fn test_not_ready_until_source_assigned() {
        let media = SimulatedMedia::new("vocals", clock(), 30.0);
        assert!(!media.is_ready());
        assert_eq!(media.duration(), 0.0);

        media.set_source(MediaSource::Network("https://cdn/vocals.mp3".to_string()));
        assert!(media.is_ready());
        assert_eq!(media.duration(), 30.0);
    }

    #[test]
    fn test_never_ready_ignores_source() {
        let media = SimulatedMedia::new("other", clock(), 30.0).never_ready();
        media.set_source(MediaSource::Network("https://cdn/other.mp3".to_string()));
        assert!(!media.is_ready());
    }

    #[test]
    fn test_error_state_is_not_ready() {
        let media = SimulatedMedia::new("piano", clock(), 30.0).loaded();
        media.set_error(true);
        assert!(!media.is_ready());
    }

    #[tokio::test]
    async fn test_fail_play_counts_attempt() {
        let media = SimulatedMedia::new("guitar", clock(), 30.0).loaded();
        media.set_fail_play(true);
        assert!(media.play().await.is_err());
        assert_eq!(media.play_calls(), 1);
        assert!(!media.is_playing());
    }

    #[test]
    fn test_journal_records_in_order() {
        let journal = MediaJournal::new();
        let media = SimulatedMedia::new("synth", clock(), 30.0).loaded().with_journal(journal.clone());
        media.set_position(2.0);
        media.pause();
        assert_eq!(
            journal.ops(),
            vec![
                MediaOp::SetPosition { stem: "synth".to_string(), position: 2.0 },
                MediaOp::Pause { stem: "synth".to_string() },
            ]
        );
    }
}
