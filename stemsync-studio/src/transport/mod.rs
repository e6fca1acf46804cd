//! Master transport
//!
//! Coordinates play/pause/seek across every registered media handle. The
//! transport's [`TransportTiming`] is the single source of truth for the
//! playback position; handles follow it and are corrected by the frame
//! loop while playing.
//!
//! **Ordering within `play()`:**
//! 1. Resume the clock (failure aborts, state untouched)
//! 2. Set every ready handle to the start position
//! 3. Record the start time
//! 4. Issue `play()` to every handle concurrently (failures logged)
//! 5. Transition to Playing and start the frame loop

mod timing;

pub use timing::TransportTiming;

use crate::clock::ClockSource;
use crate::controls::{EndedFn, TargetCell, TimeUpdateFn};
use crate::error::Result;
use crate::media::SharedHandle;
use crate::stem::StemId;
use crate::sync::{
    check_sync, resync_to_reference, CorrectionReport, DriftCorrector, DriftThresholds, SyncStatus,
};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use stemsync_common::events::{EventBus, StudioEvent, TransportState};
use stemsync_common::time::secs_to_ms;
use timing::clamp_position;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Distance from the end at which playback is considered finished (seconds)
pub const END_OF_TRACK_MARGIN: f64 = 0.1;

/// Transport tuning
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub thresholds: DriftThresholds,
    /// Maximum pairwise drift tolerated by the coarse sync check (seconds)
    pub sync_check_threshold: f64,
    pub frame_interval: Duration,
    pub sync_check_interval: Duration,
    /// Spawn the frame and sync-check loops on play
    ///
    /// When false the owner drives cycles itself through
    /// [`MasterTransport::run_correction_cycle`] and
    /// [`MasterTransport::run_sync_check`].
    pub drive_frames: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            thresholds: DriftThresholds::default(),
            sync_check_threshold: 0.050,
            frame_interval: Duration::from_millis(16),
            sync_check_interval: Duration::from_millis(500),
            drive_frames: true,
        }
    }
}

struct Inner {
    session_id: Uuid,
    clock: Arc<dyn ClockSource>,
    /// Registered handles in registration order
    handles: RwLock<Vec<(StemId, SharedHandle)>>,
    timing: Mutex<TransportTiming>,
    corrector: DriftCorrector,
    options: TransportOptions,
    on_time_update: TargetCell<TimeUpdateFn>,
    on_ended: TargetCell<EndedFn>,
    events: Arc<EventBus>,
    frame_task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped by every play/pause/stop; a play that finds it changed after
    /// awaiting its handles has been superseded
    generation: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let task = self.frame_task.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Playback state machine shared by every handle of a session
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct MasterTransport {
    inner: Arc<Inner>,
}

impl MasterTransport {
    /// Create a transport in the Stopped state at position 0
    ///
    /// # Arguments
    /// * `clock` - Injected playback clock
    /// * `options` - Thresholds and loop intervals
    /// * `events` - Bus for transport and drift events
    pub fn new(clock: Arc<dyn ClockSource>, options: TransportOptions, events: Arc<EventBus>) -> Self {
        let session_id = Uuid::new_v4();
        debug!(%session_id, ?options, "Creating master transport");
        Self {
            inner: Arc::new(Inner {
                session_id,
                clock,
                handles: RwLock::new(Vec::new()),
                timing: Mutex::new(TransportTiming::default()),
                corrector: DriftCorrector::new(options.thresholds),
                options,
                on_time_update: TargetCell::new(),
                on_ended: TargetCell::new(),
                events,
                frame_task: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn options(&self) -> &TransportOptions {
        &self.inner.options
    }

    fn timing(&self) -> MutexGuard<'_, TransportTiming> {
        self.inner.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current timing state
    pub fn timing_snapshot(&self) -> TransportTiming {
        *self.timing()
    }

    // ========================================================================
    // Handle registry
    // ========================================================================

    /// Register (or replace) the handle for a stem
    pub fn register(&self, stem_id: impl Into<StemId>, handle: SharedHandle) {
        let stem_id = stem_id.into();
        let mut handles = self.inner.handles.write().unwrap_or_else(PoisonError::into_inner);
        match handles.iter_mut().find(|(id, _)| *id == stem_id) {
            Some(entry) => {
                debug!(stem = %stem_id, "Replacing registered handle");
                entry.1 = handle;
            }
            None => {
                debug!(stem = %stem_id, "Registering handle");
                handles.push((stem_id, handle));
            }
        }
    }

    pub fn unregister(&self, stem_id: &str) -> Option<SharedHandle> {
        let mut handles = self.inner.handles.write().unwrap_or_else(PoisonError::into_inner);
        let index = handles.iter().position(|(id, _)| id.as_str() == stem_id)?;
        Some(handles.remove(index).1)
    }

    /// Drop every handle reference held by the transport
    pub fn release_all(&self) {
        self.inner.handles.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Snapshot of registered handles in registration order
    pub fn handles(&self) -> Vec<(StemId, SharedHandle)> {
        self.inner.handles.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn handle(&self, stem_id: &str) -> Option<SharedHandle> {
        self.inner
            .handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(id, _)| id.as_str() == stem_id)
            .map(|(_, h)| Arc::clone(h))
    }

    pub fn handle_count(&self) -> usize {
        self.inner.handles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    pub fn set_on_time_update(&self, target: Arc<TimeUpdateFn>) {
        self.inner.on_time_update.set(target);
    }

    pub fn set_on_ended(&self, target: Arc<EndedFn>) {
        self.inner.on_ended.set(target);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Derived playback position, playing or not
    pub fn current_time(&self) -> f64 {
        let now = self.inner.clock.now();
        self.timing().position_at(now)
    }

    pub fn is_playing(&self) -> bool {
        self.timing().is_playing
    }

    pub fn state(&self) -> TransportState {
        if self.is_playing() {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    /// Longest duration among ready handles; 0.0 while none is ready
    pub fn duration(&self) -> f64 {
        duration_of(&self.handles())
    }

    // ========================================================================
    // Transport operations
    // ========================================================================

    /// Start playback from `from_time`, or from the current position
    ///
    /// Fails only when the clock cannot be resumed, in which case the
    /// transport state is unchanged. Individual handles rejecting `play()`
    /// are logged and do not affect the others.
    pub async fn play(&self, from_time: Option<f64>) -> Result<()> {
        if let Err(e) = self.inner.clock.resume().await {
            warn!(error = %e, "Clock resume failed, playback not started");
            return Err(e);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.stop_loop();

        let handles = self.handles();
        let duration = duration_of(&handles);

        let (was_playing, start_position) = {
            let now = self.inner.clock.now();
            let mut timing = self.timing();
            let was_playing = timing.is_playing;
            let position = match from_time {
                Some(time) => clamp_position(time, duration),
                // Resuming at the end of the track restarts it
                None => match timing.position_at(now) {
                    p if duration > 0.0 && p >= duration - END_OF_TRACK_MARGIN => 0.0,
                    p => p,
                },
            };
            timing.is_playing = false;
            timing.pause_offset = position;
            (was_playing, position)
        };

        for (stem_id, handle) in &handles {
            if handle.is_ready() {
                handle.set_position(start_position);
            } else {
                debug!(stem = %stem_id, "Handle not ready, position left to drift correction");
            }
        }

        let start_time = self.inner.clock.now();

        let plays = handles.iter().map(|(stem_id, handle)| async move {
            if let Err(e) = handle.play().await {
                warn!(stem = %stem_id, error = %e, "Handle rejected play, continuing with remaining stems");
            }
        });
        join_all(plays).await;

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("Play superseded while starting handles");
            if !self.is_playing() {
                for (_, handle) in &handles {
                    handle.pause();
                }
            }
            return Ok(());
        }

        {
            let mut timing = self.timing();
            timing.is_playing = true;
            timing.start_time = start_time;
        }

        if !was_playing {
            self.emit_state_change(TransportState::Stopped, TransportState::Playing, start_position);
        }
        info!(position = start_position, stems = handles.len(), "Playback started");

        self.start_loop();
        Ok(())
    }

    /// Pause all handles at the derived position
    ///
    /// No-op when already stopped.
    pub fn pause(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_loop();

        let now = self.inner.clock.now();
        let position = {
            let mut timing = self.timing();
            if timing.is_playing {
                let position = timing.position_at(now);
                timing.pause_offset = position;
                timing.is_playing = false;
                Some(position)
            } else {
                None
            }
        };

        let Some(position) = position else {
            debug!("Pause while stopped ignored");
            return;
        };

        for (_, handle) in self.handles() {
            handle.pause();
        }

        self.emit_state_change(TransportState::Playing, TransportState::Stopped, position);
        info!(position, "Playback paused");
    }

    /// Move the playback position
    ///
    /// Stays playing when playing; the start time is re-anchored so the
    /// derived position continues from `time`.
    pub fn seek(&self, time: f64) {
        let handles = self.handles();
        let position = clamp_position(time, duration_of(&handles));
        let now = self.inner.clock.now();

        let playing = {
            let mut timing = self.timing();
            timing.pause_offset = position;
            if timing.is_playing {
                timing.start_time = now;
            }
            timing.is_playing
        };

        for (_, handle) in handles.iter().filter(|(_, h)| h.is_ready()) {
            handle.set_position(position);
        }

        debug!(position, playing, "Seek");
        self.report_time(position);
    }

    /// Pause if playing, otherwise play from the current position
    pub async fn toggle(&self) -> Result<()> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play(None).await
        }
    }

    /// Pause and rewind to position 0
    pub fn stop(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_loop();

        let was_playing = {
            let mut timing = self.timing();
            let was_playing = timing.is_playing;
            timing.is_playing = false;
            timing.pause_offset = 0.0;
            was_playing
        };

        for (_, handle) in self.handles() {
            handle.pause();
            if handle.is_ready() {
                handle.set_position(0.0);
            }
        }

        self.report_time(0.0);
        if was_playing {
            self.emit_state_change(TransportState::Playing, TransportState::Stopped, 0.0);
        }
        info!("Playback stopped");
    }

    /// Cancel loops, pause and release every handle, drop the handle mapping
    pub fn teardown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_loop();
        self.timing().is_playing = false;
        for (_, handle) in self.handles() {
            handle.pause();
            handle.release();
        }
        self.release_all();
        self.inner.on_time_update.clear();
        self.inner.on_ended.clear();
        debug!(session_id = %self.inner.session_id, "Transport torn down");
    }

    // ========================================================================
    // Correction cycles
    // ========================================================================

    /// Run one frame: read master time, report it, correct drifting handles
    ///
    /// Returns `None` when not playing, or when this cycle detected the end
    /// of the track and paused the transport.
    pub fn run_correction_cycle(&self) -> Option<CorrectionReport> {
        let now = self.inner.clock.now();
        let timing = *self.timing();
        if !timing.is_playing {
            return None;
        }
        let master = timing.position_at(now);

        let handles = self.handles();
        let duration = duration_of(&handles);
        if duration > 0.0 && master >= duration - END_OF_TRACK_MARGIN {
            self.finish(duration);
            return None;
        }

        self.report_time(master);

        let report = self.inner.corrector.correct(master, &handles);
        for correction in &report.corrections {
            self.inner.events.emit_lossy(StudioEvent::DriftCorrected {
                session_id: self.inner.session_id,
                stem_id: correction.stem_id.to_string(),
                drift_ms: secs_to_ms(correction.drift.abs()),
                severity: correction.severity,
            });
        }
        Some(report)
    }

    /// Coarse out-of-band check; realigns handles to the reference when the
    /// pairwise drift exceeds the configured threshold
    pub fn run_sync_check(&self) -> Option<SyncStatus> {
        if !self.is_playing() {
            return None;
        }

        let handles = self.handles();
        let status = check_sync(&handles, self.inner.options.sync_check_threshold);
        let realigned = if status.in_sync {
            0
        } else {
            let moved = resync_to_reference(&handles, &status);
            info!(
                max_drift_ms = secs_to_ms(status.max_drift),
                reference = ?status.reference,
                moved,
                "Stems out of sync, realigned to reference"
            );
            moved
        };

        self.inner.events.emit_lossy(StudioEvent::SyncCheck {
            session_id: self.inner.session_id,
            in_sync: status.in_sync,
            max_drift_ms: secs_to_ms(status.max_drift),
            realigned,
        });
        Some(status)
    }

    /// Pause at the end of the track and notify
    fn finish(&self, duration: f64) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_loop();

        let was_playing = {
            let mut timing = self.timing();
            let was_playing = timing.is_playing;
            timing.is_playing = false;
            timing.pause_offset = duration;
            was_playing
        };
        if !was_playing {
            return;
        }

        for (_, handle) in self.handles() {
            handle.pause();
        }

        self.report_time(duration);
        self.emit_state_change(TransportState::Playing, TransportState::Stopped, duration);
        self.inner.events.emit_lossy(StudioEvent::TrackEnded {
            session_id: self.inner.session_id,
            duration,
            timestamp: stemsync_common::time::now(),
        });
        info!(duration, "Track ended");

        if let Some(ended) = self.inner.on_ended.get() {
            ended();
        }
    }

    fn report_time(&self, position: f64) {
        if let Some(target) = self.inner.on_time_update.get() {
            target(position);
        }
        self.inner.events.emit_lossy(StudioEvent::PositionUpdate {
            session_id: self.inner.session_id,
            position,
        });
    }

    fn emit_state_change(&self, old_state: TransportState, new_state: TransportState, position: f64) {
        self.inner.events.emit_lossy(StudioEvent::TransportStateChanged {
            session_id: self.inner.session_id,
            old_state,
            new_state,
            position,
            timestamp: stemsync_common::time::now(),
        });
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    fn start_loop(&self) {
        if !self.inner.options.drive_frames {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let frame_period = self.inner.options.frame_interval.max(Duration::from_millis(1));
        let sync_period = self.inner.options.sync_check_interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut frames = interval(frame_period);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut sync_checks = interval_at(Instant::now() + sync_period, sync_period);
            sync_checks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = frames.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let transport = MasterTransport { inner };
                        if transport.run_correction_cycle().is_none() {
                            break;
                        }
                    }
                    _ = sync_checks.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        MasterTransport { inner }.run_sync_check();
                    }
                }
            }
            debug!("Frame loop exited");
        });

        let previous = self
            .inner
            .frame_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_loop(&self) {
        let task = self.inner.frame_task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

fn duration_of(handles: &[(StemId, SharedHandle)]) -> f64 {
    handles
        .iter()
        .filter(|(_, h)| h.is_ready())
        .map(|(_, h)| h.duration())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{AudioClock, AutoplayPolicy, ManualClock};
    use crate::media::{MediaHandle, SimulatedMedia};
    use std::sync::atomic::AtomicU32;

    fn manual_transport(clock: &Arc<ManualClock>) -> MasterTransport {
        let options = TransportOptions {
            drive_frames: false,
            ..Default::default()
        };
        MasterTransport::new(clock.clone(), options, Arc::new(EventBus::new(64)))
    }

    fn sim(name: &str, clock: Arc<dyn ClockSource>, duration: f64) -> Arc<SimulatedMedia> {
        Arc::new(SimulatedMedia::new(name, clock, duration).loaded())
    }

    #[tokio::test]
    async fn test_resume_denied_leaves_state_untouched() {
        let clock = Arc::new(ManualClock::new());
        clock.set_deny_resume(true);
        let transport = manual_transport(&clock);
        let vocals = sim("vocals", clock.clone(), 30.0);
        transport.register("vocals", vocals.clone());

        let result = transport.play(Some(5.0)).await;

        assert!(matches!(result, Err(crate::Error::ClockResumeDenied(_))));
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.current_time(), 0.0);
        assert_eq!(vocals.play_calls(), 0);
    }

    #[tokio::test]
    async fn test_register_replaces_in_place() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        transport.register("vocals", sim("a", clock.clone(), 10.0));
        transport.register("bass", sim("b", clock.clone(), 10.0));
        transport.register("vocals", sim("c", clock.clone(), 20.0));

        let ids: Vec<String> = transport.handles().iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["vocals", "bass"]);
        assert_eq!(transport.duration(), 20.0);
        assert!(transport.unregister("bass").is_some());
        assert!(transport.unregister("bass").is_none());
    }

    #[tokio::test]
    async fn test_seek_while_stopped_reports_position() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        let drums = sim("drums", clock.clone(), 30.0);
        transport.register("drums", drums.clone());
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        transport.set_on_time_update(Arc::new(move |t: f64| sink.lock().unwrap().push(t)));

        transport.seek(12.0);
        transport.seek(99.0);

        assert_eq!(*reported.lock().unwrap(), vec![12.0, 30.0]);
        assert_eq!(drums.position(), 30.0);
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_rewinds() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        let bass = sim("bass", clock.clone(), 30.0);
        transport.register("bass", bass.clone());

        transport.play(Some(4.0)).await.unwrap();
        clock.advance(2.0);
        transport.stop();

        assert_eq!(transport.current_time(), 0.0);
        assert_eq!(bass.position(), 0.0);
        assert!(!bass.is_playing());
    }

    #[tokio::test]
    async fn test_end_of_track_pauses_at_duration() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        let vocals = sim("vocals", clock.clone(), 10.0);
        transport.register("vocals", vocals.clone());
        let ended = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ended);
        transport.set_on_ended(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let mut rx = transport.inner.events.subscribe();

        transport.play(None).await.unwrap();
        clock.advance(9.95);

        assert!(transport.run_correction_cycle().is_none());
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.current_time(), 10.0);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert!(!vocals.is_playing());

        let mut saw_ended = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StudioEvent::TrackEnded { .. }) {
                saw_ended = true;
            }
        }
        assert!(saw_ended);
    }

    #[tokio::test]
    async fn test_play_after_end_restarts_from_zero() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        let vocals = sim("vocals", clock.clone(), 10.0);
        transport.register("vocals", vocals.clone());

        transport.play(Some(9.0)).await.unwrap();
        clock.advance(1.0);
        assert!(transport.run_correction_cycle().is_none());
        assert_eq!(transport.current_time(), 10.0);

        transport.play(None).await.unwrap();

        assert_eq!(transport.current_time(), 0.0);
        assert_eq!(vocals.position(), 0.0);
        clock.advance(0.5);
        assert!(transport.run_correction_cycle().is_some());
        assert!(transport.is_playing());
    }

    #[tokio::test]
    async fn test_explicit_play_near_end_is_honored() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        transport.register("vocals", sim("vocals", clock.clone(), 10.0));

        transport.play(Some(9.95)).await.unwrap();

        assert_eq!(transport.current_time(), 9.95);
    }

    #[tokio::test]
    async fn test_failed_handle_does_not_block_others() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        let vocals = sim("vocals", clock.clone(), 30.0);
        let bass = sim("bass", clock.clone(), 30.0);
        bass.set_fail_play(true);
        transport.register("vocals", vocals.clone());
        transport.register("bass", bass.clone());

        transport.play(None).await.unwrap();

        assert!(transport.is_playing());
        assert!(vocals.is_playing());
        assert!(!bass.is_playing());
    }

    #[tokio::test]
    async fn test_sync_check_realigns_to_reference() {
        let clock = Arc::new(ManualClock::new());
        let transport = manual_transport(&clock);
        let vocals = sim("vocals", clock.clone(), 30.0);
        let bass = sim("bass", clock.clone(), 30.0);
        transport.register("vocals", vocals.clone());
        transport.register("bass", bass.clone());

        transport.play(Some(1.0)).await.unwrap();
        bass.nudge(0.2);

        let status = transport.run_sync_check().unwrap();
        assert!(!status.in_sync);
        assert_eq!(status.reference, Some(StemId::from("vocals")));
        assert_eq!(bass.position(), vocals.position());
    }

    #[tokio::test(start_paused = true)]
    async fn test_internal_frame_loop_corrects_drift() {
        let clock = Arc::new(AudioClock::new(AutoplayPolicy::Allowed));
        let transport = MasterTransport::new(clock.clone(), TransportOptions::default(), Arc::new(EventBus::new(4096)));
        let vocals = sim("vocals", clock.clone(), 120.0);
        let bass = Arc::new(SimulatedMedia::new("bass", clock.clone(), 120.0).loaded().with_rate(1.5));
        transport.register("vocals", vocals.clone());
        transport.register("bass", bass.clone());
        let mut rx = transport.inner.events.subscribe();

        transport.play(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let master = transport.current_time();
        assert!((bass.position() - master).abs() <= DriftThresholds::default().critical);

        let mut corrections = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StudioEvent::DriftCorrected { .. }) {
                corrections += 1;
            }
        }
        assert!(corrections > 0);

        transport.pause();
        assert!(transport.inner.frame_task.lock().unwrap().is_none());
    }
}
