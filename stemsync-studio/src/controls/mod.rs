//! Rate-limited control surface
//!
//! High-frequency UI mutations (volume faders, scrubbing) update their
//! visible value immediately and reach the audio side at a bounded rate:
//! - stem and master volume are debounced (trailing edge, last value wins)
//! - seek is throttled (leading edge plus one trailing value per window)
//!
//! The wrappers are built once; the caller swaps propagation targets
//! through [`TargetCell`]s without disturbing timer state.

mod debounce;
mod target;
mod throttle;

pub use debounce::Debouncer;
pub use target::{EndedFn, MasterVolumeFn, SeekFn, StemVolumeFn, TargetCell, TimeUpdateFn};
pub use throttle::Throttler;

use crate::mixer::clamp_volume;
use crate::stem::StemId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ControlOptions {
    pub volume_debounce: Duration,
    pub seek_throttle: Duration,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            volume_debounce: Duration::from_millis(50),
            seek_throttle: Duration::from_millis(16),
        }
    }
}

#[derive(Debug)]
struct VisibleValues {
    stem_volumes: HashMap<StemId, f32>,
    master_volume: f32,
    seek_position: Option<f64>,
}

pub struct DebouncedControlSurface {
    visible: RwLock<VisibleValues>,
    stem_volume_target: TargetCell<StemVolumeFn>,
    master_volume_target: TargetCell<MasterVolumeFn>,
    seek_target: TargetCell<SeekFn>,
    stem_volume: Debouncer<StemId, f32>,
    master_volume: Debouncer<(), f32>,
    seek: Throttler<f64>,
}

impl DebouncedControlSurface {
    pub fn new(options: ControlOptions) -> Self {
        let stem_volume_target: TargetCell<StemVolumeFn> = TargetCell::new();
        let master_volume_target: TargetCell<MasterVolumeFn> = TargetCell::new();
        let seek_target: TargetCell<SeekFn> = TargetCell::new();

        let cell = stem_volume_target.clone();
        let stem_volume = Debouncer::new(options.volume_debounce, move |stem_id: &StemId, volume: f32| {
            debug!(stem = %stem_id, volume, "Propagating stem volume");
            if let Some(target) = cell.get() {
                target(stem_id.as_str(), volume);
            }
        });

        let cell = master_volume_target.clone();
        let master_volume = Debouncer::new(options.volume_debounce, move |_: &(), volume: f32| {
            debug!(volume, "Propagating master volume");
            if let Some(target) = cell.get() {
                target(volume);
            }
        });

        let cell = seek_target.clone();
        let seek = Throttler::new(options.seek_throttle, move |position: f64| {
            if let Some(target) = cell.get() {
                target(position);
            }
        });

        Self {
            visible: RwLock::new(VisibleValues {
                stem_volumes: HashMap::new(),
                master_volume: 1.0,
                seek_position: None,
            }),
            stem_volume_target,
            master_volume_target,
            seek_target,
            stem_volume,
            master_volume,
            seek,
        }
    }

    pub fn set_stem_volume_target(&self, target: Arc<StemVolumeFn>) {
        self.stem_volume_target.set(target);
    }

    pub fn set_master_volume_target(&self, target: Arc<MasterVolumeFn>) {
        self.master_volume_target.set(target);
    }

    pub fn set_seek_target(&self, target: Arc<SeekFn>) {
        self.seek_target.set(target);
    }

    pub fn set_stem_volume(&self, stem_id: &str, volume: f32) {
        let volume = clamp_volume(volume);
        self.visible
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .stem_volumes
            .insert(StemId::from(stem_id), volume);
        self.stem_volume.call(StemId::from(stem_id), volume);
    }

    pub fn set_master_volume(&self, volume: f32) {
        let volume = clamp_volume(volume);
        self.visible.write().unwrap_or_else(PoisonError::into_inner).master_volume = volume;
        self.master_volume.call((), volume);
    }

    pub fn seek(&self, position: f64) {
        self.visible.write().unwrap_or_else(PoisonError::into_inner).seek_position = Some(position);
        self.seek.call(position);
    }

    /// Visible stem volume (before propagation); 1.0 if never set
    pub fn stem_volume(&self, stem_id: &str) -> f32 {
        self.visible
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .stem_volumes
            .get(stem_id)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn master_volume(&self) -> f32 {
        self.visible.read().unwrap_or_else(PoisonError::into_inner).master_volume
    }

    pub fn last_seek(&self) -> Option<f64> {
        self.visible.read().unwrap_or_else(PoisonError::into_inner).seek_position
    }

    /// Deliver pending volume changes now
    pub fn flush(&self) {
        self.stem_volume.flush();
        self.master_volume.flush();
    }

    /// Drop pending changes and stop timers
    pub fn cancel(&self) {
        self.stem_volume.cancel();
        self.master_volume.cancel();
        self.seek.cancel();
    }
}

impl Default for DebouncedControlSurface {
    fn default() -> Self {
        Self::new(ControlOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_volume_reads_as_silence() {
        let surface = DebouncedControlSurface::default();
        let propagated = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&propagated);
        surface.set_master_volume_target(Arc::new(move |v: f32| sink.lock().unwrap().push(v)));

        surface.set_stem_volume("vocals", f32::NAN);
        surface.set_master_volume(f32::NAN);

        assert_eq!(surface.stem_volume("vocals"), 0.0);
        assert_eq!(surface.master_volume(), 0.0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*propagated.lock().unwrap(), vec![0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_value_immediate_propagation_debounced() {
        let surface = DebouncedControlSurface::default();
        let propagated = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&propagated);
        surface.set_stem_volume_target(Arc::new(move |id: &str, v: f32| {
            sink.lock().unwrap().push((id.to_string(), v));
        }));

        surface.set_stem_volume("bass", 0.2);
        surface.set_stem_volume("bass", 0.6);

        assert_eq!(surface.stem_volume("bass"), 0.6);
        assert!(propagated.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*propagated.lock().unwrap(), vec![("bass".to_string(), 0.6)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_target_is_invoked() {
        let surface = DebouncedControlSurface::default();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&first);
        surface.set_master_volume_target(Arc::new(move |v: f32| sink.lock().unwrap().push(v)));
        surface.set_master_volume(0.3);

        let sink = Arc::clone(&second);
        surface.set_master_volume_target(Arc::new(move |v: f32| sink.lock().unwrap().push(v)));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![0.3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_throttled() {
        let surface = DebouncedControlSurface::default();
        let seeks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seeks);
        surface.set_seek_target(Arc::new(move |t: f64| sink.lock().unwrap().push(t)));

        for t in [1.0, 1.1, 1.2, 1.3] {
            surface.seek(t);
        }
        assert_eq!(*seeks.lock().unwrap(), vec![1.0]);
        assert_eq!(surface.last_seek(), Some(1.3));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seeks.lock().unwrap(), vec![1.0, 1.3]);
    }
}
