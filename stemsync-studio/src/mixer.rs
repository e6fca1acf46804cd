//! Stem mixer: per-stem volume, mute and solo with a master volume
//!
//! # Effective volume
//!
//! - Muted stems are silent
//! - While any stem is soloed, stems that are not soloed are silent
//! - Otherwise `stem_volume * master_volume`
//!
//! Volumes are clamped to [0, 1].

use crate::media::SharedHandle;
use crate::stem::StemId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Mix settings for one stem
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StemMix {
    pub volume: f32,
    pub muted: bool,
    pub soloed: bool,
}

impl Default for StemMix {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            soloed: false,
        }
    }
}

#[derive(Debug)]
struct MixerState {
    stems: HashMap<StemId, StemMix>,
    master: f32,
}

#[derive(Debug)]
pub struct Mixer {
    state: RwLock<MixerState>,
}

/// Clamp to [0, 1]; non-finite input maps to silence
pub(crate) fn clamp_volume(volume: f32) -> f32 {
    if !volume.is_finite() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

fn effective(mix: &StemMix, master: f32, any_soloed: bool) -> f32 {
    if mix.muted || (any_soloed && !mix.soloed) {
        0.0
    } else {
        mix.volume * master
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MixerState {
                stems: HashMap::new(),
                master: 1.0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MixerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MixerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, stem_id: &str, f: impl FnOnce(&mut StemMix)) {
        let mut state = self.write();
        let mix = state.stems.entry(StemId::from(stem_id)).or_default();
        f(mix);
    }

    pub fn stem(&self, stem_id: &str) -> StemMix {
        self.read().stems.get(stem_id).copied().unwrap_or_default()
    }

    pub fn set_volume(&self, stem_id: &str, volume: f32) {
        self.update(stem_id, |mix| mix.volume = clamp_volume(volume));
    }

    pub fn volume(&self, stem_id: &str) -> f32 {
        self.stem(stem_id).volume
    }

    pub fn set_muted(&self, stem_id: &str, muted: bool) {
        self.update(stem_id, |mix| mix.muted = muted);
    }

    /// Flip mute; returns the new state
    pub fn toggle_mute(&self, stem_id: &str) -> bool {
        let mut muted = false;
        self.update(stem_id, |mix| {
            mix.muted = !mix.muted;
            muted = mix.muted;
        });
        muted
    }

    pub fn set_solo(&self, stem_id: &str, soloed: bool) {
        self.update(stem_id, |mix| mix.soloed = soloed);
    }

    /// Flip solo; returns the new state
    pub fn toggle_solo(&self, stem_id: &str) -> bool {
        let mut soloed = false;
        self.update(stem_id, |mix| {
            mix.soloed = !mix.soloed;
            soloed = mix.soloed;
        });
        soloed
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.write().master = clamp_volume(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.read().master
    }

    pub fn any_soloed(&self) -> bool {
        self.read().stems.values().any(|mix| mix.soloed)
    }

    pub fn effective_volume(&self, stem_id: &str) -> f32 {
        let state = self.read();
        let any_soloed = state.stems.values().any(|mix| mix.soloed);
        let mix = state.stems.get(stem_id).copied().unwrap_or_default();
        effective(&mix, state.master, any_soloed)
    }

    /// Push effective volumes to every handle
    pub fn apply(&self, handles: &[(StemId, SharedHandle)]) {
        let state = self.read();
        let any_soloed = state.stems.values().any(|mix| mix.soloed);
        for (stem_id, handle) in handles {
            let mix = state.stems.get(stem_id).copied().unwrap_or_default();
            handle.set_volume(effective(&mix, state.master, any_soloed));
        }
        debug!(stems = handles.len(), master = state.master, any_soloed, "Mixer applied");
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}
