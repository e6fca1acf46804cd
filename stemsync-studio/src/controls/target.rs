//! Indirection cell for caller-supplied callbacks
//!
//! Wrappers built once per session hold a `TargetCell`; the caller replaces
//! the target whenever its own closure changes. Invocations always see the
//! latest target while the wrapper (and its timer state) stays the same.

use std::sync::{Arc, PoisonError, RwLock};

/// Receives the unified playback position
pub type TimeUpdateFn = dyn Fn(f64) + Send + Sync;

/// Fired once when playback reaches the end of the longest stem
pub type EndedFn = dyn Fn() + Send + Sync;

/// Propagation target for a per-stem volume change
pub type StemVolumeFn = dyn Fn(&str, f32) + Send + Sync;

/// Propagation target for a master volume change
pub type MasterVolumeFn = dyn Fn(f32) + Send + Sync;

/// Propagation target for a seek
pub type SeekFn = dyn Fn(f64) + Send + Sync;

/// Shared, replaceable reference to the current callback
pub struct TargetCell<F: ?Sized> {
    slot: Arc<RwLock<Option<Arc<F>>>>,
}

impl<F: ?Sized> TargetCell<F> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the current target
    pub fn set(&self, target: Arc<F>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(target);
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Current target, if any
    ///
    /// Returns a clone of the `Arc` so the lock is not held while the
    /// target runs.
    pub fn get(&self) -> Option<Arc<F>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl<F: ?Sized> Clone for TargetCell<F> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<F: ?Sized> Default for TargetCell<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> std::fmt::Debug for TargetCell<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetCell").field("is_set", &self.is_set()).finish()
    }
}
