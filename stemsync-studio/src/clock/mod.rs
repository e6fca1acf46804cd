//! Playback clock
//!
//! The clock is the single authority for elapsed playback time. Core units
//! receive an injected `Arc<dyn ClockSource>`; the process-wide default
//! instance is created lazily by [`shared_clock`] and is meant to be used by
//! the composition root only.

mod audio;
mod manual;

pub use audio::{AudioClock, AutoplayPolicy};
pub use manual::ManualClock;

use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Lifecycle state of a clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// Created (or suspended) but not advancing; needs `resume()`
    Suspended,
    /// Advancing
    Running,
    /// Terminal; a new clock must be created
    Closed,
}

/// Monotonic time source used as the playback authority
#[async_trait]
pub trait ClockSource: Send + Sync {
    /// Current clock time in seconds since an arbitrary epoch fixed at creation
    ///
    /// Monotonic. Only advances while the clock is running.
    fn now(&self) -> f64;

    fn state(&self) -> ClockState;

    /// Start (or restart) the clock
    ///
    /// May await a platform decision. Fails with `ClockResumeDenied` when the
    /// platform refuses and with `ClockClosed` on a closed clock.
    async fn resume(&self) -> Result<()>;

    /// Stop advancing without losing the accumulated time
    fn suspend(&self);

    /// Terminal shutdown
    fn close(&self);
}

static SHARED_CLOCK: Lazy<Mutex<Option<Arc<AudioClock>>>> = Lazy::new(|| Mutex::new(None));

/// Process-wide default clock
///
/// Lazily created on first use and recreated only if the previous instance
/// reports `Closed`.
pub fn shared_clock() -> Arc<AudioClock> {
    let mut slot = SHARED_CLOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(clock) = slot.as_ref() {
        if clock.state() != ClockState::Closed {
            return Arc::clone(clock);
        }
        info!("Shared clock was closed, creating a new instance");
    }
    let clock = Arc::new(AudioClock::new(AutoplayPolicy::Allowed));
    *slot = Some(Arc::clone(&clock));
    clock
}
