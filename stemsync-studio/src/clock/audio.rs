//! Monotonic audio clock

use super::{ClockSource, ClockState};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Whether the platform lets the clock start without a user gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayPolicy {
    /// `resume()` always succeeds
    Allowed,
    /// `resume()` is denied until [`AudioClock::grant_gesture`] is called
    RequiresGesture,
}

#[derive(Debug)]
struct ClockInner {
    state: ClockState,
    /// Seconds accumulated over previous running spans
    accumulated: f64,
    /// Start of the current running span
    running_since: Option<Instant>,
}

/// Clock backed by `tokio::time::Instant`
///
/// Behaves like a hardware audio context clock: created suspended, only
/// advances while running. Using tokio's instant makes the clock follow
/// paused test time.
#[derive(Debug)]
pub struct AudioClock {
    inner: Mutex<ClockInner>,
    policy: AutoplayPolicy,
    gesture_granted: AtomicBool,
}

impl AudioClock {
    pub fn new(policy: AutoplayPolicy) -> Self {
        Self {
            inner: Mutex::new(ClockInner {
                state: ClockState::Suspended,
                accumulated: 0.0,
                running_since: None,
            }),
            policy,
            gesture_granted: AtomicBool::new(false),
        }
    }

    /// Record that a user gesture happened (lifts the autoplay restriction)
    pub fn grant_gesture(&self) {
        self.gesture_granted.store(true, Ordering::Release);
    }

    pub fn policy(&self) -> AutoplayPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, ClockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(inner: &mut ClockInner) {
        if let Some(since) = inner.running_since.take() {
            inner.accumulated += since.elapsed().as_secs_f64();
        }
    }
}

#[async_trait]
impl ClockSource for AudioClock {
    fn now(&self) -> f64 {
        let inner = self.lock();
        inner.accumulated
            + inner
                .running_since
                .map(|since| since.elapsed().as_secs_f64())
                .unwrap_or(0.0)
    }

    fn state(&self) -> ClockState {
        self.lock().state
    }

    async fn resume(&self) -> Result<()> {
        let mut inner = self.lock();
        let state = inner.state;
        match state {
            ClockState::Running => Ok(()),
            ClockState::Closed => Err(Error::ClockClosed),
            ClockState::Suspended => {
                if self.policy == AutoplayPolicy::RequiresGesture
                    && !self.gesture_granted.load(Ordering::Acquire)
                {
                    warn!("Clock resume denied: no user gesture yet");
                    return Err(Error::ClockResumeDenied(
                        "autoplay requires a user gesture".to_string(),
                    ));
                }
                inner.running_since = Some(Instant::now());
                inner.state = ClockState::Running;
                debug!(at = inner.accumulated, "Clock resumed");
                Ok(())
            }
        }
    }

    fn suspend(&self) {
        let mut inner = self.lock();
        if inner.state == ClockState::Running {
            Self::settle(&mut inner);
            inner.state = ClockState::Suspended;
        }
    }

    fn close(&self) {
        let mut inner = self.lock();
        Self::settle(&mut inner);
        inner.state = ClockState::Closed;
    }
}
