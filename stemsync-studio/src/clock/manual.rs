//! Manually driven clock for deterministic sessions and tests

use super::{ClockSource, ClockState};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct ManualInner {
    now: f64,
    state: ClockState,
    deny_resume: bool,
    resume_calls: u32,
}

/// Clock whose time only moves when told to
///
/// Time is set by the caller regardless of state; `state()` and `resume()`
/// still follow the lifecycle so autoplay denial can be simulated.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<ManualInner>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManualInner {
                now: 0.0,
                state: ClockState::Suspended,
                deny_resume: false,
                resume_calls: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move time forward; negative steps are ignored
    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            self.lock().now += seconds;
        }
    }

    /// Jump to an absolute time (never backwards)
    pub fn set(&self, seconds: f64) {
        let mut inner = self.lock();
        if seconds > inner.now {
            inner.now = seconds;
        }
    }

    /// Make subsequent `resume()` calls fail
    pub fn set_deny_resume(&self, deny: bool) {
        self.lock().deny_resume = deny;
    }

    pub fn resume_calls(&self) -> u32 {
        self.lock().resume_calls
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        self.lock().now
    }

    fn state(&self) -> ClockState {
        self.lock().state
    }

    async fn resume(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.resume_calls += 1;
        let state = inner.state;
        match state {
            ClockState::Closed => Err(Error::ClockClosed),
            _ if inner.deny_resume => Err(Error::ClockResumeDenied("denied by test policy".to_string())),
            _ => {
                inner.state = ClockState::Running;
                Ok(())
            }
        }
    }

    fn suspend(&self) {
        let mut inner = self.lock();
        if inner.state == ClockState::Running {
            inner.state = ClockState::Suspended;
        }
    }

    fn close(&self) {
        self.lock().state = ClockState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.advance(1.5);
        clock.set(1.0);
        clock.advance(-3.0);
        assert_eq!(clock.now(), 1.5);
    }

    #[tokio::test]
    async fn test_manual_clock_deny_resume() {
        let clock = ManualClock::new();
        clock.set_deny_resume(true);
        assert!(clock.resume().await.is_err());
        clock.set_deny_resume(false);
        assert!(clock.resume().await.is_ok());
        assert_eq!(clock.resume_calls(), 2);
        assert_eq!(clock.state(), ClockState::Running);
    }
}
