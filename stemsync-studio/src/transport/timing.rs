//! Transport timing state

/// Authoritative playback timing for one session
///
/// Handle positions are followers of the position derived here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportTiming {
    pub is_playing: bool,
    /// Clock timestamp when playback (re)started
    pub start_time: f64,
    /// Track position at the last pause, seek or start
    pub pause_offset: f64,
}

impl TransportTiming {
    /// Derived track position for the given clock time
    pub fn position_at(&self, now: f64) -> f64 {
        if self.is_playing {
            self.pause_offset + (now - self.start_time)
        } else {
            self.pause_offset
        }
    }
}

/// Clamp a requested position to the playable range
///
/// No upper bound while the duration is unknown (0.0).
pub(crate) fn clamp_position(time: f64, duration: f64) -> f64 {
    let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
    if duration > 0.0 {
        time.min(duration)
    } else {
        time
    }
}
