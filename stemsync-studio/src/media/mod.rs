//! Caller-owned media endpoints
//!
//! The engine never creates or destroys media endpoints. It drives them
//! through the [`MediaHandle`] capability trait: position and volume reads
//! and writes, play/pause, readiness queries and source assignment.

mod simulated;

pub use simulated::{MediaJournal, MediaOp, SimulatedMedia};

use crate::cache::AudioBytes;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// How much data a media endpoint has buffered
///
/// Ordered: each state implies all previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// Playable source assigned to a handle
#[derive(Clone)]
pub enum MediaSource {
    /// Stream directly from the network URL
    Network(String),
    /// Play from a previously cached payload
    Cached { url: String, bytes: AudioBytes },
}

impl MediaSource {
    pub fn url(&self) -> &str {
        match self {
            MediaSource::Network(url) => url,
            MediaSource::Cached { url, .. } => url,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, MediaSource::Cached { .. })
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSource::Network(url) => f.debug_tuple("Network").field(url).finish(),
            MediaSource::Cached { url, bytes } => f
                .debug_struct("Cached")
                .field("url", url)
                .field("bytes", &format!("<{} bytes>", bytes.len()))
                .finish(),
        }
    }
}

/// Capability interface over one playable audio endpoint
///
/// All methods take `&self`; implementations use interior mutability since
/// the caller, the loader and the transport share the same handle.
#[async_trait]
pub trait MediaHandle: Send + Sync {
    /// Duration in seconds; 0.0 (or NaN) while unknown
    fn duration(&self) -> f64;

    fn ready_state(&self) -> ReadyState;

    /// Whether the endpoint is in an error state
    fn has_error(&self) -> bool;

    /// Current playback position in seconds
    fn position(&self) -> f64;

    fn set_position(&self, seconds: f64);

    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);

    /// Start playback; may be rejected by the endpoint
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn set_source(&self, source: MediaSource);

    /// Drop the assigned source and any buffered data
    fn release(&self);

    /// Buffered enough to report a meaningful position and accept writes
    ///
    /// Handles that are not ready are skipped by drift correction and by
    /// position alignment.
    fn is_ready(&self) -> bool {
        let duration = self.duration();
        self.ready_state() >= ReadyState::HaveCurrentData
            && !self.has_error()
            && duration.is_finite()
            && duration > 0.0
    }
}

/// Shared reference to a caller-owned handle
pub type SharedHandle = Arc<dyn MediaHandle>;
