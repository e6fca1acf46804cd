//! Error types for stemsync-studio
//!
//! Only clock failures are fatal to a caller-facing operation. Everything
//! else is per-handle or best-effort and is logged, not returned, at the
//! boundary where it occurs.

use thiserror::Error;

/// Main error type for the studio engine
#[derive(Error, Debug)]
pub enum Error {
    /// The platform refused to start the audio clock (autoplay restriction)
    #[error("Clock resume denied: {0}")]
    ClockResumeDenied(String),

    /// The clock has been closed and cannot be resumed
    #[error("Clock closed")]
    ClockClosed,

    /// A single media handle failed (play rejected, source error)
    #[error("Media handle error for stem '{stem_id}': {message}")]
    Handle { stem_id: String, message: String },

    /// Stem descriptor is malformed (empty id or URL)
    #[error("Invalid stem: {0}")]
    InvalidStem(String),

    /// Fetch failed at the HTTP layer
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Fetch failed for a non-HTTP reason
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Audio payload could not be decoded
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Cache store failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization of cache metadata
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the common crate
    #[error(transparent)]
    Common(#[from] stemsync_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the studio Error
pub type Result<T> = std::result::Result<T, Error>;
