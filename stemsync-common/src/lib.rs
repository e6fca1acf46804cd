//! # stemsync Common Library
//!
//! Shared code for the stemsync crates:
//! - Error types
//! - Configuration file resolution and TOML loading
//! - Event types (StudioEvent enum) and the EventBus
//! - Timestamp helpers
//! - Cache key derivation

pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, StudioEvent};
