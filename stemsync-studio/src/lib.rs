//! # stemsync studio engine
//!
//! Keeps several independently loaded stem players phase-aligned during
//! playback, corrects drift against a single clock and progressively caches
//! and prefetches stem audio.
//!
//! **Architecture:**
//! - `clock`: the playback time authority
//! - `transport`: play/pause/seek state machine over registered handles
//! - `sync`: per-frame drift correction and the coarse sync check
//! - `cache` / `loader`: cache-first stem loading and prefetch
//! - `controls` / `mixer`: rate-limited volume and seek propagation
//! - `session`: composition root

pub mod cache;
pub mod clock;
pub mod config;
pub mod controls;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod media;
pub mod mixer;
pub mod peaks;
pub mod session;
pub mod stem;
pub mod sync;
pub mod synth;
pub mod transport;

pub use config::StudioConfig;
pub use error::{Error, Result};
pub use session::{StudioSession, StudioSessionBuilder};
pub use stem::{Stem, StemId, StemType};
pub use transport::MasterTransport;
