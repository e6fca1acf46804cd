//! Studio engine configuration
//!
//! Loaded from TOML via `stemsync_common::config`. Every field has a
//! built-in default, so an empty (or missing) file yields a working
//! configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (simulator only)
//! 2. `STEMSYNC_CONFIG` environment variable (path to the TOML file)
//! 3. Platform config directory
//! 4. Built-in defaults

use crate::cache::CachePolicy;
use crate::controls::ControlOptions;
use crate::error::{Error, Result};
use crate::loader::LoaderOptions;
use crate::sync::DriftThresholds;
use crate::transport::TransportOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use stemsync_common::time::{millis_to_duration, ms_to_secs};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub controls: ControlsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub prefetch: PrefetchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Drift correction and loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Drift above this is corrected (milliseconds)
    #[serde(default = "default_gentle_threshold_ms")]
    pub gentle_threshold_ms: u64,

    /// Drift above this is reported as critical (milliseconds)
    #[serde(default = "default_critical_threshold_ms")]
    pub critical_threshold_ms: u64,

    /// Correction cycle period (milliseconds)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Coarse sync check period (milliseconds)
    #[serde(default = "default_sync_check_interval_ms")]
    pub sync_check_interval_ms: u64,

    /// Maximum pairwise drift tolerated by the coarse check (milliseconds)
    #[serde(default = "default_sync_check_threshold_ms")]
    pub sync_check_threshold_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gentle_threshold_ms: default_gentle_threshold_ms(),
            critical_threshold_ms: default_critical_threshold_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            sync_check_interval_ms: default_sync_check_interval_ms(),
            sync_check_threshold_ms: default_sync_check_threshold_ms(),
        }
    }
}

/// Control surface rate limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsConfig {
    #[serde(default = "default_volume_debounce_ms")]
    pub volume_debounce_ms: u64,

    #[serde(default = "default_seek_throttle_ms")]
    pub seek_throttle_ms: u64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            volume_debounce_ms: default_volume_debounce_ms(),
            seek_throttle_ms: default_seek_throttle_ms(),
        }
    }
}

/// Byte cache limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: usize,

    /// Payloads larger than this are not cached
    #[serde(default = "default_max_entry_mb")]
    pub max_entry_mb: usize,

    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Share of entries evicted when a limit is hit
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,

    /// On-disk tier location; memory only when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_size_mb: default_max_size_mb(),
            max_entry_mb: default_max_entry_mb(),
            max_age_days: default_max_age_days(),
            eviction_fraction: default_eviction_fraction(),
            directory: None,
        }
    }
}

/// Background prefetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Buckets per waveform summary
    #[serde(default = "default_waveform_buckets")]
    pub waveform_buckets: usize,

    /// Upcoming queue entries prefetched
    #[serde(default = "default_queue_ahead")]
    pub queue_ahead: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            waveform_buckets: default_waveform_buckets(),
            queue_ahead: default_queue_ahead(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_gentle_threshold_ms() -> u64 {
    30
}

fn default_critical_threshold_ms() -> u64 {
    100
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_sync_check_interval_ms() -> u64 {
    500
}

fn default_sync_check_threshold_ms() -> u64 {
    50
}

fn default_volume_debounce_ms() -> u64 {
    50
}

fn default_seek_throttle_ms() -> u64 {
    16
}

fn default_max_entries() -> usize {
    100
}

fn default_max_size_mb() -> usize {
    500
}

fn default_max_entry_mb() -> usize {
    50
}

fn default_max_age_days() -> u32 {
    14
}

fn default_eviction_fraction() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_waveform_buckets() -> usize {
    100
}

fn default_queue_ahead() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl StudioConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Common(stemsync_common::Error::Toml(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let sync = &self.sync;
        if sync.gentle_threshold_ms >= sync.critical_threshold_ms {
            return Err(Error::Config(format!(
                "gentle_threshold_ms ({}) must be less than critical_threshold_ms ({})",
                sync.gentle_threshold_ms, sync.critical_threshold_ms
            )));
        }
        for (name, value) in [
            ("sync.frame_interval_ms", sync.frame_interval_ms),
            ("sync.sync_check_interval_ms", sync.sync_check_interval_ms),
            ("controls.volume_debounce_ms", self.controls.volume_debounce_ms),
            ("controls.seek_throttle_ms", self.controls.seek_throttle_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        if !(0.0..=1.0).contains(&self.cache.eviction_fraction) || self.cache.eviction_fraction == 0.0 {
            return Err(Error::Config(format!(
                "cache.eviction_fraction ({}) must be in (0, 1]",
                self.cache.eviction_fraction
            )));
        }
        if self.cache.max_entries == 0 {
            return Err(Error::Config("cache.max_entries must be greater than 0".to_string()));
        }
        if self.prefetch.waveform_buckets == 0 {
            return Err(Error::Config("prefetch.waveform_buckets must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            thresholds: DriftThresholds::from_millis(self.sync.gentle_threshold_ms, self.sync.critical_threshold_ms),
            sync_check_threshold: ms_to_secs(self.sync.sync_check_threshold_ms as f64),
            frame_interval: millis_to_duration(self.sync.frame_interval_ms),
            sync_check_interval: millis_to_duration(self.sync.sync_check_interval_ms),
            drive_frames: true,
        }
    }

    pub fn control_options(&self) -> ControlOptions {
        ControlOptions {
            volume_debounce: millis_to_duration(self.controls.volume_debounce_ms),
            seek_throttle: millis_to_duration(self.controls.seek_throttle_ms),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::from_megabytes(
            self.cache.max_entries,
            self.cache.max_size_mb,
            self.cache.max_entry_mb,
            self.cache.max_age_days,
            self.cache.eviction_fraction,
        )
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            waveform_buckets: self.prefetch.waveform_buckets,
            metadata_poll_interval: Duration::from_millis(50),
        }
    }
}
