//! Supporting types for studio events

use serde::{Deserialize, Serialize};

/// Transport state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "stopped"),
            TransportState::Playing => write!(f, "playing"),
        }
    }
}

/// Drift classification for a single correction
///
/// Both severities receive the same remediation (the handle is snapped to
/// master time); the distinction exists for logging and monitoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    /// Within the gentle threshold, no action
    None,
    /// Above gentle, at or below critical
    Gentle,
    /// Above critical
    Critical,
}

impl std::fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftSeverity::None => write!(f, "none"),
            DriftSeverity::Gentle => write!(f, "gentle"),
            DriftSeverity::Critical => write!(f, "critical"),
        }
    }
}
