//! Network-aware prefetch policy

use serde::{Deserialize, Serialize};

/// Snapshot of the caller's connection characteristics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConditions {
    /// Effective connection type ("slow-2g", "2g", "3g", "4g"); `None` when
    /// the platform does not report one
    pub effective_type: Option<String>,
    /// User asked for reduced data usage
    pub save_data: bool,
}

/// Suggested stem quality for the current connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioQuality::High => write!(f, "high"),
            AudioQuality::Medium => write!(f, "medium"),
            AudioQuality::Low => write!(f, "low"),
        }
    }
}

impl NetworkConditions {
    pub fn new(effective_type: impl Into<String>, save_data: bool) -> Self {
        Self {
            effective_type: Some(effective_type.into()),
            save_data,
        }
    }

    pub fn should_prefetch(&self) -> bool {
        if self.save_data {
            return false;
        }
        !matches!(self.effective_type.as_deref(), Some("slow-2g") | Some("2g"))
    }

    pub fn recommended_quality(&self) -> AudioQuality {
        match self.effective_type.as_deref() {
            None | Some("4g") => AudioQuality::High,
            Some("3g") => AudioQuality::Medium,
            Some(_) => AudioQuality::Low,
        }
    }
}
