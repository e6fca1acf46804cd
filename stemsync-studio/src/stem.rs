//! Stem descriptors and prefetch priority

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::str::FromStr;

/// Stable stem identifier supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StemId(String);

impl StemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for StemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Semantic stem type
///
/// Declaration order is prefetch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemType {
    Vocals,
    Bass,
    Drums,
    Guitar,
    Piano,
    Instrumental,
    Strings,
    Synth,
    Other,
    Unknown,
}

impl StemType {
    /// Prefetch priority (0 = fetched first)
    pub fn priority(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StemType::Vocals => "vocals",
            StemType::Bass => "bass",
            StemType::Drums => "drums",
            StemType::Guitar => "guitar",
            StemType::Piano => "piano",
            StemType::Instrumental => "instrumental",
            StemType::Strings => "strings",
            StemType::Synth => "synth",
            StemType::Other => "other",
            StemType::Unknown => "unknown",
        }
    }
}

impl FromStr for StemType {
    type Err = std::convert::Infallible;

    /// Parse a stem type name; unrecognized names map to `Unknown`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parsed = match s.trim().to_ascii_lowercase().as_str() {
            "vocals" | "vocal" | "voice" | "lead_vocal" | "backing_vocals" => StemType::Vocals,
            "bass" => StemType::Bass,
            "drums" | "drum" | "percussion" => StemType::Drums,
            "guitar" | "guitars" => StemType::Guitar,
            "piano" | "keys" => StemType::Piano,
            "instrumental" | "instrument" | "accompaniment" => StemType::Instrumental,
            "strings" => StemType::Strings,
            "synth" | "synthesizer" => StemType::Synth,
            "other" => StemType::Other,
            _ => StemType::Unknown,
        };
        Ok(parsed)
    }
}

impl std::fmt::Display for StemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named audio part belonging to a track
///
/// Immutable once created; owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stem {
    pub id: StemId,
    pub stem_type: StemType,
    pub source_url: String,
}

impl Stem {
    pub fn new(id: impl Into<StemId>, stem_type: StemType, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stem_type,
            source_url: source_url.into(),
        }
    }

    /// Build a stem whose type is parsed from a free-form name
    pub fn from_type_name(id: impl Into<StemId>, type_name: &str, source_url: impl Into<String>) -> Self {
        let stem_type = type_name.parse().unwrap_or(StemType::Unknown);
        Self::new(id, stem_type, source_url)
    }

    /// Shape check used before touching a handle
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidStem(format!("empty id for {}", self.source_url)));
        }
        if self.source_url.trim().is_empty() {
            return Err(Error::InvalidStem(format!("empty source URL for '{}'", self.id)));
        }
        Ok(())
    }

    pub fn is_well_formed(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Stable sort by prefetch priority (ties keep input order)
pub fn order_by_priority(stems: &[Stem]) -> Vec<Stem> {
    let mut ordered = stems.to_vec();
    ordered.sort_by_key(|s| s.stem_type.priority());
    ordered
}
