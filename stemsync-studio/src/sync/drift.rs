//! Per-frame drift correction

use crate::media::SharedHandle;
use crate::stem::StemId;
use stemsync_common::events::DriftSeverity;
use stemsync_common::time::secs_to_ms;
use tracing::{debug, warn};

/// Drift thresholds in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftThresholds {
    /// Above this a handle is corrected (observability: gentle)
    pub gentle: f64,
    /// Above this a correction is reported as critical
    pub critical: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            gentle: 0.030,
            critical: 0.100,
        }
    }
}

impl DriftThresholds {
    pub fn from_millis(gentle_ms: u64, critical_ms: u64) -> Self {
        Self {
            gentle: gentle_ms as f64 / 1000.0,
            critical: critical_ms as f64 / 1000.0,
        }
    }

    /// Classify an absolute drift
    ///
    /// Boundaries belong to the lower band: drift exactly equal to the
    /// gentle threshold is not corrected.
    pub fn classify(&self, drift: f64) -> DriftSeverity {
        let drift = drift.abs();
        if drift > self.critical {
            DriftSeverity::Critical
        } else if drift > self.gentle {
            DriftSeverity::Gentle
        } else {
            DriftSeverity::None
        }
    }
}

/// One corrected handle
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub stem_id: StemId,
    /// Signed drift (handle position minus master) before correction
    pub drift: f64,
    pub severity: DriftSeverity,
}

/// Outcome of a single correction cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionReport {
    /// Master time read for this cycle
    pub master: f64,
    pub corrections: Vec<Correction>,
    /// Handles measured (ready, non-errored, non-zero duration)
    pub checked: usize,
    /// Handles skipped as not ready
    pub skipped: usize,
}

impl CorrectionReport {
    pub fn critical_count(&self) -> usize {
        self.corrections
            .iter()
            .filter(|c| c.severity == DriftSeverity::Critical)
            .count()
    }
}

/// Compares handle positions against master time and snaps outliers
///
/// Holds no per-cycle state; the master time is supplied by the caller so
/// that it is read exactly once per cycle.
#[derive(Debug, Clone, Default)]
pub struct DriftCorrector {
    thresholds: DriftThresholds,
}

impl DriftCorrector {
    pub fn new(thresholds: DriftThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> DriftThresholds {
        self.thresholds
    }

    /// Run one correction pass over the registered handles
    ///
    /// Handles that are not ready are skipped without being corrected or
    /// counted. Gentle and critical drift both snap to master.
    pub fn correct(&self, master: f64, handles: &[(StemId, SharedHandle)]) -> CorrectionReport {
        let mut report = CorrectionReport {
            master,
            ..Default::default()
        };

        for (stem_id, handle) in handles {
            if !handle.is_ready() {
                report.skipped += 1;
                continue;
            }
            report.checked += 1;

            let drift = handle.position() - master;
            let severity = self.thresholds.classify(drift);

            match severity {
                DriftSeverity::None => continue,
                DriftSeverity::Gentle => {
                    debug!(stem = %stem_id, drift_ms = secs_to_ms(drift), "Gentle drift correction");
                }
                DriftSeverity::Critical => {
                    warn!(stem = %stem_id, drift_ms = secs_to_ms(drift), master, "Critical drift, snapping to master");
                }
            }

            handle.set_position(master);
            report.corrections.push(Correction {
                stem_id: stem_id.clone(),
                drift,
                severity,
            });
        }

        report
    }
}
