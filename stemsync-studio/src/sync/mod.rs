//! Drift measurement and correction
//!
//! Two cooperating mechanisms keep handle positions aligned with master
//! time:
//! - [`DriftCorrector`] runs once per frame and snaps any handle whose
//!   position diverges from master time beyond a threshold
//! - [`check_sync`] runs out-of-band at a coarse interval and compares
//!   handles against one another

mod checker;
mod drift;

pub use checker::{check_sync, resync_to_reference, SyncStatus};
pub use drift::{Correction, CorrectionReport, DriftCorrector, DriftThresholds};
