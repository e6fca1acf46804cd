//! Coarse inter-handle sync check

use crate::media::SharedHandle;
use crate::stem::StemId;

/// Result of comparing ready handles against one another
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub in_sync: bool,
    /// Largest pairwise drift among ready handles, in seconds
    pub max_drift: f64,
    /// First ready handle in registration order
    pub reference: Option<StemId>,
    /// Position of the reference handle when measured
    pub reference_position: f64,
    pub ready: usize,
}

/// Measure the maximum pairwise drift among ready handles
///
/// Fewer than two ready handles is trivially in sync. The maximum pairwise
/// distance equals the spread between the furthest-apart positions.
pub fn check_sync(handles: &[(StemId, SharedHandle)], threshold: f64) -> SyncStatus {
    let mut reference: Option<(&StemId, f64)> = None;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut ready = 0;

    for (stem_id, handle) in handles.iter().filter(|(_, h)| h.is_ready()) {
        let position = handle.position();
        if reference.is_none() {
            reference = Some((stem_id, position));
        }
        min = min.min(position);
        max = max.max(position);
        ready += 1;
    }

    let max_drift = if ready < 2 { 0.0 } else { max - min };

    SyncStatus {
        in_sync: max_drift <= threshold,
        max_drift,
        reference: reference.map(|(id, _)| id.clone()),
        reference_position: reference.map(|(_, p)| p).unwrap_or(0.0),
        ready,
    }
}

/// Align every ready handle other than the reference to its position
///
/// Returns the number of handles moved.
pub fn resync_to_reference(handles: &[(StemId, SharedHandle)], status: &SyncStatus) -> usize {
    let Some(reference) = &status.reference else {
        return 0;
    };

    let mut moved = 0;
    for (stem_id, handle) in handles {
        if stem_id == reference || !handle.is_ready() {
            continue;
        }
        handle.set_position(status.reference_position);
        moved += 1;
    }
    moved
}
