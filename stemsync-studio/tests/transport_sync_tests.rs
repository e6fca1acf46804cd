//! Transport and drift-correction behavior over simulated handles
//!
//! Every test drives the correction cycle by hand against a manual clock,
//! so timing is exact and nothing depends on the wall clock.

mod helpers;

use helpers::{assert_close, drain, TransportRig, FRAME};
use stemsync_common::events::{DriftSeverity, StudioEvent, TransportState};
use stemsync_studio::media::{MediaHandle, MediaJournal, MediaOp};
use stemsync_studio::sync::DriftThresholds;

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_injected_critical_drift_converges_within_two_cycles() {
    let rig = TransportRig::new();
    let vocals = rig.add("vocals", 60.0, 1.0);
    let bass = rig.add("bass", 60.0, 1.0);
    let drums = rig.add("drums", 60.0, 1.0);
    let thresholds = DriftThresholds::default();

    rig.transport.play(Some(10.0)).await.unwrap();
    rig.frame();

    bass.nudge(0.250);
    drums.nudge(-0.180);

    for _ in 0..2 {
        rig.frame();
    }

    let master = rig.transport.current_time();
    for handle in [&vocals, &bass, &drums] {
        assert!(
            (handle.position() - master).abs() <= thresholds.gentle,
            "{} still {}s away from master",
            handle.name(),
            handle.position() - master
        );
    }
}

#[tokio::test]
async fn test_rate_error_is_held_inside_critical_band() {
    let rig = TransportRig::new();
    rig.add("vocals", 120.0, 1.0);
    let other = rig.add("other", 120.0, 1.03);
    let critical = DriftThresholds::default().critical;

    rig.transport.play(None).await.unwrap();
    for _ in 0..300 {
        rig.frame();
        let drift = other.position() - rig.transport.current_time();
        assert!(drift.abs() <= critical, "drift {} escaped the critical band", drift);
    }
}

#[tokio::test]
async fn test_corrections_are_reported_with_severity() {
    let rig = TransportRig::new();
    rig.add("vocals", 60.0, 1.0);
    let bass = rig.add("bass", 60.0, 1.0);
    let mut rx = rig.events.subscribe();

    rig.transport.play(None).await.unwrap();
    rig.frame();
    bass.nudge(0.050);
    let gentle = rig.frame().expect("still playing");
    bass.nudge(0.300);
    let critical = rig.frame().expect("still playing");

    assert_eq!(gentle.corrections.len(), 1);
    assert_eq!(gentle.corrections[0].severity, DriftSeverity::Gentle);
    assert_eq!(critical.critical_count(), 1);

    let severities: Vec<DriftSeverity> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            StudioEvent::DriftCorrected { severity, .. } => Some(severity),
            _ => None,
        })
        .collect();
    assert_eq!(severities, vec![DriftSeverity::Gentle, DriftSeverity::Critical]);
}

// ============================================================================
// Transport operations
// ============================================================================

#[tokio::test]
async fn test_play_from_time_sets_exact_positions_before_first_cycle() {
    let rig = TransportRig::new();
    let journal = MediaJournal::new();
    let vocals = rig.add_journaled("vocals", 90.0, &journal);
    let bass = rig.add_journaled("bass", 90.0, &journal);

    rig.transport.play(Some(42.5)).await.unwrap();

    assert_eq!(vocals.position(), 42.5);
    assert_eq!(bass.position(), 42.5);
    assert_eq!(rig.transport.current_time(), 42.5);

    let ops = journal.ops();
    let first_play = ops
        .iter()
        .position(|op| matches!(op, MediaOp::Play { .. }))
        .expect("play issued");
    let positioned: Vec<f64> = ops[..first_play]
        .iter()
        .filter_map(|op| match op {
            MediaOp::SetPosition { position, .. } => Some(*position),
            _ => None,
        })
        .collect();
    assert_eq!(positioned, vec![42.5, 42.5]);
}

#[tokio::test]
async fn test_pause_then_play_resumes_from_paused_position() {
    let rig = TransportRig::new();
    let drums = rig.add("drums", 60.0, 1.0);

    rig.transport.play(Some(3.0)).await.unwrap();
    rig.clock.advance(2.25);
    rig.transport.pause();
    let paused_at = rig.transport.current_time();

    rig.transport.play(None).await.unwrap();
    let resumed_at = rig.transport.current_time();

    assert_close(paused_at, 5.25, 1e-9);
    assert_close(resumed_at, paused_at, 1e-9);
    assert_close(drums.position(), paused_at, 1e-9);
    assert_eq!(rig.transport.state(), TransportState::Playing);
}

#[tokio::test]
async fn test_seek_while_playing_keeps_playing() {
    let rig = TransportRig::new();
    let vocals = rig.add("vocals", 60.0, 1.0);
    let bass = rig.add("bass", 60.0, 1.0);

    rig.transport.play(None).await.unwrap();
    rig.clock.advance(4.0);
    rig.transport.seek(20.0);

    assert_eq!(rig.transport.state(), TransportState::Playing);
    assert_eq!(rig.transport.current_time(), 20.0);
    assert_eq!(vocals.position(), 20.0);
    assert_eq!(bass.position(), 20.0);

    rig.clock.advance(1.0);
    assert_close(rig.transport.current_time(), 21.0, 1e-9);
    assert!(vocals.is_playing());
}

#[tokio::test]
async fn test_toggle_alternates_state() {
    let rig = TransportRig::new();
    rig.add("vocals", 60.0, 1.0);
    let mut rx = rig.events.subscribe();

    rig.transport.toggle().await.unwrap();
    assert!(rig.transport.is_playing());
    rig.transport.toggle().await.unwrap();
    assert!(!rig.transport.is_playing());

    let changes = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, StudioEvent::TransportStateChanged { .. }))
        .count();
    assert_eq!(changes, 2);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_cached_stems_rewind_before_play_and_time_advances() {
    let rig = TransportRig::new();
    let journal = MediaJournal::new();
    for name in ["vocals", "bass", "drums"] {
        rig.add_journaled(name, 45.0, &journal);
    }

    rig.transport.play(None).await.unwrap();

    let ops = journal.ops();
    assert_eq!(ops.len(), 6);
    for op in &ops[..3] {
        assert!(matches!(op, MediaOp::SetPosition { position, .. } if *position == 0.0));
    }
    for op in &ops[3..] {
        assert!(matches!(op, MediaOp::Play { .. }));
    }

    let mut last = rig.transport.current_time();
    for _ in 0..20 {
        let report = rig.frame().expect("still playing");
        assert!(report.master > last);
        last = report.master;
    }
    assert_close(last, 20.0 * FRAME, 1e-9);
}

#[tokio::test]
async fn test_stalled_handle_is_skipped_while_others_are_corrected() {
    let rig = TransportRig::new();
    let vocals = rig.add("vocals", 60.0, 1.0);
    let bass = rig.add("bass", 60.0, 1.0);
    let stalled = rig.add_stalled("other", 60.0);

    rig.transport.play(None).await.unwrap();
    for _ in 0..10 {
        bass.nudge(0.150);
        let report = rig.frame().expect("still playing");
        assert_eq!(report.checked, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.critical_count(), 1);
    }

    let master = rig.transport.current_time();
    assert_eq!(bass.position(), master);
    assert_eq!(vocals.position(), master);
    assert!(!stalled.is_ready());
    assert_eq!(stalled.duration(), 0.0);
}

#[tokio::test]
async fn test_pause_while_stopped_is_a_no_op() {
    let rig = TransportRig::new();
    let journal = MediaJournal::new();
    rig.add_journaled("vocals", 60.0, &journal);
    rig.transport.seek(7.0);
    journal.clear();
    let mut rx = rig.events.subscribe();
    let before = rig.transport.timing_snapshot();

    rig.transport.pause();
    rig.transport.pause();

    assert_eq!(rig.transport.timing_snapshot(), before);
    assert_eq!(rig.transport.state(), TransportState::Stopped);
    assert_eq!(rig.transport.current_time(), 7.0);
    assert!(journal.ops().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_track_end_stops_transport_and_emits_event() {
    let rig = TransportRig::new();
    rig.add("vocals", 2.0, 1.0);
    let mut rx = rig.events.subscribe();

    rig.transport.play(Some(1.5)).await.unwrap();
    let mut cycles = 0;
    while rig.frame().is_some() {
        cycles += 1;
        assert!(cycles < 100, "track never ended");
    }

    assert_eq!(rig.transport.state(), TransportState::Stopped);
    assert_eq!(rig.transport.current_time(), 2.0);
    assert!(drain(&mut rx)
        .iter()
        .any(|event| matches!(event, StudioEvent::TrackEnded { .. })));
}
