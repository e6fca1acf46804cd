//! stemsync-sim - Studio engine simulator
//!
//! Builds a studio session over simulated stem players whose playback rate
//! is slightly off, plays for a while and prints a JSON report of the drift
//! corrections and sync checks the engine performed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use stemsync_common::config::{load_or_default, CONFIG_ENV_VAR};
use stemsync_common::events::{DriftSeverity, EventBus, StudioEvent};
use stemsync_studio::clock::{shared_clock, ClockSource};
use stemsync_studio::fetch::StaticFetcher;
use stemsync_studio::media::{MediaHandle, SharedHandle, SimulatedMedia};
use stemsync_studio::synth::sine_wav;
use stemsync_studio::{Stem, StudioConfig, StudioSession};
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SAMPLE_RATE: u32 = 8000;

/// Command-line arguments for stemsync-sim
#[derive(Parser, Debug)]
#[command(name = "stemsync-sim")]
#[command(about = "Simulate multi-stem playback and report drift correction")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated stem types, one simulated stem each
    #[arg(long, default_value = "drums,vocals,other,bass", value_delimiter = ',')]
    stems: Vec<String>,

    /// Track duration in seconds
    #[arg(long, default_value_t = 30.0)]
    duration: f64,

    /// Wall-clock playback time in seconds
    #[arg(long, default_value_t = 3.0)]
    play_secs: f64,

    /// Playback rate override, `stem=rate` (repeatable)
    #[arg(long = "rate", value_parser = parse_rate)]
    rates: Vec<(String, f64)>,

    /// Stem that never becomes ready
    #[arg(long)]
    stalled: Option<String>,

    /// Seek to this position halfway through playback
    #[arg(long)]
    seek: Option<f64>,
}

fn parse_rate(s: &str) -> std::result::Result<(String, f64), String> {
    let (stem, rate) = s
        .split_once('=')
        .ok_or_else(|| format!("expected stem=rate, got '{}'", s))?;
    let rate: f64 = rate
        .parse()
        .map_err(|e| format!("invalid rate '{}': {}", rate, e))?;
    if rate <= 0.0 {
        return Err(format!("rate must be positive, got {}", rate));
    }
    Ok((stem.to_string(), rate))
}

/// Default drift injected when no override is given: alternating +/-1% steps
fn default_rate(index: usize) -> f64 {
    if index == 0 {
        return 1.0;
    }
    let step = 0.01 * index.div_ceil(2) as f64;
    if index % 2 == 1 {
        1.0 + step
    } else {
        1.0 - step
    }
}

#[derive(Debug, Default, Serialize)]
struct StemReport {
    rate: f64,
    ready: bool,
    gentle_corrections: u32,
    critical_corrections: u32,
    final_drift_ms: f64,
}

#[derive(Debug, Default, Serialize)]
struct EventTally {
    drift_corrections: BTreeMap<String, (u32, u32)>,
    sync_checks: u32,
    out_of_sync: u32,
    realigned: usize,
    stems_loaded: u32,
    cache_stores: u32,
    lagged: u64,
}

impl EventTally {
    fn record(&mut self, event: &StudioEvent) {
        match event {
            StudioEvent::DriftCorrected { stem_id, severity, .. } => {
                let entry = self.drift_corrections.entry(stem_id.clone()).or_default();
                match severity {
                    DriftSeverity::Critical => entry.1 += 1,
                    _ => entry.0 += 1,
                }
            }
            StudioEvent::SyncCheck { in_sync, realigned, .. } => {
                self.sync_checks += 1;
                if !in_sync {
                    self.out_of_sync += 1;
                }
                self.realigned += realigned;
            }
            StudioEvent::StemLoaded { .. } => self.stems_loaded += 1,
            StudioEvent::CacheStored { .. } => self.cache_stores += 1,
            _ => {}
        }
    }
}

#[derive(Debug, Serialize)]
struct SimReport {
    session_id: String,
    position: f64,
    duration: f64,
    prefetched: Vec<String>,
    stems: BTreeMap<String, StemReport>,
    sync_checks: u32,
    out_of_sync: u32,
    realigned: usize,
    stems_loaded: u32,
    cache_stores: u32,
    events_lagged: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config: StudioConfig = load_or_default(args.config.as_deref(), CONFIG_ENV_VAR)
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = format!(
        "stemsync_studio={level},stemsync_sim={level},stemsync_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        stems = ?args.stems,
        duration = args.duration,
        play_secs = args.play_secs,
        "Starting stemsync simulator"
    );

    // Composition root owns the process-wide clock
    let clock: Arc<dyn ClockSource> = shared_clock();
    let events = Arc::new(EventBus::new(4096));

    // Synthetic payloads stand in for the CDN
    let fetcher = Arc::new(StaticFetcher::new());
    let stems: Vec<Stem> = args
        .stems
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Stem::from_type_name(
                name.as_str(),
                name,
                format!("memory://stems/{}-{}.wav", i, name),
            )
        })
        .collect();
    for (i, stem) in stems.iter().enumerate() {
        let wav = sine_wav(110.0 * (i as f32 + 1.0), args.duration, SAMPLE_RATE, 0.6)
            .with_context(|| format!("Failed to synthesize payload for {}", stem.id))?;
        fetcher.insert(stem.source_url.clone(), wav);
    }

    let session = StudioSession::builder(config)
        .clock(Arc::clone(&clock))
        .fetcher(fetcher)
        .events(Arc::clone(&events))
        .build()
        .await
        .context("Failed to build studio session")?;

    // Collect events until told to stop
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let collector = tokio::spawn(collect_events(events.subscribe(), stop_rx));

    // Simulated players with injected rate error
    let mut handles: BTreeMap<String, (f64, Arc<SimulatedMedia>)> = BTreeMap::new();
    let mut attachments: Vec<(Stem, SharedHandle)> = Vec::new();
    for (i, stem) in stems.iter().enumerate() {
        let rate = args
            .rates
            .iter()
            .find(|(name, _)| name == stem.id.as_str())
            .map(|(_, rate)| *rate)
            .unwrap_or_else(|| default_rate(i));
        let mut media =
            SimulatedMedia::new(stem.id.as_str(), Arc::clone(&clock), args.duration).with_rate(rate);
        if args.stalled.as_deref() == Some(stem.id.as_str()) {
            warn!(stem = %stem.id, "Simulating a stem that never becomes ready");
            media = media.never_ready();
        }
        let media = Arc::new(media);
        handles.insert(stem.id.to_string(), (rate, Arc::clone(&media)));
        attachments.push((stem.clone(), media as SharedHandle));
    }

    let prefetched = session.prefetch_stems(&stems).await;
    let attached = session.attach(&attachments).await;
    info!(attached, "Stems attached");

    session.play(None).await.context("Playback failed to start")?;

    let play_time = Duration::from_secs_f64(args.play_secs.max(0.0));
    match args.seek {
        Some(position) => {
            tokio::time::sleep(play_time / 2).await;
            info!(position, "Seeking");
            session.seek(position);
            tokio::time::sleep(play_time / 2).await;
        }
        None => tokio::time::sleep(play_time).await,
    }

    let position = session.current_time();
    let mut stem_reports = BTreeMap::new();
    for (name, (rate, media)) in &handles {
        stem_reports.insert(
            name.clone(),
            StemReport {
                rate: *rate,
                ready: media.is_ready(),
                final_drift_ms: if media.is_ready() {
                    (media.position() - position) * 1000.0
                } else {
                    0.0
                },
                ..Default::default()
            },
        );
    }

    session.pause();
    session.wait_for_background().await;
    session.shutdown();

    // The collector may already have exited if the channel closed
    let _ = stop_tx.send(());
    let tally = collector.await.context("Event collector failed")?;

    for (name, (gentle, critical)) in &tally.drift_corrections {
        if let Some(report) = stem_reports.get_mut(name) {
            report.gentle_corrections = *gentle;
            report.critical_corrections = *critical;
        }
    }

    let report = SimReport {
        session_id: session.session_id().to_string(),
        position,
        duration: session.duration(),
        prefetched,
        stems: stem_reports,
        sync_checks: tally.sync_checks,
        out_of_sync: tally.out_of_sync,
        realigned: tally.realigned,
        stems_loaded: tally.stems_loaded,
        cache_stores: tally.cache_stores,
        events_lagged: tally.lagged,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    info!("Simulation complete");
    Ok(())
}

async fn collect_events(
    mut rx: broadcast::Receiver<StudioEvent>,
    mut stop: oneshot::Receiver<()>,
) -> EventTally {
    let mut tally = EventTally::default();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            received = rx.recv() => match received {
                Ok(event) => tally.record(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => tally.lagged += missed,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    // Drain whatever was already queued
    while let Ok(event) = rx.try_recv() {
        tally.record(&event);
    }
    tally
}
