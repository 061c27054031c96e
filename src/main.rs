//! Enduro - Guided Endurance Session Engine
//!
//! Runs a prescription from the command line against the SQLite store, with a
//! simulated or GPX-replayed GPS track.

use anyhow::Context;
use clap::Parser;
use enduro::metrics::pacing;
use enduro::session::{
    BroadcastNotifier, Block, BlockType, Discipline, IntensityAdjustment, IntervalSpec, PhaseSpec,
    SessionDriver, SessionEngine, SessionError, SessionPrescription,
};
use enduro::storage::config::{self, AppConfig};
use enduro::storage::{queue, PersistenceGateway, PersistenceHandle, SqliteStore};
use enduro::tracking::{SimulatedLocationSource, SimulationParams};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "enduro", version, about = "Run a guided endurance session")]
struct Args {
    /// Prescription JSON file (built-in demo session if omitted)
    #[arg(long)]
    prescription: Option<PathBuf>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// GPX file to replay as the GPS track
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// Session seconds per wall-clock second
    #[arg(long, default_value_t = 1)]
    speedup: u32,

    /// Free-text feedback stored with the session
    #[arg(long)]
    feedback: Option<String>,

    /// Make the session one step easier or harder before starting
    #[arg(long)]
    intensity: Option<IntensityAdjustment>,

    /// Target pace such as "5:30/km"
    #[arg(long, value_parser = parse_target_pace)]
    target_pace: Option<u32>,
}

fn parse_target_pace(text: &str) -> Result<u32, String> {
    pacing::parse_pace(text).ok_or_else(|| format!("Invalid pace: {}", text))
}

/// Session seconds between live pacing reports.
const PACING_REPORT_SECONDS: u32 = 60;

fn demo_prescription() -> SessionPrescription {
    SessionPrescription {
        discipline: Discipline::Running,
        session_name: "Threshold intervals".to_string(),
        summary: Some("Easy warmup, 4 x 3 min in Z4, steady finish".to_string()),
        warmup: Some(PhaseSpec {
            duration_seconds: 600,
            target_zone: "Z2".to_string(),
            description: None,
            cues: vec!["Relax the shoulders".to_string()],
        }),
        main_blocks: vec![
            Block {
                id: "intervals".to_string(),
                block_type: BlockType::Intervals,
                name: "Threshold repeats".to_string(),
                duration_seconds: 1200,
                target_zone: "Z4".to_string(),
                description: None,
                cues: Vec::new(),
                rpe_target: Some(8),
                intervals: Some(IntervalSpec {
                    work_seconds: 180,
                    work_zone: "Z4".to_string(),
                    rest_seconds: 120,
                    repeats: 4,
                }),
            },
            Block {
                id: "steady".to_string(),
                block_type: BlockType::Continuous,
                name: "Steady".to_string(),
                duration_seconds: 600,
                target_zone: "Z3".to_string(),
                description: None,
                cues: Vec::new(),
                rpe_target: Some(6),
                intervals: None,
            },
        ],
        cooldown: Some(PhaseSpec {
            duration_seconds: 300,
            target_zone: "Z1".to_string(),
            description: None,
            cues: Vec::new(),
        }),
    }
}

fn load_prescription(path: Option<&PathBuf>) -> anyhow::Result<SessionPrescription> {
    let Some(path) = path else {
        return Ok(demo_prescription());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading prescription {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing prescription {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Enduro v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut app_config: AppConfig = match &args.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(path) = &args.database {
        app_config.persistence.database_path = Some(path.clone());
    }

    let mut prescription = load_prescription(args.prescription.as_ref())?;
    if let Some(direction) = args.intensity {
        match prescription.adjust_intensity(direction) {
            Ok(adjusted) => {
                for change in &adjusted.changes {
                    tracing::info!(
                        block = %change.block_id,
                        field = %change.field,
                        from = %change.old_value,
                        to = %change.new_value,
                        "Adjusted"
                    );
                }
                prescription = adjusted.prescription;
            }
            Err(SessionError::IntensityLimit(_)) => {
                tracing::warn!(%direction, "Keeping the prescription unchanged");
            }
            Err(e) => return Err(e.into()),
        }
    }
    let tick = Duration::from_secs(1) / args.speedup.max(1);

    let (handle, worker) = match SqliteStore::open(&app_config.database_path()) {
        Ok(store) => {
            let gateway = PersistenceGateway::new(Arc::new(store))
                .with_retry(app_config.persistence.retry_policy());
            let (handle, worker) = queue::channel(gateway);
            (handle, Some(worker.spawn()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database unavailable, running local-only");
            (PersistenceHandle::local_only(), None)
        }
    };

    let location = match &args.gpx {
        Some(path) => {
            let content = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            SimulatedLocationSource::from_gpx(&content)?
        }
        None => SimulatedLocationSource::new(SimulationParams {
            speed_mps: app_config.tracking.simulated_speed_mps,
            interval: tick,
            ..Default::default()
        }),
    };

    let notifier = Arc::new(BroadcastNotifier::default());
    let mut events = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(?event, "Coach"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut builder = SessionEngine::builder(prescription)
        .config(&app_config)
        .persistence(handle)
        .location(Box::new(location))
        .notifications(notifier);
    if let Some(target) = args.target_pace {
        builder = builder.target_pace(target);
    }
    let mut engine = builder.build()?;
    if let Some(text) = args.feedback {
        engine.submit_feedback(text);
    }
    engine.start()?;

    let engine = Arc::new(Mutex::new(engine));
    let pacing_report = args.target_pace.map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick * PACING_REPORT_SECONDS);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Some(check) = engine.lock().await.live_pacing() {
                    tracing::info!(
                        current = %pacing::format_pace(check.current_seconds_per_km),
                        target = %pacing::format_pace(check.target_seconds_per_km),
                        status = ?check.guidance.status,
                        sustainable = check.sustainable,
                        "Pacing"
                    );
                }
            }
        })
    });
    let snapshot = SessionDriver::new(engine.clone())
        .with_period(tick)
        .with_auto_complete(true)
        .run()
        .await;
    if let Some(task) = pacing_report {
        task.abort();
    }
    tracing::info!(phase = %snapshot.state.phase, "Session ended");

    let receipt = {
        let mut engine = engine.lock().await;

        if let Some(metrics) = engine.metrics() {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "outcome": metrics.outcome,
                    "total_duration": metrics.total_duration,
                    "blocks_completed": metrics.blocks_completed,
                    "intervals_completed": metrics.intervals_completed,
                    "zones_distribution": metrics.zones_distribution,
                    "route_stats": metrics.route_stats,
                }))?
            );

            if let Some(pace) = metrics.route_stats.as_ref().and_then(|r| r.avg_pace_min_per_km) {
                println!("Average pace: {}", pacing::format_pace(pace * 60.0));
            }
        }

        engine.take_finalize_receipt()
    };

    if let Some(receipt) = receipt {
        tracing::info!(outcome = ?receipt.outcome().await, "Final flush");
    }

    // Last reference: dropping the engine closes the queue
    drop(engine);
    if let Some(worker) = worker {
        match tokio::time::timeout(Duration::from_secs(5), worker).await {
            Ok(Ok(status)) if !status.warnings.is_empty() => {
                tracing::warn!(warnings = ?status.warnings, "Persistence reported problems");
            }
            Ok(_) => {}
            Err(_) => tracing::warn!("Persistence worker did not finish"),
        }
    }

    Ok(())
}
