//! Geofence CLI
//!
//! Replays monitoring-engine events through the dispatch pipeline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use geofence::dispatch::{
    ChannelBroadcastSink, NotificationFacility, PresentationError, TransitionPipeline,
};
use geofence::models::{FenceRecord, TransitionEvent};
use geofence::store::MemoryFenceStore;
use geofence::Config;

/// Geofence - transition dispatch for monitored regions
#[derive(Parser)]
#[command(name = "geofence")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "GEOFENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one transition event through the pipeline
    Replay {
        /// JSON array of fence records
        #[arg(long)]
        fences: PathBuf,

        /// JSON transition event
        #[arg(long)]
        event: PathBuf,
    },

    /// Check fence definitions without dispatching anything
    Validate {
        /// JSON array of fence records
        #[arg(long)]
        fences: PathBuf,
    },
}

/// Prints alerts to the log instead of the platform's notification tray
struct LogNotificationFacility;

#[async_trait::async_trait]
impl NotificationFacility for LogNotificationFacility {
    async fn present(&self, alert: &serde_json::Value) -> Result<(), PresentationError> {
        info!(alert = %alert, "Local alert");
        Ok(())
    }

    async fn dismiss(&self, ids: &[String]) -> Result<(), PresentationError> {
        info!(?ids, "Local alerts dismissed");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let result = match cli.command {
        Commands::Replay { fences, event } => run_replay(&config, &fences, &event).await,
        Commands::Validate { fences } => run_validate(&fences),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

fn read_fences(path: &Path) -> anyhow::Result<Vec<FenceRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid fences in {}", path.display()))
}

async fn run_replay(config: &Config, fences: &Path, event_path: &Path) -> anyhow::Result<()> {
    let records = read_fences(fences)?;
    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("failed to read {}", event_path.display()))?;
    let event: TransitionEvent = serde_json::from_str(&raw)
        .with_context(|| format!("invalid event in {}", event_path.display()))?;

    info!(fences = records.len(), "Replaying transition event");

    let store = Arc::new(MemoryFenceStore::from_records(records));
    let sink = Arc::new(ChannelBroadcastSink::new(config.broadcast.channel_capacity));
    let mut listener = sink.subscribe();

    let pipeline = TransitionPipeline::new(
        config,
        store,
        Arc::new(LogNotificationFacility),
        sink,
        tracing::info_span!("geofence", source = "replay"),
    )?;

    let report = pipeline.dispatch(&event).await;

    let message = listener.recv().await?;
    println!("{}", serde_json::to_string_pretty(&*message)?);

    for outcome in &report.webhooks {
        match &outcome.result {
            Ok(status) => println!("webhook {} -> {} ({status})", outcome.fence_id, outcome.url),
            Err(e) => println!("webhook {} -> {} failed: {e}", outcome.fence_id, outcome.url),
        }
    }

    Ok(())
}

fn run_validate(fences: &Path) -> anyhow::Result<()> {
    let records = read_fences(fences)?;
    let mut invalid = 0usize;

    for record in &records {
        if let Err(e) = record.validate() {
            invalid += 1;
            println!("{e}");
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} fences are invalid", records.len());
    }

    println!("{} fences OK", records.len());
    Ok(())
}
