//! Panda Grasp CLI
//!
//! Loads the scene, runs the grasp policy once, prints the outcome, then
//! keeps stepping the world until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use panda_grasp_core::{GraspState, Orchestrator, OrchestratorConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Steps per idle batch after the run
const IDLE_BATCH_STEPS: u32 = 240;

#[derive(Parser)]
#[command(name = "panda-grasp")]
#[command(about = "Scripted Panda grasp-and-lift with bounded recovery", long_about = None)]
struct Cli {
    /// Offset the first grasp sideways so the recovery path runs
    #[arg(long)]
    recovery_demo: bool,

    /// JSON run configuration (policy, scene)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pace simulation steps against wall-clock time
    #[arg(long)]
    realtime: bool,

    /// Exit after the run instead of idling
    #[arg(long)]
    exit_on_finish: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<OrchestratorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => OrchestratorConfig::default(),
    };
    config.recovery_demo |= cli.recovery_demo;
    config.realtime |= cli.realtime;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(recovery_demo = config.recovery_demo, "configuration loaded");

    let mut orchestrator = Orchestrator::new(config).context("scene setup failed")?;
    let report = orchestrator.run().context("grasp run failed")?;

    println!("FSM result: {}", report.outcome);
    if report.outcome == GraspState::Fail {
        println!("Retries exhausted after {} attempts", report.retries);
    }

    if let Some(path) = &cli.report {
        let json = report.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    if cli.exit_on_finish {
        return Ok(());
    }

    info!("idling; press Ctrl-C to quit");
    loop {
        orchestrator.idle(IDLE_BATCH_STEPS)?;
    }
}
