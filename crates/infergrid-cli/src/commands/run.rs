use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::info;

use infergrid_core::{Policy, SimConfig};
use infergrid_metrics::render_report;
use infergrid_orchestrator::{Orchestrator, SimulationOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input file (.json or .toml).
    #[arg(short, long, default_value = "input.json")]
    pub config: PathBuf,

    /// Dispatch policy: rr, sjf or priority.
    #[arg(short, long, default_value = "rr", value_parser = parse_policy)]
    pub policy: Policy,

    /// Wall seconds per simulated second.
    #[arg(long)]
    pub time_scale: Option<f64>,

    /// Relative spread applied to execution times, in [0, 1).
    #[arg(long)]
    pub jitter: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Orchestrator tick in milliseconds.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Write the event log as JSON to this path.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Summary format.
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

fn parse_policy(s: &str) -> Result<Policy, String> {
    s.parse()
}

impl RunArgs {
    /// Flags take precedence over the file's `simulation` section.
    fn apply_overrides(&self, config: &mut SimConfig) {
        let sim = &mut config.simulation;
        if let Some(scale) = self.time_scale {
            sim.time_scale = scale;
        }
        if let Some(jitter) = self.jitter {
            sim.jitter = jitter;
        }
        if let Some(seed) = self.seed {
            sim.seed = seed;
        }
        if let Some(tick) = self.tick_ms {
            sim.tick_interval_ms = tick;
        }
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = SimConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply_overrides(&mut config);

    info!(
        path = %args.config.display(),
        policy = %args.policy,
        servers = config.server_config.len(),
        requests = config.request_data.len(),
        "config loaded"
    );

    let outcome = Orchestrator::new(&config, args.policy)?.run().await?;

    if let Some(path) = &args.events {
        write_events(path, &outcome)?;
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.report)?),
        OutputFormat::Text => println!("{}", render_report(&outcome.report)),
    }

    Ok(())
}

fn write_events(path: &Path, outcome: &SimulationOutcome) -> anyhow::Result<()> {
    let json = outcome.events_json()?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), events = outcome.events.len(), "event log written");
    Ok(())
}
