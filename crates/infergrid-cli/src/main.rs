//! infergrid — inference load-balancing simulator.
//!
//! # Usage
//!
//! ```text
//! infergrid run --config input.json --policy sjf
//! infergrid generate --servers 4 --requests 50 -o stress.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "infergrid",
    about = "InferGrid — inference workload scheduling simulator",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulation and print its summary.
    Run(commands::run::RunArgs),
    /// Write a random but reproducible workload config.
    Generate {
        /// Number of servers.
        #[arg(long, default_value = "3")]
        servers: u32,
        /// Number of requests.
        #[arg(long, default_value = "20")]
        requests: u32,
        /// Largest server capacity.
        #[arg(long, default_value = "4")]
        max_capacity: u32,
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output file. Prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.command {
        Command::Run(args) => commands::run::run(args).await,
        Command::Generate {
            servers,
            requests,
            max_capacity,
            seed,
            output,
        } => commands::generate::generate(servers, requests, max_capacity, seed, output.as_deref()),
    }
}

/// Used when `RUST_LOG` is unset. Crate targets are `infergrid_*`, so a
/// plain level covers all of them.
const DEFAULT_LOG_FILTER: &str = "info";

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => DEFAULT_LOG_FILTER.parse()?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn default_filter_is_a_plain_level() {
        let filter: tracing_subscriber::EnvFilter = DEFAULT_LOG_FILTER.parse().unwrap();
        assert_eq!(
            filter.max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::INFO)
        );
        assert!(!DEFAULT_LOG_FILTER.contains('='));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
