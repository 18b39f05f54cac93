//! findglow - find result highlight coordinator
//!
//! Command-line usage:
//!   findglow replay <scenario.json>   - Replay a scripted find session and print the overlay timeline
//!   findglow stylesheet               - Print the pulse stylesheet injected into the chrome

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use findglow::config::HighlightConfig;
use findglow::scenario::{self, Scenario};
use std::path::{Path, PathBuf};

/// findglow - flash a highlight around the current find result
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Highlight configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scenario against the headless chrome
    Replay {
        scenario: PathBuf,

        /// Override the highlight duration
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Let replies for superseded find commands still show a highlight
        #[arg(long)]
        keep_stale: bool,
    },
    /// Print the pulse animation stylesheet
    Stylesheet,
}

fn load_config(path: Option<&Path>) -> Result<HighlightConfig> {
    match path {
        Some(path) => HighlightConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(HighlightConfig::default()),
    }
}

async fn run_replay(path: &Path, mut config: HighlightConfig, duration_ms: Option<u64>, keep_stale: bool) -> Result<()> {
    if let Some(duration_ms) = duration_ms {
        config.duration_ms = duration_ms;
    }
    if keep_stale {
        config.discard_stale_replies = false;
    }
    config.validate().context("Invalid highlight configuration")?;

    let scenario = Scenario::from_file(path).with_context(|| format!("Failed to load scenario {}", path.display()))?;
    log::info!(
        "Replaying {} steps from {} ({}ms highlight)",
        scenario.steps.len(),
        path.display(),
        config.duration_ms
    );

    let report = scenario::replay(&scenario, config).await;

    for (at, event) in &report.timeline {
        println!("{:>8.1}ms  {}", at.as_secs_f64() * 1000.0, event);
    }

    let stats = report.stats;
    println!();
    println!(
        "find commands: {}, triggers: {}, queries: {}",
        stats.find_commands, stats.triggers, stats.queries
    );
    println!(
        "highlights: {}, no result: {}, failed: {}, stale: {}",
        stats.highlights_started, stats.no_result, stats.query_failures, stats.stale_discarded
    );
    println!("max simultaneous overlays: {}", report.max_visible);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Replay {
            scenario,
            duration_ms,
            keep_stale,
        } => run_replay(&scenario, config, duration_ms, keep_stale).await,
        Command::Stylesheet => {
            config.validate().context("Invalid highlight configuration")?;
            print!("{}", findglow::highlight::pulse_stylesheet(&config));
            Ok(())
        }
    }
}
