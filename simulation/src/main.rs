//! Regional economy simulation
//!
//! Loads the input tables and a run configuration, then simulates the
//! configured horizon and writes monthly statistics.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use simulation::{InputData, SimulationConfig, SimulationWorld};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "regional-abm")]
#[command(about = "Agent-based simulation of a regional economy with fiscal redistribution")]
struct Cli {
    /// Path to a JSON run configuration; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the input tables
    #[arg(short, long, default_value = "input")]
    data: PathBuf,

    /// Output directory for statistics and snapshots (overrides config file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Random seed (overrides config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated days (overrides config file)
    #[arg(long)]
    days: Option<u32>,

    /// Synthesise a new population even when a cached one exists
    #[arg(long)]
    force_new_population: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => {
            info!("No config file given, using defaults");
            SimulationConfig::default()
        }
    };
    if cli.output.is_some() {
        config.output_dir = cli.output;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(days) = cli.days {
        config.total_days = days;
    }
    config.force_new_population |= cli.force_new_population;

    let data = InputData::load(&cli.data)?;
    let mut world = SimulationWorld::new(config, data).context("failed to initialize the simulation")?;

    let start = std::time::Instant::now();
    world.run()?;
    let elapsed = start.elapsed();

    info!(
        "Run complete: {:?} total, {} months reported, seed {}",
        elapsed,
        world.reports().len(),
        world.seed()
    );
    Ok(())
}
