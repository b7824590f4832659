#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for validating wave content and replaying waves.

mod simulation;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use horde_content::WaveContent;
use tracing_subscriber::EnvFilter;

use crate::simulation::{Simulation, SimulationOptions};

#[derive(Debug, Parser)]
#[command(name = "horde", version, about = "Turn-based enemy wave tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validates a wave content file and prints a summary of its ranges.
    Check {
        /// Wave content TOML file.
        #[arg(long)]
        content: PathBuf,
    },
    /// Releases a single wave against a recording world and prints the spawn log.
    Simulate {
        /// Wave content TOML file.
        #[arg(long)]
        content: PathBuf,
        /// Level path TOML file.
        #[arg(long)]
        path: PathBuf,
        /// Turn number to spawn, starting at 1.
        #[arg(long)]
        turn: u32,
        /// Seed for the composition stream; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        /// Length of a simulated frame in milliseconds.
        #[arg(long = "tick-ms", default_value_t = 16)]
        tick_ms: u64,
        /// Cancels the wave once this much simulated time has passed.
        #[arg(long = "cancel-after-ms")]
        cancel_after_ms: Option<u64>,
    },
}

/// Entry point for the horde command-line interface.
fn main() -> Result<()> {
    init_logging();

    match Cli::parse().command {
        Command::Check { content } => check(&content),
        Command::Simulate {
            content,
            path,
            turn,
            seed,
            tick_ms,
            cancel_after_ms,
        } => {
            let options = SimulationOptions {
                turn,
                seed: seed.unwrap_or_else(rand::random),
                tick: Duration::from_millis(tick_ms.max(1)),
                cancel_after: cancel_after_ms.map(Duration::from_millis),
            };
            let report = Simulation::load(&content, &path)?.run(&options)?;
            print!("{report}");
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn check(path: &Path) -> Result<()> {
    let content = WaveContent::load(path)
        .with_context(|| format!("failed to load wave content from {}", path.display()))?;

    let scaling = content.scaling();
    println!(
        "spawn interval: {} ms",
        content.spawn_interval().as_millis()
    );
    println!(
        "scaling: count {}{:+}/turn, health {:+}, damage {:+}, speed {:+}",
        scaling.base_count,
        scaling.count_increment,
        scaling.health_increment,
        scaling.damage_increment,
        scaling.speed_increment
    );
    for range in content.waves().ranges() {
        let total = range.total_weight();
        println!("turns {}..={}:", range.start(), range.end());
        for archetype in range.archetypes() {
            let share = if total == 0 {
                0.0
            } else {
                100.0 * f64::from(archetype.spawn_weight()) / total as f64
            };
            let base = archetype.base();
            println!(
                "  {:<12} weight {:>4} ({share:>5.1}%)  hp {:.1} dmg {:.1} spd {:.2}",
                archetype.key(),
                archetype.spawn_weight(),
                base.health,
                base.damage,
                base.speed
            );
        }
    }
    Ok(())
}
