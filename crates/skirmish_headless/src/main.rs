//! Headless skirmish battle runner.
//!
//! # Usage
//!
//! ```bash
//! # Play a default 8x8 battle and print the report as JSON
//! cargo run -p skirmish_headless -- battle
//!
//! # Bigger battle on 8 workers, saved to a file
//! cargo run -p skirmish_headless -- battle --width 16 --height 16 --archers 10 \
//!     --transports 6 --cannons 4 --workers 8 --output results/battle.json
//!
//! # Check a config file
//! cargo run -p skirmish_headless -- check-config engine.ron
//! ```
//!
//! Reports go to stdout (or `--output`); logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_core::prelude::{EngineConfig, Roster};
use skirmish_headless::battle::{run_battle, BattleConfig};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish battle runner for soak testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one random battle
    Battle {
        /// Board columns
        #[arg(long, default_value = "8")]
        width: u16,

        /// Board rows
        #[arg(long, default_value = "8")]
        height: u16,

        /// Archers per side
        #[arg(long, default_value = "3")]
        archers: u16,

        /// Transports per side
        #[arg(long, default_value = "2")]
        transports: u16,

        /// Cannons per side
        #[arg(long, default_value = "1")]
        cannons: u16,

        /// Maximum rounds to play
        #[arg(short, long, default_value = "50")]
        rounds: u32,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        workers: usize,

        /// Simulated seconds between rounds
        #[arg(long, default_value = "15")]
        secs_per_round: u64,

        /// Engine config file (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Reject commands still on cooldown
        #[arg(long)]
        enforce_cooldowns: bool,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate an engine config file
    CheckConfig {
        /// Config file (RON)
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Battle {
            width,
            height,
            archers,
            transports,
            cannons,
            rounds,
            seed,
            workers,
            secs_per_round,
            config,
            enforce_cooldowns,
            output,
        } => {
            let mut engine = load_engine_config(config);
            engine.enforce_cooldowns |= enforce_cooldowns;
            let battle = BattleConfig::new(width, height)
                .with_roster(Roster::new(archers, transports, cannons))
                .with_rounds(rounds)
                .with_seed(seed)
                .with_workers(workers)
                .with_secs_per_round(secs_per_round)
                .with_engine_config(engine);
            cmd_battle(&battle, output);
        }
        Commands::CheckConfig { path } => cmd_check_config(&path),
    }
}

fn load_engine_config(path: Option<PathBuf>) -> EngineConfig {
    let Some(path) = path else {
        return EngineConfig::default();
    };
    match EngineConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load engine config");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

/// Play one battle and emit its report
fn cmd_battle(config: &BattleConfig, output: Option<PathBuf>) {
    let report = match run_battle(config) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Battle failed");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = report.save(&path) {
                tracing::error!(error = %e, path = %path.display(), "Failed to save report");
                eprintln!("FATAL: Failed to save report: {e}");
                std::process::exit(1);
            }
            tracing::info!(path = %path.display(), "Report saved");
        }
        None => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("FATAL: Failed to serialize report: {e}");
                std::process::exit(1);
            }
        },
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATTLE COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Rounds played: {}", report.rounds_played);
    eprintln!(
        "Commands: {} executed, {} rejected, {} conflicts retried, {} abandoned",
        report.outcomes.executed,
        report.outcomes.rejected,
        report.outcomes.conflicts,
        report.outcomes.abandoned
    );
    for (faction, count) in &report.survivors {
        eprintln!("  {:<6} survivors: {}", faction.short_name(), count);
    }
    match report.winner {
        Some(winner) => eprintln!("Winner: {}", winner.short_name()),
        None => eprintln!("Winner: none"),
    }
    eprintln!("Invariants held: {}", report.invariants_held);

    if !report.invariants_held {
        std::process::exit(2);
    }
}

/// Validate a config file
fn cmd_check_config(path: &std::path::Path) {
    match EngineConfig::load(path) {
        Ok(config) => {
            eprintln!("OK: {}", path.display());
            eprintln!("  board sides: {}..={}", config.min_board_side, config.max_board_side);
            eprintln!("  enforce cooldowns: {}", config.enforce_cooldowns);
            match config.rng_seed {
                Some(seed) => eprintln!("  rng seed: {seed}"),
                None => eprintln!("  rng seed: entropy"),
            }
        }
        Err(e) => {
            eprintln!("INVALID: {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}
