//! Headless battle runner for engine soak testing and CI verification.
//!
//! Plays random battles against the in-memory engine, issuing commands from
//! a worker pool so that the engine's locking and optimistic writes are
//! exercised under real contention. Each battle yields a [`BattleReport`]
//! with outcome tallies and an end-of-battle invariant check.
//!
//! # Example
//!
//! ```bash
//! # A 10x10 battle, 4 archers, 3 transports, 2 cannons per side
//! cargo run -p skirmish_headless -- battle --width 10 --height 10 \
//!     --archers 4 --transports 3 --cannons 2 --seed 7 --output results/battle.json
//!
//! # Validate an engine config file
//! cargo run -p skirmish_headless -- check-config engine.ron
//! ```

pub mod battle;

pub use battle::{run_battle, BattleConfig, BattleError, BattleReport, OutcomeTally};
