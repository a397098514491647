//! Random battles for soak testing.
//!
//! A battle starts one session and plays rounds: every round, each ACTIVE
//! unit of both factions receives a random command, all issued in parallel
//! on a rayon pool. Units racing each other see [`GameError::Conflict`] and
//! are retried. The simulated clock advances between rounds, so cooldowns
//! behave as in a real game without waiting for them.

use std::collections::BTreeMap;
use std::path::Path;
use std::result::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use skirmish_core::prelude::*;

/// Attempts per command before a lost write race is given up on.
pub const MAX_CONFLICT_RETRIES: u32 = 8;

/// Errors that abort a battle.
#[derive(Debug, Error)]
pub enum BattleError {
    /// The engine refused the setup.
    #[error("Engine error: {0}")]
    Game(#[from] GameError),

    /// Worker pool could not be started.
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Board columns.
    pub width: u16,
    /// Board rows.
    pub height: u16,
    /// Starting roster, the same for both factions.
    pub roster: Roster,
    /// Maximum rounds to play.
    pub rounds: u32,
    /// Seed for placement and random commands.
    pub seed: u64,
    /// Worker threads (0 = rayon default).
    pub workers: usize,
    /// Simulated seconds between rounds.
    pub secs_per_round: u64,
    /// Engine tunables. `rng_seed` is overridden by `seed`.
    pub engine: EngineConfig,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            roster: Roster::new(3, 2, 1),
            rounds: 50,
            seed: 0,
            workers: 0,
            secs_per_round: 15,
            engine: EngineConfig::default(),
        }
    }
}

impl BattleConfig {
    /// Battle on a `width` x `height` board with default settings.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the per-faction roster
    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }

    /// Set the round limit
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set simulated time per round
    pub fn with_secs_per_round(mut self, secs: u64) -> Self {
        self.secs_per_round = secs;
        self
    }

    /// Set engine config
    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// How the issued commands ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTally {
    /// Commands executed and recorded.
    pub executed: u64,
    /// Commands rejected by board state (bounds, blocking, cooldown, ...).
    pub rejected: u64,
    /// Write races lost and retried.
    pub conflicts: u64,
    /// Commands dropped after [`MAX_CONFLICT_RETRIES`] lost races.
    pub abandoned: u64,
    /// Any other error.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct AtomicTally {
    executed: AtomicU64,
    rejected: AtomicU64,
    conflicts: AtomicU64,
    abandoned: AtomicU64,
    failed: AtomicU64,
}

impl AtomicTally {
    fn snapshot(&self) -> OutcomeTally {
        OutcomeTally {
            executed: self.executed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Result of one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleReport {
    /// Configuration used
    pub config: BattleConfig,
    /// Session the battle was played in
    pub session: SessionId,
    /// Rounds actually played
    pub rounds_played: u32,
    /// Command outcomes
    pub outcomes: OutcomeTally,
    /// ACTIVE units left per faction
    pub survivors: BTreeMap<Faction, usize>,
    /// Only faction with units left, if exactly one
    pub winner: Option<Faction>,
    /// Events in the session history
    pub events: usize,
    /// Board and history invariants held at the end
    pub invariants_held: bool,
    /// Wall-clock runtime
    pub duration_seconds: f64,
}

impl BattleReport {
    /// Save report to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load report from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn issue(game: &Skirmish, unit: UnitId, faction: Faction, tally: &AtomicTally) {
    for _ in 0..MAX_CONFLICT_RETRIES {
        match game.random_command(unit, faction) {
            Ok(_) => {
                tally.executed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) if err.is_conflict() => {
                tally.conflicts.fetch_add(1, Ordering::Relaxed);
            }
            Err(GameError::IllegalMove(reason)) => {
                debug!(%unit, %reason, "Command rejected");
                tally.rejected.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => {
                warn!(%unit, error = %err, "Command failed");
                tally.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }
    tally.abandoned.fetch_add(1, Ordering::Relaxed);
}

fn active_units(game: &Skirmish, session: SessionId) -> Result<Vec<(UnitId, Faction)>, GameError> {
    let mut units = Vec::new();
    for faction in Faction::ALL {
        units.extend(
            game.units_of(session, faction)?
                .into_iter()
                .filter(Unit::is_active)
                .map(|u| (u.id(), faction)),
        );
    }
    Ok(units)
}

fn invariants_hold(game: &Skirmish, session: &Session) -> Result<bool, GameError> {
    let mut units = game.units_of(session.id, Faction::White)?;
    units.extend(game.units_of(session.id, Faction::Black)?);

    let mut cells = std::collections::HashSet::new();
    let board_ok = units
        .iter()
        .filter(|u| u.is_active())
        .all(|u| session.board.contains(u.position()) && cells.insert(u.position()));

    let commands: u64 = units.iter().map(|u| u64::from(u.command_count())).sum();
    let events = game.history().map_or(0, |h| h.for_session(session.id).len());
    Ok(board_ok && usize::try_from(commands).is_ok_and(|c| c == events))
}

/// Play a battle to completion.
///
/// Stops after `config.rounds` rounds or as soon as one faction has no
/// ACTIVE units left.
pub fn run_battle(config: &BattleConfig) -> Result<BattleReport, BattleError> {
    let start = Instant::now();
    let clock = Arc::new(ManualClock::default());
    let engine = EngineConfig {
        rng_seed: Some(config.seed),
        ..config.engine.clone()
    };
    let game = Skirmish::in_memory_with_clock(engine, clock.clone());
    let session = game.new_game(config.width, config.height, config.roster, config.roster)?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if config.workers > 0 {
        pool = pool.num_threads(config.workers);
    }
    let pool = pool.build()?;

    info!(
        session = %session.id,
        width = config.width,
        height = config.height,
        units_per_side = config.roster.total(),
        seed = config.seed,
        workers = pool.current_num_threads(),
        "Starting battle"
    );

    let tally = AtomicTally::default();
    let mut rounds_played = 0;
    while rounds_played < config.rounds {
        let units = active_units(&game, session.id)?;
        pool.install(|| {
            units
                .par_iter()
                .for_each(|&(unit, faction)| issue(&game, unit, faction, &tally));
        });
        clock.advance(Duration::from_secs(config.secs_per_round));
        rounds_played += 1;

        if rounds_played % 10 == 0 {
            debug!(round = rounds_played, outcomes = ?tally.snapshot(), "Progress");
        }
        if Faction::ALL
            .iter()
            .any(|&f| game.count_active(session.id, f) == 0)
        {
            break;
        }
    }

    let survivors: BTreeMap<Faction, usize> = Faction::ALL
        .into_iter()
        .map(|f| (f, game.count_active(session.id, f)))
        .collect();
    let mut alive = survivors
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(&faction, _)| faction);
    let winner = match (alive.next(), alive.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    };

    let invariants_held = invariants_hold(&game, &session)?;
    if !invariants_held {
        warn!(session = %session.id, "Board invariants violated");
    }
    let events = game.history().map_or(0, InMemoryEventLog::len);
    let duration_seconds = start.elapsed().as_secs_f64();
    let outcomes = tally.snapshot();

    info!(
        rounds = rounds_played,
        executed = outcomes.executed,
        rejected = outcomes.rejected,
        conflicts = outcomes.conflicts,
        winner = ?winner,
        "Battle complete in {:.2}s",
        duration_seconds
    );

    Ok(BattleReport {
        config: config.clone(),
        session: session.id,
        rounds_played,
        outcomes,
        survivors,
        winner,
        events,
        invariants_held,
        duration_seconds,
    })
}
