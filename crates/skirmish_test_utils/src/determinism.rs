//! Determinism testing utilities.
//!
//! A skirmish played sequentially with a seeded random source and a manual
//! clock must end in the same board state every time. Sources of
//! non-determinism to watch for:
//!
//! - **Entropy seeding**: every test battle sets `rng_seed`.
//! - **Wall-clock time**: cooldowns read the clock, so battles run on a
//!   [`ManualClock`] advanced by a fixed amount per round.
//! - **Map iteration order**: stores iterate in unit id order.
//!
//! Concurrent battles are not expected to be reproducible (resolution order
//! depends on scheduling); only their invariants are checked.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use skirmish_core::prelude::*;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Rounds played per run.
    pub rounds: u32,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic.
    ///
    /// # Panics
    ///
    /// Panics if runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Rounds: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.rounds,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Run a scenario several times and compare final state hashes.
///
/// `setup` builds a fresh state, `step` plays one round, `hash` digests the
/// final state.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    rounds: u32,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..rounds {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        rounds,
    }
}

/// A seeded in-memory game in progress.
pub struct SeededBattle {
    /// The service.
    pub game: Skirmish,
    /// Clock the service reads.
    pub clock: Arc<ManualClock>,
    /// Session being played.
    pub session: Session,
}

impl SeededBattle {
    /// Start a battle on a `width` x `height` board with the same roster per side.
    ///
    /// # Panics
    /// Panics if the board or roster is invalid.
    #[must_use]
    pub fn start(seed: u64, width: u16, height: u16, roster: Roster) -> Self {
        let clock = Arc::new(ManualClock::default());
        let config = EngineConfig {
            rng_seed: Some(seed),
            ..EngineConfig::default()
        };
        let game = Skirmish::in_memory_with_clock(config, clock.clone());
        let session = game
            .new_game(width, height, roster, roster)
            .expect("battle setup must be valid");
        Self {
            game,
            clock,
            session,
        }
    }

    /// Issue one random command per ACTIVE unit, white first, then advance
    /// the clock past every cooldown.
    pub fn play_round(&self) {
        for faction in Faction::ALL {
            let units = self
                .game
                .units_of(self.session.id, faction)
                .expect("session exists");
            for unit in units.iter().filter(|u| u.is_active()) {
                // Rejections are part of play; only the final state matters.
                let _ = self.game.random_command(unit.id(), faction);
            }
        }
        self.clock.advance(Duration::from_secs(15));
    }

    /// Hash of every unit's observable state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for faction in Faction::ALL {
            for unit in self.game.units_of(self.session.id, faction).unwrap_or_default() {
                unit.id().hash(&mut hasher);
                unit.position().hash(&mut hasher);
                unit.status().hash(&mut hasher);
                unit.command_count().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Play the same seeded battle `runs` times in sequence.
pub fn verify_seeded_battle(seed: u64, runs: usize, rounds: u32) -> DeterminismResult {
    verify_determinism(
        runs,
        rounds,
        || SeededBattle::start(seed, 10, 10, Roster::new(4, 3, 2)),
        |battle| battle.play_round(),
        SeededBattle::state_hash,
    )
}

/// Play the same seeded battle on `threads` threads at once.
///
/// Each thread owns its battle, so results must still match.
pub fn verify_seeded_battle_parallel(seed: u64, threads: usize, rounds: u32) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(move || {
                    let battle = SeededBattle::start(seed, 10, 10, Roster::new(4, 3, 2));
                    for _ in 0..rounds {
                        battle.play_round();
                    }
                    battle.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        rounds,
    }
}
