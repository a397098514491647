//! Randomness: placement draws and random commands.
//!
//! All randomness goes through a [`RandomSource`] so that seeded runs are
//! reproducible. [`ChaChaSource`] wraps a `ChaCha8Rng`; give it a seed for
//! deterministic battles.

use std::sync::{Arc, Mutex, PoisonError};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::command::{Command, CommandKind, MoveCommand, ShootCommand, MIN_MOVE_STEPS};
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::geometry::Direction;
use crate::ids::UnitId;
use crate::store::UnitStore;
use crate::unit::UnitKind;

/// Furthest offset a random shot aims at, per axis.
pub const MAX_RANDOM_SHOT: i32 = 3;

/// Source of uniform random numbers, shared between threads.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..bound`. Returns 0 when `bound` is 0.
    fn below(&self, bound: u32) -> u32;

    /// Uniform integer in `lo..=hi`.
    fn range_inclusive(&self, lo: i32, hi: i32) -> i32;

    /// Fair coin.
    fn coin_flip(&self) -> bool;
}

/// [`RandomSource`] backed by ChaCha8.
#[derive(Debug)]
pub struct ChaChaSource {
    rng: Mutex<ChaCha8Rng>,
}

impl ChaChaSource {
    /// Deterministic source: the same seed yields the same sequence.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Source seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Seeded when `seed` is given, from entropy otherwise.
    #[must_use]
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

impl RandomSource for ChaChaSource {
    fn below(&self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.with_rng(|rng| rng.gen_range(0..bound))
    }

    fn range_inclusive(&self, lo: i32, hi: i32) -> i32 {
        if lo >= hi {
            return lo;
        }
        self.with_rng(|rng| rng.gen_range(lo..=hi))
    }

    fn coin_flip(&self) -> bool {
        self.with_rng(|rng| rng.gen_bool(0.5))
    }
}

/// Builds structurally legal random commands for a unit.
///
/// The result is legal for the unit's kind but may still be rejected by the
/// engine: bounds, occupancy and cooldowns are not looked at.
pub struct RandomCommandGenerator {
    units: Arc<dyn UnitStore>,
    random: Arc<dyn RandomSource>,
}

impl RandomCommandGenerator {
    /// Create a generator reading units from `units`.
    pub fn new(units: Arc<dyn UnitStore>, random: Arc<dyn RandomSource>) -> Self {
        Self { units, random }
    }

    /// Random command for `unit_id`, issued by `issuer`.
    ///
    /// # Errors
    /// [`GameError::UnitNotFound`] if the unit does not exist,
    /// [`GameError::Forbidden`] if `issuer` does not own it.
    pub fn generate(&self, unit_id: UnitId, issuer: Faction) -> Result<Command> {
        let unit = self.units.get(unit_id)?;
        if unit.faction() != issuer {
            return Err(GameError::Forbidden {
                unit: unit_id,
                issuer,
                owner: unit.faction(),
            });
        }

        let command = match unit.kind() {
            UnitKind::Archer => {
                let direction = self.direction();
                if self.random.coin_flip() {
                    MoveCommand::new(direction, MIN_MOVE_STEPS, issuer, CommandKind::ArcherMove)?.into()
                } else {
                    let distance = self.random.range_inclusive(1, MAX_RANDOM_SHOT);
                    let (dx, dy) = direction.delta();
                    ShootCommand::new(dx * distance, dy * distance, issuer, CommandKind::ArcherShoot)?
                        .into()
                }
            }
            UnitKind::Transport => {
                let steps = u8::try_from(self.random.range_inclusive(1, 3)).unwrap_or(MIN_MOVE_STEPS);
                MoveCommand::new(self.direction(), steps, issuer, CommandKind::TransportMove)?.into()
            }
            UnitKind::Cannon => {
                let (dx, dy) = loop {
                    let dx = self.random.range_inclusive(-MAX_RANDOM_SHOT, MAX_RANDOM_SHOT);
                    let dy = self.random.range_inclusive(-MAX_RANDOM_SHOT, MAX_RANDOM_SHOT);
                    if dx != 0 || dy != 0 {
                        break (dx, dy);
                    }
                };
                ShootCommand::new(dx, dy, issuer, CommandKind::CannonShoot)?.into()
            }
        };
        tracing::trace!(unit = %unit_id, ?command, "Generated random command");
        Ok(command)
    }

    fn direction(&self) -> Direction {
        // Direction::ALL has four entries, so the index always fits.
        let index = usize::try_from(self.random.below(4)).unwrap_or(0);
        Direction::ALL.get(index).copied().unwrap_or(Direction::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;
    use crate::ids::SessionId;
    use crate::store::InMemoryUnitStore;
    use crate::unit::UnitSpawnParams;

    fn generator_with(kind: UnitKind, seed: u64) -> (RandomCommandGenerator, UnitId) {
        let store = Arc::new(InMemoryUnitStore::new());
        let unit = store
            .insert_all(&[UnitSpawnParams {
                session: SessionId::new(1),
                faction: Faction::White,
                kind,
                position: Position::new(4, 4),
            }])
            .unwrap()
            .remove(0);
        let generator = RandomCommandGenerator::new(store, Arc::new(ChaChaSource::from_seed(seed)));
        (generator, unit.id())
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = ChaChaSource::from_seed(42);
        let b = ChaChaSource::from_seed(42);
        for _ in 0..32 {
            assert_eq!(a.below(100), b.below(100));
            assert_eq!(a.range_inclusive(-3, 3), b.range_inclusive(-3, 3));
        }
    }

    #[test]
    fn test_degenerate_ranges() {
        let source = ChaChaSource::from_seed(1);
        assert_eq!(source.below(0), 0);
        assert_eq!(source.below(1), 0);
        assert_eq!(source.range_inclusive(2, 2), 2);
    }

    #[test]
    fn test_archer_commands_are_orthogonal() {
        let (generator, id) = generator_with(UnitKind::Archer, 3);
        for _ in 0..200 {
            match generator.generate(id, Faction::White).unwrap() {
                Command::Move(cmd) => {
                    assert_eq!(cmd.steps(), 1);
                    assert_eq!(Command::Move(cmd).kind(), CommandKind::ArcherMove);
                }
                Command::Shoot(cmd) => {
                    assert!(cmd.dx() == 0 || cmd.dy() == 0);
                    assert!((1..=3).contains(&cmd.distance()));
                }
            }
        }
    }

    #[test]
    fn test_transport_only_moves() {
        let (generator, id) = generator_with(UnitKind::Transport, 4);
        for _ in 0..200 {
            let command = generator.generate(id, Faction::White).unwrap();
            let Command::Move(cmd) = command else {
                panic!("transport got {command:?}");
            };
            assert!((1..=3).contains(&cmd.steps()));
            assert_eq!(command.kind(), CommandKind::TransportMove);
        }
    }

    #[test]
    fn test_cannon_never_targets_itself() {
        let (generator, id) = generator_with(UnitKind::Cannon, 5);
        for _ in 0..200 {
            let command = generator.generate(id, Faction::White).unwrap();
            let Command::Shoot(cmd) = command else {
                panic!("cannon got {command:?}");
            };
            assert!(cmd.dx() != 0 || cmd.dy() != 0);
            assert!(cmd.dx().abs() <= 3 && cmd.dy().abs() <= 3);
        }
    }

    #[test]
    fn test_wrong_issuer_forbidden() {
        let (generator, id) = generator_with(UnitKind::Archer, 6);
        assert!(matches!(
            generator.generate(id, Faction::Black),
            Err(GameError::Forbidden { owner: Faction::White, .. })
        ));
        assert!(matches!(
            generator.generate(UnitId::new(999), Faction::White),
            Err(GameError::UnitNotFound(_))
        ));
    }
}
