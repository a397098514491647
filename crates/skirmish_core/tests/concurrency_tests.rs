//! Concurrent resolution keeps the board consistent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use skirmish_core::lock::Exclusive;
use skirmish_core::prelude::*;
use skirmish_test_utils::fixtures::{
    assert_board_consistent, move_cmd, no_cooldowns, shoot_cmd, ArenaBuilder,
};

/// Execute, retrying while a concurrent write wins the race.
fn execute_with_retry(engine: &CommandEngine, unit: UnitId, command: Command) -> Result<EventRecord> {
    loop {
        match engine.execute(unit, command) {
            Err(err) if err.is_conflict() => continue,
            other => return other,
        }
    }
}

/// Unit store that rewrites the first occupant it reports, as if another
/// command saved that unit right after it was read.
struct InterleavedWrites {
    inner: InMemoryUnitStore,
    armed: AtomicBool,
}

impl InterleavedWrites {
    fn new() -> Self {
        Self {
            inner: InMemoryUnitStore::new(),
            armed: AtomicBool::new(true),
        }
    }
}

impl UnitStore for InterleavedWrites {
    fn get_for_update(&self, id: UnitId) -> Result<Exclusive<'_, UnitId, Unit>> {
        self.inner.get_for_update(id)
    }

    fn get(&self, id: UnitId) -> Result<Unit> {
        self.inner.get(id)
    }

    fn find_active_at(&self, session: SessionId, position: Position) -> Option<Unit> {
        let found = self.inner.find_active_at(session, position);
        if let Some(occupant) = &found {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.inner.save(occupant).unwrap();
            }
        }
        found
    }

    fn count_active(&self, session: SessionId, faction: Faction) -> usize {
        self.inner.count_active(session, faction)
    }

    fn save_all_with(&self, units: &[Unit], publish: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        self.inner.save_all_with(units, publish)
    }

    fn insert_all(&self, spawns: &[UnitSpawnParams]) -> Result<Vec<Unit>> {
        self.inner.insert_all(spawns)
    }

    fn list_by_session(&self, session: SessionId) -> Vec<Unit> {
        self.inner.list_by_session(session)
    }

    fn list_by_session_and_faction(&self, session: SessionId, faction: Faction) -> Vec<Unit> {
        self.inner.list_by_session_and_faction(session, faction)
    }
}

#[test]
fn stale_victim_rejects_the_whole_resolution() {
    let units = Arc::new(InterleavedWrites::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let events = Arc::new(InMemoryEventLog::new());
    let clock = Arc::new(ManualClock::default());
    let session = sessions
        .create(Board::new(8, 8), SessionStatus::Active, clock.now())
        .unwrap();
    let placed = units
        .insert_all(&[
            UnitSpawnParams {
                session: session.id,
                faction: Faction::White,
                kind: UnitKind::Cannon,
                position: Position::new(1, 1),
            },
            UnitSpawnParams {
                session: session.id,
                faction: Faction::Black,
                kind: UnitKind::Archer,
                position: Position::new(3, 3),
            },
        ])
        .unwrap();
    let (cannon, victim) = (placed[0].id(), placed[1].id());
    let engine = CommandEngine::new(
        units.clone(),
        sessions,
        events.clone(),
        clock,
        EngineConfig::default(),
    );
    let shot = shoot_cmd(2, 2, Faction::White, CommandKind::CannonShoot);

    let err = engine.execute(cannon, shot).unwrap_err();
    assert!(err.is_conflict(), "expected a conflict, got {err}");
    assert!(events.is_empty());
    assert_eq!(units.get(cannon).unwrap(), placed[0]);
    let survivor = units.get(victim).unwrap();
    assert!(survivor.is_active());
    assert_eq!(survivor.version(), 1);

    // A retry reads the fresh victim and goes through.
    engine.execute(cannon, shot).unwrap();
    assert!(!units.get(victim).unwrap().is_active());
    assert_eq!(units.get(cannon).unwrap().command_count(), 1);
    assert_eq!(events.len(), 1);
}

#[test]
fn racing_movers_never_share_a_cell() {
    for _ in 0..50 {
        let arena = Arc::new(
            ArenaBuilder::new(8, 8)
                .with_config(no_cooldowns())
                .with_unit(Faction::White, UnitKind::Transport, 0, 0)
                .with_unit(Faction::Black, UnitKind::Transport, 2, 0)
                .build(),
        );
        let barrier = Arc::new(Barrier::new(2));

        let orders = [
            (arena.id(0), move_cmd(Direction::Right, 1, Faction::White, CommandKind::TransportMove)),
            (arena.id(1), move_cmd(Direction::Left, 1, Faction::Black, CommandKind::TransportMove)),
        ];
        let handles: Vec<_> = orders
            .into_iter()
            .map(|(unit, command)| {
                let arena = Arc::clone(&arena);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    execute_with_retry(&arena.engine, unit, command)
                })
            })
            .collect();
        for handle in handles {
            // The loser may have been destroyed before it got to run.
            match handle.join().unwrap() {
                Ok(_) | Err(GameError::IllegalMove(IllegalMove::UnitDestroyed(_))) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        arena.assert_consistent();
        let units = arena.all_units();
        let alive: Vec<_> = units.iter().filter(|u| u.is_active()).collect();
        assert_eq!(alive.len(), 1, "exactly one transport survives the collision");
        assert_eq!(alive[0].position(), Position::new(1, 0));
    }
}

#[test]
fn commands_on_one_unit_are_serialized() {
    const THREADS: usize = 8;
    const PAIRS: usize = 25;

    let arena = Arc::new(
        ArenaBuilder::new(20, 20)
            .with_config(no_cooldowns())
            .with_unit(Faction::White, UnitKind::Transport, 10, 10)
            .build(),
    );
    let transport = arena.id(0);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let arena = Arc::clone(&arena);
            thread::spawn(move || {
                let right = move_cmd(Direction::Right, 1, Faction::White, CommandKind::TransportMove);
                let left = move_cmd(Direction::Left, 1, Faction::White, CommandKind::TransportMove);
                for _ in 0..PAIRS {
                    arena.engine.execute(transport, right).unwrap();
                    arena.engine.execute(transport, left).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let unit = arena.unit(transport);
    let expected = u32::try_from(THREADS * PAIRS * 2).unwrap();
    assert_eq!(unit.command_count(), expected);
    assert_eq!(unit.position(), Position::new(10, 10));
    assert_eq!(arena.events.len(), THREADS * PAIRS * 2);
    assert_eq!(unit.version(), u64::from(expected));
}

#[test]
fn random_melee_keeps_invariants() {
    let config = EngineConfig {
        enforce_cooldowns: false,
        rng_seed: Some(11),
        ..EngineConfig::default()
    };
    let game = Arc::new(Skirmish::in_memory(config));
    let session = game
        .new_game(6, 6, Roster::new(4, 4, 2), Roster::new(4, 4, 2))
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let game = Arc::clone(&game);
            thread::spawn(move || {
                let faction = Faction::ALL[worker % 2];
                for _ in 0..60 {
                    for unit in game.units_of(session.id, faction).unwrap() {
                        if !unit.is_active() {
                            continue;
                        }
                        match game.random_command(unit.id(), faction) {
                            Ok(_) | Err(GameError::IllegalMove(_) | GameError::Conflict { .. }) => {}
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut units = game.units_of(session.id, Faction::White).unwrap();
    units.extend(game.units_of(session.id, Faction::Black).unwrap());
    assert_board_consistent(session.board, &units);

    // Every recorded event is one increment of one unit's counter.
    let total_commands: usize = units
        .iter()
        .map(|u| usize::try_from(u.command_count()).unwrap())
        .sum();
    assert_eq!(game.history().unwrap().len(), total_commands);
}

#[test]
fn new_game_waits_for_in_flight_commands() {
    let config = EngineConfig {
        enforce_cooldowns: false,
        rng_seed: Some(5),
        ..EngineConfig::default()
    };
    let game = Arc::new(Skirmish::in_memory(config));
    let first = game
        .new_game(8, 8, Roster::new(3, 3, 0), Roster::new(3, 3, 0))
        .unwrap();

    let barrier = Arc::new(Barrier::new(3));
    let workers: Vec<_> = Faction::ALL
        .into_iter()
        .map(|faction| {
            let game = Arc::clone(&game);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                loop {
                    for unit in game.units_of(first.id, faction).unwrap() {
                        match game.random_command(unit.id(), faction) {
                            Err(GameError::IllegalMove(IllegalMove::SessionNotAccepting { .. })) => return,
                            Ok(_) | Err(GameError::IllegalMove(_) | GameError::Conflict { .. }) => {}
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    let second = game
        .new_game(8, 8, Roster::new(1, 0, 0), Roster::new(1, 0, 0))
        .unwrap();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(game.session(first.id).unwrap().status, SessionStatus::Aborted);
    assert_eq!(game.active_session().unwrap().id, second.id);

    let history = game.history().unwrap();
    let mut old_units = game.units_of(first.id, Faction::White).unwrap();
    old_units.extend(game.units_of(first.id, Faction::Black).unwrap());
    let old_commands: usize = old_units
        .iter()
        .map(|u| usize::try_from(u.command_count()).unwrap())
        .sum();
    assert_eq!(history.for_session(first.id).len(), old_commands);
    assert!(history.for_session(second.id).is_empty());
}
