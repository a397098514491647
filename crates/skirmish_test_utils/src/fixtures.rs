//! Test fixtures and helpers.
//!
//! An [`Arena`] is an ACTIVE session with hand-placed units, wired to
//! in-memory stores and a manual clock, for scenario tests.

use std::collections::HashSet;
use std::sync::Arc;

use skirmish_core::prelude::*;

/// Build a move command, panicking on invalid parameters.
#[must_use]
pub fn move_cmd(direction: Direction, steps: u8, issuer: Faction, kind: CommandKind) -> Command {
    MoveCommand::new(direction, steps, issuer, kind)
        .expect("fixture move command must be valid")
        .into()
}

/// Build a shoot command, panicking on invalid parameters.
#[must_use]
pub fn shoot_cmd(dx: i32, dy: i32, issuer: Faction, kind: CommandKind) -> Command {
    ShootCommand::new(dx, dy, issuer, kind)
        .expect("fixture shoot command must be valid")
        .into()
}

/// Config with cooldowns switched off, for tests that fire many commands.
#[must_use]
pub fn no_cooldowns() -> EngineConfig {
    EngineConfig {
        enforce_cooldowns: false,
        ..EngineConfig::default()
    }
}

/// Config where the engine rejects commands still on cooldown.
#[must_use]
pub fn enforced_cooldowns() -> EngineConfig {
    EngineConfig {
        enforce_cooldowns: true,
        ..EngineConfig::default()
    }
}

/// Panic if two ACTIVE units share a cell or any ACTIVE unit is off board.
pub fn assert_board_consistent(board: Board, units: &[Unit]) {
    let mut seen = HashSet::new();
    for unit in units.iter().filter(|u| u.is_active()) {
        assert!(
            board.contains(unit.position()),
            "unit {} is off board at {}",
            unit.id(),
            unit.position()
        );
        assert!(
            seen.insert(unit.position()),
            "two ACTIVE units share cell {}",
            unit.position()
        );
    }
}

/// Builder for an [`Arena`].
#[derive(Debug, Clone)]
pub struct ArenaBuilder {
    board: Board,
    config: EngineConfig,
    placements: Vec<(Faction, UnitKind, Position)>,
}

impl ArenaBuilder {
    /// Empty arena of the given size, default config.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            board: Board::new(width, height),
            config: EngineConfig::default(),
            placements: Vec::new(),
        }
    }

    /// Use `config` for the engine.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Place a unit. Ids follow placement order.
    #[must_use]
    pub fn with_unit(mut self, faction: Faction, kind: UnitKind, x: i32, y: i32) -> Self {
        self.placements.push((faction, kind, Position::new(x, y)));
        self
    }

    /// Create the session and units.
    ///
    /// # Panics
    /// Panics if two placements share a cell.
    #[must_use]
    pub fn build(self) -> Arena {
        let units = Arc::new(InMemoryUnitStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let clock = Arc::new(ManualClock::default());

        let session = sessions
            .create(self.board, SessionStatus::Active, clock.now())
            .expect("fresh store accepts an active session");
        let spawns: Vec<UnitSpawnParams> = self
            .placements
            .iter()
            .map(|&(faction, kind, position)| UnitSpawnParams {
                session: session.id,
                faction,
                kind,
                position,
            })
            .collect();
        let placed = units
            .insert_all(&spawns)
            .expect("fixture placements must be distinct")
            .iter()
            .map(Unit::id)
            .collect();

        let engine = CommandEngine::new(
            units.clone(),
            sessions.clone(),
            events.clone(),
            clock.clone(),
            self.config,
        );
        Arena {
            engine,
            units,
            sessions,
            events,
            clock,
            session,
            placed,
        }
    }
}

/// An ACTIVE session with an engine over in-memory stores.
pub struct Arena {
    /// Engine under test.
    pub engine: CommandEngine,
    /// Unit store.
    pub units: Arc<InMemoryUnitStore>,
    /// Session store.
    pub sessions: Arc<InMemorySessionStore>,
    /// Event log.
    pub events: Arc<InMemoryEventLog>,
    /// Clock the engine reads.
    pub clock: Arc<ManualClock>,
    /// The session units were placed in.
    pub session: Session,
    /// Ids of placed units, in placement order.
    pub placed: Vec<UnitId>,
}

impl Arena {
    /// Id of the `index`-th placed unit.
    #[must_use]
    pub fn id(&self, index: usize) -> UnitId {
        self.placed[index]
    }

    /// Current state of a unit.
    ///
    /// # Panics
    /// Panics if the unit does not exist.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Unit {
        self.units.get(id).expect("unit exists")
    }

    /// Every unit of the session.
    #[must_use]
    pub fn all_units(&self) -> Vec<Unit> {
        self.units.list_by_session(self.session.id)
    }

    /// Panic if the board invariants do not hold.
    pub fn assert_consistent(&self) {
        assert_board_consistent(self.session.board, &self.all_units());
    }
}
