//! One-stop facade over the engine, lifecycle and random generator.
//!
//! Every client (tests, the headless runner, a future network layer) goes
//! through the same four operations: start a game, list units, command a
//! unit, command a unit at random.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::command::Command;
use crate::config::EngineConfig;
use crate::engine::CommandEngine;
use crate::error::Result;
use crate::event::{EventRecord, EventSink, InMemoryEventLog};
use crate::factions::Faction;
use crate::ids::{SessionId, UnitId};
use crate::lifecycle::GameLifecycle;
use crate::random::{ChaChaSource, RandomCommandGenerator, RandomSource};
use crate::session::{Roster, Session};
use crate::store::{InMemorySessionStore, InMemoryUnitStore, SessionStore, UnitStore};
use crate::unit::Unit;

/// External collaborators a [`Skirmish`] is wired to.
#[derive(Clone)]
pub struct Collaborators {
    /// Unit persistence.
    pub units: Arc<dyn UnitStore>,
    /// Session persistence.
    pub sessions: Arc<dyn SessionStore>,
    /// Where executed commands are recorded.
    pub events: Arc<dyn EventSink>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Randomness for placement and random commands.
    pub random: Arc<dyn RandomSource>,
}

/// The game service.
pub struct Skirmish {
    units: Arc<dyn UnitStore>,
    engine: CommandEngine,
    lifecycle: GameLifecycle,
    generator: RandomCommandGenerator,
    history: Option<Arc<InMemoryEventLog>>,
}

impl Skirmish {
    /// Wire a service to explicit collaborators.
    #[must_use]
    pub fn new(parts: Collaborators, config: EngineConfig) -> Self {
        let engine = CommandEngine::new(
            Arc::clone(&parts.units),
            Arc::clone(&parts.sessions),
            parts.events,
            Arc::clone(&parts.clock),
            config.clone(),
        );
        let lifecycle = GameLifecycle::new(
            Arc::clone(&parts.units),
            parts.sessions,
            parts.clock,
            Arc::clone(&parts.random),
            config,
        );
        let generator = RandomCommandGenerator::new(Arc::clone(&parts.units), parts.random);
        Self {
            units: parts.units,
            engine,
            lifecycle,
            generator,
            history: None,
        }
    }

    /// In-memory service on wall-clock time.
    #[must_use]
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::in_memory_with_clock(config, Arc::new(SystemClock))
    }

    /// In-memory service on the given clock.
    ///
    /// Randomness is seeded from `config.rng_seed` when set.
    #[must_use]
    pub fn in_memory_with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let history = Arc::new(InMemoryEventLog::new());
        let parts = Collaborators {
            units: Arc::new(InMemoryUnitStore::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
            events: Arc::clone(&history) as Arc<dyn EventSink>,
            clock,
            random: Arc::new(ChaChaSource::from_optional_seed(config.rng_seed)),
        };
        let mut skirmish = Self::new(parts, config);
        skirmish.history = Some(history);
        skirmish
    }

    /// Start a new game, aborting the one in play.
    ///
    /// # Errors
    /// See [`GameLifecycle::create_session`].
    pub fn new_game(&self, width: u16, height: u16, white: Roster, black: Roster) -> Result<Session> {
        self.lifecycle.create_session(width, height, white, black)
    }

    /// Units of `faction` in `session`, ACTIVE and DESTROYED.
    ///
    /// # Errors
    /// See [`GameLifecycle::list_units`].
    pub fn units_of(&self, session: SessionId, faction: Faction) -> Result<Vec<Unit>> {
        self.lifecycle.list_units(session, faction)
    }

    /// Execute a hand-authored command.
    ///
    /// # Errors
    /// See [`CommandEngine::execute`].
    pub fn command(&self, unit: UnitId, command: Command) -> Result<EventRecord> {
        self.engine.execute(unit, command)
    }

    /// Generate a random command for `unit` and execute it.
    ///
    /// # Errors
    /// See [`RandomCommandGenerator::generate`] and [`CommandEngine::execute`].
    pub fn random_command(&self, unit: UnitId, issuer: Faction) -> Result<EventRecord> {
        let command = self.generator.generate(unit, issuer)?;
        self.engine.execute(unit, command)
    }

    /// Read one unit.
    ///
    /// # Errors
    /// [`GameError::UnitNotFound`](crate::error::GameError::UnitNotFound).
    pub fn unit(&self, id: UnitId) -> Result<Unit> {
        self.units.get(id)
    }

    /// Number of ACTIVE units of `faction` in `session`.
    #[must_use]
    pub fn count_active(&self, session: SessionId, faction: Faction) -> usize {
        self.units.count_active(session, faction)
    }

    /// The session in play, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<Session> {
        self.lifecycle.active_session()
    }

    /// Look a session up by id.
    ///
    /// # Errors
    /// [`GameError::SessionNotFound`](crate::error::GameError::SessionNotFound).
    pub fn session(&self, id: SessionId) -> Result<Session> {
        self.lifecycle.get_session(id)
    }

    /// Event history, when the service was built in memory.
    #[must_use]
    pub fn history(&self) -> Option<&InMemoryEventLog> {
        self.history.as_deref()
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        self.engine.config()
    }
}
