//! Session creation and unit placement.

use std::sync::{Arc, Mutex, PoisonError};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Result, ValidationError};
use crate::factions::Faction;
use crate::geometry::{Board, Position};
use crate::ids::SessionId;
use crate::random::RandomSource;
use crate::session::{Roster, Session, SessionStatus};
use crate::store::{SessionStore, UnitStore};
use crate::unit::{Unit, UnitSpawnParams};

/// Creates sessions and answers roster queries.
pub struct GameLifecycle {
    units: Arc<dyn UnitStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    config: EngineConfig,
    creation: Mutex<()>,
}

impl GameLifecycle {
    /// Create a lifecycle over the given collaborators.
    pub fn new(
        units: Arc<dyn UnitStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            units,
            sessions,
            clock,
            random,
            config,
            creation: Mutex::new(()),
        }
    }

    /// Start a new ACTIVE session, aborting the current one.
    ///
    /// Units are placed on distinct random cells: white first, then black,
    /// each in the order archers, transports, cannons. The current session
    /// is only aborted once placement has succeeded.
    ///
    /// # Errors
    /// [`ValidationError::BoardSize`] or [`ValidationError::RosterTooLarge`]
    /// before anything changes. Store errors are propagated.
    pub fn create_session(&self, width: u16, height: u16, white: Roster, black: Roster) -> Result<Session> {
        let board = Board::new(width, height);
        self.config.check_board(board)?;
        let requested = white.total() + black.total();
        if requested > board.capacity() {
            return Err(ValidationError::RosterTooLarge {
                requested,
                capacity: board.capacity(),
            }
            .into());
        }

        let _creating = self.creation.lock().unwrap_or_else(PoisonError::into_inner);

        // The new session stays NEW until its units are placed, so a failed
        // placement leaves the current game running.
        let mut session = self.sessions.create(board, SessionStatus::New, self.clock.now())?;
        if let Err(err) = self.place_units(&session, white, black) {
            session.status = SessionStatus::Aborted;
            if let Err(cleanup) = self.sessions.save(&session) {
                tracing::warn!(session = %session.id, error = %cleanup, "Failed to retire unplaced session");
            }
            return Err(err);
        }

        if let Some(current) = self.sessions.find_active_session() {
            // Waits for in-flight commands in that session to finish.
            let mut retiring = self.sessions.get_for_update(current.id)?;
            if retiring.status == SessionStatus::Active {
                retiring.status = SessionStatus::Aborted;
                self.sessions.save(&retiring)?;
                tracing::info!(session = %retiring.id, "Aborted superseded session");
            }
        }

        session.status = SessionStatus::Active;
        self.sessions.save(&session)?;

        tracing::info!(
            session = %session.id,
            width,
            height,
            white = white.total(),
            black = black.total(),
            "Created session"
        );
        Ok(session)
    }

    fn place_units(&self, session: &Session, white: Roster, black: Roster) -> Result<()> {
        let cells = self.sample_cells(session.board, white.total() + black.total());
        let kinds = white
            .kinds()
            .map(|kind| (Faction::White, kind))
            .chain(black.kinds().map(|kind| (Faction::Black, kind)));
        let spawns: Vec<UnitSpawnParams> = kinds
            .zip(cells)
            .map(|((faction, kind), position)| UnitSpawnParams {
                session: session.id,
                faction,
                kind,
                position,
            })
            .collect();
        self.units.insert_all(&spawns)?;
        Ok(())
    }

    /// `count` distinct cells, uniformly drawn without replacement.
    fn sample_cells(&self, board: Board, count: usize) -> Vec<Position> {
        let mut cells: Vec<Position> = board.cells().collect();
        let count = count.min(cells.len());
        for i in 0..count {
            let remaining = u32::try_from(cells.len() - i).unwrap_or(u32::MAX);
            let pick = usize::try_from(self.random.below(remaining)).unwrap_or(0);
            cells.swap(i, i + pick);
        }
        cells.truncate(count);
        cells
    }

    /// Units of `faction` in `session`, ACTIVE and DESTROYED.
    ///
    /// # Errors
    /// [`GameError::SessionNotFound`](crate::error::GameError::SessionNotFound)
    /// if the session does not exist.
    pub fn list_units(&self, session: SessionId, faction: Faction) -> Result<Vec<Unit>> {
        self.sessions.get(session)?;
        Ok(self.units.list_by_session_and_faction(session, faction))
    }

    /// The session currently in play, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<Session> {
        self.sessions.find_active_session()
    }

    /// Look a session up by id.
    ///
    /// # Errors
    /// [`GameError::SessionNotFound`](crate::error::GameError::SessionNotFound)
    /// if it does not exist.
    pub fn get_session(&self, session: SessionId) -> Result<Session> {
        self.sessions.get(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::GameError;
    use crate::ids::UnitId;
    use crate::lock::Exclusive;
    use crate::random::ChaChaSource;
    use crate::store::{InMemorySessionStore, InMemoryUnitStore};
    use crate::unit::UnitKind;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fixture(seed: u64) -> (GameLifecycle, Arc<InMemoryUnitStore>, Arc<InMemorySessionStore>) {
        let units = Arc::new(InMemoryUnitStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let lifecycle = GameLifecycle::new(
            units.clone(),
            sessions.clone(),
            Arc::new(ManualClock::default()),
            Arc::new(ChaChaSource::from_seed(seed)),
            EngineConfig::default(),
        );
        (lifecycle, units, sessions)
    }

    #[test]
    fn test_units_placed_on_distinct_cells() {
        let (lifecycle, units, _) = fixture(1);
        let session = lifecycle
            .create_session(8, 8, Roster::new(3, 2, 1), Roster::new(2, 2, 2))
            .unwrap();

        let placed = units.list_by_session(session.id);
        assert_eq!(placed.len(), 12);
        let cells: HashSet<_> = placed.iter().map(Unit::position).collect();
        assert_eq!(cells.len(), 12);
        assert!(placed.iter().all(|u| session.board.contains(u.position())));

        let white = lifecycle.list_units(session.id, Faction::White).unwrap();
        let kinds: Vec<_> = white.iter().map(Unit::kind).collect();
        assert_eq!(
            kinds,
            vec![
                UnitKind::Archer,
                UnitKind::Archer,
                UnitKind::Archer,
                UnitKind::Transport,
                UnitKind::Transport,
                UnitKind::Cannon
            ]
        );
        assert!(white.iter().all(|u| u.is_active() && u.command_count() == 0));
    }

    #[test]
    fn test_full_board_is_accepted() {
        let (lifecycle, units, _) = fixture(2);
        let session = lifecycle
            .create_session(4, 4, Roster::new(8, 0, 0), Roster::new(0, 4, 4))
            .unwrap();
        assert_eq!(units.list_by_session(session.id).len(), 16);
    }

    #[test]
    fn test_combined_roster_must_fit() {
        let (lifecycle, units, sessions) = fixture(3);
        let err = lifecycle
            .create_session(4, 4, Roster::new(9, 0, 0), Roster::new(8, 0, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::Validation(ValidationError::RosterTooLarge {
                requested: 17,
                capacity: 16
            })
        ));
        assert!(units.is_empty());
        assert!(sessions.all().is_empty());
    }

    #[test]
    fn test_board_size_bounds() {
        let (lifecycle, _, sessions) = fixture(4);
        for (w, h) in [(3, 8), (8, 3), (21, 8), (8, 21)] {
            let err = lifecycle
                .create_session(w, h, Roster::default(), Roster::default())
                .unwrap_err();
            assert!(matches!(err, GameError::Validation(ValidationError::BoardSize { .. })));
        }
        assert!(sessions.all().is_empty());
        assert!(lifecycle
            .create_session(20, 4, Roster::default(), Roster::default())
            .is_ok());
    }

    #[test]
    fn test_new_session_aborts_previous() {
        let (lifecycle, _, sessions) = fixture(5);
        let first = lifecycle
            .create_session(8, 8, Roster::new(1, 0, 0), Roster::new(1, 0, 0))
            .unwrap();
        let second = lifecycle
            .create_session(8, 8, Roster::new(1, 0, 0), Roster::new(1, 0, 0))
            .unwrap();

        assert_eq!(lifecycle.get_session(first.id).unwrap().status, SessionStatus::Aborted);
        assert_eq!(lifecycle.active_session().unwrap().id, second.id);
        let active = sessions
            .all()
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count();
        assert_eq!(active, 1);
        // Units of the aborted session are kept.
        assert_eq!(lifecycle.list_units(first.id, Faction::White).unwrap().len(), 1);
    }

    /// Unit store whose `insert_all` fails while `refuse` is set.
    #[derive(Default)]
    struct RefusingInserts {
        inner: InMemoryUnitStore,
        refuse: AtomicBool,
    }

    impl UnitStore for RefusingInserts {
        fn get_for_update(&self, id: UnitId) -> Result<Exclusive<'_, UnitId, Unit>> {
            self.inner.get_for_update(id)
        }

        fn get(&self, id: UnitId) -> Result<Unit> {
            self.inner.get(id)
        }

        fn find_active_at(&self, session: SessionId, position: Position) -> Option<Unit> {
            self.inner.find_active_at(session, position)
        }

        fn count_active(&self, session: SessionId, faction: Faction) -> usize {
            self.inner.count_active(session, faction)
        }

        fn save_all_with(&self, units: &[Unit], publish: &mut dyn FnMut() -> Result<()>) -> Result<()> {
            self.inner.save_all_with(units, publish)
        }

        fn insert_all(&self, spawns: &[UnitSpawnParams]) -> Result<Vec<Unit>> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(GameError::Config("unit store offline".into()));
            }
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
    fn test_failed_placement_keeps_current_session() {
        let units = Arc::new(RefusingInserts::default());
        let sessions = Arc::new(InMemorySessionStore::new());
        let lifecycle = GameLifecycle::new(
            units.clone(),
            sessions.clone(),
            Arc::new(ManualClock::default()),
            Arc::new(ChaChaSource::from_seed(10)),
            EngineConfig::default(),
        );
        let current = lifecycle
            .create_session(8, 8, Roster::new(1, 0, 0), Roster::new(1, 0, 0))
            .unwrap();

        units.refuse.store(true, Ordering::SeqCst);
        let err = lifecycle
            .create_session(8, 8, Roster::new(2, 0, 0), Roster::new(2, 0, 0))
            .unwrap_err();
        assert!(matches!(err, GameError::Config(_)));

        assert_eq!(lifecycle.get_session(current.id).unwrap().status, SessionStatus::Active);
        assert_eq!(lifecycle.active_session().unwrap().id, current.id);
        let all = sessions.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].status, SessionStatus::Aborted);
        assert!(units.inner.list_by_session(all[1].id).is_empty());

        units.refuse.store(false, Ordering::SeqCst);
        let next = lifecycle
            .create_session(8, 8, Roster::new(1, 0, 0), Roster::new(1, 0, 0))
            .unwrap();
        assert_eq!(lifecycle.get_session(current.id).unwrap().status, SessionStatus::Aborted);
        assert_eq!(lifecycle.active_session().unwrap().id, next.id);
    }

    #[test]
    fn test_list_units_unknown_session() {
        let (lifecycle, _, _) = fixture(6);
        assert!(matches!(
            lifecycle.list_units(SessionId::new(77), Faction::White),
            Err(GameError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_same_seed_same_layout() {
        let layout = |seed| {
            let (lifecycle, units, _) = fixture(seed);
            let session = lifecycle
                .create_session(10, 10, Roster::new(2, 2, 2), Roster::new(2, 2, 2))
                .unwrap();
            units
                .list_by_session(session.id)
                .iter()
                .map(Unit::position)
                .collect::<Vec<_>>()
        };
        assert_eq!(layout(9), layout(9));
    }
}
