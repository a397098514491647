//! Unit and session stores.
//!
//! The engine talks to persistence only through [`UnitStore`] and
//! [`SessionStore`]. Implementations must provide:
//!
//! - **Leases**: `get_for_update` blocks until the caller holds the entity
//!   exclusively, and the returned guard releases it on drop.
//! - **Atomic optimistic writes**: `save_all` applies every unit or none. It
//!   rejects with [`GameError::Conflict`] when a snapshot's version is stale,
//!   when a destroyed unit would come back, or when two ACTIVE units would
//!   end up on one cell. `save_all_with` also runs a publish step (the
//!   engine appends its event there) and writes nothing if that fails.
//! - **One active session**: the session store keeps a single active
//!   pointer and refuses writes that would make a second session ACTIVE.
//!
//! [`InMemoryUnitStore`] and [`InMemorySessionStore`] implement both
//! contracts with `RwLock`-protected maps.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::geometry::{Board, Position};
use crate::ids::{SessionId, UnitId};
use crate::lock::{Exclusive, LockTable, Shared};
use crate::session::{Session, SessionStatus};
use crate::unit::{Unit, UnitSpawnParams};

/// Persistent view of all units.
pub trait UnitStore: Send + Sync {
    /// Lease `id` exclusively and read it. Blocks while another caller holds it.
    fn get_for_update(&self, id: UnitId) -> Result<Exclusive<'_, UnitId, Unit>>;

    /// Read `id` without a lease.
    fn get(&self, id: UnitId) -> Result<Unit>;

    /// ACTIVE unit on `position` in `session`, if any.
    fn find_active_at(&self, session: SessionId, position: Position) -> Option<Unit>;

    /// Number of ACTIVE units of `faction` in `session`.
    fn count_active(&self, session: SessionId, faction: Faction) -> usize;

    /// Write one unit. See [`UnitStore::save_all`].
    fn save(&self, unit: &Unit) -> Result<()> {
        self.save_all(std::slice::from_ref(unit))
    }

    /// Write all `units` atomically, bumping each version.
    fn save_all(&self, units: &[Unit]) -> Result<()> {
        self.save_all_with(units, &mut nothing_to_publish)
    }

    /// Like [`UnitStore::save_all`], running `publish` once the batch has
    /// passed its checks and before it is applied. Nothing is written when
    /// either the checks or `publish` fail.
    ///
    /// `publish` runs while the store is locked and must not call back
    /// into it.
    fn save_all_with(&self, units: &[Unit], publish: &mut dyn FnMut() -> Result<()>) -> Result<()>;

    /// Create units, assigning ids. All or nothing.
    fn insert_all(&self, spawns: &[UnitSpawnParams]) -> Result<Vec<Unit>>;

    /// Every unit of `session`, ACTIVE and DESTROYED.
    fn list_by_session(&self, session: SessionId) -> Vec<Unit>;

    /// Every unit of `faction` in `session`, ACTIVE and DESTROYED.
    fn list_by_session_and_faction(&self, session: SessionId, faction: Faction) -> Vec<Unit>;
}

/// Persistent view of all sessions.
pub trait SessionStore: Send + Sync {
    /// Lease `id` exclusively and read it.
    fn get_for_update(&self, id: SessionId) -> Result<Exclusive<'_, SessionId, Session>>;

    /// Lease `id` shared and read it. Excludes exclusive holders only.
    fn get_shared(&self, id: SessionId) -> Result<Shared<'_, SessionId, Session>>;

    /// Read `id` without a lease.
    fn get(&self, id: SessionId) -> Result<Session>;

    /// The session currently ACTIVE, if any.
    fn find_active_session(&self) -> Option<Session>;

    /// Create a session, assigning an id.
    fn create(&self, board: Board, status: SessionStatus, started_at: SystemTime) -> Result<Session>;

    /// Write a session.
    fn save(&self, session: &Session) -> Result<()>;
}

fn nothing_to_publish() -> Result<()> {
    Ok(())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn conflict(entity: impl std::fmt::Display, reason: impl Into<String>) -> GameError {
    GameError::Conflict {
        entity: entity.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// Units
// ============================================================================

/// Units kept in memory.
///
/// Iteration follows unit id order, so listings are deterministic.
#[derive(Debug)]
pub struct InMemoryUnitStore {
    units: RwLock<BTreeMap<UnitId, Unit>>,
    leases: LockTable<UnitId>,
    next_id: AtomicU64,
}

impl Default for InMemoryUnitStore {
    fn default() -> Self {
        Self {
            units: RwLock::new(BTreeMap::new()),
            leases: LockTable::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryUnitStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of units across all sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.units).len()
    }

    /// Whether the store holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.units).is_empty()
    }

    /// Check `updates` against the stored state as if they were all applied.
    fn check_batch(stored: &BTreeMap<UnitId, Unit>, updates: &HashMap<UnitId, &Unit>) -> Result<()> {
        for (&id, &update) in updates {
            let current = stored.get(&id).ok_or(GameError::UnitNotFound(id))?;
            if current.version() != update.version() {
                return Err(conflict(
                    id,
                    format!(
                        "stale version {} (stored {})",
                        update.version(),
                        current.version()
                    ),
                ));
            }
            if !current.is_active() && update.is_active() {
                return Err(conflict(id, "destroyed units cannot be revived"));
            }
        }

        for &update in updates.values() {
            if !update.is_active() {
                continue;
            }
            let clash = stored.values().find(|stored_unit| {
                let other = updates
                    .get(&stored_unit.id())
                    .copied()
                    .unwrap_or(*stored_unit);
                other.id() != update.id()
                    && other.session() == update.session()
                    && other.is_active()
                    && other.position() == update.position()
            });
            if let Some(other) = clash {
                return Err(conflict(
                    update.id(),
                    format!("cell {} already held by unit {}", update.position(), other.id()),
                ));
            }
        }
        Ok(())
    }
}

impl UnitStore for InMemoryUnitStore {
    fn get_for_update(&self, id: UnitId) -> Result<Exclusive<'_, UnitId, Unit>> {
        let lease = self.leases.exclusive(id);
        let unit = self.get(id)?;
        Ok(Exclusive::new(lease, unit))
    }

    fn get(&self, id: UnitId) -> Result<Unit> {
        read(&self.units)
            .get(&id)
            .cloned()
            .ok_or(GameError::UnitNotFound(id))
    }

    fn find_active_at(&self, session: SessionId, position: Position) -> Option<Unit> {
        read(&self.units)
            .values()
            .find(|u| u.session() == session && u.is_active() && u.position() == position)
            .cloned()
    }

    fn count_active(&self, session: SessionId, faction: Faction) -> usize {
        read(&self.units)
            .values()
            .filter(|u| u.session() == session && u.faction() == faction && u.is_active())
            .count()
    }

    fn save_all_with(&self, units: &[Unit], publish: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let mut stored = write(&self.units);

        let mut updates: HashMap<UnitId, &Unit> = HashMap::with_capacity(units.len());
        for unit in units {
            if updates.insert(unit.id(), unit).is_some() {
                return Err(conflict(unit.id(), "unit written twice in one batch"));
            }
        }
        Self::check_batch(&stored, &updates)?;
        publish()?;

        for unit in units {
            stored.insert(unit.id(), unit.next_revision());
        }
        Ok(())
    }

    fn insert_all(&self, spawns: &[UnitSpawnParams]) -> Result<Vec<Unit>> {
        let mut stored = write(&self.units);

        for (i, spawn) in spawns.iter().enumerate() {
            let taken_in_batch = spawns[..i]
                .iter()
                .any(|s| s.session == spawn.session && s.position == spawn.position);
            let taken_in_store = stored
                .values()
                .any(|u| u.session() == spawn.session && u.is_active() && u.position() == spawn.position);
            if taken_in_batch || taken_in_store {
                return Err(conflict(
                    spawn.session,
                    format!("spawn cell {} already occupied", spawn.position),
                ));
            }
        }

        let created: Vec<Unit> = spawns
            .iter()
            .map(|&spawn| Unit::spawn(UnitId::new(self.next_id.fetch_add(1, Ordering::Relaxed)), spawn))
            .collect();
        for unit in &created {
            stored.insert(unit.id(), unit.clone());
        }
        Ok(created)
    }

    fn list_by_session(&self, session: SessionId) -> Vec<Unit> {
        read(&self.units)
            .values()
            .filter(|u| u.session() == session)
            .cloned()
            .collect()
    }

    fn list_by_session_and_faction(&self, session: SessionId, faction: Faction) -> Vec<Unit> {
        read(&self.units)
            .values()
            .filter(|u| u.session() == session && u.faction() == faction)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Default)]
struct SessionTable {
    sessions: BTreeMap<SessionId, Session>,
    /// The single well-known pointer to the ACTIVE session.
    active: Option<SessionId>,
    next_id: u64,
}

impl SessionTable {
    fn check_activation(&self, id: Option<SessionId>, status: SessionStatus) -> Result<()> {
        match self.active {
            Some(active) if status == SessionStatus::Active && Some(active) != id => Err(conflict(
                active,
                "another session is already active",
            )),
            _ => Ok(()),
        }
    }

    fn point_at(&mut self, session: &Session) {
        if session.status == SessionStatus::Active {
            self.active = Some(session.id);
        } else if self.active == Some(session.id) {
            self.active = None;
        }
    }
}

/// Sessions kept in memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    table: RwLock<SessionTable>,
    leases: LockTable<SessionId>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session ever created, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Session> {
        read(&self.table).sessions.values().cloned().collect()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_for_update(&self, id: SessionId) -> Result<Exclusive<'_, SessionId, Session>> {
        let lease = self.leases.exclusive(id);
        let session = self.get(id)?;
        Ok(Exclusive::new(lease, session))
    }

    fn get_shared(&self, id: SessionId) -> Result<Shared<'_, SessionId, Session>> {
        let lease = self.leases.shared(id);
        let session = self.get(id)?;
        Ok(Shared::new(lease, session))
    }

    fn get(&self, id: SessionId) -> Result<Session> {
        read(&self.table)
            .sessions
            .get(&id)
            .cloned()
            .ok_or(GameError::SessionNotFound(id))
    }

    fn find_active_session(&self) -> Option<Session> {
        let table = read(&self.table);
        table.active.and_then(|id| table.sessions.get(&id).cloned())
    }

    fn create(&self, board: Board, status: SessionStatus, started_at: SystemTime) -> Result<Session> {
        let mut table = write(&self.table);
        table.check_activation(None, status)?;

        table.next_id += 1;
        let session = Session {
            id: SessionId::new(table.next_id),
            board,
            status,
            started_at,
        };
        table.point_at(&session);
        table.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut table = write(&self.table);
        if !table.sessions.contains_key(&session.id) {
            return Err(GameError::SessionNotFound(session.id));
        }
        table.check_activation(Some(session.id), session.status)?;
        table.point_at(session);
        table.sessions.insert(session.id, session.clone());
        Ok(())
    }
}
