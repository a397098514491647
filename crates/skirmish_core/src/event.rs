//! Append-only history of executed commands.

use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;
use crate::error::Result;
use crate::ids::{SessionId, UnitId};

/// One executed command.
///
/// Records are immutable once appended. `payload` is the JSON form of the
/// command as issued, so own-unit cancellations look exactly like
/// relocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Session the unit belongs to.
    pub session: SessionId,
    /// Commanded unit.
    pub unit: UnitId,
    /// What the command was.
    pub kind: CommandKind,
    /// JSON-serialized command.
    pub payload: String,
    /// Whether the command was carried out.
    pub success: bool,
    /// When the engine executed it.
    pub executed_at: SystemTime,
}

/// Destination for event records.
pub trait EventSink: Send + Sync {
    /// Append a record. Records are never changed afterwards.
    fn append(&self, event: EventRecord) -> Result<()>;
}

/// Events kept in memory, in append order.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Vec<EventRecord> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<EventRecord> {
        self.snapshot()
    }

    /// Timeline of a session, newest first.
    #[must_use]
    pub fn for_session(&self, session: SessionId) -> Vec<EventRecord> {
        let mut events: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| e.session == session)
            .collect();
        events.reverse();
        events
    }

    /// Records of one unit, newest first.
    #[must_use]
    pub fn for_unit(&self, unit: UnitId) -> Vec<EventRecord> {
        let mut events: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| e.unit == unit)
            .collect();
        events.reverse();
        events
    }

    /// Records of a session executed strictly after `since`, oldest first.
    #[must_use]
    pub fn since(&self, session: SessionId, since: SystemTime) -> Vec<EventRecord> {
        let mut events: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| e.session == session && e.executed_at > since)
            .collect();
        events.sort_by_key(|e| e.executed_at);
        events
    }
}

impl EventSink for InMemoryEventLog {
    fn append(&self, event: EventRecord) -> Result<()> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
