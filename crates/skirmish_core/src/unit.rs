//! Unit records and per-kind rules.
//!
//! Every unit is one [`Unit`] record carrying a [`UnitKind`] tag. The rules
//! that differ between kinds (which commands they accept, how far they move)
//! are looked up from a static [`KindRules`] table instead of being spread
//! over per-kind types.

use std::ops::RangeInclusive;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;
use crate::factions::Faction;
use crate::geometry::Position;
use crate::ids::{SessionId, UnitId};

/// Unit archetype, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    /// Moves one square, shoots orthogonally.
    Archer,
    /// Moves up to three squares, crushes enemies it lands on.
    Transport,
    /// Stationary, shoots at any offset.
    Cannon,
}

/// Kind-specific constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRules {
    /// Move kind this unit accepts, if it can move.
    pub move_kind: Option<CommandKind>,
    /// Allowed number of squares per move.
    pub move_steps: RangeInclusive<u8>,
    /// Shoot kind this unit accepts, if it can shoot.
    pub shoot_kind: Option<CommandKind>,
}

static ARCHER_RULES: KindRules = KindRules {
    move_kind: Some(CommandKind::ArcherMove),
    move_steps: 1..=1,
    shoot_kind: Some(CommandKind::ArcherShoot),
};

static TRANSPORT_RULES: KindRules = KindRules {
    move_kind: Some(CommandKind::TransportMove),
    move_steps: 1..=3,
    shoot_kind: None,
};

static CANNON_RULES: KindRules = KindRules {
    move_kind: None,
    move_steps: 0..=0,
    shoot_kind: Some(CommandKind::CannonShoot),
};

impl UnitKind {
    /// All kinds, in placement order.
    pub const ALL: [Self; 3] = [Self::Archer, Self::Transport, Self::Cannon];

    /// Rule table entry for this kind.
    #[must_use]
    pub fn rules(self) -> &'static KindRules {
        match self {
            Self::Archer => &ARCHER_RULES,
            Self::Transport => &TRANSPORT_RULES,
            Self::Cannon => &CANNON_RULES,
        }
    }

    /// Whether a command of `kind` may be issued to this unit kind.
    #[must_use]
    pub fn accepts(self, kind: CommandKind) -> bool {
        let rules = self.rules();
        rules.move_kind == Some(kind) || rules.shoot_kind == Some(kind)
    }

    /// Whether a move of `steps` squares is within this kind's range.
    #[must_use]
    pub fn allows_steps(self, steps: u8) -> bool {
        let rules = self.rules();
        rules.move_kind.is_some() && rules.move_steps.contains(&steps)
    }
}

/// Whether a unit is still on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Alive and occupying its cell.
    Active,
    /// Eliminated. Kept for history, occupies nothing.
    Destroyed,
}

impl UnitStatus {
    /// Whether the unit is still alive.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Parameters for spawning a new unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpawnParams {
    /// Session the unit belongs to.
    pub session: SessionId,
    /// Owning side.
    pub faction: Faction,
    /// Archetype.
    pub kind: UnitKind,
    /// Starting cell.
    pub position: Position,
}

/// A unit on the board.
///
/// Fields are private; the mutators below are the only way to change a
/// unit, and callers must hold the unit's exclusive lease while using them.
/// The version is owned by the store: it records which stored revision this
/// snapshot was read from and is bumped by every successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    session: SessionId,
    faction: Faction,
    kind: UnitKind,
    position: Position,
    status: UnitStatus,
    command_count: u32,
    last_command_at: SystemTime,
    version: u64,
}

impl Unit {
    /// Create a freshly placed unit: ACTIVE, no commands run yet.
    #[must_use]
    pub fn spawn(id: UnitId, params: UnitSpawnParams) -> Self {
        Self {
            id,
            session: params.session,
            faction: params.faction,
            kind: params.kind,
            position: params.position,
            status: UnitStatus::Active,
            command_count: 0,
            last_command_at: SystemTime::UNIX_EPOCH,
            version: 0,
        }
    }

    /// Unit id.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Owning session.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Owning side.
    #[must_use]
    pub const fn faction(&self) -> Faction {
        self.faction
    }

    /// Archetype.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Current cell.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Alive or destroyed.
    #[must_use]
    pub const fn status(&self) -> UnitStatus {
        self.status
    }

    /// Shorthand for `status().is_alive()`.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_alive()
    }

    /// Number of commands executed so far.
    #[must_use]
    pub const fn command_count(&self) -> u32 {
        self.command_count
    }

    /// When the last command ran. The UNIX epoch if none has.
    #[must_use]
    pub const fn last_command_at(&self) -> SystemTime {
        self.last_command_at
    }

    /// Stored revision this snapshot was read from.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Snapshot of the next stored revision. Used by stores on save.
    #[must_use]
    pub fn next_revision(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Time left before a `kind` command may run, zero if it may run now.
    ///
    /// A clock that went backwards counts as no time elapsed.
    #[must_use]
    pub fn cooldown_remaining(&self, kind: CommandKind, now: SystemTime) -> Duration {
        let elapsed = now
            .duration_since(self.last_command_at)
            .unwrap_or(Duration::ZERO);
        kind.cooldown().saturating_sub(elapsed)
    }

    /// Whether a `kind` command may run at `now`.
    #[must_use]
    pub fn can_execute(&self, kind: CommandKind, now: SystemTime) -> bool {
        self.cooldown_remaining(kind, now).is_zero()
    }

    /// Move the unit to `position`.
    pub fn relocate(&mut self, position: Position) {
        self.position = position;
    }

    /// Mark the unit destroyed. Destroyed units never come back.
    pub fn mark_destroyed(&mut self) {
        self.status = UnitStatus::Destroyed;
    }

    /// Record that a command ran at `at`.
    pub fn record_command_executed(&mut self, at: SystemTime) {
        self.last_command_at = at;
        self.command_count += 1;
    }
}
