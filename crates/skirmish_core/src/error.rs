//! Error types for command resolution and session management.

use std::time::Duration;

use thiserror::Error;

use crate::command::CommandKind;
use crate::factions::Faction;
use crate::geometry::Position;
use crate::ids::{SessionId, UnitId};
use crate::session::SessionStatus;
use crate::unit::UnitKind;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Malformed input: the caller supplied a value that can never be valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A move was built with a shoot kind, or the other way round.
    #[error("{kind:?} is not a valid kind for a {variant} command")]
    KindMismatch {
        /// Command variant being constructed ("move" or "shoot").
        variant: &'static str,
        /// The rejected kind.
        kind: CommandKind,
    },

    /// Archers only shoot along a row or column.
    #[error("Archer shoots only orthogonally (dx={dx}, dy={dy})")]
    ArcherDiagonalShot {
        /// Horizontal offset.
        dx: i32,
        /// Vertical offset.
        dy: i32,
    },

    /// A shot needs a target offset.
    #[error("dx and dy cannot both be zero")]
    ZeroOffsetShot,

    /// Move steps outside of [1, 3].
    #[error("Move steps must be within 1..=3, got {0}")]
    StepsOutOfRange(u8),

    /// Board side outside of the configured bounds.
    #[error("Board {width}x{height} outside allowed sides {min}..={max}")]
    BoardSize {
        /// Requested width.
        width: u16,
        /// Requested height.
        height: u16,
        /// Smallest allowed side.
        min: u16,
        /// Largest allowed side.
        max: u16,
    },

    /// More units requested than there are cells.
    #[error("Board too small for requested units: need {requested} cells, have {capacity}")]
    RosterTooLarge {
        /// Units requested across both factions.
        requested: usize,
        /// Cells on the board.
        capacity: usize,
    },
}

/// A well-formed command that the current board state rejects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalMove {
    /// Path or target leaves the board.
    #[error("Command goes outside the board at {0}")]
    OutsideBoard(Position),

    /// An ACTIVE unit sits on an intermediate cell.
    #[error("Path blocked by another unit at {0}")]
    PathBlocked(Position),

    /// Command kind does not belong to this unit kind.
    #[error("{unit:?} cannot execute {command:?}")]
    WrongKind {
        /// Kind of the commanded unit.
        unit: UnitKind,
        /// Kind of the rejected command.
        command: CommandKind,
    },

    /// Step count outside of what the unit kind allows.
    #[error("{unit:?} cannot move {steps} squares")]
    StepsNotAllowed {
        /// Kind of the commanded unit.
        unit: UnitKind,
        /// Requested steps.
        steps: u8,
    },

    /// Destroyed units take no commands.
    #[error("Unit {0} is destroyed")]
    UnitDestroyed(UnitId),

    /// The unit's session is not running.
    #[error("Session {session} is {status:?} and does not accept commands")]
    SessionNotAccepting {
        /// Session of the commanded unit.
        session: SessionId,
        /// Its current status.
        status: SessionStatus,
    },

    /// The command kind's cooldown has not elapsed yet.
    #[error("{kind:?} on cooldown for another {remaining:?}")]
    CooldownActive {
        /// Kind of the rejected command.
        kind: CommandKind,
        /// Time left until the unit may run it again.
        remaining: Duration,
    },
}

/// Top-level error type for all engine errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Bad input, never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Rejected against current board state.
    #[error(transparent)]
    IllegalMove(#[from] IllegalMove),

    /// Unit does not exist.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Issuer does not own the unit.
    #[error("{issuer:?} does not own unit {unit} (owned by {owner:?})")]
    Forbidden {
        /// Unit the command targeted.
        unit: UnitId,
        /// Faction that issued the command.
        issuer: Faction,
        /// Faction that owns the unit.
        owner: Faction,
    },

    /// A write was based on a stale read; retry from a fresh read.
    #[error("Write conflict on {entity}: {reason}")]
    Conflict {
        /// Entity the write was rejected for.
        entity: String,
        /// What was stale.
        reason: String,
    },

    /// Command payload could not be serialized.
    #[error("Failed to serialize command: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be read or is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GameError {
    /// Whether retrying the whole resolution from a fresh read may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
