//! # Skirmish Core
//!
//! Command resolution engine for a two-faction grid combat game.
//!
//! Each side commands archers, transports and cannons on a rectangular
//! board. This crate owns the rules:
//! - Validating a command against the unit's kind and the board
//! - Resolving moves (path walking, collisions) and shots
//! - Cooldowns and per-unit command counters
//! - Keeping concurrent commands from corrupting board state
//!
//! Persistence, transport and presentation are collaborators behind the
//! traits in [`store`], [`clock`] and [`random`]. In-memory implementations
//! are provided so the engine can run headless.
//!
//! ## Crate Structure
//!
//! - [`geometry`] - Board bounds, positions and directions
//! - [`command`] - Move/Shoot command values
//! - [`unit`] - Unit records and the per-kind rule table
//! - [`engine`] - Command resolution
//! - [`lifecycle`] - Session creation and unit placement
//! - [`random`] - Random command generation
//! - [`skirmish`] - Facade bundling the service operations

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod factions;
pub mod geometry;
pub mod ids;
pub mod lifecycle;
pub mod lock;
pub mod random;
pub mod session;
pub mod skirmish;
pub mod store;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::command::{Command, CommandKind, MoveCommand, ShootCommand};
    pub use crate::config::EngineConfig;
    pub use crate::engine::CommandEngine;
    pub use crate::error::{GameError, IllegalMove, Result, ValidationError};
    pub use crate::event::{EventRecord, EventSink, InMemoryEventLog};
    pub use crate::factions::Faction;
    pub use crate::geometry::{Board, Direction, Position};
    pub use crate::ids::{SessionId, UnitId};
    pub use crate::lifecycle::GameLifecycle;
    pub use crate::random::{ChaChaSource, RandomCommandGenerator, RandomSource};
    pub use crate::session::{Roster, Session, SessionStatus};
    pub use crate::skirmish::Skirmish;
    pub use crate::store::{InMemorySessionStore, InMemoryUnitStore, SessionStore, UnitStore};
    pub use crate::unit::{Unit, UnitKind, UnitSpawnParams, UnitStatus};
}
