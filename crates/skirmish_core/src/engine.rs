//! Command resolution.
//!
//! [`CommandEngine::execute`] runs one command against one unit:
//!
//! 1. Lease the unit's session shared and the unit exclusively.
//! 2. Check ownership, status, kind, steps and (when enabled) cooldown. Nothing is
//!    mutated before every check has passed.
//! 3. Resolve the move or shot against the current board.
//! 4. Stamp the unit with the execution time and bump its command count.
//! 5. Write the unit (and any victim) and append the event in one atomic
//!    save. A failed append leaves the units untouched.
//!
//! Leases are guards, so they are released on every return path.
//!
//! The victim of a capture or shot is not leased. Its snapshot carries a
//! version, and the store refuses the whole write with
//! [`GameError::Conflict`] if the victim changed in the meantime or if the
//! destination cell was taken by a concurrent mover.

use std::sync::Arc;
use std::time::SystemTime;

use crate::clock::Clock;
use crate::command::{Command, MoveCommand, ShootCommand};
use crate::config::EngineConfig;
use crate::error::{GameError, IllegalMove, Result};
use crate::event::{EventRecord, EventSink};
use crate::geometry::{Board, Position};
use crate::ids::UnitId;
use crate::session::Session;
use crate::store::{SessionStore, UnitStore};
use crate::unit::Unit;

/// What a resolved command did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The unit moved to an empty cell.
    Relocated(Position),
    /// The unit moved onto an enemy and destroyed it.
    Captured(UnitId),
    /// The destination held a friendly unit; the unit stayed put.
    Cancelled,
    /// A shot destroyed the unit on the target cell.
    Hit(UnitId),
    /// A shot landed on an empty cell.
    Missed,
}

struct Resolution {
    outcome: Outcome,
    victim: Option<Unit>,
}

impl Resolution {
    const fn without_victim(outcome: Outcome) -> Self {
        Self {
            outcome,
            victim: None,
        }
    }
}

/// Executes commands against the unit and session stores.
pub struct CommandEngine {
    units: Arc<dyn UnitStore>,
    sessions: Arc<dyn SessionStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl CommandEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        units: Arc<dyn UnitStore>,
        sessions: Arc<dyn SessionStore>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            units,
            sessions,
            events,
            clock,
            config,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `command` on `unit_id` and return the recorded event.
    ///
    /// # Errors
    /// - [`GameError::UnitNotFound`] / [`GameError::SessionNotFound`]
    /// - [`GameError::Forbidden`] if the issuer does not own the unit
    /// - [`GameError::IllegalMove`] if the board state rejects the command
    /// - [`GameError::Conflict`] if a concurrent command changed a unit this
    ///   one depends on; nothing was written and the call may be retried
    pub fn execute(&self, unit_id: UnitId, command: Command) -> Result<EventRecord> {
        // A unit never changes session, so an unleased read is enough to
        // find which session to lease first.
        let session_id = self.units.get(unit_id)?.session();
        let session = self.sessions.get_shared(session_id)?;
        if !session.status.is_accepting_commands() {
            return Err(IllegalMove::SessionNotAccepting {
                session: session.id,
                status: session.status,
            }
            .into());
        }

        let mut unit = self.units.get_for_update(unit_id)?;
        let now = self.clock.now();
        self.check(&unit, command, now)?;

        let resolution = match command {
            Command::Move(cmd) => self.resolve_move(&session, &mut unit, cmd)?,
            Command::Shoot(cmd) => self.resolve_shoot(&session, &unit, cmd)?,
        };
        unit.record_command_executed(now);

        let payload = serde_json::to_string(&command)?;

        let event = EventRecord {
            session: session.id,
            unit: unit_id,
            kind: command.kind(),
            payload,
            success: true,
            executed_at: now,
        };

        let mut batch = Vec::with_capacity(2);
        batch.extend(resolution.victim);
        batch.push(unit.clone());
        let mut publish = || self.events.append(event.clone());
        if let Err(err) = self.units.save_all_with(&batch, &mut publish) {
            if err.is_conflict() {
                tracing::warn!(unit = %unit_id, %err, "Resolution lost a write race");
            }
            return Err(err);
        }

        tracing::debug!(
            unit = %unit_id,
            kind = ?command.kind(),
            outcome = ?resolution.outcome,
            "Command executed"
        );
        Ok(event)
    }

    fn check(&self, unit: &Unit, command: Command, now: SystemTime) -> Result<()> {
        if command.issuer() != unit.faction() {
            return Err(GameError::Forbidden {
                unit: unit.id(),
                issuer: command.issuer(),
                owner: unit.faction(),
            });
        }
        if !unit.is_active() {
            return Err(IllegalMove::UnitDestroyed(unit.id()).into());
        }

        let kind = command.kind();
        if !unit.kind().accepts(kind) {
            return Err(IllegalMove::WrongKind {
                unit: unit.kind(),
                command: kind,
            }
            .into());
        }
        if let Command::Move(cmd) = command {
            if !unit.kind().allows_steps(cmd.steps()) {
                return Err(IllegalMove::StepsNotAllowed {
                    unit: unit.kind(),
                    steps: cmd.steps(),
                }
                .into());
            }
        }

        if self.config.enforce_cooldowns {
            let remaining = unit.cooldown_remaining(kind, now);
            if !remaining.is_zero() {
                return Err(IllegalMove::CooldownActive { kind, remaining }.into());
            }
        }
        Ok(())
    }

    fn resolve_move(&self, session: &Session, unit: &mut Unit, cmd: MoveCommand) -> Result<Resolution> {
        let origin = unit.position();

        for distance in 1..i32::from(cmd.steps()) {
            let cell = origin.step(cmd.direction(), distance);
            ensure_on_board(session.board, cell)?;
            if self.units.find_active_at(session.id, cell).is_some() {
                return Err(IllegalMove::PathBlocked(cell).into());
            }
        }

        let target = cmd.target_position(origin);
        ensure_on_board(session.board, target)?;

        match self.units.find_active_at(session.id, target) {
            Some(occupant) if occupant.faction() == unit.faction() => {
                Ok(Resolution::without_victim(Outcome::Cancelled))
            }
            Some(mut enemy) => {
                enemy.mark_destroyed();
                unit.relocate(target);
                Ok(Resolution {
                    outcome: Outcome::Captured(enemy.id()),
                    victim: Some(enemy),
                })
            }
            None => {
                unit.relocate(target);
                Ok(Resolution::without_victim(Outcome::Relocated(target)))
            }
        }
    }

    fn resolve_shoot(&self, session: &Session, unit: &Unit, cmd: ShootCommand) -> Result<Resolution> {
        let target = cmd.target_position(unit.position());
        ensure_on_board(session.board, target)?;

        match self.units.find_active_at(session.id, target) {
            Some(mut victim) => {
                victim.mark_destroyed();
                Ok(Resolution {
                    outcome: Outcome::Hit(victim.id()),
                    victim: Some(victim),
                })
            }
            None => Ok(Resolution::without_victim(Outcome::Missed)),
        }
    }
}

fn ensure_on_board(board: Board, cell: Position) -> Result<()> {
    if board.contains(cell) {
        Ok(())
    } else {
        Err(IllegalMove::OutsideBoard(cell).into())
    }
}
