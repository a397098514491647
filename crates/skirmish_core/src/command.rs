//! Command values issued to units.
//!
//! A [`Command`] is either a [`MoveCommand`] or a [`ShootCommand`]. Both are
//! validated on construction (and on deserialization), so every value that
//! exists is structurally legal. Whether it is legal *for a given unit on a
//! given board* is decided by the [`engine`](crate::engine).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::factions::Faction;
use crate::geometry::{Direction, Position};

/// Smallest number of squares a move may cover.
pub const MIN_MOVE_STEPS: u8 = 1;

/// Largest number of squares a move may cover.
pub const MAX_MOVE_STEPS: u8 = 3;

/// What a command does, fixed per unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Archer moves one square.
    #[serde(rename = "MOVE_ARCHER")]
    ArcherMove,
    /// Transport moves one to three squares.
    #[serde(rename = "MOVE_TRANSPORT")]
    TransportMove,
    /// Archer shoots along a row or column.
    #[serde(rename = "SHOOT_ARCHER")]
    ArcherShoot,
    /// Cannon shoots at any offset.
    #[serde(rename = "SHOOT_CANNON")]
    CannonShoot,
}

impl CommandKind {
    /// Minimum time between two commands of this kind on the same unit.
    #[must_use]
    pub const fn cooldown(self) -> Duration {
        match self {
            Self::ArcherMove => Duration::from_secs(5),
            Self::TransportMove => Duration::from_secs(7),
            Self::ArcherShoot => Duration::from_secs(10),
            Self::CannonShoot => Duration::from_secs(13),
        }
    }

    /// Whether this kind belongs to a [`MoveCommand`].
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::ArcherMove | Self::TransportMove)
    }

    /// Whether this kind belongs to a [`ShootCommand`].
    #[must_use]
    pub const fn is_shoot(self) -> bool {
        matches!(self, Self::ArcherShoot | Self::CannonShoot)
    }
}

/// Move the unit in a straight line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MoveFields")]
pub struct MoveCommand {
    direction: Direction,
    steps: u8,
    issuer: Faction,
    #[serde(rename = "type")]
    kind: CommandKind,
}

impl MoveCommand {
    /// Build a move command.
    ///
    /// # Errors
    /// Fails if `kind` is not a move kind or `steps` is outside `1..=3`.
    pub fn new(
        direction: Direction,
        steps: u8,
        issuer: Faction,
        kind: CommandKind,
    ) -> Result<Self, ValidationError> {
        if !kind.is_move() {
            return Err(ValidationError::KindMismatch {
                variant: "move",
                kind,
            });
        }
        if !(MIN_MOVE_STEPS..=MAX_MOVE_STEPS).contains(&steps) {
            return Err(ValidationError::StepsOutOfRange(steps));
        }
        Ok(Self {
            direction,
            steps,
            issuer,
            kind,
        })
    }

    /// Direction of travel.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of squares to travel.
    #[must_use]
    pub const fn steps(&self) -> u8 {
        self.steps
    }

    /// Cell the move ends on when nothing is in the way.
    #[must_use]
    pub fn target_position(&self, origin: Position) -> Position {
        origin.step(self.direction, i32::from(self.steps))
    }
}

#[derive(Deserialize)]
struct MoveFields {
    direction: Direction,
    steps: u8,
    issuer: Faction,
    #[serde(rename = "type")]
    kind: CommandKind,
}

impl TryFrom<MoveFields> for MoveCommand {
    type Error = ValidationError;

    fn try_from(fields: MoveFields) -> Result<Self, Self::Error> {
        Self::new(fields.direction, fields.steps, fields.issuer, fields.kind)
    }
}

/// Shoot at a cell relative to the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ShootFields")]
pub struct ShootCommand {
    dx: i32,
    dy: i32,
    issuer: Faction,
    #[serde(rename = "type")]
    kind: CommandKind,
}

impl ShootCommand {
    /// Build a shoot command.
    ///
    /// # Errors
    /// Fails if `kind` is not a shoot kind, if an archer shot is diagonal,
    /// or if both offsets are zero.
    pub fn new(dx: i32, dy: i32, issuer: Faction, kind: CommandKind) -> Result<Self, ValidationError> {
        if !kind.is_shoot() {
            return Err(ValidationError::KindMismatch {
                variant: "shoot",
                kind,
            });
        }
        if kind == CommandKind::ArcherShoot && dx != 0 && dy != 0 {
            return Err(ValidationError::ArcherDiagonalShot { dx, dy });
        }
        if dx == 0 && dy == 0 {
            return Err(ValidationError::ZeroOffsetShot);
        }
        Ok(Self {
            dx,
            dy,
            issuer,
            kind,
        })
    }

    /// Horizontal offset of the target.
    #[must_use]
    pub const fn dx(&self) -> i32 {
        self.dx
    }

    /// Vertical offset of the target.
    #[must_use]
    pub const fn dy(&self) -> i32 {
        self.dy
    }

    /// Chebyshev distance to the target.
    #[must_use]
    pub fn distance(&self) -> u32 {
        self.dx.unsigned_abs().max(self.dy.unsigned_abs())
    }

    /// Cell being shot at.
    #[must_use]
    pub const fn target_position(&self, origin: Position) -> Position {
        origin.offset(self.dx, self.dy)
    }
}

#[derive(Deserialize)]
struct ShootFields {
    dx: i32,
    dy: i32,
    issuer: Faction,
    #[serde(rename = "type")]
    kind: CommandKind,
}

impl TryFrom<ShootFields> for ShootCommand {
    type Error = ValidationError;

    fn try_from(fields: ShootFields) -> Result<Self, Self::Error> {
        Self::new(fields.dx, fields.dy, fields.issuer, fields.kind)
    }
}

/// A command sent to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Command {
    /// Move in a straight line.
    Move(MoveCommand),
    /// Shoot at an offset.
    Shoot(ShootCommand),
}

impl Command {
    /// Which action this is.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Move(cmd) => cmd.kind,
            Self::Shoot(cmd) => cmd.kind,
        }
    }

    /// Faction that issued the command.
    #[must_use]
    pub const fn issuer(&self) -> Faction {
        match self {
            Self::Move(cmd) => cmd.issuer,
            Self::Shoot(cmd) => cmd.issuer,
        }
    }

    /// Cell the command aims at from `origin`.
    #[must_use]
    pub fn target_position(&self, origin: Position) -> Position {
        match self {
            Self::Move(cmd) => cmd.target_position(origin),
            Self::Shoot(cmd) => cmd.target_position(origin),
        }
    }
}

impl From<MoveCommand> for Command {
    fn from(cmd: MoveCommand) -> Self {
        Self::Move(cmd)
    }
}

impl From<ShootCommand> for Command {
    fn from(cmd: ShootCommand) -> Self {
        Self::Shoot(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_rejects_shoot_kinds() {
        for kind in [CommandKind::ArcherShoot, CommandKind::CannonShoot] {
            let result = MoveCommand::new(Direction::Up, 1, Faction::White, kind);
            assert_eq!(
                result,
                Err(ValidationError::KindMismatch {
                    variant: "move",
                    kind
                })
            );
        }
    }

    #[test]
    fn test_move_rejects_steps_out_of_range() {
        for steps in [0, 4, 200] {
            let result = MoveCommand::new(Direction::Up, steps, Faction::White, CommandKind::TransportMove);
            assert_eq!(result, Err(ValidationError::StepsOutOfRange(steps)));
        }
    }

    #[test]
    fn test_shoot_rejects_move_kinds() {
        let result = ShootCommand::new(1, 0, Faction::Black, CommandKind::ArcherMove);
        assert!(matches!(result, Err(ValidationError::KindMismatch { variant: "shoot", .. })));
    }

    #[test]
    fn test_archer_cannot_shoot_diagonally() {
        let result = ShootCommand::new(2, -1, Faction::White, CommandKind::ArcherShoot);
        assert_eq!(result, Err(ValidationError::ArcherDiagonalShot { dx: 2, dy: -1 }));

        // Cannons may.
        assert!(ShootCommand::new(2, -1, Faction::White, CommandKind::CannonShoot).is_ok());
    }

    #[test]
    fn test_zero_offset_shot_rejected_for_every_kind() {
        for kind in [CommandKind::ArcherShoot, CommandKind::CannonShoot] {
            assert_eq!(
                ShootCommand::new(0, 0, Faction::White, kind),
                Err(ValidationError::ZeroOffsetShot)
            );
        }
    }

    #[test]
    fn test_target_positions() {
        let origin = Position::new(4, 4);
        let mv = MoveCommand::new(Direction::Left, 3, Faction::White, CommandKind::TransportMove).unwrap();
        assert_eq!(mv.target_position(origin), Position::new(1, 4));

        let shot = ShootCommand::new(-2, 3, Faction::Black, CommandKind::CannonShoot).unwrap();
        assert_eq!(shot.target_position(origin), Position::new(2, 7));
        assert_eq!(shot.distance(), 3);
        assert_eq!(Command::from(shot).target_position(origin), Position::new(2, 7));
    }

    #[test]
    fn test_cooldowns() {
        assert_eq!(CommandKind::ArcherMove.cooldown(), Duration::from_secs(5));
        assert_eq!(CommandKind::TransportMove.cooldown(), Duration::from_secs(7));
        assert_eq!(CommandKind::ArcherShoot.cooldown(), Duration::from_secs(10));
        assert_eq!(CommandKind::CannonShoot.cooldown(), Duration::from_secs(13));
    }

    #[test]
    fn test_json_payload_shape() {
        let cmd = Command::from(
            MoveCommand::new(Direction::Right, 1, Faction::White, CommandKind::ArcherMove).unwrap(),
        );
        let json: serde_json::Value = serde_json::to_value(cmd).unwrap();
        assert_eq!(json["kind"], "move");
        assert_eq!(json["direction"], "RIGHT");
        assert_eq!(json["steps"], 1);
        assert_eq!(json["issuer"], "WHITE");
        assert_eq!(json["type"], "MOVE_ARCHER");
    }

    #[test]
    fn test_deserialization_revalidates() {
        let diagonal = r#"{"kind":"shoot","dx":1,"dy":1,"issuer":"BLACK","type":"SHOOT_ARCHER"}"#;
        assert!(serde_json::from_str::<Command>(diagonal).is_err());

        let zero = r#"{"kind":"shoot","dx":0,"dy":0,"issuer":"BLACK","type":"SHOOT_CANNON"}"#;
        assert!(serde_json::from_str::<Command>(zero).is_err());

        let ok = r#"{"kind":"shoot","dx":-2,"dy":3,"issuer":"BLACK","type":"SHOOT_CANNON"}"#;
        let cmd: Command = serde_json::from_str(ok).unwrap();
        assert_eq!(cmd.kind(), CommandKind::CannonShoot);
        assert_eq!(cmd.issuer(), Faction::Black);
    }
}
