//! Property-based testing strategies.

use proptest::prelude::*;
use skirmish_core::command::{MAX_MOVE_STEPS, MIN_MOVE_STEPS};
use skirmish_core::prelude::*;

/// Any faction.
pub fn arb_faction() -> impl Strategy<Value = Faction> {
    prop_oneof![Just(Faction::White), Just(Faction::Black)]
}

/// Any direction.
pub fn arb_direction() -> impl Strategy<Value = Direction> {
    prop::sample::select(Direction::ALL.to_vec())
}

/// Any unit kind.
pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
    prop::sample::select(UnitKind::ALL.to_vec())
}

/// Any command kind.
pub fn arb_command_kind() -> impl Strategy<Value = CommandKind> {
    prop::sample::select(vec![
        CommandKind::ArcherMove,
        CommandKind::TransportMove,
        CommandKind::ArcherShoot,
        CommandKind::CannonShoot,
    ])
}

/// Valid move commands of either move kind.
pub fn arb_move_command() -> impl Strategy<Value = MoveCommand> {
    (
        arb_direction(),
        MIN_MOVE_STEPS..=MAX_MOVE_STEPS,
        arb_faction(),
        prop_oneof![Just(CommandKind::ArcherMove), Just(CommandKind::TransportMove)],
    )
        .prop_map(|(direction, steps, issuer, kind)| {
            MoveCommand::new(direction, steps, issuer, kind).expect("generated move is valid")
        })
}

/// Valid cannon shots within `reach` squares on each axis.
pub fn arb_cannon_shot(reach: i32) -> impl Strategy<Value = ShootCommand> {
    ((-reach..=reach), (-reach..=reach), arb_faction())
        .prop_filter("shot needs an offset", |(dx, dy, _)| *dx != 0 || *dy != 0)
        .prop_map(|(dx, dy, issuer)| {
            ShootCommand::new(dx, dy, issuer, CommandKind::CannonShoot).expect("generated shot is valid")
        })
}

/// Valid archer shots up to `reach` squares along one axis.
pub fn arb_archer_shot(reach: i32) -> impl Strategy<Value = ShootCommand> {
    (arb_direction(), 1..=reach, arb_faction()).prop_map(|(direction, distance, issuer)| {
        let (dx, dy) = direction.delta();
        ShootCommand::new(dx * distance, dy * distance, issuer, CommandKind::ArcherShoot)
            .expect("generated archer shot is valid")
    })
}

/// Any valid command.
pub fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        arb_move_command().prop_map(Command::from),
        arb_cannon_shot(6).prop_map(Command::from),
        arb_archer_shot(6).prop_map(Command::from),
    ]
}

/// A cell on `board`.
pub fn arb_position(board: Board) -> impl Strategy<Value = Position> {
    (0..i32::from(board.width), 0..i32::from(board.height)).prop_map(|(x, y)| Position::new(x, y))
}

/// Board dimensions within the default side bounds.
pub fn arb_board() -> impl Strategy<Value = Board> {
    (4u16..=20, 4u16..=20).prop_map(|(w, h)| Board::new(w, h))
}

/// A roster of at most `max_each` units per kind.
pub fn arb_roster(max_each: u16) -> impl Strategy<Value = Roster> {
    (0..=max_each, 0..=max_each, 0..=max_each).prop_map(|(a, t, c)| Roster::new(a, t, c))
}
