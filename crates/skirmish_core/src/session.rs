//! Game sessions and starting rosters.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::geometry::Board;
use crate::ids::SessionId;
use crate::unit::UnitKind;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created, board not yet in play.
    New,
    /// In play; commands are accepted.
    Active,
    /// Ended normally.
    Finished,
    /// Ended early, e.g. replaced by a newer session.
    Aborted,
}

impl SessionStatus {
    /// Whether players may issue commands in this state.
    #[must_use]
    pub const fn is_accepting_commands(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether this is an end state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

/// One game instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Board dimensions.
    pub board: Board,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// When the session was created.
    pub started_at: SystemTime,
}

/// How many units of each kind one faction starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Number of archers.
    pub archers: u16,
    /// Number of transports.
    pub transports: u16,
    /// Number of cannons.
    pub cannons: u16,
}

impl Roster {
    /// Create a roster.
    #[must_use]
    pub const fn new(archers: u16, transports: u16, cannons: u16) -> Self {
        Self {
            archers,
            transports,
            cannons,
        }
    }

    /// Total number of units.
    #[must_use]
    pub fn total(&self) -> usize {
        usize::from(self.archers) + usize::from(self.transports) + usize::from(self.cannons)
    }

    /// Count for one kind.
    #[must_use]
    pub const fn count_of(&self, kind: UnitKind) -> u16 {
        match kind {
            UnitKind::Archer => self.archers,
            UnitKind::Transport => self.transports,
            UnitKind::Cannon => self.cannons,
        }
    }

    /// Kinds in placement order (archers, transports, cannons), one entry per unit.
    pub fn kinds(&self) -> impl Iterator<Item = UnitKind> + '_ {
        UnitKind::ALL
            .into_iter()
            .flat_map(move |kind| std::iter::repeat(kind).take(usize::from(self.count_of(kind))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(SessionStatus::Active.is_accepting_commands());
        assert!(!SessionStatus::New.is_accepting_commands());
        assert!(!SessionStatus::Aborted.is_accepting_commands());
        assert!(SessionStatus::Finished.is_terminal());
        assert!(SessionStatus::Aborted.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::New.is_terminal());
    }

    #[test]
    fn test_roster_kinds_in_placement_order() {
        let roster = Roster::new(2, 1, 1);
        assert_eq!(roster.total(), 4);
        let kinds: Vec<_> = roster.kinds().collect();
        assert_eq!(
            kinds,
            vec![UnitKind::Archer, UnitKind::Archer, UnitKind::Transport, UnitKind::Cannon]
        );
    }
}
