//! Faction definitions.

use serde::{Deserialize, Serialize};

/// One of the two competing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Faction {
    /// The white side.
    White,
    /// The black side.
    Black,
}

impl Faction {
    /// Both factions, in placement order.
    pub const ALL: [Self; 2] = [Self::White, Self::Black];

    /// The opposing faction.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Short display name.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Black => "Black",
        }
    }
}
