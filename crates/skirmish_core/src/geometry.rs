//! Board geometry.
//!
//! Pure helpers mapping directions and offsets to board cells. The board
//! origin is the top-left cell: `x` grows to the right, `y` grows downward.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell on the board.
///
/// Coordinates are signed so that offsets landing off the board can be
/// represented and rejected by [`Board::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column, 0 at the left edge.
    pub x: i32,
    /// Row, 0 at the top edge.
    pub y: i32,
}

impl Position {
    /// Create a position from coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position shifted by `(dx, dy)`.
    ///
    /// Saturates at the `i32` bounds. A saturated coordinate is never on a
    /// board, since board sides are `u16`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Position `distance` cells away along `direction`. Saturates like
    /// [`Position::offset`].
    #[must_use]
    pub const fn step(self, direction: Direction, distance: i32) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx.saturating_mul(distance), dy.saturating_mul(distance))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal direction of a move or an orthogonal shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Towards row 0.
    Up,
    /// Away from row 0.
    Down,
    /// Towards column 0.
    Left,
    /// Away from column 0.
    Right,
}

impl Direction {
    /// All four directions.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit vector `(dx, dy)` for this direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// Rectangular board dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Number of columns.
    pub width: u16,
    /// Number of rows.
    pub height: u16,
}

impl Board {
    /// Create board dimensions. Size limits are checked by the lifecycle.
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Whether `pos` lies within `[0, width) x [0, height)`.
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < i32::from(self.width) && pos.y < i32::from(self.height)
    }

    /// Number of cells.
    #[must_use]
    pub fn capacity(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Position of the cell with row-major `index`.
    ///
    /// `index` must be below [`Board::capacity`].
    #[must_use]
    pub fn position_at(&self, index: usize) -> Position {
        let width = usize::from(self.width.max(1));
        // Both quotient and remainder are bounded by u16 sides.
        let x = i32::try_from(index % width).unwrap_or(i32::MAX);
        let y = i32::try_from(index / width).unwrap_or(i32::MAX);
        Position::new(x, y)
    }

    /// Iterate over every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.capacity()).map(|index| self.position_at(index))
    }
}
