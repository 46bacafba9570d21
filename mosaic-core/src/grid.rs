//! Moore-neighborhood grid geometry: move directions and coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Move Directions
// ============================================================================

/// One of the 8 Moore-neighborhood moves.
///
/// The discriminant order matches the scan order used when building
/// pattern-graph adjacency and when resolving ties between candidate
/// directions, so it must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    UpLeft,
    Up,
    UpRight,
    Left,
    Right,
    DownLeft,
    Down,
    DownRight,
}

impl Direction {
    /// All directions in scan order.
    pub const ALL: [Direction; 8] = [
        Direction::UpLeft,
        Direction::Up,
        Direction::UpRight,
        Direction::Left,
        Direction::Right,
        Direction::DownLeft,
        Direction::Down,
        Direction::DownRight,
    ];

    /// Row/column offset of this move.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::UpLeft => (-1, -1),
            Direction::Up => (-1, 0),
            Direction::UpRight => (-1, 1),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::DownLeft => (1, -1),
            Direction::Down => (1, 0),
            Direction::DownRight => (1, 1),
        }
    }

    /// Wire label of this move (UL, U, UR, L, R, DL, D, DR).
    pub fn label(self) -> &'static str {
        match self {
            Direction::UpLeft => "UL",
            Direction::Up => "U",
            Direction::UpRight => "UR",
            Direction::Left => "L",
            Direction::Right => "R",
            Direction::DownLeft => "DL",
            Direction::Down => "D",
            Direction::DownRight => "DR",
        }
    }

    /// Parse a wire label.
    pub fn from_label(label: &str) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.label() == label)
    }

    /// The move taking `from` to `to`, when the two coordinates are
    /// distinct Moore neighbors.
    pub fn between(from: Coord, to: Coord) -> Option<Direction> {
        let (dr, dc) = (to.row - from.row, to.col - from.col);
        Direction::ALL.into_iter().find(|d| d.offset() == (dr, dc))
    }

    /// The opposite move.
    pub fn reverse(self) -> Direction {
        match self {
            Direction::UpLeft => Direction::DownRight,
            Direction::Up => Direction::Down,
            Direction::UpRight => Direction::DownLeft,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::DownLeft => Direction::UpRight,
            Direction::Down => Direction::Up,
            Direction::DownRight => Direction::UpLeft,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Coordinates
// ============================================================================

/// A matrix coordinate (row, column).
///
/// Signed so that off-grid neighbors of border cells are representable;
/// displayed as `"row-col"`, the node identity encoding of pattern graphs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The coordinate one move away.
    pub fn step(self, dir: Direction) -> Coord {
        let (dr, dc) = dir.offset();
        Coord::new(self.row + dr, self.col + dc)
    }

    /// Whether `other` is a distinct Moore neighbor of `self`.
    pub fn is_neighbor(self, other: Coord) -> bool {
        Direction::between(self, other).is_some()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

/// Error parsing a `"row-col"` coordinate encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCoordError(String);

impl fmt::Display for ParseCoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid coordinate encoding: {:?}", self.0)
    }
}

impl std::error::Error for ParseCoordError {}

impl FromStr for Coord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once('-')
            .ok_or_else(|| ParseCoordError(s.to_string()))?;
        let row = row.parse().map_err(|_| ParseCoordError(s.to_string()))?;
        let col = col.parse().map_err(|_| ParseCoordError(s.to_string()))?;
        Ok(Coord::new(row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_match_scan_order() {
        let expected = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        for (d, off) in Direction::ALL.iter().zip(expected) {
            assert_eq!(d.offset(), off);
        }
    }

    #[test]
    fn test_labels_roundtrip() {
        for d in Direction::ALL {
            assert_eq!(Direction::from_label(d.label()), Some(d));
        }
        assert_eq!(Direction::from_label("XX"), None);
    }

    #[test]
    fn test_between() {
        let c = Coord::new(3, 3);
        assert_eq!(
            Direction::between(c, Coord::new(3, 4)),
            Some(Direction::Right)
        );
        assert_eq!(
            Direction::between(c, Coord::new(2, 2)),
            Some(Direction::UpLeft)
        );
        assert_eq!(Direction::between(c, c), None);
        assert_eq!(Direction::between(c, Coord::new(3, 5)), None);
    }

    #[test]
    fn test_reverse_is_involution() {
        for d in Direction::ALL {
            assert_eq!(d.reverse().reverse(), d);
            let (dr, dc) = d.offset();
            assert_eq!(d.reverse().offset(), (-dr, -dc));
        }
    }

    #[test]
    fn test_coord_display_parse() {
        let c = Coord::new(4, 7);
        assert_eq!(c.to_string(), "4-7");
        assert_eq!("4-7".parse::<Coord>().unwrap(), c);
        assert!("4_7".parse::<Coord>().is_err());
    }

    #[test]
    fn test_step() {
        let c = Coord::new(0, 0);
        assert_eq!(c.step(Direction::UpLeft), Coord::new(-1, -1));
        assert_eq!(c.step(Direction::Down), Coord::new(1, 0));
    }
}
