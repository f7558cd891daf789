/// Grid geometry shared by every layer of the engine.
///
/// Positions are absolute map coordinates with a floor index. The engine
/// only ever compares creatures on the same floor, so most helpers ignore `z`
/// and callers check `same_floor` explicitly.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: u8,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn same_floor(&self, other: &Position) -> bool {
        self.z == other.z
    }

    /// Chebyshev (king-move) distance, ignoring floors.
    pub fn chebyshev(&self, other: &Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position { x: self.x + dx, y: self.y + dy, z: self.z }
    }

    /// `(dx, dy)` from `self` to `other`.
    pub fn delta_to(&self, other: &Position) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Cardinal facing. North is towards negative `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Scan order used wherever directions are compared; earlier wins ties.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East  => 1,
            Direction::South => 2,
            Direction::West  => 3,
        }
    }

    /// Number of clockwise quarter turns from north.
    pub fn quarter_turns(self) -> u8 {
        self.index() as u8
    }
}
