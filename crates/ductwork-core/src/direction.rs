//! Compass directions, cardinal connection masks, and held-movement input.
//!
//! Angles are compass bearings in whole degrees: 0 is North and angles grow
//! clockwise. Grid offsets use screen orientation, so North is `(0, -1)`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the eight compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// All eight directions, clockwise from North.
    pub fn all() -> [Direction; 8] {
        [
            Direction::North,
            Direction::NorthEast,
            Direction::East,
            Direction::SouthEast,
            Direction::South,
            Direction::SouthWest,
            Direction::West,
            Direction::NorthWest,
        ]
    }

    /// The four cardinal directions.
    pub fn cardinals() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    fn index(self) -> i32 {
        self as i32
    }

    fn from_index(index: i32) -> Self {
        Self::all()[index.rem_euclid(8) as usize]
    }

    /// Bearing of this direction in degrees.
    pub fn degrees(self) -> i32 {
        self.index() * 45
    }

    /// Nearest direction to a bearing. Halfway bearings round clockwise.
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        Self::from_index((normalized * 2 + 45) / 90)
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 4)
    }

    /// This direction turned clockwise by `degrees` (rounded to 45).
    pub fn rotated(self, degrees: i32) -> Self {
        Self::from_degrees(self.degrees() + degrees.rem_euclid(360))
    }

    /// Whether this is one of the four diagonal directions.
    pub fn is_diagonal(self) -> bool {
        self.index() % 2 == 1
    }

    /// Tile offset for one step in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }
}

// ---------------------------------------------------------------------------
// PipeDirection
// ---------------------------------------------------------------------------

/// Cardinal connection mask of a pipe node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PipeDirection(u8);

impl PipeDirection {
    pub const NONE: PipeDirection = PipeDirection(0);
    pub const NORTH: PipeDirection = PipeDirection(1 << 0);
    pub const SOUTH: PipeDirection = PipeDirection(1 << 1);
    pub const WEST: PipeDirection = PipeDirection(1 << 2);
    pub const EAST: PipeDirection = PipeDirection(1 << 3);
    pub const LONGITUDINAL: PipeDirection = PipeDirection(1 << 0 | 1 << 1);
    pub const LATERAL: PipeDirection = PipeDirection(1 << 2 | 1 << 3);
    pub const FOURWAY: PipeDirection = PipeDirection(0b1111);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Build a mask from raw bits; bits above the four cardinals are dropped.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::FOURWAY.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: PipeDirection) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: PipeDirection) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether this mask exposes `direction`. Diagonals need both of their
    /// cardinal bits.
    pub fn has_direction(self, direction: Direction) -> bool {
        let wanted = PipeDirection::from(direction);
        !wanted.is_empty() && self.contains(wanted)
    }

    /// Rotate one quarter turn clockwise.
    pub fn rotate_cw(self) -> Self {
        let mut out = PipeDirection::NONE;
        if self.contains(Self::NORTH) {
            out = out.union(Self::EAST);
        }
        if self.contains(Self::EAST) {
            out = out.union(Self::SOUTH);
        }
        if self.contains(Self::SOUTH) {
            out = out.union(Self::WEST);
        }
        if self.contains(Self::WEST) {
            out = out.union(Self::NORTH);
        }
        out
    }

    /// Rotate clockwise by `degrees`, snapped to quarter turns.
    pub fn rotated(self, degrees: i32) -> Self {
        let quarter_turns = ((degrees.rem_euclid(360) + 45) / 90) % 4;
        (0..quarter_turns).fold(self, |mask, _| mask.rotate_cw())
    }

    /// The cardinal directions present in this mask, clockwise from North.
    pub fn cardinals(self) -> Vec<Direction> {
        Direction::cardinals()
            .into_iter()
            .filter(|d| self.has_direction(*d))
            .collect()
    }
}

impl From<Direction> for PipeDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::North => Self::NORTH,
            Direction::South => Self::SOUTH,
            Direction::East => Self::EAST,
            Direction::West => Self::WEST,
            Direction::NorthEast => Self::NORTH.union(Self::EAST),
            Direction::NorthWest => Self::NORTH.union(Self::WEST),
            Direction::SouthEast => Self::SOUTH.union(Self::EAST),
            Direction::SouthWest => Self::SOUTH.union(Self::WEST),
        }
    }
}

// ---------------------------------------------------------------------------
// MoveButtons
// ---------------------------------------------------------------------------

/// Movement keys currently held by a traveler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MoveButtons(u8);

impl MoveButtons {
    pub const NONE: MoveButtons = MoveButtons(0);
    pub const UP: MoveButtons = MoveButtons(1 << 0);
    pub const DOWN: MoveButtons = MoveButtons(1 << 1);
    pub const LEFT: MoveButtons = MoveButtons(1 << 2);
    pub const RIGHT: MoveButtons = MoveButtons(1 << 3);

    pub fn union(self, other: MoveButtons) -> Self {
        Self(self.0 | other.0)
    }

    fn held(self, button: MoveButtons) -> bool {
        self.0 & button.0 != 0
    }

    /// Whether any direction key is held.
    pub fn any(self) -> bool {
        self.0 & 0b1111 != 0
    }

    /// The direction these keys point in. Diagonal combinations win over
    /// single keys; opposing keys alone resolve to the first axis checked.
    pub fn direction(self) -> Option<Direction> {
        let up = self.held(Self::UP);
        let down = self.held(Self::DOWN);
        let left = self.held(Self::LEFT);
        let right = self.held(Self::RIGHT);

        match (up, down, left, right) {
            (true, _, _, true) => Some(Direction::NorthEast),
            (true, _, true, _) => Some(Direction::NorthWest),
            (_, true, _, true) => Some(Direction::SouthEast),
            (_, true, true, _) => Some(Direction::SouthWest),
            (true, _, _, _) => Some(Direction::North),
            (_, true, _, _) => Some(Direction::South),
            (_, _, true, _) => Some(Direction::West),
            (_, _, _, true) => Some(Direction::East),
            _ => None,
        }
    }
}

impl From<Direction> for MoveButtons {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::North => Self::UP,
            Direction::South => Self::DOWN,
            Direction::East => Self::RIGHT,
            Direction::West => Self::LEFT,
            Direction::NorthEast => Self::UP.union(Self::RIGHT),
            Direction::NorthWest => Self::UP.union(Self::LEFT),
            Direction::SouthEast => Self::DOWN.union(Self::RIGHT),
            Direction::SouthWest => Self::DOWN.union(Self::LEFT),
        }
    }
}
