//! Spatial grid: tile coordinates, world positions, and the anchored-segment
//! index the topology resolver reads from.
//!
//! A tile may hold several anchored segments at once (layered pipes stacked
//! on the same floor tile), so the index is a multimap.

use crate::direction::Direction;
use crate::fixed::Fixed64;
use crate::id::SegmentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on the 2D tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent tile one step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (chessboard) distance to another position.
    pub fn chebyshev_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
    }
}

/// A continuous position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: Fixed64,
    pub y: Fixed64,
}

impl WorldPos {
    pub const ORIGIN: WorldPos = WorldPos {
        x: Fixed64::ZERO,
        y: Fixed64::ZERO,
    };

    pub fn new(x: Fixed64, y: Fixed64) -> Self {
        Self { x, y }
    }

    pub fn from_num(x: i32, y: i32) -> Self {
        Self::new(Fixed64::from_num(x), Fixed64::from_num(y))
    }

    pub fn offset(self, dx: Fixed64, dy: Fixed64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Component-wise difference `self - other`.
    pub fn delta(self, other: WorldPos) -> (Fixed64, Fixed64) {
        (self.x - other.x, self.y - other.y)
    }
}

/// Conversion between tile coordinates and world positions. Tile `(x, y)`
/// is centred on world `(x * tile_size, y * tile_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridFrame {
    pub tile_size: Fixed64,
}

impl Default for GridFrame {
    fn default() -> Self {
        Self {
            tile_size: Fixed64::ONE,
        }
    }
}

impl GridFrame {
    pub fn new(tile_size: Fixed64) -> Self {
        Self { tile_size }
    }

    /// World position of a tile's centre.
    pub fn world_from_tile(&self, tile: GridPosition) -> WorldPos {
        WorldPos::new(
            Fixed64::from_num(tile.x) * self.tile_size,
            Fixed64::from_num(tile.y) * self.tile_size,
        )
    }

    /// The tile whose centre is nearest to `pos`.
    pub fn tile_from_world(&self, pos: WorldPos) -> GridPosition {
        let x = (pos.x / self.tile_size).round().to_num::<i32>();
        let y = (pos.y / self.tile_size).round().to_num::<i32>();
        GridPosition::new(x, y)
    }
}

// ---------------------------------------------------------------------------
// TileGrid
// ---------------------------------------------------------------------------

/// Index of anchored segments per tile.
///
/// Only anchored segments are present; unanchoring removes a segment from
/// the index so the resolver can never pick it as a neighbour.
#[derive(Debug, Default, Clone)]
pub struct TileGrid {
    tiles: BTreeMap<GridPosition, Vec<SegmentId>>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor a segment on a tile. Anchoring twice is a no-op.
    pub fn anchor(&mut self, segment: SegmentId, tile: GridPosition) {
        let entries = self.tiles.entry(tile).or_default();
        if !entries.contains(&segment) {
            entries.push(segment);
        }
    }

    /// Remove a segment from a tile. Returns whether it was present.
    pub fn unanchor(&mut self, segment: SegmentId, tile: GridPosition) -> bool {
        let Some(entries) = self.tiles.get_mut(&tile) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|s| *s != segment);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.tiles.remove(&tile);
        }
        removed
    }

    /// Segments anchored on `tile`, in anchoring order.
    pub fn anchored_at(&self, tile: GridPosition) -> &[SegmentId] {
        self.tiles.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_anchored(&self, segment: SegmentId, tile: GridPosition) -> bool {
        self.anchored_at(tile).contains(&segment)
    }

    /// Number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Total anchored segments across all tiles.
    pub fn anchored_count(&self) -> usize {
        self.tiles.values().map(Vec::len).sum()
    }
}
