//! Read-only query API for inspecting transit state.
//!
//! Snapshot types aggregate engine state into convenient views for
//! rendering, UI and debugging. All types are owned copies -- no references
//! into internal engine storage.

use crate::carrier::TransitPhase;
use crate::direction::Direction;
use crate::fixed::Fixed64;
use crate::grid::{GridPosition, WorldPos};
use crate::id::{CarrierId, EntityId, PipeLayer, SegmentId};
use crate::segment::SegmentKind;

// ---------------------------------------------------------------------------
// Carrier snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierSnapshot {
    pub id: CarrierId,
    /// Derived state-machine phase.
    pub phase: TransitPhase,
    pub current: Option<SegmentId>,
    pub previous: Option<SegmentId>,
    /// Destination of the hop in progress.
    pub next: Option<SegmentId>,
    pub direction: Option<Direction>,
    pub layer: PipeLayer,
    /// Interpolated world position.
    pub position: WorldPos,
    /// Seconds left on the current hop. Zero when idle.
    pub time_left: Fixed64,
    pub travelers: Vec<EntityId>,
}

// ---------------------------------------------------------------------------
// Segment snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSnapshot {
    pub id: SegmentId,
    pub kind: SegmentKind,
    pub tile: GridPosition,
    /// Placement rotation in degrees.
    pub rotation: i32,
    pub anchored: bool,
    pub plugged: bool,
    pub welded: bool,
    /// Carriers inside, in insertion order.
    pub occupants: Vec<CarrierId>,
    /// Directions the segment's kind allows, before neighbour filtering.
    pub connectable: Vec<Direction>,
}
