//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::direction::{Direction, MoveButtons, PipeDirection};
use crate::engine::TransitEngine;
use crate::event::{Event, EventKind};
use crate::fixed::Fixed64;
use crate::grid::{GridPosition, WorldPos};
use crate::id::*;
use crate::segment::{PipeNode, Segment, SegmentKind};
use crate::world::EntityTraits;
use std::cell::RefCell;
use std::rc::Rc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Segment constructors
// ===========================================================================

/// An entry with one four-way node on the primary layer.
pub fn entry_at(x: i32, y: i32) -> Segment {
    Segment::new(
        SegmentKind::Entry,
        GridPosition::new(x, y),
        0,
        vec![PipeNode::new(PipeLayer::PRIMARY, PipeDirection::FOURWAY)],
    )
}

/// A north-south pipe on the primary layer.
pub fn straight_ns(x: i32, y: i32) -> Segment {
    layered_ns(x, y, PipeLayer::PRIMARY)
}

/// A north-south pipe on `layer`.
pub fn layered_ns(x: i32, y: i32, layer: PipeLayer) -> Segment {
    Segment::new(
        SegmentKind::Straight,
        GridPosition::new(x, y),
        0,
        vec![PipeNode::new(layer, PipeDirection::LONGITUDINAL)],
    )
}

/// An east-west pipe on `layer`.
pub fn layered_ew(x: i32, y: i32, layer: PipeLayer) -> Segment {
    Segment::new(
        SegmentKind::Straight,
        GridPosition::new(x, y),
        0,
        vec![PipeNode::new(layer, PipeDirection::LATERAL)],
    )
}

/// A four-way manifold with one four-way node on each of the first three
/// layers.
pub fn manifold_at(x: i32, y: i32) -> Segment {
    let nodes = [PipeLayer::PRIMARY, PipeLayer::SECONDARY, PipeLayer::TERTIARY]
        .into_iter()
        .map(|layer| PipeNode::new(layer, PipeDirection::FOURWAY))
        .collect();
    Segment::new(
        SegmentKind::Manifold {
            degrees: vec![0, 90, 180, 270],
        },
        GridPosition::new(x, y),
        0,
        nodes,
    )
}

// ===========================================================================
// Entities
// ===========================================================================

/// A crawler standing on tile `(x, y)`.
pub fn spawn_crawler(engine: &mut TransitEngine, x: i32, y: i32) -> EntityId {
    let position = engine.network().frame().world_from_tile(GridPosition::new(x, y));
    engine.spawn_entity(EntityTraits::CRAWLER, position)
}

/// Spawn a crawler on `entry` and put it straight into the network,
/// skipping the entry delay.
pub fn capture_at(engine: &mut TransitEngine, entry: SegmentId) -> (EntityId, CarrierId) {
    let position = engine
        .network()
        .world_position(entry)
        .unwrap_or(WorldPos::ORIGIN);
    let traveler = engine.spawn_entity(EntityTraits::CRAWLER, position);
    let carrier = engine
        .try_insert(entry, traveler)
        .expect("test entry should accept a crawler");
    (traveler, carrier)
}

/// Buttons that hold `direction`.
pub fn buttons_for(direction: Direction) -> MoveButtons {
    let (dx, dy) = direction.offset();
    let mut buttons = MoveButtons::NONE;
    if dy < 0 {
        buttons = buttons.union(MoveButtons::UP);
    }
    if dy > 0 {
        buttons = buttons.union(MoveButtons::DOWN);
    }
    if dx < 0 {
        buttons = buttons.union(MoveButtons::LEFT);
    }
    if dx > 0 {
        buttons = buttons.union(MoveButtons::RIGHT);
    }
    buttons
}

/// Hold `direction` for a captured traveler.
pub fn hold(engine: &mut TransitEngine, traveler: EntityId, direction: Direction) {
    engine
        .move_input(traveler, buttons_for(direction))
        .expect("traveler should be captured");
}

// ===========================================================================
// Layouts
// ===========================================================================

/// A straight north-bound run: an entry at the origin and `length` pipes
/// north of it.
pub fn build_straight_run(engine: &mut TransitEngine, length: i32) -> (SegmentId, Vec<SegmentId>) {
    let entry = engine.add_segment(entry_at(0, 0));
    let pipes = (1..=length)
        .map(|y| engine.add_segment(straight_ns(0, -y)))
        .collect();
    (entry, pipes)
}

/// Handles into [`manifold_cross`].
#[derive(Debug, Clone, Copy)]
pub struct ManifoldCross {
    pub entry: SegmentId,
    pub manifold: SegmentId,
    /// East of the manifold on the secondary layer.
    pub east_secondary: SegmentId,
    /// West of the manifold on the primary layer.
    pub west_primary: SegmentId,
    /// North of the manifold on the tertiary layer.
    pub north_tertiary: SegmentId,
}

/// A manifold at the origin fed from an entry to its south, with exits east
/// (secondary), west (primary) and north (tertiary).
pub fn manifold_cross(engine: &mut TransitEngine) -> ManifoldCross {
    ManifoldCross {
        entry: engine.add_segment(entry_at(0, 1)),
        manifold: engine.add_segment(manifold_at(0, 0)),
        east_secondary: engine.add_segment(layered_ew(1, 0, PipeLayer::SECONDARY)),
        west_primary: engine.add_segment(layered_ew(-1, 0, PipeLayer::PRIMARY)),
        north_tertiary: engine.add_segment(layered_ns(0, -1, PipeLayer::TERTIARY)),
    }
}

/// Capture a crawler at the cross's entry and crawl north into the
/// manifold, arriving on the primary layer.
pub fn ride_into_manifold(engine: &mut TransitEngine, layout: &ManifoldCross) -> (EntityId, CarrierId) {
    let (traveler, carrier) = capture_at(engine, layout.entry);
    hold(engine, traveler, Direction::North);
    let hop = engine.config().hop_duration;
    engine.update(hop);
    engine
        .move_input(traveler, MoveButtons::NONE)
        .expect("traveler should still be captured");
    (traveler, carrier)
}

// ===========================================================================
// Event capture
// ===========================================================================

/// Records every event delivered to passive listeners.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    /// Register listeners for every event kind on `engine`.
    pub fn attach(engine: &mut TransitEngine) -> Self {
        let log = Self::default();
        for kind in EventKind::ALL {
            let sink = Rc::clone(&log.events);
            engine.on_passive(kind, Box::new(move |event| sink.borrow_mut().push(event.clone())));
        }
        log
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}
