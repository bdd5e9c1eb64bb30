//! Carriers: the ephemeral containers that move travelers through the
//! network.
//!
//! A carrier only exists while it is in-network. Its fields are mutated
//! exclusively by the engine; everything here is either a read accessor or
//! `pub(crate)`.

use crate::direction::Direction;
use crate::fixed::{Fixed64, checked_div_64};
use crate::grid::WorldPos;
use crate::id::{EntityId, PipeLayer, SegmentId};
use crate::sim::SimClock;
use serde::{Deserialize, Serialize};

/// Where a carrier is in its per-tick state machine. Derived from the
/// carrier's fields, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitPhase {
    /// No intent and no next segment.
    Idle,
    /// Has a direction but has not resolved a next segment yet.
    Seeking,
    /// Interpolating toward the next segment.
    Advancing,
    /// Time budget exhausted; transfer happens this tick.
    Arrived,
}

/// The moving container.
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    pub(crate) current: Option<SegmentId>,
    pub(crate) previous: Option<SegmentId>,
    /// Set only while a hop is in progress.
    pub(crate) next: Option<SegmentId>,
    pub(crate) direction: Option<Direction>,
    pub(crate) previous_direction: Option<Direction>,
    pub(crate) starting_time: Fixed64,
    pub(crate) time_left: Fixed64,
    /// Clock reading of the last traversal cue.
    pub(crate) last_cue: Option<Fixed64>,
    /// Lane the carrier travels on. At a manifold this is also the lane
    /// excluded from the offered choices.
    pub(crate) layer: PipeLayer,
    pub(crate) moving: bool,
    pub(crate) exiting: bool,
    pub(crate) travelers: Vec<EntityId>,
    /// Offset from the current segment's tile centre.
    pub(crate) offset: (Fixed64, Fixed64),
    /// World position used before the carrier enters its first segment.
    pub(crate) origin: WorldPos,
}

impl Carrier {
    pub(crate) fn new(origin: WorldPos) -> Self {
        Self {
            current: None,
            previous: None,
            next: None,
            direction: None,
            previous_direction: None,
            starting_time: Fixed64::ZERO,
            time_left: Fixed64::ZERO,
            last_cue: None,
            layer: PipeLayer::PRIMARY,
            moving: false,
            exiting: false,
            travelers: Vec::new(),
            offset: (Fixed64::ZERO, Fixed64::ZERO),
            origin,
        }
    }

    pub fn phase(&self) -> TransitPhase {
        match (self.next, self.direction) {
            (Some(_), _) if self.time_left <= Fixed64::ZERO => TransitPhase::Arrived,
            (Some(_), _) => TransitPhase::Advancing,
            (None, Some(_)) if self.moving => TransitPhase::Seeking,
            (None, _) => TransitPhase::Idle,
        }
    }

    pub fn current(&self) -> Option<SegmentId> {
        self.current
    }

    pub fn previous(&self) -> Option<SegmentId> {
        self.previous
    }

    pub fn next(&self) -> Option<SegmentId> {
        self.next
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn previous_direction(&self) -> Option<Direction> {
        self.previous_direction
    }

    pub fn layer(&self) -> PipeLayer {
        self.layer
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting
    }

    pub fn time_left(&self) -> Fixed64 {
        self.time_left
    }

    pub fn travelers(&self) -> &[EntityId] {
        &self.travelers
    }

    pub fn offset(&self) -> (Fixed64, Fixed64) {
        self.offset
    }

    // -- Mutation (engine only) --

    pub(crate) fn begin_hop(&mut self, next: SegmentId, duration: Fixed64) {
        self.next = Some(next);
        self.starting_time = duration;
        self.time_left = duration;
    }

    /// Spend up to `dt` of the hop budget and return the fraction of the
    /// hop completed, in `0..=1`.
    pub(crate) fn advance(&mut self, dt: Fixed64) -> Fixed64 {
        let spent = dt.clamp(Fixed64::ZERO, self.time_left.max(Fixed64::ZERO));
        self.time_left -= spent;
        let remaining = checked_div_64(self.time_left, self.starting_time).unwrap_or(Fixed64::ZERO);
        (Fixed64::ONE - remaining).clamp(Fixed64::ZERO, Fixed64::ONE)
    }

    /// Drop the in-progress hop and the direction intent.
    pub(crate) fn halt(&mut self) {
        self.next = None;
        self.direction = None;
    }

    /// Whether a traversal cue may play: more than `cooldown` seconds have
    /// passed since the last one.
    pub(crate) fn cue_ready(&self, clock: &SimClock, cooldown: Fixed64) -> bool {
        self.last_cue
            .is_none_or(|last| clock.elapsed_since(last) > cooldown)
    }

    pub(crate) fn hold(&mut self, traveler: EntityId) -> bool {
        if self.travelers.contains(&traveler) {
            return false;
        }
        self.travelers.push(traveler);
        true
    }

    pub(crate) fn release(&mut self, traveler: EntityId) -> bool {
        let before = self.travelers.len();
        self.travelers.retain(|t| *t != traveler);
        self.travelers.len() != before
    }
}
