//! The per-carrier state machine run once per carrier per update.
//!
//! Idle/Seeking resolve a next segment, Advancing interpolates toward it and
//! Arrived transfers the carrier. A carrier finishes at most one hop per
//! update; budget left over after an arrival is discarded.

use crate::engine::TransitEngine;
use crate::event::Event;
use crate::fixed::{Fixed64, lerp};
use crate::id::{CarrierId, SegmentId};
use tracing::{debug, trace, warn};

impl TransitEngine {
    pub(crate) fn step_carrier(&mut self, id: CarrierId, dt: Fixed64) {
        let Some(carrier) = self.carriers.get(id) else {
            return;
        };
        if carrier.exiting {
            return;
        }
        if carrier.next.is_none() && carrier.direction.is_none() {
            return;
        }
        let Some(current) = carrier.current else {
            return;
        };
        if !self.network.contains(current) {
            warn!(carrier = ?id, segment = ?current, "current segment vanished; exiting");
            self.exit(id);
            return;
        }

        if carrier.moving && carrier.next.is_none() && !self.seek(id, current) {
            return;
        }

        self.advance_hop(id, current, dt);
    }

    /// Resolve the next segment in the held direction. Returns whether a hop
    /// started; otherwise the carrier is idle or gone.
    fn seek(&mut self, id: CarrierId, current: SegmentId) -> bool {
        let hop_duration = self.config.hop_duration;
        let Some(carrier) = self.carriers.get_mut(id) else {
            return false;
        };
        let Some(direction) = carrier.direction else {
            return false;
        };
        let Some(segment) = self.network.get(current) else {
            return false;
        };

        if segment.kind().is_manifold() {
            carrier.halt();
            trace!(carrier = ?id, segment = ?current, "waiting at manifold");
            return false;
        }

        let layer = carrier.layer;
        if let Some(next) = self.network.next_segment(current, direction, layer) {
            carrier.begin_hop(next, hop_duration);
            let tick = self.clock.tick;
            self.emit(Event::HopStarted {
                carrier: id,
                from: current,
                to: next,
                direction,
                tick,
            });
            trace!(carrier = ?id, from = ?current, to = ?next, ?direction, "hop started");
            return true;
        }

        if segment.connectable_directions().contains(&direction) {
            if segment.kind().is_entry() {
                debug!(carrier = ?id, segment = ?current, "dead end at entry; exiting");
                self.exit(id);
                return false;
            }
            let can_go_back = self
                .network
                .next_segment(current, direction.opposite(), layer)
                .is_some();
            if !can_go_back {
                debug!(carrier = ?id, segment = ?current, "no way forward or back; exiting");
                self.exit(id);
                return false;
            }
        }

        if let Some(carrier) = self.carriers.get_mut(id) {
            carrier.halt();
        }
        false
    }

    /// Spend this update's budget on the in-progress hop and transfer the
    /// carrier once the budget is exhausted.
    fn advance_hop(&mut self, id: CarrierId, current: SegmentId, dt: Fixed64) {
        let Some(carrier) = self.carriers.get_mut(id) else {
            return;
        };
        let Some(next) = carrier.next else {
            return;
        };

        match (
            self.network.world_position(current),
            self.network.world_position(next),
        ) {
            (Some(from), Some(to)) => {
                if carrier.time_left > Fixed64::ZERO {
                    let progress = carrier.advance(dt);
                    let (dx, dy) = to.delta(from);
                    carrier.offset = (
                        lerp(Fixed64::ZERO, dx, progress),
                        lerp(Fixed64::ZERO, dy, progress),
                    );
                }
            }
            // Destination gone mid-hop: arrive now and let the transfer fail.
            _ => carrier.time_left = Fixed64::ZERO,
        }

        if carrier.time_left <= Fixed64::ZERO {
            self.arrive(id, current, next);
        }
    }

    /// Transfer a carrier whose hop budget is exhausted.
    ///
    /// Entries end the trip: an open one lets the carrier out, a welded one
    /// sends it back. Welding any other kind does not affect travel.
    fn arrive(&mut self, id: CarrierId, current: SegmentId, next: SegmentId) {
        if let Some(segment) = self.network.get_mut(current) {
            segment.remove(id);
        }

        let Some(destination) = self.network.get(next) else {
            warn!(carrier = ?id, segment = ?next, "destination vanished mid-hop; exiting");
            self.exit(id);
            return;
        };

        if destination.kind().is_entry() {
            if destination.is_welded() {
                self.block(id, current);
                return;
            }
            debug!(carrier = ?id, segment = ?next, "reached open entry; exiting");
            self.exit(id);
            return;
        }

        match self.enter_network(id, next) {
            Ok(()) => {
                if let Some(carrier) = self.carriers.get_mut(id) {
                    carrier.next = None;
                }
                self.play_cue(id, next);
            }
            Err(err) => {
                debug!(carrier = ?id, segment = ?next, %err, "transfer failed");
                if self.carriers.contains_key(id) {
                    self.block(id, current);
                }
            }
        }
    }

    /// Abort the hop and put the carrier back where it was.
    fn block(&mut self, id: CarrierId, current: SegmentId) {
        let reinserted = self
            .network
            .get_mut(current)
            .is_some_and(|segment| segment.insert(id) || segment.occupants().contains(&id));
        if !reinserted {
            warn!(carrier = ?id, segment = ?current, "cannot return carrier to its segment; exiting");
            self.exit(id);
            return;
        }
        if let Some(carrier) = self.carriers.get_mut(id) {
            carrier.halt();
            carrier.offset = (Fixed64::ZERO, Fixed64::ZERO);
        }
        let tick = self.clock.tick;
        self.emit(Event::HopBlocked {
            carrier: id,
            segment: current,
            tick,
        });
        debug!(carrier = ?id, segment = ?current, "hop blocked");
    }

    /// Raise a traversal cue unless one played within the cooldown.
    pub(crate) fn play_cue(&mut self, id: CarrierId, segment: SegmentId) {
        let clock = self.clock;
        let cooldown = self.config.cue_cooldown;
        let Some(carrier) = self.carriers.get_mut(id) else {
            return;
        };
        if !carrier.cue_ready(&clock, cooldown) {
            return;
        }
        carrier.last_cue = Some(clock.now);
        let tick = self.clock.tick;
        self.emit(Event::TraversalCue {
            carrier: id,
            segment,
            tick,
        });
    }
}
