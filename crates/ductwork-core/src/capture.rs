//! Capture, transfer and release.
//!
//! [`TransitEngine::exit`] is the single safety valve: every failure path in
//! the state machine and every segment disconnect ends up there, so a
//! traveler is never left inside a carrier that no longer has anywhere to be.

use crate::carrier::Carrier;
use crate::direction::MoveButtons;
use crate::engine::{TransitEngine, TransitError};
use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::{CarrierId, ContentsId, EntityId, SegmentId};
use crate::world::Frame;
use tracing::{debug, trace, warn};

impl TransitEngine {
    // -----------------------------------------------------------------------
    // Capture
    // -----------------------------------------------------------------------

    /// Put `traveler` into `carrier`. Only items and bodies qualify. On
    /// success the traveler stops colliding and follows the carrier.
    pub fn try_capture(&mut self, carrier: CarrierId, traveler: EntityId) -> Result<(), TransitError> {
        let record = self
            .entities
            .get_mut(traveler)
            .ok_or(TransitError::EntityNotFound(traveler))?;
        if !record.traits.is_capturable() {
            return Err(TransitError::Ineligible(traveler));
        }
        if record.carried_by().is_some() {
            return Err(TransitError::AlreadyCaptured(traveler));
        }
        let holder = self
            .carriers
            .get_mut(carrier)
            .ok_or(TransitError::CarrierNotFound(carrier))?;
        if holder.exiting {
            return Err(TransitError::Exiting(carrier));
        }
        if !holder.hold(traveler) {
            return Err(TransitError::AlreadyCaptured(traveler));
        }

        record.collidable = false;
        record.frame = Frame::Carrier(carrier);

        let tick = self.clock.tick;
        self.emit(Event::TravelerCaptured {
            traveler,
            carrier,
            tick,
        });
        trace!(traveler = ?traveler, carrier = ?carrier, "traveler captured");
        Ok(())
    }

    /// Spawn a carrier at `entry`, capture `entity` into it and enter the
    /// network there.
    pub fn try_insert(&mut self, entry: SegmentId, entity: EntityId) -> Result<CarrierId, TransitError> {
        let record = self
            .entities
            .get(entity)
            .ok_or(TransitError::EntityNotFound(entity))?;
        if !record.traits.crawler {
            return Err(TransitError::NotACrawler(entity));
        }
        if record.carried_by().is_some() {
            return Err(TransitError::AlreadyCaptured(entity));
        }
        let segment = self
            .network
            .get(entry)
            .ok_or(TransitError::SegmentNotFound(entry))?;
        if !segment.kind().is_entry() {
            return Err(TransitError::NotAnEntry(entry));
        }
        if !segment.is_plugged() {
            return Err(TransitError::Unplugged(entry));
        }

        let origin = self.network.frame().world_from_tile(segment.tile());
        let carrier = self.carriers.insert(Carrier::new(origin));

        if let Err(err) = self.try_capture(carrier, entity) {
            self.carriers.remove(carrier);
            return Err(err);
        }

        self.set_in_transit(entity, true);
        self.enter_network(carrier, entry)?;
        debug!(entity = ?entity, carrier = ?carrier, entry = ?entry, "entered network");
        Ok(carrier)
    }

    // -----------------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------------

    /// Move `carrier` into `destination`. Any failure after the carrier is
    /// known to exist exits it.
    pub fn enter_network(&mut self, carrier: CarrierId, destination: SegmentId) -> Result<(), TransitError> {
        let holder = self
            .carriers
            .get(carrier)
            .ok_or(TransitError::CarrierNotFound(carrier))?;
        if holder.exiting {
            return Err(TransitError::Exiting(carrier));
        }

        for &traveler in &holder.travelers {
            if let Some(record) = self.entities.get_mut(traveler) {
                record.frame = Frame::Carrier(carrier);
            }
        }

        let Some(segment) = self.network.get_mut(destination) else {
            warn!(carrier = ?carrier, segment = ?destination, "destination missing; exiting");
            self.exit(carrier);
            return Err(TransitError::SegmentNotFound(destination));
        };
        if !segment.insert(carrier) {
            debug!(carrier = ?carrier, segment = ?destination, "destination refused carrier; exiting");
            self.exit(carrier);
            return Err(TransitError::Unplugged(destination));
        }
        let keeps_layer = segment.kind().is_manifold();
        let first_layer = segment.first_node().map(|node| node.layer);

        let Some(holder) = self.carriers.get_mut(carrier) else {
            return Err(TransitError::CarrierNotFound(carrier));
        };
        let left = holder.current.filter(|&c| c != destination);
        if let Some(previous) = holder.current {
            holder.previous = Some(previous);
            holder.previous_direction = holder.direction;
        }
        holder.current = Some(destination);
        holder.offset = (Fixed64::ZERO, Fixed64::ZERO);
        if !keeps_layer && let Some(layer) = first_layer {
            holder.layer = layer;
        }

        if let Some(left) = left
            && let Some(segment) = self.network.get_mut(left)
        {
            segment.remove(carrier);
        }

        let tick = self.clock.tick;
        self.emit(Event::CarrierEntered {
            carrier,
            segment: destination,
            tick,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Release every traveler at the carrier's last position and destroy the
    /// carrier. Returns `false` if the carrier is gone or already exiting.
    pub fn exit(&mut self, carrier: CarrierId) -> bool {
        let position = self.carrier_position(carrier);
        let Some(holder) = self.carriers.get_mut(carrier) else {
            return false;
        };
        if holder.exiting {
            return false;
        }
        holder.exiting = true;

        let travelers = std::mem::take(&mut holder.travelers);
        let current = holder.current;
        let tick = self.clock.tick;

        for traveler in travelers {
            if let Some(record) = self.entities.get_mut(traveler) {
                record.frame = Frame::Ambient;
                if let Some(position) = position {
                    record.position = position;
                }
                record.collidable = true;
                record.awake = true;
            }
            self.set_in_transit(traveler, false);
            self.emit(Event::TravelerReleased {
                traveler,
                carrier,
                tick,
            });
        }

        if let Some(segment) = current.and_then(|s| self.network.get_mut(s)) {
            segment.remove(carrier);
        }
        self.carriers.remove(carrier);

        self.emit(Event::CarrierExited {
            carrier,
            segment: current,
            tick,
        });
        debug!(carrier = ?carrier, segment = ?current, "carrier exited");
        true
    }

    fn set_in_transit(&mut self, entity: EntityId, in_transit: bool) {
        let Some(record) = self.entities.get_mut(entity) else {
            return;
        };
        if record.in_transit == in_transit {
            return;
        }
        record.in_transit = in_transit;
        let tick = self.clock.tick;
        self.emit(Event::TransitFlagChanged {
            entity,
            in_transit,
            tick,
        });
    }

    // -----------------------------------------------------------------------
    // Input and lifetime
    // -----------------------------------------------------------------------

    /// Movement keys held by a captured traveler.
    pub fn move_input(&mut self, traveler: EntityId, buttons: MoveButtons) -> Result<(), TransitError> {
        let carrier = self
            .entities
            .get(traveler)
            .ok_or(TransitError::EntityNotFound(traveler))?
            .carried_by()
            .ok_or(TransitError::NotCaptured(traveler))?;
        let holder = self
            .carriers
            .get_mut(carrier)
            .ok_or(TransitError::CarrierNotFound(carrier))?;
        if holder.exiting {
            return Err(TransitError::Exiting(carrier));
        }

        let Some(current) = holder.current.filter(|s| self.network.contains(*s)) else {
            warn!(carrier = ?carrier, "input for carrier outside the network; exiting");
            self.exit(carrier);
            return Ok(());
        };

        holder.moving = buttons.any();
        let Some(direction) = buttons.direction().filter(|_| holder.moving) else {
            holder.direction = None;
            return Ok(());
        };

        let at_manifold = self
            .network
            .get(current)
            .is_some_and(|s| s.kind().is_manifold());
        if !at_manifold || holder.direction.is_some() {
            holder.direction = Some(direction);
            return Ok(());
        }
        if holder.next.is_some() {
            return Ok(());
        }

        if let Some(next) = self.network.next_segment(current, direction, holder.layer) {
            holder.direction = Some(direction);
            holder.begin_hop(next, self.config.hop_duration);
            let tick = self.clock.tick;
            self.emit(Event::HopStarted {
                carrier,
                from: current,
                to: next,
                direction,
                tick,
            });
        }
        Ok(())
    }

    /// Forget a host entity. A traveler is pulled out of its carrier first;
    /// a carrier left empty is destroyed.
    pub fn despawn_entity(&mut self, entity: EntityId) -> Result<(), TransitError> {
        let record = self
            .entities
            .remove(entity)
            .ok_or(TransitError::EntityNotFound(entity))?;
        let Some(carrier) = record.carried_by() else {
            return Ok(());
        };
        let empty = match self.carriers.get_mut(carrier) {
            Some(holder) => {
                holder.release(entity);
                holder.travelers.is_empty()
            }
            None => false,
        };
        if empty {
            self.exit(carrier);
        }
        Ok(())
    }

    /// Contents of the pipe a captured traveler is currently inside: the
    /// first pipe node of the carrier's segment.
    pub fn contents_for(&self, traveler: EntityId) -> Option<ContentsId> {
        let carrier = self.entities.get(traveler)?.carried_by()?;
        let current = self.carriers.get(carrier)?.current?;
        self.network.get(current)?.first_node()?.contents
    }
}
