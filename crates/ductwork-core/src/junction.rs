//! The interaction surface: entry and exit actions on entries, and the
//! explicit choices offered at manifolds.
//!
//! Everything here is data. Presenting the actions (menus, labels, icons) is
//! the host's job; the engine only enumerates them and carries them out.

use crate::direction::Direction;
use crate::engine::{TransitEngine, TransitError};
use crate::event::{Event, NoticeKind};
use crate::id::{CommitmentId, EntityId, PipeLayer, SegmentId};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The action an entry offers to a crawler standing at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryAction {
    Enter,
    Exit,
}

/// Conventional name of a layer, for labelling choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerName {
    Primary,
    Secondary,
    Tertiary,
    Unknown,
}

impl From<PipeLayer> for LayerName {
    fn from(layer: PipeLayer) -> Self {
        match layer.0 {
            0 => LayerName::Primary,
            1 => LayerName::Secondary,
            2 => LayerName::Tertiary,
            _ => LayerName::Unknown,
        }
    }
}

/// One way out of a manifold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionChoice {
    pub direction: Direction,
    pub layer: PipeLayer,
    pub layer_name: LayerName,
    /// The segment the choice currently leads to.
    pub destination: SegmentId,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

impl TransitEngine {
    /// What `user` can do at `entry` right now, if anything.
    ///
    /// Only plugged entries offer actions, and only to crawlers. A user
    /// whose carrier sits in this entry may leave; a free user may enter.
    pub fn entry_action(&self, entry: SegmentId, user: EntityId) -> Option<EntryAction> {
        let segment = self.network.get(entry)?;
        if !segment.kind().is_entry() || !segment.is_plugged() {
            return None;
        }
        let record = self.entities.get(user)?;
        if !record.traits.crawler {
            return None;
        }
        match record.carried_by() {
            None => Some(EntryAction::Enter),
            Some(carrier) => {
                let inside = self
                    .carriers
                    .get(carrier)
                    .is_some_and(|c| c.current == Some(entry));
                inside.then_some(EntryAction::Exit)
            }
        }
    }

    /// Start climbing into `entry`. Completes after `enter_delay` unless the
    /// user moves first. A second request while one is pending returns the
    /// pending commitment.
    pub fn try_enter(&mut self, entry: SegmentId, user: EntityId) -> Result<CommitmentId, TransitError> {
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
        let welded = segment.is_welded();

        let record = self
            .entities
            .get(user)
            .ok_or(TransitError::EntityNotFound(user))?;
        if !record.traits.crawler {
            return Err(TransitError::NotACrawler(user));
        }
        if record.carried_by().is_some() {
            return Err(TransitError::AlreadyCaptured(user));
        }
        let origin = record.position;

        if welded {
            self.notify_sealed(user);
            return Err(TransitError::Sealed(entry));
        }

        if let Some(pending) = self.commitments.pending_for(user) {
            return Ok(pending);
        }

        let commitment = self
            .commitments
            .start(user, entry, origin, self.config.enter_delay);
        let tick = self.clock.tick;
        self.emit(Event::EntryStarted {
            commitment,
            user,
            entry,
            tick,
        });
        debug!(user = ?user, entry = ?entry, "entry started");
        Ok(commitment)
    }

    /// Climb out of `entry` from inside it.
    pub fn try_exit(&mut self, entry: SegmentId, user: EntityId) -> Result<(), TransitError> {
        let carrier = self
            .entities
            .get(user)
            .ok_or(TransitError::EntityNotFound(user))?
            .carried_by()
            .ok_or(TransitError::NotCaptured(user))?;
        let inside = self
            .carriers
            .get(carrier)
            .is_some_and(|c| c.current == Some(entry));
        if !inside {
            return Err(TransitError::NotInside {
                entity: user,
                segment: entry,
            });
        }
        let segment = self
            .network
            .get(entry)
            .ok_or(TransitError::SegmentNotFound(entry))?;
        if !segment.kind().is_entry() {
            return Err(TransitError::NotAnEntry(entry));
        }
        if segment.is_welded() {
            self.notify_sealed(user);
            return Err(TransitError::Sealed(entry));
        }

        self.exit(carrier);
        Ok(())
    }

    fn notify_sealed(&mut self, entity: EntityId) {
        let tick = self.clock.tick;
        self.emit(Event::Notice {
            entity,
            kind: NoticeKind::WeldedShut,
            tick,
        });
    }

    // -----------------------------------------------------------------------
    // Manifolds
    // -----------------------------------------------------------------------

    /// Every reachable `(direction, layer)` pair out of `manifold` for the
    /// user inside it, skipping the layer the user arrived on.
    ///
    /// Returns an empty list when the user is not inside this manifold.
    pub fn manifold_choices(&self, manifold: SegmentId, user: EntityId) -> Vec<JunctionChoice> {
        let Some(carrier) = self
            .carrier_of(user)
            .and_then(|id| self.carriers.get(id))
            .filter(|c| c.current == Some(manifold))
        else {
            return Vec::new();
        };
        let Some(segment) = self.network.get(manifold).filter(|s| s.kind().is_manifold()) else {
            return Vec::new();
        };

        let directions = segment.connectable_directions();
        let mut choices = Vec::new();
        for layer in (0..self.config.layer_count).map(PipeLayer) {
            if layer == carrier.layer {
                continue;
            }
            for &direction in &directions {
                if let Some(destination) = self.network.next_segment(manifold, direction, layer) {
                    choices.push(JunctionChoice {
                        direction,
                        layer,
                        layer_name: LayerName::from(layer),
                        destination,
                    });
                }
            }
        }
        choices
    }

    /// Leave `manifold` in `direction` on `layer`. The chosen layer becomes
    /// the one excluded at the next manifold.
    pub fn select_choice(
        &mut self,
        manifold: SegmentId,
        user: EntityId,
        direction: Direction,
        layer: PipeLayer,
    ) -> Result<SegmentId, TransitError> {
        let carrier = self
            .entities
            .get(user)
            .ok_or(TransitError::EntityNotFound(user))?
            .carried_by()
            .ok_or(TransitError::NotCaptured(user))?;
        let holder = self
            .carriers
            .get(carrier)
            .ok_or(TransitError::CarrierNotFound(carrier))?;
        if holder.current != Some(manifold) {
            return Err(TransitError::NotInside {
                entity: user,
                segment: manifold,
            });
        }
        if holder.next.is_some() {
            return Err(TransitError::InMotion(carrier));
        }
        let arrival = holder.layer;
        let segment = self
            .network
            .get(manifold)
            .ok_or(TransitError::SegmentNotFound(manifold))?;
        if !segment.kind().is_manifold() {
            return Err(TransitError::NotAManifold(manifold));
        }
        // Only pairs `manifold_choices` could offer.
        if layer == arrival
            || layer.0 >= self.config.layer_count
            || !segment.connectable_directions().contains(&direction)
        {
            return Err(TransitError::Unreachable(manifold));
        }
        let destination = self
            .network
            .next_segment(manifold, direction, layer)
            .ok_or(TransitError::Unreachable(manifold))?;

        if let Some(holder) = self.carriers.get_mut(carrier) {
            holder.layer = layer;
        }
        self.enter_network(carrier, destination)?;
        self.play_cue(carrier, destination);
        debug!(carrier = ?carrier, manifold = ?manifold, ?direction, layer = layer.0, "manifold choice taken");
        Ok(destination)
    }

    /// [`select_choice`](Self::select_choice) for an enumerated choice.
    pub fn take_choice(
        &mut self,
        manifold: SegmentId,
        user: EntityId,
        choice: &JunctionChoice,
    ) -> Result<SegmentId, TransitError> {
        self.select_choice(manifold, user, choice.direction, choice.layer)
    }
}
