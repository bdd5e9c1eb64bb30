//! The transit engine: owns the segment network, the carriers and the
//! entity mirror, and orchestrates the per-update pipeline.
//!
//! # Architecture
//!
//! The `TransitEngine` owns:
//! - A [`Network`] (segments, tile index, transport groups)
//! - A [`SlotMap`] of [`Carrier`]s
//! - An [`EntityTable`] mirroring the host entities transit touches
//! - A [`CommitmentQueue`] of pending entries
//! - A [`SimClock`] and an [`EventBus`]
//!
//! No other component mutates carriers or segments; the operations that do
//! are spread over `engine`, `transit`, `capture` and `junction` as `impl`
//! blocks on this one type.
//!
//! # Update pipeline
//!
//! Each `update(dt)` runs:
//! 1. **Pre-tick** -- regroup nodes if anchoring changed; resolve entry commitments
//! 2. **Transit** -- advance every carrier's state machine once
//! 3. **Post-tick** -- deliver buffered events to listeners
//! 4. **Bookkeeping** -- advance the clock, compute the state hash

use crate::carrier::Carrier;
use crate::commitment::{CancelReason, CommitmentOutcome, CommitmentQueue, PendingEntry};
use crate::config::{ConfigError, TransitConfig};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::fixed::{Fixed64, Ticks};
use crate::grid::{GridFrame, GridPosition, WorldPos};
use crate::id::{CarrierId, EntityId, SegmentId};
use crate::network::{Network, NetworkError};
use crate::query::{CarrierSnapshot, SegmentSnapshot};
use crate::segment::Segment;
use crate::sim::{SimClock, StateHash};
use crate::world::{EntityRecord, EntityTable, EntityTraits, Frame};
use slotmap::{Key, SlotMap};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced to callers of engine operations.
///
/// None of these are raised from inside `update`: inconsistent state found
/// while ticking is resolved by exiting the affected carrier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitError {
    #[error("entity {0:?} is neither an item nor a body")]
    Ineligible(EntityId),
    #[error("entity {0:?} cannot use entries")]
    NotACrawler(EntityId),
    #[error("segment {0:?} is not an entry")]
    NotAnEntry(SegmentId),
    #[error("segment {0:?} is not a manifold")]
    NotAManifold(SegmentId),
    #[error("segment {0:?} is welded shut")]
    Sealed(SegmentId),
    #[error("segment {0:?} is unplugged")]
    Unplugged(SegmentId),
    #[error("entity {0:?} is already captured")]
    AlreadyCaptured(EntityId),
    #[error("entity {0:?} is not captured")]
    NotCaptured(EntityId),
    #[error("entity {entity:?} is not inside segment {segment:?}")]
    NotInside { entity: EntityId, segment: SegmentId },
    #[error("nothing reachable from segment {0:?} that way")]
    Unreachable(SegmentId),
    #[error("carrier {0:?} is mid-hop")]
    InMotion(CarrierId),
    #[error("carrier {0:?} is exiting")]
    Exiting(CarrierId),
    #[error("segment not found: {0:?}")]
    SegmentNotFound(SegmentId),
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),
    #[error("carrier not found: {0:?}")]
    CarrierNotFound(CarrierId),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

// ---------------------------------------------------------------------------
// Segment lifecycle
// ---------------------------------------------------------------------------

/// Callbacks the segment registry raises as segments join and leave the
/// grid. Detaching or breaking evicts every occupant and returns how many
/// carriers were exited.
pub trait SegmentLifecycle {
    fn on_attach(&mut self, segment: SegmentId) -> Result<(), TransitError>;
    fn on_detach(&mut self, segment: SegmentId) -> Result<usize, TransitError>;
    fn on_break(&mut self, segment: SegmentId) -> Result<usize, TransitError>;
}

// ---------------------------------------------------------------------------
// TransitEngine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TransitEngine {
    pub(crate) config: TransitConfig,
    pub(crate) network: Network,
    pub(crate) carriers: SlotMap<CarrierId, Carrier>,
    pub(crate) entities: EntityTable,
    pub(crate) commitments: CommitmentQueue,
    pub(crate) clock: SimClock,
    /// Typed event bus for transit events.
    pub event_bus: EventBus,
    pub(crate) last_state_hash: u64,
}

impl Default for TransitEngine {
    fn default() -> Self {
        Self::build(TransitConfig::default())
    }
}

impl TransitEngine {
    /// Create an engine after validating `config`.
    pub fn new(config: TransitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: TransitConfig) -> Self {
        Self {
            network: Network::new(GridFrame::new(config.tile_size)),
            carriers: SlotMap::with_key(),
            entities: EntityTable::new(),
            commitments: CommitmentQueue::new(),
            clock: SimClock::new(),
            event_bus: EventBus::new(config.event_capacity),
            last_state_hash: 0,
            config,
        }
    }

    pub fn config(&self) -> &TransitConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn tick(&self) -> Ticks {
        self.clock.tick
    }

    /// Simulated seconds elapsed.
    pub fn now(&self) -> Fixed64 {
        self.clock.now
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.event_bus.emit(event);
    }

    // -----------------------------------------------------------------------
    // Segment management
    // -----------------------------------------------------------------------

    /// Register a segment without anchoring it.
    pub fn place_segment(&mut self, segment: Segment) -> SegmentId {
        self.network.place(segment)
    }

    /// Register a segment and anchor it on its tile.
    pub fn add_segment(&mut self, segment: Segment) -> SegmentId {
        let id = self.network.place(segment);
        // A freshly placed segment is never anchored, so this cannot fail.
        let _ = self.on_attach(id);
        id
    }

    pub fn anchor_segment(&mut self, segment: SegmentId) -> Result<(), TransitError> {
        self.on_attach(segment)
    }

    /// Take a segment off the grid, exiting its occupants.
    pub fn unanchor_segment(&mut self, segment: SegmentId) -> Result<usize, TransitError> {
        self.on_detach(segment)
    }

    /// Break a segment in place: it stays anchored but is unplugged.
    pub fn break_segment(&mut self, segment: SegmentId) -> Result<usize, TransitError> {
        self.on_break(segment)
    }

    /// Delete a segment, exiting its occupants first.
    pub fn remove_segment(&mut self, segment: SegmentId) -> Result<usize, TransitError> {
        if !self.network.contains(segment) {
            return Err(TransitError::SegmentNotFound(segment));
        }
        let occupants = self.network.unplug(segment);
        let evicted = self.evict(segment, occupants);
        self.network.remove(segment);
        debug!(segment = ?segment, evicted, "segment removed");
        Ok(evicted)
    }

    /// Change a segment's rotation; its shape is recomputed.
    pub fn rotate_segment(&mut self, segment: SegmentId, rotation: i32) -> Result<(), TransitError> {
        Ok(self.network.rotate(segment, rotation)?)
    }

    /// Move an unanchored segment to another tile.
    pub fn relocate_segment(
        &mut self,
        segment: SegmentId,
        tile: GridPosition,
    ) -> Result<(), TransitError> {
        Ok(self.network.relocate(segment, tile)?)
    }

    /// Weld a segment shut or cut it open.
    pub fn set_welded(&mut self, segment: SegmentId, welded: bool) -> Result<(), TransitError> {
        Ok(self.network.set_welded(segment, welded)?)
    }

    /// Exit every carrier in `occupants` and report the unplug.
    fn evict(&mut self, segment: SegmentId, occupants: Vec<CarrierId>) -> usize {
        let mut evicted = 0;
        for carrier in occupants {
            if self.exit(carrier) {
                evicted += 1;
            }
        }
        let tick = self.clock.tick;
        self.emit(Event::SegmentUnplugged {
            segment,
            evicted: evicted as u32,
            tick,
        });
        evicted
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub fn spawn_entity(&mut self, traits: EntityTraits, position: WorldPos) -> EntityId {
        self.entities.spawn(traits, position)
    }

    pub fn entity(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.entities.get(entity)
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Move an entity that is out in the world.
    pub fn move_entity(&mut self, entity: EntityId, position: WorldPos) -> Result<(), TransitError> {
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(TransitError::EntityNotFound(entity))?;
        if record.carried_by().is_some() {
            return Err(TransitError::AlreadyCaptured(entity));
        }
        record.position = position;
        Ok(())
    }

    /// Current world position of an entity, following its carrier if it is
    /// captured.
    pub fn entity_position(&self, entity: EntityId) -> Option<WorldPos> {
        let record = self.entities.get(entity)?;
        match record.frame() {
            Frame::Ambient => Some(record.position),
            Frame::Carrier(carrier) => self.carrier_position(carrier),
        }
    }

    // -----------------------------------------------------------------------
    // Carriers
    // -----------------------------------------------------------------------

    pub fn carrier(&self, carrier: CarrierId) -> Option<&Carrier> {
        self.carriers.get(carrier)
    }

    pub fn carriers(&self) -> impl Iterator<Item = (CarrierId, &Carrier)> {
        self.carriers.iter()
    }

    pub fn carrier_count(&self) -> usize {
        self.carriers.len()
    }

    /// The carrier currently moving `entity`.
    pub fn carrier_of(&self, entity: EntityId) -> Option<CarrierId> {
        self.entities.get(entity)?.carried_by()
    }

    /// World position of a carrier: its segment's tile centre plus the
    /// interpolated offset.
    pub fn carrier_position(&self, carrier: CarrierId) -> Option<WorldPos> {
        let carrier = self.carriers.get(carrier)?;
        let Some(base) = carrier.current.and_then(|s| self.network.world_position(s)) else {
            return Some(carrier.origin);
        };
        let (dx, dy) = carrier.offset;
        Some(base.offset(dx, dy))
    }

    // -----------------------------------------------------------------------
    // Commitments
    // -----------------------------------------------------------------------

    pub fn pending_entries(&self) -> &CommitmentQueue {
        &self.commitments
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Advance the engine by `dt` seconds.
    pub fn update(&mut self, dt: Fixed64) {
        self.phase_pre_tick(dt);
        self.phase_transit(dt);
        self.phase_post_tick();
        self.phase_bookkeeping(dt);
    }

    fn phase_pre_tick(&mut self, dt: Fixed64) {
        if self.network.groups_dirty() {
            let groups = self.network.regroup();
            trace!(groups, "transport groups rebuilt");
        }

        let entities = &self.entities;
        let network = &self.network;
        let outcomes = self.commitments.advance(dt, |pending| {
            commitment_blocker(entities, network, pending)
        });

        for outcome in outcomes {
            let tick = self.clock.tick;
            match outcome {
                CommitmentOutcome::Cancelled { id, entry, reason } => {
                    debug!(user = ?entry.user, entry = ?entry.entry, ?reason, "entry cancelled");
                    self.emit(Event::EntryCancelled {
                        commitment: id,
                        user: entry.user,
                        entry: entry.entry,
                        tick,
                    });
                }
                CommitmentOutcome::Completed { entry, .. } => {
                    if let Err(err) = self.try_insert(entry.entry, entry.user) {
                        debug!(user = ?entry.user, entry = ?entry.entry, %err, "entry refused");
                    }
                }
            }
        }
    }

    fn phase_transit(&mut self, dt: Fixed64) {
        let ids: Vec<CarrierId> = self.carriers.keys().collect();
        for id in ids {
            self.step_carrier(id, dt);
        }
    }

    fn phase_post_tick(&mut self) {
        self.event_bus.deliver();
    }

    fn phase_bookkeeping(&mut self, dt: Fixed64) {
        self.clock.advance(dt);
        self.last_state_hash = self.compute_state_hash();
    }

    /// The hash computed at the end of the most recent update.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.clock.tick);
        hasher.write_fixed64(self.clock.now);

        for (id, carrier) in &self.carriers {
            hasher.write_u64(id.data().as_ffi());
            hasher.write_u64(carrier.current.map_or(0, |s| s.data().as_ffi()));
            hasher.write_u64(carrier.next.map_or(0, |s| s.data().as_ffi()));
            hasher.write_i32(carrier.direction.map_or(-1, |d| d.degrees()));
            hasher.write_fixed64(carrier.time_left);
            hasher.write_u8(carrier.layer.0);
            hasher.write_bool(carrier.moving);
            hasher.write_fixed64(carrier.offset.0);
            hasher.write_fixed64(carrier.offset.1);
            hasher.write_u32(carrier.travelers.len() as u32);
        }
        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn snapshot_carrier(&self, carrier: CarrierId) -> Option<CarrierSnapshot> {
        let c = self.carriers.get(carrier)?;
        Some(CarrierSnapshot {
            id: carrier,
            phase: c.phase(),
            current: c.current,
            previous: c.previous,
            next: c.next,
            direction: c.direction,
            layer: c.layer,
            position: self.carrier_position(carrier)?,
            time_left: c.time_left,
            travelers: c.travelers.clone(),
        })
    }

    pub fn snapshot_all_carriers(&self) -> Vec<CarrierSnapshot> {
        self.carriers
            .keys()
            .filter_map(|id| self.snapshot_carrier(id))
            .collect()
    }

    pub fn snapshot_segment(&self, segment: SegmentId) -> Option<SegmentSnapshot> {
        let s = self.network.get(segment)?;
        Some(SegmentSnapshot {
            id: segment,
            kind: s.kind().clone(),
            tile: s.tile(),
            rotation: s.rotation(),
            anchored: s.is_anchored(),
            plugged: s.is_plugged(),
            welded: s.is_welded(),
            occupants: s.occupants().to_vec(),
            connectable: s.connectable_directions(),
        })
    }
}

impl SegmentLifecycle for TransitEngine {
    fn on_attach(&mut self, segment: SegmentId) -> Result<(), TransitError> {
        self.network.anchor(segment)?;
        let tick = self.clock.tick;
        self.emit(Event::SegmentPlugged { segment, tick });
        trace!(segment = ?segment, "segment plugged");
        Ok(())
    }

    fn on_detach(&mut self, segment: SegmentId) -> Result<usize, TransitError> {
        let occupants = self.network.unanchor(segment)?;
        Ok(self.evict(segment, occupants))
    }

    fn on_break(&mut self, segment: SegmentId) -> Result<usize, TransitError> {
        if !self.network.contains(segment) {
            return Err(TransitError::SegmentNotFound(segment));
        }
        let occupants = self.network.unplug(segment);
        Ok(self.evict(segment, occupants))
    }
}

/// Why a pending entry can no longer complete, if it cannot.
fn commitment_blocker(
    entities: &EntityTable,
    network: &Network,
    pending: &PendingEntry,
) -> Option<CancelReason> {
    let Some(user) = entities.get(pending.user) else {
        return Some(CancelReason::UserGone);
    };
    if user.carried_by().is_some() || user.position != pending.origin {
        return Some(CancelReason::Moved);
    }
    match network.get(pending.entry) {
        Some(entry) if entry.is_plugged() => None,
        _ => Some(CancelReason::EntryGone),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
