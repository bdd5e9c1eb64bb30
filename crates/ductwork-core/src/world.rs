//! Host entities as the engine sees them.
//!
//! The engine does not own a full entity store; it keeps only the handful of
//! flags transit touches. A captured entity lives in its carrier's frame and
//! its world position is derived from the carrier.

use crate::grid::WorldPos;
use crate::id::{CarrierId, EntityId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Capabilities an entity was spawned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityTraits {
    /// May use entry segments to enter or leave the network.
    pub crawler: bool,
    /// A carryable item.
    pub item: bool,
    /// A biological body.
    pub body: bool,
}

impl EntityTraits {
    /// A crawling creature: has a body and may use entries.
    pub const CRAWLER: EntityTraits = EntityTraits {
        crawler: true,
        item: false,
        body: true,
    };

    /// A loose item.
    pub const ITEM: EntityTraits = EntityTraits {
        crawler: false,
        item: true,
        body: false,
    };

    /// Whether a carrier may hold this entity.
    pub fn is_capturable(&self) -> bool {
        self.item || self.body
    }
}

/// Coordinate frame an entity's position is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// The world/grid frame.
    Ambient,
    /// Inside a carrier; position follows the carrier.
    Carrier(CarrierId),
}

/// Per-entity state mirrored by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub traits: EntityTraits,
    /// Position in the ambient frame. Stale while captured.
    pub(crate) position: WorldPos,
    pub(crate) frame: Frame,
    pub(crate) collidable: bool,
    pub(crate) awake: bool,
    pub(crate) in_transit: bool,
}

impl EntityRecord {
    fn new(traits: EntityTraits, position: WorldPos) -> Self {
        Self {
            traits,
            position,
            frame: Frame::Ambient,
            collidable: true,
            awake: true,
            in_transit: false,
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// The carrier moving this entity, if any.
    pub fn carried_by(&self) -> Option<CarrierId> {
        match self.frame {
            Frame::Carrier(c) => Some(c),
            Frame::Ambient => None,
        }
    }

    pub fn is_collidable(&self) -> bool {
        self.collidable
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn in_transit(&self) -> bool {
        self.in_transit
    }
}

/// Arena of entity records.
#[derive(Debug, Default)]
pub struct EntityTable {
    entities: SlotMap<EntityId, EntityRecord>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, traits: EntityTraits, position: WorldPos) -> EntityId {
        self.entities.insert(EntityRecord::new(traits, position))
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(id)
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.entities.remove(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
