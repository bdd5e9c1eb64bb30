//! Typed event system with pre-allocated ring buffers.
//!
//! Events are emitted while the engine mutates carriers and segments and are
//! delivered in batch during the post-tick phase of [`TransitEngine::update`].
//! Each event kind gets its own bounded [`EventBuffer`], created on the first
//! emit of that kind.
//!
//! Events raised outside `update` (a host calling `exit` or `unanchor`
//! directly) stay buffered until the next post-tick.
//!
//! # Suppression
//!
//! [`EventBus::suppress`] turns a kind off entirely: nothing is buffered or
//! delivered for it afterwards.
//!
//! [`TransitEngine::update`]: crate::engine::TransitEngine::update

use crate::direction::Direction;
use crate::fixed::Ticks;
use crate::id::*;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Why the engine is telling an entity something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// The entry the entity tried to use is welded shut.
    WeldedShut,
}

/// A transit event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Segments --
    SegmentPlugged {
        segment: SegmentId,
        tick: Ticks,
    },
    SegmentUnplugged {
        segment: SegmentId,
        evicted: u32,
        tick: Ticks,
    },

    // -- Capture --
    TravelerCaptured {
        traveler: EntityId,
        carrier: CarrierId,
        tick: Ticks,
    },
    CarrierEntered {
        carrier: CarrierId,
        segment: SegmentId,
        tick: Ticks,
    },

    // -- Movement --
    HopStarted {
        carrier: CarrierId,
        from: SegmentId,
        to: SegmentId,
        direction: Direction,
        tick: Ticks,
    },
    HopBlocked {
        carrier: CarrierId,
        segment: SegmentId,
        tick: Ticks,
    },
    TraversalCue {
        carrier: CarrierId,
        segment: SegmentId,
        tick: Ticks,
    },

    // -- Release --
    TravelerReleased {
        traveler: EntityId,
        carrier: CarrierId,
        tick: Ticks,
    },
    CarrierExited {
        carrier: CarrierId,
        segment: Option<SegmentId>,
        tick: Ticks,
    },
    TransitFlagChanged {
        entity: EntityId,
        in_transit: bool,
        tick: Ticks,
    },

    // -- Interaction --
    EntryStarted {
        commitment: CommitmentId,
        user: EntityId,
        entry: SegmentId,
        tick: Ticks,
    },
    EntryCancelled {
        commitment: CommitmentId,
        user: EntityId,
        entry: SegmentId,
        tick: Ticks,
    },
    Notice {
        entity: EntityId,
        kind: NoticeKind,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SegmentPlugged,
    SegmentUnplugged,
    TravelerCaptured,
    CarrierEntered,
    HopStarted,
    HopBlocked,
    TraversalCue,
    TravelerReleased,
    CarrierExited,
    TransitFlagChanged,
    EntryStarted,
    EntryCancelled,
    Notice,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 13;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SegmentPlugged { .. } => EventKind::SegmentPlugged,
            Event::SegmentUnplugged { .. } => EventKind::SegmentUnplugged,
            Event::TravelerCaptured { .. } => EventKind::TravelerCaptured,
            Event::CarrierEntered { .. } => EventKind::CarrierEntered,
            Event::HopStarted { .. } => EventKind::HopStarted,
            Event::HopBlocked { .. } => EventKind::HopBlocked,
            Event::TraversalCue { .. } => EventKind::TraversalCue,
            Event::TravelerReleased { .. } => EventKind::TravelerReleased,
            Event::CarrierExited { .. } => EventKind::CarrierExited,
            Event::TransitFlagChanged { .. } => EventKind::TransitFlagChanged,
            Event::EntryStarted { .. } => EventKind::EntryStarted,
            Event::EntryCancelled { .. } => EventKind::EntryCancelled,
            Event::Notice { .. } => EventKind::Notice,
        }
    }

    /// The tick this event was raised on.
    pub fn tick(&self) -> Ticks {
        match self {
            Event::SegmentPlugged { tick, .. }
            | Event::SegmentUnplugged { tick, .. }
            | Event::TravelerCaptured { tick, .. }
            | Event::CarrierEntered { tick, .. }
            | Event::HopStarted { tick, .. }
            | Event::HopBlocked { tick, .. }
            | Event::TraversalCue { tick, .. }
            | Event::TravelerReleased { tick, .. }
            | Event::CarrierExited { tick, .. }
            | Event::TransitFlagChanged { tick, .. }
            | Event::EntryStarted { tick, .. }
            | Event::EntryCancelled { tick, .. }
            | Event::Notice { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    /// Every event kind, in delivery order.
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::SegmentPlugged,
        EventKind::SegmentUnplugged,
        EventKind::TravelerCaptured,
        EventKind::CarrierEntered,
        EventKind::HopStarted,
        EventKind::HopBlocked,
        EventKind::TraversalCue,
        EventKind::TravelerReleased,
        EventKind::CarrierExited,
        EventKind::TransitFlagChanged,
        EventKind::EntryStarted,
        EventKind::EntryCancelled,
        EventKind::Notice,
    ];

    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: bounded ring buffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring of events for one kind. When full, pushing drops the
/// oldest event.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    capacity: usize,
    /// Lifetime count of pushes, including dropped events.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events lost to overflow over the buffer's lifetime.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity as u64)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Event> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Predicate deciding whether a listener sees an event.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// When a listener runs relative to the others on the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Pre,
    Normal,
    Post,
}

struct Listener {
    priority: ListenerPriority,
    filter: Option<EventFilter>,
    callback: PassiveListener,
}

impl Listener {
    fn notify(&mut self, event: &Event) {
        if self.filter.as_ref().is_none_or(|accept| accept(event)) {
            (self.callback)(event);
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One lazily created buffer per event kind, plus listeners and suppression
/// flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    /// Kept sorted by priority; equal priorities stay in registration order.
    listeners: [Vec<Listener>; EVENT_KIND_COUNT],
    capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners: usize = self.listeners.iter().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("listeners", &listeners)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl EventBus {
    /// `capacity` is the ring size used for every kind.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            capacity,
        }
    }

    /// Stop recording `kind`. Its buffer is dropped and never recreated.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, ListenerPriority::Normal, None, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: ListenerPriority,
        filter: Option<EventFilter>,
        callback: PassiveListener,
    ) {
        let list = &mut self.listeners[kind.index()];
        let at = list.partition_point(|l| l.priority <= priority);
        list.insert(
            at,
            Listener {
                priority,
                filter,
                callback,
            },
        );
    }

    /// Hand every buffered event to its kind's listeners and empty the
    /// buffers. Kinds are visited in [`EventKind::ALL`] order.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            let events = buffer.drain();
            for listener in &mut self.listeners[idx] {
                for event in &events {
                    listener.notify(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Events waiting for the next delivery, oldest first.
    pub fn buffered(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.buffers[kind.index()].iter().flat_map(EventBuffer::iter)
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Lifetime count for a kind, including dropped events.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::total_written)
    }

    /// Empty every buffer without delivering.
    pub fn clear_all(&mut self) {
        self.buffers.iter_mut().flatten().for_each(EventBuffer::clear);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
