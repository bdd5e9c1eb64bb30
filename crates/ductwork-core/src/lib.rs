//! Ductwork Core -- the tube-network traversal engine.
//!
//! Travelers climb into a network of tile-resident tube segments at entries,
//! are carried through it one edge at a time by ephemeral carriers, choose a
//! way out at manifolds, and are released back into the world when they
//! reach an open entry or the network falls apart around them.
//!
//! # Update Pipeline
//!
//! Each call to [`engine::TransitEngine::update`] advances every carrier
//! once:
//!
//! 1. **Pre-tick** -- Rebuild transport groups if anchoring changed; resolve
//!    pending entry commitments.
//! 2. **Transit** -- Run each carrier's state machine: seek, advance, arrive.
//! 3. **Post-tick** -- Deliver buffered events to listeners.
//! 4. **Bookkeeping** -- Advance the clock and compute the state hash.
//!
//! A carrier completes at most one hop per update. Every failure found while
//! ticking ends in [`engine::TransitEngine::exit`] for the affected carrier,
//! so travelers are never lost inside the network.
//!
//! # Key Types
//!
//! - [`engine::TransitEngine`] -- Owns the network, carriers and entity
//!   mirror; the only thing that mutates them.
//! - [`network::Network`] -- Segment arena, tile index and the
//!   [`next_segment`](network::Network::next_segment) resolver.
//! - [`segment::Segment`] -- One tile of tube with its kind and pipe nodes.
//! - [`carrier::Carrier`] -- The moving container and its derived
//!   [`TransitPhase`](carrier::TransitPhase).
//! - [`junction`] -- Entry actions and manifold choices.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`event::EventBus`] -- Ring-buffered events with batched delivery.

pub mod capture;
pub mod carrier;
pub mod commitment;
pub mod config;
pub mod direction;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod junction;
pub mod network;
pub mod query;
pub mod segment;
pub mod sim;
pub mod transit;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
