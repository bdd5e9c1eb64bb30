//! End-to-end scenarios for the transit engine: capture, crawling, manifold
//! choices and the network coming apart around travelers.

use ductwork_core::carrier::TransitPhase;
use ductwork_core::direction::{Direction, MoveButtons};
use ductwork_core::engine::{TransitEngine, TransitError};
use ductwork_core::event::{Event, EventKind};
use ductwork_core::grid::WorldPos;
use ductwork_core::id::PipeLayer;
use ductwork_core::junction::EntryAction;
use ductwork_core::test_utils::*;
use ductwork_core::world::{EntityTraits, Frame};

// ===========================================================================
// Crawling
// ===========================================================================

#[test]
fn entry_to_pipe_in_one_hop_duration() {
    let mut engine = TransitEngine::default();
    let entry = engine.add_segment(entry_at(0, 0));
    let pipe = engine.add_segment(straight_ns(0, -1));
    let (traveler, carrier) = capture_at(&mut engine, entry);

    hold(&mut engine, traveler, Direction::North);
    let hop = engine.config().hop_duration;
    engine.update(hop);

    assert_eq!(engine.carrier(carrier).unwrap().current(), Some(pipe));
    assert_eq!(engine.entity_position(traveler), Some(WorldPos::from_num(0, -1)));
}

#[test]
fn full_trip_from_entry_to_entry() {
    let mut engine = TransitEngine::default();
    let (entry, pipes) = build_straight_run(&mut engine, 4);
    let far = engine.add_segment(entry_at(0, -5));
    let (traveler, carrier) = capture_at(&mut engine, entry);
    let log = EventLog::attach(&mut engine);

    hold(&mut engine, traveler, Direction::North);
    let mut visited = Vec::new();
    for _ in 0..10 {
        engine.update(fixed(0.15));
        match engine.carrier(carrier) {
            Some(c) => visited.extend(c.current()),
            None => break,
        }
    }

    visited.dedup();
    assert_eq!(visited, pipes);
    assert!(engine.carrier(carrier).is_none());
    assert_eq!(engine.entity_position(traveler), Some(WorldPos::from_num(0, -5)));
    assert_eq!(log.count(EventKind::CarrierExited), 1);
    assert!(engine.network().get(far).unwrap().occupants().is_empty());
}

#[test]
fn progress_is_monotonic_within_a_hop() {
    let mut engine = TransitEngine::default();
    let (entry, _) = build_straight_run(&mut engine, 1);
    let (traveler, carrier) = capture_at(&mut engine, entry);
    hold(&mut engine, traveler, Direction::North);

    let mut last = engine.carrier_position(carrier).unwrap().y;
    for _ in 0..6 {
        engine.update(fixed(0.03));
        let y = engine.carrier_position(carrier).unwrap().y;
        assert!(y <= last, "carrier moved backwards: {y} > {last}");
        last = y;
    }
    assert_eq!(last, fixed(-1.0));
}

#[test]
fn neighbour_removed_mid_hop_exits() {
    let mut engine = TransitEngine::default();
    let (entry, pipes) = build_straight_run(&mut engine, 2);
    let (traveler, carrier) = capture_at(&mut engine, entry);
    hold(&mut engine, traveler, Direction::North);
    engine.update(fixed(0.15));
    engine.update(fixed(0.05));
    assert_eq!(engine.carrier(carrier).unwrap().next(), Some(pipes[1]));

    engine.remove_segment(pipes[1]).unwrap();
    engine.update(fixed(0.05));

    assert!(engine.carrier(carrier).is_none());
    let record = engine.entity(traveler).unwrap();
    assert_eq!(record.frame(), Frame::Ambient);
    assert!(record.is_collidable());
    assert!(engine.network().get(pipes[0]).unwrap().occupants().is_empty());
}

// ===========================================================================
// Entering and leaving
// ===========================================================================

#[test]
fn welded_entry_refuses_entry() {
    let mut engine = TransitEngine::default();
    let entry = engine.add_segment(entry_at(0, 0));
    engine.set_welded(entry, true).unwrap();
    let crawler = spawn_crawler(&mut engine, 0, 0);
    let log = EventLog::attach(&mut engine);

    assert_eq!(engine.try_enter(entry, crawler), Err(TransitError::Sealed(entry)));
    engine.update(fixed(5.0));

    assert_eq!(engine.carrier_count(), 0);
    assert_eq!(engine.carrier_of(crawler), None);
    let notices: Vec<Event> = log
        .events()
        .into_iter()
        .filter(|e| e.kind() == EventKind::Notice)
        .collect();
    assert_eq!(notices.len(), 1);
}

#[test]
fn timed_entry_then_exit_at_same_entry() {
    let mut engine = TransitEngine::default();
    let entry = engine.add_segment(entry_at(2, 2));
    let crawler = spawn_crawler(&mut engine, 2, 2);

    engine.try_enter(entry, crawler).unwrap();
    let delay = engine.config().enter_delay;
    engine.update(delay);
    assert!(engine.entity(crawler).unwrap().in_transit());
    assert_eq!(engine.entry_action(entry, crawler), Some(EntryAction::Exit));

    engine.try_exit(entry, crawler).unwrap();
    assert_eq!(engine.entry_action(entry, crawler), Some(EntryAction::Enter));
    assert_eq!(engine.entity_position(crawler), Some(WorldPos::from_num(2, 2)));
}

#[test]
fn entry_removed_while_committing_cancels() {
    let mut engine = TransitEngine::default();
    let entry = engine.add_segment(entry_at(0, 0));
    let crawler = spawn_crawler(&mut engine, 0, 0);
    engine.try_enter(entry, crawler).unwrap();

    engine.unanchor_segment(entry).unwrap();
    engine.update(fixed(5.0));

    assert_eq!(engine.carrier_count(), 0);
    assert!(engine.pending_entries().is_empty());
}

#[test]
fn entry_broken_while_committing_cancels_in_place() {
    let mut engine = TransitEngine::default();
    let entry = engine.add_segment(entry_at(0, 0));
    let crawler = spawn_crawler(&mut engine, 0, 0);
    engine.try_enter(entry, crawler).unwrap();
    let log = EventLog::attach(&mut engine);

    engine.break_segment(entry).unwrap();
    engine.update(fixed(5.0));

    assert_eq!(engine.carrier_count(), 0);
    assert!(engine.pending_entries().is_empty());
    assert_eq!(log.count(EventKind::EntryCancelled), 1);
    assert_eq!(log.count(EventKind::TravelerCaptured), 0);
    assert_eq!(log.count(EventKind::CarrierExited), 0);
    assert_eq!(engine.entity_position(crawler), Some(WorldPos::ORIGIN));
}

#[test]
fn capture_then_exit_is_symmetric() {
    let mut engine = TransitEngine::default();
    let entry = engine.add_segment(entry_at(-3, 4));
    let (traveler, carrier) = capture_at(&mut engine, entry);

    assert!(engine.exit(carrier));
    let record = engine.entity(traveler).unwrap();
    assert_eq!(record.carried_by(), None);
    assert!(record.is_collidable());
    assert!(!record.in_transit());
    assert_eq!(engine.entity_position(traveler), Some(WorldPos::from_num(-3, 4)));
}

// ===========================================================================
// Disconnects
// ===========================================================================

#[test]
fn unplugging_segment_exits_every_occupant() {
    let mut engine = TransitEngine::default();
    let (entry, pipes) = build_straight_run(&mut engine, 1);

    let mut travelers = Vec::new();
    for _ in 0..4 {
        let (traveler, _) = capture_at(&mut engine, entry);
        hold(&mut engine, traveler, Direction::North);
        travelers.push(traveler);
    }
    engine.update(fixed(0.15));
    for &t in &travelers {
        engine.move_input(t, MoveButtons::NONE).unwrap();
    }
    assert_eq!(engine.network().get(pipes[0]).unwrap().occupants().len(), 4);

    let log = EventLog::attach(&mut engine);
    assert_eq!(engine.unanchor_segment(pipes[0]).unwrap(), 4);
    engine.update(fixed(0.0));

    assert_eq!(log.count(EventKind::CarrierExited), 4);
    assert_eq!(log.count(EventKind::TravelerReleased), 4);
    assert!(engine.network().get(pipes[0]).unwrap().occupants().is_empty());
    assert_eq!(engine.carrier_count(), 0);
}

#[test]
fn reanchored_segment_is_usable_again() {
    let mut engine = TransitEngine::default();
    let (entry, pipes) = build_straight_run(&mut engine, 1);
    engine.unanchor_segment(pipes[0]).unwrap();
    engine.anchor_segment(pipes[0]).unwrap();

    let (traveler, carrier) = capture_at(&mut engine, entry);
    hold(&mut engine, traveler, Direction::North);
    engine.update(fixed(0.15));
    assert_eq!(engine.carrier(carrier).unwrap().current(), Some(pipes[0]));
}

// ===========================================================================
// Manifolds
// ===========================================================================

#[test]
fn manifold_stops_automatic_travel() {
    let mut engine = TransitEngine::default();
    let layout = manifold_cross(&mut engine);
    let (traveler, carrier) = capture_at(&mut engine, layout.entry);
    hold(&mut engine, traveler, Direction::North);

    for _ in 0..4 {
        engine.update(fixed(0.15));
    }
    let c = engine.carrier(carrier).unwrap();
    assert_eq!(c.current(), Some(layout.manifold));
    assert_eq!(c.phase(), TransitPhase::Idle);
}

#[test]
fn manifold_never_offers_arrival_layer() {
    let mut engine = TransitEngine::default();
    let layout = manifold_cross(&mut engine);
    let (traveler, carrier) = ride_into_manifold(&mut engine, &layout);
    let arrived_on = engine.carrier(carrier).unwrap().layer();

    let choices = engine.manifold_choices(layout.manifold, traveler);
    assert_eq!(choices.len(), 2);
    assert!(choices.iter().all(|c| c.layer != arrived_on));
}

#[test]
fn manifold_choice_then_keep_crawling() {
    let mut engine = TransitEngine::default();
    let layout = manifold_cross(&mut engine);
    let beyond = engine.add_segment(layered_ns(0, -2, PipeLayer::TERTIARY));
    let (traveler, carrier) = ride_into_manifold(&mut engine, &layout);

    let choice = engine
        .manifold_choices(layout.manifold, traveler)
        .into_iter()
        .find(|c| c.layer == PipeLayer::TERTIARY)
        .unwrap();
    assert_eq!(choice.direction, Direction::North);
    engine.take_choice(layout.manifold, traveler, &choice).unwrap();

    hold(&mut engine, traveler, Direction::North);
    engine.update(fixed(0.15));
    let c = engine.carrier(carrier).unwrap();
    assert_eq!(c.current(), Some(beyond));
    assert_eq!(c.layer(), PipeLayer::TERTIARY);
}

#[test]
fn input_at_manifold_hops_on_current_layer() {
    let mut engine = TransitEngine::default();
    let layout = manifold_cross(&mut engine);
    let (traveler, carrier) = ride_into_manifold(&mut engine, &layout);

    // West leads to a primary-layer pipe, the lane the carrier arrived on.
    hold(&mut engine, traveler, Direction::West);
    assert_eq!(engine.carrier(carrier).unwrap().next(), Some(layout.west_primary));
    engine.update(fixed(0.15));
    assert_eq!(engine.carrier(carrier).unwrap().current(), Some(layout.west_primary));
}

// ===========================================================================
// Entities
// ===========================================================================

#[test]
fn despawned_traveler_leaves_no_orphan_carrier() {
    let mut engine = TransitEngine::default();
    let (entry, _) = build_straight_run(&mut engine, 2);
    let (traveler, carrier) = capture_at(&mut engine, entry);
    hold(&mut engine, traveler, Direction::North);
    engine.update(fixed(0.05));

    engine.despawn_entity(traveler).unwrap();
    assert!(engine.carrier(carrier).is_none());
    engine.update(fixed(0.15));
    assert_eq!(engine.carrier_count(), 0);
}

#[test]
fn items_leave_with_their_crawler() {
    let mut engine = TransitEngine::default();
    let (entry, _) = build_straight_run(&mut engine, 1);
    let (traveler, carrier) = capture_at(&mut engine, entry);
    let item = engine.spawn_entity(EntityTraits::ITEM, WorldPos::ORIGIN);
    engine.try_capture(carrier, item).unwrap();

    hold(&mut engine, traveler, Direction::North);
    engine.update(fixed(0.15));
    assert_eq!(engine.entity_position(item), Some(WorldPos::from_num(0, -1)));

    engine.exit(carrier);
    assert_eq!(engine.entity_position(item), Some(WorldPos::from_num(0, -1)));
    assert!(engine.entity(item).unwrap().is_collidable());
}
