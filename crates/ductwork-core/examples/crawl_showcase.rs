//! Crawl showcase: a crawler climbs into an entry, crawls north to a
//! manifold, switches layers and crawls out through a second entry.
//!
//! Engine logs go through `tracing`; set `RUST_LOG=ductwork_core=trace` to
//! see every hop.
//!
//! Run with: `cargo run -p ductwork-core --example crawl_showcase`

use std::cell::RefCell;
use std::rc::Rc;

use ductwork_core::direction::{Direction, MoveButtons, PipeDirection};
use ductwork_core::engine::TransitEngine;
use ductwork_core::event::{Event, EventKind};
use ductwork_core::fixed::{Fixed64, fixed64_to_f64};
use ductwork_core::grid::GridPosition;
use ductwork_core::id::PipeLayer;
use ductwork_core::segment::{PipeNode, Segment, SegmentKind};
use ductwork_core::world::EntityTraits;
use tracing_subscriber::EnvFilter;

fn pipe(x: i32, y: i32, layer: PipeLayer, mask: PipeDirection) -> Segment {
    Segment::new(
        SegmentKind::Straight,
        GridPosition::new(x, y),
        0,
        vec![PipeNode::new(layer, mask)],
    )
}

fn entry(x: i32, y: i32, layer: PipeLayer) -> Segment {
    Segment::new(
        SegmentKind::Entry,
        GridPosition::new(x, y),
        0,
        vec![PipeNode::new(layer, PipeDirection::FOURWAY)],
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut engine = TransitEngine::default();

    // --- Layout ---
    //
    //   (0,-3) manifold -- (1,-3) -- (2,-3) entry      secondary layer east
    //      |
    //   (0,-2) pipe
    //   (0,-1) pipe
    //   (0, 0) entry                                   primary layer

    let start = engine.add_segment(entry(0, 0, PipeLayer::PRIMARY));
    engine.add_segment(pipe(0, -1, PipeLayer::PRIMARY, PipeDirection::LONGITUDINAL));
    engine.add_segment(pipe(0, -2, PipeLayer::PRIMARY, PipeDirection::LONGITUDINAL));
    let manifold = engine.add_segment(Segment::new(
        SegmentKind::Manifold {
            degrees: vec![0, 90, 180, 270],
        },
        GridPosition::new(0, -3),
        0,
        vec![
            PipeNode::new(PipeLayer::PRIMARY, PipeDirection::FOURWAY),
            PipeNode::new(PipeLayer::SECONDARY, PipeDirection::FOURWAY),
        ],
    ));
    engine.add_segment(pipe(1, -3, PipeLayer::SECONDARY, PipeDirection::LATERAL));
    engine.add_segment(entry(2, -3, PipeLayer::SECONDARY));

    // --- Event log ---

    let log: Rc<RefCell<Vec<Event>>> = Rc::new(RefCell::new(Vec::new()));
    for kind in [
        EventKind::TravelerCaptured,
        EventKind::HopStarted,
        EventKind::TraversalCue,
        EventKind::CarrierExited,
    ] {
        let sink = Rc::clone(&log);
        engine.on_passive(kind, Box::new(move |e| sink.borrow_mut().push(e.clone())));
    }

    // --- Climb in ---

    let crawler = engine.spawn_entity(EntityTraits::CRAWLER, engine.network().world_position(start).unwrap());
    engine.try_enter(start, crawler).unwrap();
    let dt = Fixed64::from_num(0.05);
    while engine.carrier_of(crawler).is_none() {
        engine.update(dt);
    }
    println!("captured after {:.2}s", fixed64_to_f64(engine.now()));

    // --- Crawl north until the manifold stops us ---

    engine.move_input(crawler, MoveButtons::UP).unwrap();
    for _ in 0..20 {
        engine.update(dt);
    }
    let carrier = engine.carrier_of(crawler).unwrap();
    let snap = engine.snapshot_carrier(carrier).unwrap();
    println!(
        "at manifold: phase={:?} layer={} pos=({:.2}, {:.2})",
        snap.phase,
        snap.layer.0,
        fixed64_to_f64(snap.position.x),
        fixed64_to_f64(snap.position.y),
    );

    // --- Pick a way out ---

    for choice in engine.manifold_choices(manifold, crawler) {
        println!("  choice: {:?} on {:?}", choice.direction, choice.layer_name);
    }
    engine
        .select_choice(manifold, crawler, Direction::East, PipeLayer::SECONDARY)
        .unwrap();

    engine.move_input(crawler, MoveButtons::RIGHT).unwrap();
    while engine.carrier_of(crawler).is_some() {
        engine.update(dt);
    }
    let pos = engine.entity_position(crawler).unwrap();
    println!(
        "released at ({:.2}, {:.2}) after {} ticks",
        fixed64_to_f64(pos.x),
        fixed64_to_f64(pos.y),
        engine.tick()
    );

    // --- Summary ---

    println!("\nevents:");
    for event in log.borrow().iter() {
        println!("  tick {:>3}: {:?}", event.tick(), event.kind());
    }
}
