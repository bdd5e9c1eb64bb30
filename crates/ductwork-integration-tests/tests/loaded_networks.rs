//! Cross-crate tests: networks loaded from data files through
//! `ductwork-data`, then driven through `ductwork-core`.
//!
//! Each test writes its data files into its own temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use ductwork_core::carrier::TransitPhase;
use ductwork_core::direction::{Direction, MoveButtons};
use ductwork_core::engine::{TransitEngine, TransitError};
use ductwork_core::event::EventKind;
use ductwork_core::grid::WorldPos;
use ductwork_core::id::PipeLayer;
use ductwork_core::junction::{EntryAction, LayerName};
use ductwork_core::test_utils::*;
use ductwork_data::{load_network, LoadedLayout};

// ===========================================================================
// Fixtures
// ===========================================================================

struct TestDir(PathBuf);

impl TestDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "ductwork_integration_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn write(&self, file: &str, contents: &str) -> &Self {
        fs::write(self.0.join(file), contents).unwrap();
        self
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Entry south of a three-layer manifold; a secondary-layer pipe leads east
/// from the manifold to a second entry.
const FORK_RON: &str = r#"
(
    segments: [
        (name: "mouth", kind: entry, tile: (0, 1),
         nodes: [(directions: [north, south, east, west])]),
        (name: "hub", kind: manifold(degrees: [0, 90, 180, 270]), tile: (0, 0),
         nodes: [
            (layer: 0, directions: [north, south, east, west]),
            (layer: 1, directions: [north, south, east, west]),
            (layer: 2, directions: [north, south, east, west]),
         ]),
        (name: "east_pipe", kind: straight, tile: (1, 0),
         nodes: [(layer: 1, directions: [east, west])]),
        (name: "far", kind: entry, tile: (2, 0),
         nodes: [(layer: 1, directions: [north, south, east, west])]),
    ],
    crawlers: [(name: "rat", at: "mouth", inside: true)],
)
"#;

const FORK_JSON: &str = r#"{
    "segments": [
        {"name": "mouth", "kind": "entry", "tile": [0, 1],
         "nodes": [{"directions": ["north", "south", "east", "west"]}]},
        {"name": "hub", "kind": {"manifold": {"degrees": [0, 90, 180, 270]}}, "tile": [0, 0],
         "nodes": [
            {"layer": 0, "directions": ["north", "south", "east", "west"]},
            {"layer": 1, "directions": ["north", "south", "east", "west"]},
            {"layer": 2, "directions": ["north", "south", "east", "west"]}
         ]},
        {"name": "east_pipe", "kind": "straight", "tile": [1, 0],
         "nodes": [{"layer": 1, "directions": ["east", "west"]}]},
        {"name": "far", "kind": "entry", "tile": [2, 0],
         "nodes": [{"layer": 1, "directions": ["north", "south", "east", "west"]}]}
    ],
    "crawlers": [{"name": "rat", "at": "mouth", "inside": true}]
}"#;

const FORK_TOML: &str = r#"
[[segments]]
name = "mouth"
kind = "entry"
tile = [0, 1]
[[segments.nodes]]
directions = ["north", "south", "east", "west"]

[[segments]]
name = "hub"
kind = { manifold = { degrees = [0, 90, 180, 270] } }
tile = [0, 0]
[[segments.nodes]]
layer = 0
directions = ["north", "south", "east", "west"]
[[segments.nodes]]
layer = 1
directions = ["north", "south", "east", "west"]
[[segments.nodes]]
layer = 2
directions = ["north", "south", "east", "west"]

[[segments]]
name = "east_pipe"
kind = "straight"
tile = [1, 0]
[[segments.nodes]]
layer = 1
directions = ["east", "west"]

[[segments]]
name = "far"
kind = "entry"
tile = [2, 0]
[[segments.nodes]]
layer = 1
directions = ["north", "south", "east", "west"]

[[crawlers]]
name = "rat"
at = "mouth"
inside = true
"#;

fn seg(loaded: &LoadedLayout, name: &str) -> ductwork_core::id::SegmentId {
    loaded.segment(name).unwrap()
}

/// Crawl into the hub, take the only way out, and crawl on to the far entry.
fn ride_the_fork(engine: &mut TransitEngine, loaded: &LoadedLayout) {
    let rat = loaded.crawler("rat").unwrap();
    hold(engine, rat, Direction::North);
    let hop = engine.config().hop_duration;
    engine.update(hop);
    engine.move_input(rat, MoveButtons::NONE).unwrap();

    let choices = engine.manifold_choices(seg(loaded, "hub"), rat);
    if let Some(choice) = choices.first() {
        engine.take_choice(seg(loaded, "hub"), rat, choice).unwrap();
    }
    hold(engine, rat, Direction::East);
    for _ in 0..4 {
        engine.update(hop);
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn loaded_fork_offers_only_the_other_layers() {
    let dir = TestDir::new("fork_choices");
    dir.write("layout.ron", FORK_RON);
    let (mut engine, loaded) = load_network(dir.path()).unwrap();
    let rat = loaded.crawler("rat").unwrap();
    let carrier = engine.carrier_of(rat).unwrap();

    hold(&mut engine, rat, Direction::North);
    let hop = engine.config().hop_duration;
    engine.update(hop);
    engine.move_input(rat, MoveButtons::NONE).unwrap();

    let c = engine.carrier(carrier).unwrap();
    assert_eq!(c.current(), Some(seg(&loaded, "hub")));
    assert_eq!(c.phase(), TransitPhase::Idle);
    assert_eq!(c.layer(), PipeLayer::PRIMARY);

    let choices = engine.manifold_choices(seg(&loaded, "hub"), rat);
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].direction, Direction::East);
    assert_eq!(choices[0].layer_name, LayerName::Secondary);
    assert_eq!(choices[0].destination, seg(&loaded, "east_pipe"));
}

#[test]
fn loaded_fork_end_to_end() {
    let dir = TestDir::new("fork_trip");
    dir.write("layout.ron", FORK_RON);
    let (mut engine, loaded) = load_network(dir.path()).unwrap();
    let log = EventLog::attach(&mut engine);
    let rat = loaded.crawler("rat").unwrap();

    ride_the_fork(&mut engine, &loaded);

    assert_eq!(engine.carrier_count(), 0);
    let record = engine.entity(rat).unwrap();
    assert!(record.is_collidable());
    assert!(!record.in_transit());
    let far = engine.network().world_position(seg(&loaded, "far"));
    assert_eq!(engine.entity_position(rat), far);
    assert_eq!(log.count(EventKind::CarrierExited), 1);
    assert_eq!(engine.entry_action(seg(&loaded, "far"), rat), Some(EntryAction::Enter));
}

#[test]
fn every_format_builds_the_same_network() {
    let hashes: Vec<u64> = [
        ("fmt_ron", "layout.ron", FORK_RON),
        ("fmt_json", "layout.json", FORK_JSON),
        ("fmt_toml", "layout.toml", FORK_TOML),
    ]
    .into_iter()
    .map(|(name, file, contents)| {
        let dir = TestDir::new(name);
        dir.write(file, contents);
        let (mut engine, loaded) = load_network(dir.path()).unwrap();
        ride_the_fork(&mut engine, &loaded);
        engine.state_hash()
    })
    .collect();

    assert_eq!(hashes[0], hashes[1]);
    assert_eq!(hashes[1], hashes[2]);
}

#[test]
fn tuning_file_slows_hops() {
    let dir = TestDir::new("tuning");
    dir.write("transit.toml", "hop_duration = 0.5\n")
        .write("layout.ron", FORK_RON);
    let (mut engine, loaded) = load_network(dir.path()).unwrap();
    let rat = loaded.crawler("rat").unwrap();
    let carrier = engine.carrier_of(rat).unwrap();

    hold(&mut engine, rat, Direction::North);
    engine.update(fixed(0.25));
    let c = engine.carrier(carrier).unwrap();
    assert_eq!(c.current(), Some(seg(&loaded, "mouth")));
    assert_eq!(c.phase(), TransitPhase::Advancing);

    engine.update(fixed(0.25));
    assert_eq!(
        engine.carrier(carrier).unwrap().current(),
        Some(seg(&loaded, "hub"))
    );
}

#[test]
fn welded_entry_from_data_refuses_entry() {
    let dir = TestDir::new("welded");
    dir.write(
        "layout.json",
        r#"{
            "segments": [
                {"name": "hatch", "kind": "entry", "tile": [5, 5], "welded": true,
                 "nodes": [{"directions": ["north", "south"]}]}
            ],
            "crawlers": [{"name": "rat", "at": "hatch"}]
        }"#,
    );
    let (mut engine, loaded) = load_network(dir.path()).unwrap();
    let hatch = seg(&loaded, "hatch");
    let rat = loaded.crawler("rat").unwrap();

    assert_eq!(engine.entity_position(rat), Some(WorldPos::from_num(5, 5)));
    assert_eq!(engine.try_enter(hatch, rat), Err(TransitError::Sealed(hatch)));
    engine.update(fixed(5.0));
    assert_eq!(engine.carrier_count(), 0);
}

#[test]
fn unanchored_segment_is_a_gap_until_anchored() {
    let dir = TestDir::new("gap");
    dir.write(
        "layout.ron",
        r#"(
            segments: [
                (name: "mouth", kind: entry, tile: (0, 0),
                 nodes: [(directions: [north, south, east, west])]),
                (name: "loose", kind: straight, tile: (0, -1), anchored: false,
                 nodes: [(directions: [north, south])]),
            ],
            crawlers: [(name: "rat", at: "mouth", inside: true), (name: "cat", at: "mouth")],
        )"#,
    );
    let (mut engine, loaded) = load_network(dir.path()).unwrap();
    let rat = loaded.crawler("rat").unwrap();

    // Nothing north of the entry: pushing that way climbs back out.
    hold(&mut engine, rat, Direction::North);
    engine.update(fixed(0.15));
    assert_eq!(engine.carrier_of(rat), None);

    engine.anchor_segment(seg(&loaded, "loose")).unwrap();
    let cat = loaded.crawler("cat").unwrap();
    let carrier = engine.try_insert(seg(&loaded, "mouth"), cat).unwrap();
    hold(&mut engine, cat, Direction::North);
    engine.update(fixed(0.15));
    assert_eq!(
        engine.carrier(carrier).unwrap().current(),
        Some(seg(&loaded, "loose"))
    );
}

#[test]
fn crawler_commits_at_loaded_entry() {
    let dir = TestDir::new("commit");
    dir.write("transit.ron", "(enter_delay: Some(1.0))")
        .write("layout.ron", FORK_RON);
    let (mut engine, loaded) = load_network(dir.path()).unwrap();
    let mouth = seg(&loaded, "mouth");
    let position = engine.network().world_position(mouth).unwrap();
    let crawler = engine.spawn_entity(ductwork_core::world::EntityTraits::CRAWLER, position);

    engine.try_enter(mouth, crawler).unwrap();
    engine.update(fixed(0.5));
    assert_eq!(engine.carrier_of(crawler), None);
    engine.update(fixed(0.5));
    assert!(engine.carrier_of(crawler).is_some());
    assert_eq!(engine.entry_action(mouth, crawler), Some(EntryAction::Exit));
}
