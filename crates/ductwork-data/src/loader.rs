//! Loading pipeline: reads data files, resolves segment names, and builds a
//! populated [`TransitEngine`].
//!
//! A network directory holds an optional `transit` tuning file and a
//! required `layout` file, each in RON, JSON, or TOML.

use crate::schema::{
    CardinalData, CrawlerData, GroupKindData, LayoutData, NodeData, SegmentData,
    SegmentKindData, TransitConfigData,
};
use ductwork_core::config::{ConfigError, TransitConfig};
use ductwork_core::direction::PipeDirection;
use ductwork_core::engine::{TransitEngine, TransitError};
use ductwork_core::fixed::Fixed64;
use ductwork_core::grid::GridPosition;
use ductwork_core::id::{ContentsId, EntityId, PipeLayer, SegmentId};
use ductwork_core::segment::{NodeGroupKind, PipeNode, Segment, SegmentKind};
use ductwork_core::world::EntityTraits;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A tuning value does not fit the engine's fixed-point range.
    #[error("{field} in {file} is out of range: {value}")]
    OutOfRange {
        file: PathBuf,
        field: &'static str,
        value: f64,
    },

    /// The assembled tuning failed validation.
    #[error("invalid transit config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The engine refused part of the layout.
    #[error("layout rejected: {0}")]
    Transit(#[from] TransitError),

    #[error("no {base}.ron, {base}.toml or {base}.json in {dir}")]
    MissingRequired { base: String, dir: PathBuf },

    #[error("{file} is not a .ron, .toml or .json file")]
    UnsupportedFormat { file: PathBuf },

    /// The same base name exists in more than one format.
    #[error("both {a} and {b} exist; keep one")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("cannot parse {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name used in the file was never declared.
    #[error("{file} refers to unknown {expected_kind} '{name}'")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("'{name}' is declared twice in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats
// ===========================================================================

/// Data file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Lookup order used by [`find_data_file`].
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, String> {
        match self {
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// The file in `dir` named `base` with any supported extension.
///
/// `Ok(None)` when there is none; an error when several formats exist.
pub fn find_data_file(dir: &Path, base: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .into_iter()
        .map(|f| dir.join(format!("{base}.{}", f.extension())))
        .filter(|p| p.exists());

    let first = present.next();
    match (first, present.next()) {
        (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
        (first, _) => Ok(first),
    }
}

/// [`find_data_file`] for files that must exist.
pub fn require_data_file(dir: &Path, base: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base)?.ok_or_else(|| DataLoadError::MissingRequired {
        base: base.to_string(),
        dir: dir.to_path_buf(),
    })
}

/// Read `path` and deserialize it in the format its extension names.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    format.parse(&content).map_err(|detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    })
}

// ===========================================================================
// Names
// ===========================================================================

pub fn resolve_name<'a, V>(
    names: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    names.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_owned(),
        expected_kind,
    })
}

pub fn check_duplicate<V>(
    names: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    match names.contains_key(name) {
        true => Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_owned(),
        }),
        false => Ok(()),
    }
}

// ===========================================================================
// Transit tuning
// ===========================================================================

fn to_fixed(value: f64, field: &'static str, file: &Path) -> Result<Fixed64, DataLoadError> {
    let converted = if value.is_finite() {
        Fixed64::checked_from_num(value)
    } else {
        None
    };
    converted.ok_or_else(|| DataLoadError::OutOfRange {
        file: file.to_path_buf(),
        field,
        value,
    })
}

/// Overlay tuning data on the engine defaults and validate the result.
pub fn build_config(data: &TransitConfigData, file: &Path) -> Result<TransitConfig, DataLoadError> {
    let mut config = TransitConfig::default();
    if let Some(v) = data.hop_duration {
        config.hop_duration = to_fixed(v, "hop_duration", file)?;
    }
    if let Some(v) = data.cue_cooldown {
        config.cue_cooldown = to_fixed(v, "cue_cooldown", file)?;
    }
    if let Some(v) = data.enter_delay {
        config.enter_delay = to_fixed(v, "enter_delay", file)?;
    }
    if let Some(v) = data.tile_size {
        config.tile_size = to_fixed(v, "tile_size", file)?;
    }
    if let Some(v) = data.layer_count {
        config.layer_count = v;
    }
    if let Some(v) = data.event_capacity {
        config.event_capacity = v;
    }
    config.validate()?;
    Ok(config)
}

/// Read and validate a tuning file.
pub fn load_config(path: &Path) -> Result<TransitConfig, DataLoadError> {
    let data: TransitConfigData = deserialize_file(path)?;
    build_config(&data, path)
}

// ===========================================================================
// Layouts
// ===========================================================================

/// Names resolved while building a layout.
#[derive(Debug, Default)]
pub struct LoadedLayout {
    pub segments: HashMap<String, SegmentId>,
    pub crawlers: HashMap<String, EntityId>,
}

impl LoadedLayout {
    pub fn segment(&self, name: &str) -> Option<SegmentId> {
        self.segments.get(name).copied()
    }

    pub fn crawler(&self, name: &str) -> Option<EntityId> {
        self.crawlers.get(name).copied()
    }
}

/// Read a layout file without building it.
pub fn load_layout(path: &Path) -> Result<LayoutData, DataLoadError> {
    deserialize_file(path)
}

fn segment_kind(data: &SegmentKindData) -> SegmentKind {
    match data {
        SegmentKindData::Entry => SegmentKind::Entry,
        SegmentKindData::Straight => SegmentKind::Straight,
        SegmentKindData::Bend => SegmentKind::Bend,
        SegmentKindData::Junction { degrees } => SegmentKind::Junction {
            degrees: degrees.clone(),
        },
        SegmentKindData::Manifold { degrees } => SegmentKind::Manifold {
            degrees: degrees.clone(),
        },
        SegmentKindData::Transit => SegmentKind::Transit,
    }
}

fn pipe_node(data: &NodeData) -> PipeNode {
    let mask = data
        .directions
        .iter()
        .fold(PipeDirection::NONE, |mask, d| {
            mask.union(match d {
                CardinalData::North => PipeDirection::NORTH,
                CardinalData::South => PipeDirection::SOUTH,
                CardinalData::East => PipeDirection::EAST,
                CardinalData::West => PipeDirection::WEST,
            })
        });
    let kind = match data.group {
        GroupKindData::Pipe => NodeGroupKind::Pipe,
        GroupKindData::Scrubber => NodeGroupKind::Scrubber,
        GroupKindData::Supply => NodeGroupKind::Supply,
    };
    let node = PipeNode::new(PipeLayer(data.layer), mask).with_kind(kind);
    match data.contents {
        Some(c) => node.with_contents(ContentsId(c)),
        None => node,
    }
}

fn add_segment(engine: &mut TransitEngine, data: &SegmentData) -> Result<SegmentId, DataLoadError> {
    let segment = Segment::new(
        segment_kind(&data.kind),
        GridPosition::new(data.tile.0, data.tile.1),
        data.rotation,
        data.nodes.iter().map(pipe_node).collect(),
    );
    let id = if data.anchored {
        engine.add_segment(segment)
    } else {
        engine.place_segment(segment)
    };
    if data.welded {
        engine.set_welded(id, true)?;
    }
    Ok(id)
}

fn add_crawler(
    engine: &mut TransitEngine,
    data: &CrawlerData,
    at: SegmentId,
) -> Result<EntityId, DataLoadError> {
    let position = engine
        .network()
        .world_position(at)
        .ok_or(TransitError::SegmentNotFound(at))?;
    let crawler = engine.spawn_entity(EntityTraits::CRAWLER, position);
    if data.inside {
        engine.try_insert(at, crawler)?;
    }
    Ok(crawler)
}

/// Add every segment and crawler of `layout` to `engine`.
///
/// Segment names must be unique; crawlers refer to segments by name. A
/// crawler marked `inside` is put straight into the network, which requires
/// its segment to be an anchored entry.
pub fn build_layout(
    engine: &mut TransitEngine,
    layout: &LayoutData,
    file: &Path,
) -> Result<LoadedLayout, DataLoadError> {
    let mut loaded = LoadedLayout::default();

    for data in &layout.segments {
        check_duplicate(&loaded.segments, &data.name, file)?;
        let id = add_segment(engine, data)?;
        loaded.segments.insert(data.name.clone(), id);
    }

    for data in &layout.crawlers {
        check_duplicate(&loaded.crawlers, &data.name, file)?;
        let at = *resolve_name(&loaded.segments, &data.at, file, "segment")?;
        let crawler = add_crawler(engine, data, at)?;
        loaded.crawlers.insert(data.name.clone(), crawler);
    }

    debug!(
        file = %file.display(),
        segments = loaded.segments.len(),
        crawlers = loaded.crawlers.len(),
        "layout built"
    );
    Ok(loaded)
}

/// Load a whole network directory into a fresh engine.
///
/// Reads `transit.{ron,toml,json}` if present, then the required
/// `layout.{ron,toml,json}`.
pub fn load_network(dir: &Path) -> Result<(TransitEngine, LoadedLayout), DataLoadError> {
    let config = match find_data_file(dir, "transit")? {
        Some(path) => load_config(&path)?,
        None => TransitConfig::default(),
    };
    let mut engine = TransitEngine::new(config)?;

    let layout_path = require_data_file(dir, "layout")?;
    let layout = load_layout(&layout_path)?;
    let loaded = build_layout(&mut engine, &layout, &layout_path)?;
    Ok((engine, loaded))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ductwork_core::carrier::TransitPhase;
    use ductwork_core::direction::Direction;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ductwork_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const RUN_RON: &str = r#"
        (
            segments: [
                (name: "mouth", kind: entry, tile: (0, 0),
                 nodes: [(directions: [north, south, east, west])]),
                (name: "pipe", kind: straight, tile: (0, -1),
                 nodes: [(directions: [north, south])]),
                (name: "far", kind: entry, tile: (0, -2),
                 nodes: [(directions: [north, south, east, west])]),
            ],
            crawlers: [
                (name: "rat", at: "mouth", inside: true),
                (name: "cat", at: "far"),
            ],
        )
    "#;

    // -----------------------------------------------------------------------
    // Formats and discovery
    // -----------------------------------------------------------------------

    #[test]
    fn formats_follow_extensions() {
        for (file, format) in [
            ("layout.ron", Format::Ron),
            ("transit.toml", Format::Toml),
            ("layout.json", Format::Json),
        ] {
            assert_eq!(detect_format(Path::new(file)).unwrap(), format);
        }
        for file in ["layout.yaml", "layout"] {
            assert!(matches!(
                detect_format(Path::new(file)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn finds_the_single_file_for_a_base_name() {
        let dir = make_test_dir("find_single");
        assert_eq!(find_data_file(&dir, "layout").unwrap(), None);

        fs::write(dir.join("layout.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, "layout").unwrap(),
            Some(dir.join("layout.toml"))
        );
        assert_eq!(require_data_file(&dir, "layout").unwrap(), dir.join("layout.toml"));

        cleanup(&dir);
    }

    #[test]
    fn two_formats_for_one_name_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("layout.ron"), "()").unwrap();
        fs::write(dir.join("layout.json"), "{}").unwrap();

        assert!(matches!(
            find_data_file(&dir, "layout"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn unparseable_file_reports_its_path() {
        let dir = make_test_dir("deser_parse_err");
        let path = dir.join("layout.ron");
        fs::write(&path, "(segments: [oops").unwrap();

        let result: Result<LayoutData, _> = deserialize_file(&path);
        assert!(matches!(result, Err(DataLoadError::Parse { ref file, .. }) if *file == path));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    #[test]
    fn config_overlays_defaults() {
        let dir = make_test_dir("config_overlay");
        let path = dir.join("transit.toml");
        fs::write(&path, "hop_duration = 0.5\nlayer_count = 2\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.hop_duration, Fixed64::from_num(0.5));
        assert_eq!(config.layer_count, 2);
        assert_eq!(config.enter_delay, TransitConfig::default().enter_delay);

        cleanup(&dir);
    }

    #[test]
    fn config_is_validated() {
        let data = TransitConfigData {
            hop_duration: Some(0.0),
            ..Default::default()
        };
        let result = build_config(&data, Path::new("transit.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::InvalidConfig(ConfigError::NonPositiveHopDuration(_)))
        ));
    }

    #[test]
    fn config_rejects_unrepresentable_values() {
        let data = TransitConfigData {
            tile_size: Some(f64::NAN),
            ..Default::default()
        };
        let result = build_config(&data, Path::new("transit.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::OutOfRange { field: "tile_size", .. })
        ));

        let data = TransitConfigData {
            enter_delay: Some(1e20),
            ..Default::default()
        };
        assert!(build_config(&data, Path::new("transit.ron")).is_err());
    }

    // -----------------------------------------------------------------------
    // Layouts
    // -----------------------------------------------------------------------

    #[test]
    fn build_layout_places_segments_and_crawlers() {
        let layout: LayoutData = ron::from_str(RUN_RON).unwrap();
        let mut engine = TransitEngine::default();
        let loaded = build_layout(&mut engine, &layout, Path::new("layout.ron")).unwrap();

        assert_eq!(loaded.segments.len(), 3);
        assert_eq!(engine.network().len(), 3);

        let mouth = loaded.segment("mouth").unwrap();
        let rat = loaded.crawler("rat").unwrap();
        let carrier = engine.carrier_of(rat).unwrap();
        assert_eq!(engine.carrier(carrier).unwrap().current(), Some(mouth));
        assert_eq!(engine.carrier(carrier).unwrap().phase(), TransitPhase::Idle);

        let cat = loaded.crawler("cat").unwrap();
        assert_eq!(engine.carrier_of(cat), None);
        assert_eq!(
            engine.entity_position(cat),
            engine.network().world_position(loaded.segment("far").unwrap())
        );
    }

    #[test]
    fn build_layout_applies_segment_flags() {
        let ron = r#"
            (segments: [
                (name: "shut", kind: entry, tile: (0, 0), welded: true, nodes: []),
                (name: "loose", kind: transit, tile: (1, 0), rotation: 90, anchored: false,
                 nodes: [(layer: 2, directions: [north, south], contents: Some(9))]),
            ])
        "#;
        let layout: LayoutData = ron::from_str(ron).unwrap();
        let mut engine = TransitEngine::default();
        let loaded = build_layout(&mut engine, &layout, Path::new("layout.ron")).unwrap();

        let shut = engine.network().get(loaded.segment("shut").unwrap()).unwrap();
        assert!(shut.is_welded());
        assert!(shut.is_anchored());

        let loose = engine.network().get(loaded.segment("loose").unwrap()).unwrap();
        assert!(!loose.is_anchored());
        assert!(!loose.is_plugged());
        assert_eq!(loose.rotation(), 90);
        let node = &loose.nodes()[0];
        assert_eq!(node.layer, PipeLayer::TERTIARY);
        assert_eq!(node.mask(), PipeDirection::LATERAL);
        assert_eq!(node.contents, Some(ContentsId(9)));
    }

    #[test]
    fn extreme_manifold_angles_still_load() {
        let ron = r#"
            (segments: [
                (name: "hub", kind: manifold(degrees: [2147483647, -2147483648]), tile: (0, 0),
                 rotation: 90, nodes: [(directions: [north, south, east, west])]),
            ])
        "#;
        let layout: LayoutData = ron::from_str(ron).unwrap();
        let mut engine = TransitEngine::default();
        let loaded = build_layout(&mut engine, &layout, Path::new("layout.ron")).unwrap();

        let hub = engine.network().get(loaded.segment("hub").unwrap()).unwrap();
        assert_eq!(
            hub.connectable_directions(),
            vec![Direction::SouthWest, Direction::NorthWest]
        );
    }

    #[test]
    fn build_layout_rejects_duplicate_segment_names() {
        let ron = r#"
            (segments: [
                (name: "a", kind: entry, tile: (0, 0), nodes: []),
                (name: "a", kind: entry, tile: (1, 0), nodes: []),
            ])
        "#;
        let layout: LayoutData = ron::from_str(ron).unwrap();
        let mut engine = TransitEngine::default();
        let result = build_layout(&mut engine, &layout, Path::new("layout.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "a"
        ));
    }

    #[test]
    fn build_layout_rejects_unknown_crawler_segment() {
        let ron = r#"
            (segments: [], crawlers: [(name: "rat", at: "nowhere")])
        "#;
        let layout: LayoutData = ron::from_str(ron).unwrap();
        let mut engine = TransitEngine::default();
        let result = build_layout(&mut engine, &layout, Path::new("layout.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "segment", .. })
                if name == "nowhere"
        ));
    }

    #[test]
    fn crawler_inside_a_pipe_is_refused() {
        let ron = r#"
            (
                segments: [(name: "pipe", kind: straight, tile: (0, 0),
                            nodes: [(directions: [north, south])])],
                crawlers: [(name: "rat", at: "pipe", inside: true)],
            )
        "#;
        let layout: LayoutData = ron::from_str(ron).unwrap();
        let mut engine = TransitEngine::default();
        let result = build_layout(&mut engine, &layout, Path::new("layout.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::Transit(TransitError::NotAnEntry(_)))
        ));
    }

    #[test]
    fn load_network_reads_directory() {
        let dir = make_test_dir("load_network");
        fs::write(dir.join("transit.json"), r#"{"hop_duration": 0.25}"#).unwrap();
        fs::write(dir.join("layout.ron"), RUN_RON).unwrap();

        let (engine, loaded) = load_network(&dir).unwrap();
        assert_eq!(engine.config().hop_duration, Fixed64::from_num(0.25));
        assert_eq!(loaded.crawlers.len(), 2);
        assert_eq!(engine.carrier_count(), 1);

        cleanup(&dir);
    }

    #[test]
    fn load_network_needs_a_layout() {
        let dir = make_test_dir("load_network_missing");
        fs::write(dir.join("transit.ron"), "()").unwrap();

        let result = load_network(&dir);
        assert!(matches!(result, Err(DataLoadError::MissingRequired { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Errors
    // -----------------------------------------------------------------------

    #[test]
    fn error_messages_name_the_culprit() {
        let e = DataLoadError::MissingRequired {
            base: "layout".to_string(),
            dir: PathBuf::from("/data"),
        };
        let msg = format!("{e}");
        assert!(msg.contains("layout.ron"));
        assert!(msg.contains("/data"));

        let e = DataLoadError::OutOfRange {
            file: PathBuf::from("transit.ron"),
            field: "hop_duration",
            value: 1e20,
        };
        assert!(format!("{e}").contains("hop_duration"));

        let e: DataLoadError = ConfigError::NoLayers.into();
        assert!(format!("{e}").contains("layer_count"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let data_err: DataLoadError = io_err.into();
        assert!(matches!(data_err, DataLoadError::Io(_)));
        assert!(format!("{data_err}").contains("file not found"));
    }
}
