//! Serde data file structs for network layouts and engine tuning.
//!
//! These structs define the on-disk format. They are deserialized from RON,
//! JSON, or TOML data files and then converted into engine types by the
//! loader. Times and sizes are plain decimals on disk and become `Fixed64`
//! only on conversion.

use serde::Deserialize;

// ===========================================================================
// Transit tuning
// ===========================================================================

/// Engine tuning in a data file. Missing fields keep the engine default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitConfigData {
    #[serde(default)]
    pub hop_duration: Option<f64>,
    #[serde(default)]
    pub cue_cooldown: Option<f64>,
    #[serde(default)]
    pub enter_delay: Option<f64>,
    #[serde(default)]
    pub layer_count: Option<u8>,
    #[serde(default)]
    pub tile_size: Option<f64>,
    #[serde(default)]
    pub event_capacity: Option<usize>,
}

// ===========================================================================
// Layouts
// ===========================================================================

/// A whole network layout: its segments and the crawlers placed on it.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutData {
    pub segments: Vec<SegmentData>,
    #[serde(default)]
    pub crawlers: Vec<CrawlerData>,
}

/// One segment in a layout.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentData {
    pub name: String,
    pub kind: SegmentKindData,
    /// Tile coordinates `(x, y)`; north is negative y.
    pub tile: (i32, i32),
    /// Compass degrees, clockwise from north.
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub welded: bool,
    #[serde(default = "default_true")]
    pub anchored: bool,
    pub nodes: Vec<NodeData>,
}

fn default_true() -> bool {
    true
}

/// Segment kind as written in data files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKindData {
    Entry,
    Straight,
    Bend,
    Junction { degrees: Vec<i32> },
    Manifold { degrees: Vec<i32> },
    Transit,
}

/// A pipe node inside a segment.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub layer: u8,
    /// Unrotated cardinal openings.
    pub directions: Vec<CardinalData>,
    #[serde(default)]
    pub group: GroupKindData,
    #[serde(default)]
    pub contents: Option<u64>,
}

/// A cardinal opening of a pipe node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalData {
    North,
    South,
    East,
    West,
}

/// Transport group family of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKindData {
    #[default]
    Pipe,
    Scrubber,
    Supply,
}

/// A crawler placed by the layout, standing on (or already inside) the
/// named segment.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerData {
    pub name: String,
    pub at: String,
    #[serde(default)]
    pub inside: bool,
}
