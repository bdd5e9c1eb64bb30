//! Tube segments: kinds, pipe nodes, and connectivity shape.
//!
//! A segment's shape is a pure function of its kind, its rotation and the
//! base masks of its pipe nodes. [`Segment::set_rotation`] is the only way
//! to change it, and it recomputes every node mask.

use crate::direction::{Direction, PipeDirection};
use crate::grid::GridPosition;
use crate::id::{CarrierId, ContentsId, GroupId, PipeLayer};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Segment kinds
// ---------------------------------------------------------------------------

/// The closed set of segment kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// World access point. Connects in all eight directions.
    Entry,
    /// Plain pipe; its shape is whatever its pipe nodes expose.
    Straight,
    /// Two adjacent directions: the rotation and the rotation minus 90.
    Bend,
    /// Three or more directions given as angles relative to the rotation.
    Junction { degrees: Vec<i32> },
    /// A junction that is never auto-traversed; travelers pick an exit.
    Manifold { degrees: Vec<i32> },
    /// Pass-through: the rotation and its opposite.
    Transit,
}

impl SegmentKind {
    pub fn is_entry(&self) -> bool {
        matches!(self, SegmentKind::Entry)
    }

    pub fn is_manifold(&self) -> bool {
        matches!(self, SegmentKind::Manifold { .. })
    }

    /// Configured connection angles for junction-like kinds.
    pub fn junction_degrees(&self) -> Option<&[i32]> {
        match self {
            SegmentKind::Junction { degrees } | SegmentKind::Manifold { degrees } => {
                Some(degrees.as_slice())
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipe nodes
// ---------------------------------------------------------------------------

/// Identity of the transport group family a node joins (what the host's node
/// graph calls the group kind). Nodes of different kinds never connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeGroupKind {
    #[default]
    Pipe,
    Scrubber,
    Supply,
}

/// One pipe node inside a segment's node container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeNode {
    pub layer: PipeLayer,
    /// Mask before rotation.
    pub base_mask: PipeDirection,
    /// Mask after rotation. Derived; see [`Segment::set_rotation`].
    mask: PipeDirection,
    pub kind: NodeGroupKind,
    /// Transport group this node currently belongs to, if grouped.
    pub group: Option<GroupId>,
    pub contents: Option<ContentsId>,
}

impl PipeNode {
    pub fn new(layer: PipeLayer, base_mask: PipeDirection) -> Self {
        Self {
            layer,
            base_mask,
            mask: base_mask,
            kind: NodeGroupKind::Pipe,
            group: None,
            contents: None,
        }
    }

    pub fn with_kind(mut self, kind: NodeGroupKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_contents(mut self, contents: ContentsId) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Current (rotated) connection mask.
    pub fn mask(&self) -> PipeDirection {
        self.mask
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// A network node occupying one tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    kind: SegmentKind,
    tile: GridPosition,
    rotation: i32,
    nodes: Vec<PipeNode>,
    pub(crate) anchored: bool,
    pub(crate) plugged: bool,
    pub(crate) welded: bool,
    /// Carriers currently held by this segment, in insertion order.
    pub(crate) contents: Vec<CarrierId>,
}

impl Segment {
    pub fn new(kind: SegmentKind, tile: GridPosition, rotation: i32, nodes: Vec<PipeNode>) -> Self {
        let mut segment = Self {
            kind,
            tile,
            rotation: 0,
            nodes,
            anchored: false,
            plugged: false,
            welded: false,
            contents: Vec::new(),
        };
        segment.set_rotation(rotation);
        segment
    }

    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    pub fn tile(&self) -> GridPosition {
        self.tile
    }

    /// Placement rotation in degrees, normalized to `0..360`.
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn nodes(&self) -> &[PipeNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [PipeNode] {
        &mut self.nodes
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn is_plugged(&self) -> bool {
        self.plugged
    }

    pub fn is_welded(&self) -> bool {
        self.welded
    }

    /// Carriers currently inside this segment.
    pub fn occupants(&self) -> &[CarrierId] {
        &self.contents
    }

    /// Change the placement rotation and recompute every node mask.
    pub(crate) fn set_rotation(&mut self, rotation: i32) {
        self.rotation = rotation.rem_euclid(360);
        for node in &mut self.nodes {
            node.mask = node.base_mask.rotated(self.rotation);
        }
    }

    pub(crate) fn set_tile(&mut self, tile: GridPosition) {
        self.tile = tile;
    }

    /// The first pipe node, which defines the segment's default layer.
    pub fn first_node(&self) -> Option<&PipeNode> {
        self.nodes.first()
    }

    /// Directions this segment can connect on, from its kind and rotation.
    ///
    /// Junction-like kinds report every configured angle whether or not a
    /// neighbour exists there; per-layer filtering happens in the choice
    /// surface.
    pub fn connectable_directions(&self) -> Vec<Direction> {
        let rotation = self.rotation;
        match &self.kind {
            SegmentKind::Entry => Direction::all().to_vec(),
            SegmentKind::Bend => vec![
                Direction::from_degrees(rotation),
                Direction::from_degrees(rotation - 90),
            ],
            SegmentKind::Junction { degrees } | SegmentKind::Manifold { degrees } => degrees
                .iter()
                .map(|d| Direction::from_degrees(d.rem_euclid(360) + rotation))
                .collect(),
            SegmentKind::Transit => vec![
                Direction::from_degrees(rotation),
                Direction::from_degrees(rotation + 180),
            ],
            SegmentKind::Straight => {
                let mut dirs = Vec::new();
                for node in &self.nodes {
                    for d in node.mask.cardinals() {
                        if !dirs.contains(&d) {
                            dirs.push(d);
                        }
                    }
                }
                dirs
            }
        }
    }

    pub(crate) fn insert(&mut self, carrier: CarrierId) -> bool {
        if !self.plugged || self.contents.contains(&carrier) {
            return false;
        }
        self.contents.push(carrier);
        true
    }

    pub(crate) fn remove(&mut self, carrier: CarrierId) -> bool {
        let before = self.contents.len();
        self.contents.retain(|c| *c != carrier);
        self.contents.len() != before
    }
}
