//! The segment registry and the topology resolver.
//!
//! [`Network`] owns every placed segment and the tile index of anchored
//! ones. [`Network::next_segment`] is the one-hop neighbour query used by
//! automatic stepping and by the junction choice surface alike; it never
//! mutates anything.

use crate::direction::Direction;
use crate::grid::{GridFrame, GridPosition, TileGrid, WorldPos};
use crate::id::{CarrierId, GroupId, PipeLayer, SegmentId};
use crate::segment::{PipeNode, Segment};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from segment registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("segment not found: {0:?}")]
    SegmentNotFound(SegmentId),
    #[error("segment is already anchored: {0:?}")]
    AlreadyAnchored(SegmentId),
    #[error("segment is not anchored: {0:?}")]
    NotAnchored(SegmentId),
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Registry of tube segments plus the spatial index of anchored ones.
#[derive(Debug, Default)]
pub struct Network {
    segments: SlotMap<SegmentId, Segment>,
    grid: TileGrid,
    frame: GridFrame,
    groups_dirty: bool,
}

impl Network {
    pub fn new(frame: GridFrame) -> Self {
        Self {
            segments: SlotMap::with_key(),
            grid: TileGrid::new(),
            frame,
            groups_dirty: false,
        }
    }

    // -- Registry --

    /// Register a segment. It starts unanchored and unplugged.
    pub fn place(&mut self, segment: Segment) -> SegmentId {
        self.segments.insert(segment)
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(id)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.segments.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, &Segment)> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn frame(&self) -> &GridFrame {
        &self.frame
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Anchor a segment on its tile and plug it into the network.
    pub(crate) fn anchor(&mut self, id: SegmentId) -> Result<(), NetworkError> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or(NetworkError::SegmentNotFound(id))?;
        if segment.anchored {
            return Err(NetworkError::AlreadyAnchored(id));
        }
        segment.anchored = true;
        segment.plugged = true;
        self.grid.anchor(id, segment.tile());
        self.groups_dirty = true;
        Ok(())
    }

    /// Take a segment off the grid. Returns the carriers that were inside;
    /// the caller must evict them.
    pub(crate) fn unanchor(&mut self, id: SegmentId) -> Result<Vec<CarrierId>, NetworkError> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or(NetworkError::SegmentNotFound(id))?;
        if !segment.anchored {
            return Err(NetworkError::NotAnchored(id));
        }
        segment.anchored = false;
        self.grid.unanchor(id, segment.tile());
        self.groups_dirty = true;
        Ok(self.unplug(id))
    }

    /// Mark a segment unplugged without changing its anchoring. Returns the
    /// carriers that were inside. Unplugging twice returns nothing the
    /// second time.
    pub(crate) fn unplug(&mut self, id: SegmentId) -> Vec<CarrierId> {
        let Some(segment) = self.segments.get_mut(id) else {
            return Vec::new();
        };
        if !segment.plugged {
            return Vec::new();
        }
        segment.plugged = false;
        for node in segment.nodes_mut() {
            node.group = None;
        }
        segment.contents.clone()
    }

    /// Delete a segment from the registry.
    pub(crate) fn remove(&mut self, id: SegmentId) -> Option<Segment> {
        let segment = self.segments.remove(id)?;
        if segment.anchored {
            self.grid.unanchor(id, segment.tile());
            self.groups_dirty = true;
        }
        Some(segment)
    }

    /// Rotate a segment. Its shape and node masks are recomputed.
    pub(crate) fn rotate(&mut self, id: SegmentId, rotation: i32) -> Result<(), NetworkError> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or(NetworkError::SegmentNotFound(id))?;
        segment.set_rotation(rotation);
        self.groups_dirty = true;
        Ok(())
    }

    /// Move an unanchored segment to another tile.
    pub(crate) fn relocate(&mut self, id: SegmentId, tile: GridPosition) -> Result<(), NetworkError> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or(NetworkError::SegmentNotFound(id))?;
        if segment.anchored {
            return Err(NetworkError::AlreadyAnchored(id));
        }
        segment.set_tile(tile);
        Ok(())
    }

    pub(crate) fn set_welded(&mut self, id: SegmentId, welded: bool) -> Result<(), NetworkError> {
        let segment = self
            .segments
            .get_mut(id)
            .ok_or(NetworkError::SegmentNotFound(id))?;
        segment.welded = welded;
        Ok(())
    }

    /// World position of a segment's tile centre.
    pub fn world_position(&self, id: SegmentId) -> Option<WorldPos> {
        self.segments
            .get(id)
            .map(|s| self.frame.world_from_tile(s.tile()))
    }

    // -- Topology resolution --

    /// The segment reachable from `from` by one step in `direction` on
    /// `layer`, if any. First matching candidate on the adjacent tile wins.
    pub fn next_segment(
        &self,
        from: SegmentId,
        direction: Direction,
        layer: PipeLayer,
    ) -> Option<SegmentId> {
        let segment = self.segments.get(from)?;
        let opposite = direction.opposite();
        let target = segment.tile().step(direction);

        self.grid
            .anchored_at(target)
            .iter()
            .copied()
            .filter(|candidate| *candidate != from)
            .find(|candidate| self.are_connected(from, *candidate, direction, opposite, layer))
    }

    /// Whether `a` and `b` are joined on `layer`, with `a` exposing
    /// `direction_from_a` and `b` exposing `direction_from_b`.
    pub fn are_connected(
        &self,
        a: SegmentId,
        b: SegmentId,
        direction_from_a: Direction,
        direction_from_b: Direction,
        layer: PipeLayer,
    ) -> bool {
        let (Some(seg_a), Some(seg_b)) = (self.segments.get(a), self.segments.get(b)) else {
            return false;
        };

        let facing = |node: &&PipeNode, direction: Direction| {
            node.layer == layer && node.mask().has_direction(direction)
        };

        for node_a in seg_a.nodes().iter().filter(|n| facing(n, direction_from_a)) {
            for node_b in seg_b.nodes().iter().filter(|n| facing(n, direction_from_b)) {
                if let (Some(ga), Some(gb)) = (node_a.group, node_b.group)
                    && ga == gb
                {
                    return true;
                }
                if would_normally_connect(node_a, node_b, direction_from_a, direction_from_b) {
                    return true;
                }
            }
        }
        false
    }

    // -- Transport groups --

    /// Whether anchoring or shape changed since the last [`Network::regroup`].
    pub fn groups_dirty(&self) -> bool {
        self.groups_dirty
    }

    /// Rebuild transport group membership by flood fill over mutually
    /// facing nodes of the same kind and layer. Returns the group count.
    pub fn regroup(&mut self) -> u32 {
        let mut assigned: SecondaryMap<SegmentId, Vec<Option<GroupId>>> = SecondaryMap::new();
        for (id, segment) in &self.segments {
            assigned.insert(id, vec![None; segment.nodes().len()]);
        }

        let mut next_group = 0u32;
        let mut queue = VecDeque::new();

        for (start, segment) in &self.segments {
            if !segment.anchored {
                continue;
            }
            for start_index in 0..segment.nodes().len() {
                if assigned[start][start_index].is_some() {
                    continue;
                }
                let group = GroupId(next_group);
                next_group += 1;
                assigned[start][start_index] = Some(group);
                queue.push_back((start, start_index));

                while let Some((seg_id, index)) = queue.pop_front() {
                    let seg = &self.segments[seg_id];
                    let node = &seg.nodes()[index];
                    for direction in Direction::all() {
                        if !node.mask().has_direction(direction) {
                            continue;
                        }
                        let back = direction.opposite();
                        for &other_id in self.grid.anchored_at(seg.tile().step(direction)) {
                            let other = &self.segments[other_id];
                            for (other_index, other_node) in other.nodes().iter().enumerate() {
                                if assigned[other_id][other_index].is_some() {
                                    continue;
                                }
                                if would_normally_connect(node, other_node, direction, back) {
                                    assigned[other_id][other_index] = Some(group);
                                    queue.push_back((other_id, other_index));
                                }
                            }
                        }
                    }
                }
            }
        }

        for (id, groups) in assigned {
            if let Some(segment) = self.segments.get_mut(id) {
                for (node, group) in segment.nodes_mut().iter_mut().zip(groups) {
                    node.group = group;
                }
            }
        }
        self.groups_dirty = false;
        next_group
    }
}

/// Fallback connection test for nodes that are not (yet) in a shared group.
fn would_normally_connect(
    a: &PipeNode,
    b: &PipeNode,
    direction_from_a: Direction,
    direction_from_b: Direction,
) -> bool {
    if a.kind != b.kind {
        return false;
    }
    if a.layer != b.layer {
        return false;
    }
    a.mask().has_direction(direction_from_a) && b.mask().has_direction(direction_from_b)
}
