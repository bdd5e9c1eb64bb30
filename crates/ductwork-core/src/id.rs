use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a tube segment placed in the network.
    pub struct SegmentId;

    /// Identifies a carrier (the moving container) while it is in-network.
    pub struct CarrierId;

    /// Identifies a host entity known to the engine (travelers, crawlers).
    pub struct EntityId;

    /// Identifies a pending entry commitment.
    pub struct CommitmentId;
}

/// A parallel lane through the network. 0, 1 and 2 are conventionally the
/// primary, secondary and tertiary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PipeLayer(pub u8);

impl PipeLayer {
    pub const PRIMARY: PipeLayer = PipeLayer(0);
    pub const SECONDARY: PipeLayer = PipeLayer(1);
    pub const TERTIARY: PipeLayer = PipeLayer(2);
}

/// Identifies a transport group (a set of pipe nodes known to be joined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Opaque handle to the gas/fluid contents carried by a pipe node. The
/// engine never looks inside; it only hands the handle back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentsId(pub u64);
