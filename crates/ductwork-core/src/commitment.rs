//! Timed entry commitments.
//!
//! Starting to climb into an entry is not instant: the engine records a
//! pending commitment and resolves it at a later pre-tick. A commitment is
//! cancelled if its user moves, disappears, or the entry leaves the grid.
//! Nothing is captured until a commitment completes.

use crate::fixed::Fixed64;
use crate::grid::WorldPos;
use crate::id::{CommitmentId, EntityId, SegmentId};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One pending entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub user: EntityId,
    pub entry: SegmentId,
    /// Where the user stood when the commitment started.
    pub origin: WorldPos,
    pub elapsed: Fixed64,
    pub duration: Fixed64,
}

impl PendingEntry {
    pub fn is_due(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Why a commitment was dropped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Moved,
    UserGone,
    EntryGone,
}

/// Result of resolving one commitment.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitmentOutcome {
    Completed {
        id: CommitmentId,
        entry: PendingEntry,
    },
    Cancelled {
        id: CommitmentId,
        entry: PendingEntry,
        reason: CancelReason,
    },
}

// ---------------------------------------------------------------------------
// CommitmentQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CommitmentQueue {
    pending: SlotMap<CommitmentId, PendingEntry>,
}

impl CommitmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        user: EntityId,
        entry: SegmentId,
        origin: WorldPos,
        duration: Fixed64,
    ) -> CommitmentId {
        self.pending.insert(PendingEntry {
            user,
            entry,
            origin,
            elapsed: Fixed64::ZERO,
            duration,
        })
    }

    pub fn get(&self, id: CommitmentId) -> Option<&PendingEntry> {
        self.pending.get(id)
    }

    pub fn cancel(&mut self, id: CommitmentId) -> Option<PendingEntry> {
        self.pending.remove(id)
    }

    /// The pending commitment for `user`, if one exists.
    pub fn pending_for(&self, user: EntityId) -> Option<CommitmentId> {
        self.pending
            .iter()
            .find(|(_, p)| p.user == user)
            .map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Advance every commitment by `dt` and resolve the ones that are
    /// cancelled or due. `check` reports a cancel reason for a commitment
    /// whose preconditions no longer hold.
    pub fn advance(
        &mut self,
        dt: Fixed64,
        mut check: impl FnMut(&PendingEntry) -> Option<CancelReason>,
    ) -> Vec<CommitmentOutcome> {
        let mut outcomes = Vec::new();
        let step = dt.max(Fixed64::ZERO);
        let ids: Vec<CommitmentId> = self.pending.keys().collect();

        for id in ids {
            let Some(pending) = self.pending.get_mut(id) else {
                continue;
            };
            if let Some(reason) = check(pending) {
                if let Some(entry) = self.pending.remove(id) {
                    outcomes.push(CommitmentOutcome::Cancelled { id, entry, reason });
                }
                continue;
            }
            pending.elapsed = pending.elapsed.saturating_add(step);
            if pending.is_due()
                && let Some(entry) = self.pending.remove(id)
            {
                outcomes.push(CommitmentOutcome::Completed { id, entry });
            }
        }
        outcomes
    }
}
