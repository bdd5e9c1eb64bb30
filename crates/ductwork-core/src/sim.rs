//! Simulation clock and state hashing.
//!
//! The host drives the engine with a variable `dt`; [`SimClock`] counts the
//! updates and accumulates elapsed time in fixed point so that cooldowns and
//! commitments compare against a deterministic clock.

use crate::fixed::{Fixed64, Ticks};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Tick counter plus accumulated simulated seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimClock {
    /// Incremented by 1 at the end of every update.
    pub tick: Ticks,
    /// Seconds elapsed across all updates.
    pub now: Fixed64,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            tick: 0,
            now: Fixed64::ZERO,
        }
    }

    /// Add `dt` seconds and move to the next tick. Negative `dt` is ignored.
    pub fn advance(&mut self, dt: Fixed64) {
        if dt > Fixed64::ZERO {
            self.now = self.now.saturating_add(dt);
        }
        self.tick += 1;
    }

    /// Seconds elapsed since `since`, never negative.
    pub fn elapsed_since(&self, since: Fixed64) -> Fixed64 {
        (self.now - since).max(Fixed64::ZERO)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of transit state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
