//! Engine tuning loaded at construction time.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Errors from [`TransitConfig::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("hop_duration must be positive, got {0}")]
    NonPositiveHopDuration(Fixed64),
    #[error("tile_size must be positive, got {0}")]
    NonPositiveTileSize(Fixed64),
    #[error("{field} must not be negative, got {value}")]
    NegativeDuration { field: &'static str, value: Fixed64 },
    #[error("layer_count must be at least 1")]
    NoLayers,
}

/// Timing and sizing knobs for a [`TransitEngine`](crate::engine::TransitEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    /// Seconds to cross one edge.
    pub hop_duration: Fixed64,
    /// Minimum seconds between traversal cues for one carrier.
    pub cue_cooldown: Fixed64,
    /// Length of the entry commitment in seconds.
    pub enter_delay: Fixed64,
    /// Layers offered at manifolds, counted from the primary layer.
    pub layer_count: u8,
    /// World units per grid tile.
    pub tile_size: Fixed64,
    /// Ring buffer size per event kind.
    pub event_capacity: usize,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            hop_duration: Fixed64::from_num(0.15),
            cue_cooldown: Fixed64::from_num(0.5),
            enter_delay: Fixed64::from_num(2.5),
            layer_count: 3,
            tile_size: Fixed64::ONE,
            event_capacity: 1024,
        }
    }
}

impl TransitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hop_duration <= Fixed64::ZERO {
            return Err(ConfigError::NonPositiveHopDuration(self.hop_duration));
        }
        if self.tile_size <= Fixed64::ZERO {
            return Err(ConfigError::NonPositiveTileSize(self.tile_size));
        }
        for (field, value) in [
            ("cue_cooldown", self.cue_cooldown),
            ("enter_delay", self.enter_delay),
        ] {
            if value < Fixed64::ZERO {
                return Err(ConfigError::NegativeDuration { field, value });
            }
        }
        if self.layer_count == 0 {
            return Err(ConfigError::NoLayers);
        }
        Ok(())
    }
}
