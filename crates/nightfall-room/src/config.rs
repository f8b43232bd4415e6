//! Room actor settings.

use nightfall_tick::ClockConfig;
use serde::{Deserialize, Serialize};

/// Settings for one room actor. Game rules live in
/// [`EngineConfig`](nightfall_engine::EngineConfig); this only covers how
/// the actor runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// The clock that drives deadline checks.
    pub clock: ClockConfig,
    /// Capacity of the command channel. Senders wait when it is full.
    pub channel_size: usize,
    /// Fixed seed for role deals. `None` draws a fresh seed per room.
    pub rng_seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            channel_size: 64,
            rng_seed: None,
        }
    }
}
