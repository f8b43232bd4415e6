//! Host settings: engine rules plus room actor settings, loaded from JSON.

use std::path::Path;

use nightfall_engine::EngineConfig;
use nightfall_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::NightfallError;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "NIGHTFALL_CONFIG";

/// Everything a [`Host`](crate::Host) needs to create rooms.
///
/// Missing sections and fields fall back to their defaults, so
/// `{"engine": {"auto_start": true}}` is a complete settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub room: RoomConfig,
}

impl Settings {
    /// Loads from the file named by `NIGHTFALL_CONFIG`, or defaults when
    /// the variable is unset.
    pub fn load() -> Result<Self, NightfallError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(path),
            None => {
                tracing::debug!("{CONFIG_ENV} unset, using default settings");
                Ok(Self::default())
            }
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, NightfallError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| NightfallError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&text).map_err(|source| NightfallError::SettingsParse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "settings loaded");
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every table size the host will accept has a usable
    /// template.
    pub fn validate(&self) -> Result<(), NightfallError> {
        let engine = &self.engine;
        if engine.min_players > engine.max_players {
            return Err(NightfallError::InvalidSettings(format!(
                "min_players {} exceeds max_players {}",
                engine.min_players, engine.max_players
            )));
        }
        if self.room.channel_size == 0 {
            return Err(NightfallError::InvalidSettings(
                "channel_size must be at least 1".into(),
            ));
        }
        for players in engine.min_players..=engine.max_players {
            engine.select(players)?;
        }
        Ok(())
    }
}
