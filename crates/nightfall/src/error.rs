//! Unified error type for Nightfall.

use std::path::PathBuf;

use nightfall_engine::GameError;
use nightfall_protocol::ProtocolError;
use nightfall_room::RoomError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each wrapped variant lets `?` convert layer errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum NightfallError {
    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine refused a command.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A room could not be reached or refused a join.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The settings file could not be read.
    #[error("cannot read settings from {path}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`](crate::Settings).
    #[error("cannot parse settings from {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Settings parsed but describe a host that cannot run.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
