//! Error types for the engine.
//!
//! Every rejection is reported back to the acting player only and never
//! mutates the session. That makes the enum safe to clone and send over
//! the wire, so it derives `Serialize` alongside `thiserror::Error`.

use std::fmt;

use nightfall_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::Phase;

/// Why a target was refused even though it names an active player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IllegalReason {
    /// Eliminators cannot target one of their own.
    FellowEliminator,
    /// The protector may not shield themselves in this configuration.
    SelfProtection,
    /// The protector may not shield the same player two nights running.
    RepeatedProtection,
    /// Nobody can accuse themselves.
    SelfAccusation,
}

impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FellowEliminator => write!(f, "cannot target a fellow eliminator"),
            Self::SelfProtection => write!(f, "cannot protect yourself"),
            Self::RepeatedProtection => write!(f, "cannot protect the same player twice in a row"),
            Self::SelfAccusation => write!(f, "cannot accuse yourself"),
        }
    }
}

/// Errors returned by [`GameSession`](crate::GameSession) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum GameError {
    /// The command is not valid in the current phase.
    #[error("not allowed during {0}")]
    InvalidPhase(Phase),

    /// The actor lacks the role or standing required.
    #[error("{0} is not eligible for that")]
    NotEligible(PlayerId),

    /// A duplicate submission where replacing is not allowed.
    #[error("{0} has already submitted")]
    AlreadySubmitted(PlayerId),

    /// The target is not an active player.
    #[error("{0} is not an active player")]
    UnknownTarget(PlayerId),

    /// The target is forbidden for the actor's role.
    #[error("illegal target {target}: {reason}")]
    IllegalTarget {
        target: PlayerId,
        reason: IllegalReason,
    },

    /// Role counts do not fit the player count.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A start was requested before enough players registered.
    #[error("need at least {required} players to start, have {registered}")]
    NotEnoughPlayers { required: usize, registered: usize },
}

impl GameError {
    /// Errors that concern the whole table rather than the actor alone.
    ///
    /// A failed deal leaves every waiting player in the lobby, so the room
    /// broadcasts these instead of replying privately.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_target_message_names_reason() {
        let err = GameError::IllegalTarget {
            target: PlayerId(3),
            reason: IllegalReason::FellowEliminator,
        };
        assert_eq!(
            err.to_string(),
            "illegal target P-3: cannot target a fellow eliminator"
        );
    }

    #[test]
    fn test_game_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(GameError::UnknownTarget(PlayerId(9))).unwrap();
        assert_eq!(json["kind"], "UnknownTarget");
        assert_eq!(json["detail"], 9);
    }

    #[test]
    fn test_only_configuration_errors_are_public() {
        assert!(GameError::Configuration("x".into()).is_public());
        assert!(!GameError::NotEligible(PlayerId(1)).is_public());
    }
}
