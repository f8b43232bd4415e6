//! Error types for the room layer.

use nightfall_engine::GameError;
use nightfall_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The player is registered in a different room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not in any room the manager knows of.
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// The session refused the request.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The handler panicked. The room rolled back and is still running.
    #[error("room {0} failed to handle the request")]
    Fault(RoomId),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
