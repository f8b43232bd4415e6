//! Collaborators a room reports to.
//!
//! The engine only narrates. Anything that has to happen outside the game
//! (muting removed players, flagging the accused, revealing roles in a
//! lobby UI, feeding a matchmaking pool) hangs off these traits. Hooks run
//! on the room's task, so they must not block.

use nightfall_engine::GameEvent;
use nightfall_protocol::RoomId;

/// Receives the events that change how a player is presented: removals,
/// shields, restraint and release, and the end-of-game reveal.
pub trait PresentationHook: Send + 'static {
    fn on_event(&mut self, room_id: RoomId, event: &GameEvent);
}

/// Told whenever the number of registered players in a room changes.
pub trait MatchmakingNotifier: Send + 'static {
    fn pool_changed(&mut self, room_id: RoomId, registered: usize);
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl PresentationHook for NoopHook {
    fn on_event(&mut self, _room_id: RoomId, _event: &GameEvent) {}
}

impl MatchmakingNotifier for NoopHook {
    fn pool_changed(&mut self, _room_id: RoomId, _registered: usize) {}
}

/// The hooks attached to one room.
pub struct RoomHooks {
    pub presentation: Box<dyn PresentationHook>,
    pub matchmaking: Box<dyn MatchmakingNotifier>,
}

impl RoomHooks {
    pub fn new(
        presentation: impl PresentationHook,
        matchmaking: impl MatchmakingNotifier,
    ) -> Self {
        Self {
            presentation: Box::new(presentation),
            matchmaking: Box::new(matchmaking),
        }
    }
}

impl Default for RoomHooks {
    fn default() -> Self {
        Self::new(NoopHook, NoopHook)
    }
}

impl std::fmt::Debug for RoomHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHooks").finish_non_exhaustive()
    }
}
