//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use nightfall_engine::EngineConfig;
use nightfall_protocol::{Command, PlayerId, RoomId, SessionHandle};
use tokio::sync::mpsc;

use crate::room::{DepartureSender, spawn_room};
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomHooks, RoomInfo};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Builds the hooks for a newly created room.
pub type HookFactory = Box<dyn Fn(RoomId) -> RoomHooks + Send + Sync>;

/// Manages all active rooms and tracks which player is in which room.
///
/// A player belongs to at most one room at a time. Joining the room you are
/// already in is a reconnect, not an error. Rooms report every player they
/// unregister (left, timed out) and the index forgets them before the next
/// lookup.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
    player_rooms: HashMap<PlayerId, RoomId>,
    departures_tx: DepartureSender,
    departures: mpsc::UnboundedReceiver<(PlayerId, RoomId)>,
    engine: EngineConfig,
    config: RoomConfig,
    hooks: Option<HookFactory>,
}

impl RoomManager {
    pub fn new(engine: EngineConfig, config: RoomConfig) -> Self {
        let (departures_tx, departures) = mpsc::unbounded_channel();
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            departures_tx,
            departures,
            engine,
            config,
            hooks: None,
        }
    }

    /// Attaches hooks to every room created from now on.
    pub fn with_hooks(
        mut self,
        factory: impl Fn(RoomId) -> RoomHooks + Send + Sync + 'static,
    ) -> Self {
        self.hooks = Some(Box::new(factory));
        self
    }

    /// Applies departures reported by rooms since the last call.
    fn forget_departed(&mut self) {
        while let Ok((player_id, room_id)) = self.departures.try_recv() {
            if self.player_rooms.get(&player_id) == Some(&room_id) {
                self.player_rooms.remove(&player_id);
                tracing::debug!(%player_id, %room_id, "player left room index");
            }
        }
    }

    /// Creates a new room and returns its ID.
    pub fn create_room(&mut self) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let hooks = self
            .hooks
            .as_ref()
            .map(|factory| factory(room_id))
            .unwrap_or_default();
        let handle = spawn_room(
            room_id,
            self.config.clone(),
            self.engine.clone(),
            hooks,
            self.departures_tx.clone(),
        );
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Adds a player to a room, or rebinds them if they are already in it.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        room_id: RoomId,
        handle: SessionHandle,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        self.forget_departed();
        if let Some(current) = self.player_rooms.get(&player_id) {
            if *current != room_id {
                return Err(RoomError::AlreadyInRoom(player_id, *current));
            }
        }

        let room = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        room.join(player_id, handle, sender).await?;
        self.index(player_id, room_id);
        Ok(())
    }

    /// Records a successful join. Departures the room reported before it
    /// accepted the join are applied first so they cannot undo it.
    fn index(&mut self, player_id: PlayerId, room_id: RoomId) {
        self.forget_departed();
        self.player_rooms.insert(player_id, room_id);
    }

    /// Reports that a player's connection went away.
    ///
    /// An intentional departure frees the player to join elsewhere. A
    /// dropped connection keeps them indexed here so they can come back
    /// to the same seat.
    pub async fn leave_room(
        &mut self,
        player_id: PlayerId,
        handle: SessionHandle,
        intentional: bool,
    ) -> Result<(), RoomError> {
        self.forget_departed();
        let room_id = self
            .player_rooms
            .get(&player_id)
            .copied()
            .ok_or(RoomError::NotInRoom(player_id))?;

        if let Some(room) = self.rooms.get(&room_id) {
            room.leave(player_id, handle, intentional).await?;
        }
        if intentional {
            self.player_rooms.remove(&player_id);
        }
        Ok(())
    }

    /// Routes a game command from a player to their current room.
    pub async fn route_command(
        &mut self,
        player_id: PlayerId,
        command: Command,
    ) -> Result<(), RoomError> {
        self.forget_departed();
        let room_id = self
            .player_rooms
            .get(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;
        let room = self.rooms.get(room_id).ok_or(RoomError::NotFound(*room_id))?;
        room.send_command(player_id, command).await
    }

    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let room = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        room.get_info().await
    }

    /// Shuts down a room and forgets everyone who was in it.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let room = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        let _ = room.shutdown().await;
        self.player_rooms.retain(|_, rid| *rid != room_id);
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    pub fn player_room(&mut self, player_id: &PlayerId) -> Option<RoomId> {
        self.forget_departed();
        self.player_rooms.get(player_id).copied()
    }

    /// Rooms still in the lobby with a free seat. Rooms that do not answer
    /// are skipped.
    pub async fn list_open_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for room in self.rooms.values() {
            if let Ok(info) = room.get_info().await {
                if info.is_open() {
                    infos.push(info);
                }
            }
        }
        infos
    }

    /// Cloned handles to every room, for async work without holding the
    /// manager lock.
    pub fn room_handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Puts a player at a table.
    ///
    /// A player already indexed to a room is sent back to it, which
    /// rebinds their seat. Otherwise the first open lobby takes them, and
    /// a new room is created when none is open.
    pub async fn join_or_create(
        &mut self,
        player_id: PlayerId,
        handle: SessionHandle,
        sender: PlayerSender,
    ) -> Result<RoomId, RoomError> {
        self.forget_departed();
        if let Some(current) = self.player_rooms.get(&player_id).copied() {
            self.join_room(player_id, current, handle, sender).await?;
            return Ok(current);
        }

        // A room can fill between get_info and join; keep looking if so.
        for room in self.room_handles() {
            if let Ok(info) = room.get_info().await {
                if info.is_open() && room.join(player_id, handle, sender.clone()).await.is_ok() {
                    self.index(player_id, info.room_id);
                    return Ok(info.room_id);
                }
            }
        }

        let room_id = self.create_room();
        let room = self.rooms.get(&room_id).expect("just created this room");
        room.join(player_id, handle, sender).await?;
        self.index(player_id, room_id);
        Ok(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(EngineConfig::default(), RoomConfig::default())
    }
}
