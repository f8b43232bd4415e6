//! `Host` builder and player connections.
//!
//! This is the entry point for running Nightfall tables. It ties together
//! the layers: protocol → room manager → room actors → engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nightfall_protocol::{
    Command, Envelope, JsonCodec, PlayerId, ProtocolError, Recipient, RoomId, SessionHandle,
};
use nightfall_room::{HookFactory, RoomHooks, RoomInfo, RoomManager, RoomOutbound};
use tokio::sync::{Mutex, mpsc};

use crate::{NightfallError, Settings};

/// Shared host state handed to every connection.
struct HostState {
    rooms: Mutex<RoomManager>,
    settings: Settings,
    codec: JsonCodec,
    next_handle: AtomicU64,
}

/// Builder for configuring a [`Host`].
///
/// # Example
///
/// ```rust,ignore
/// use nightfall::prelude::*;
///
/// let host = Host::builder()
///     .settings(Settings::load()?)
///     .hooks(|_| RoomHooks::new(MyPresenter, NoopHook))
///     .build()?;
/// ```
pub struct HostBuilder {
    settings: Settings,
    hooks: Option<HookFactory>,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            hooks: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Builds the hooks for every room this host creates.
    pub fn hooks(
        mut self,
        factory: impl Fn(RoomId) -> RoomHooks + Send + Sync + 'static,
    ) -> Self {
        self.hooks = Some(Box::new(factory));
        self
    }

    /// Validates the settings and builds the host.
    ///
    /// # Errors
    /// Any [`Settings::validate`] failure.
    pub fn build(self) -> Result<Host, NightfallError> {
        self.settings.validate()?;

        let mut rooms = RoomManager::new(self.settings.engine.clone(), self.settings.room.clone());
        if let Some(factory) = self.hooks {
            rooms = rooms.with_hooks(factory);
        }

        tracing::info!(
            min_players = self.settings.engine.min_players,
            max_players = self.settings.engine.max_players,
            auto_start = self.settings.engine.auto_start,
            "nightfall host ready"
        );

        Ok(Host {
            state: Arc::new(HostState {
                rooms: Mutex::new(rooms),
                settings: self.settings,
                codec: JsonCodec,
                next_handle: AtomicU64::new(1),
            }),
        })
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hosts any number of tables. Cheap to clone; clones share the rooms.
#[derive(Clone)]
pub struct Host {
    state: Arc<HostState>,
}

impl Host {
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    fn next_handle(&self) -> SessionHandle {
        SessionHandle(self.state.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Seats a player at the first open table, or back at their own table
    /// if they already have one.
    pub async fn connect(&self, player_id: PlayerId) -> Result<Connection, NightfallError> {
        let handle = self.next_handle();
        let (tx, rx) = mpsc::unbounded_channel();
        let room_id = {
            let mut rooms = self.state.rooms.lock().await;
            rooms.join_or_create(player_id, handle, tx).await?
        };
        tracing::info!(%player_id, %room_id, %handle, "player connected");
        Ok(Connection::new(self.clone(), player_id, room_id, handle, rx))
    }

    /// Seats a player at a specific table.
    pub async fn connect_to(
        &self,
        player_id: PlayerId,
        room_id: RoomId,
    ) -> Result<Connection, NightfallError> {
        let handle = self.next_handle();
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .rooms
            .lock()
            .await
            .join_room(player_id, room_id, handle, tx)
            .await?;
        tracing::info!(%player_id, %room_id, %handle, "player connected");
        Ok(Connection::new(self.clone(), player_id, room_id, handle, rx))
    }

    pub async fn create_room(&self) -> RoomId {
        self.state.rooms.lock().await.create_room()
    }

    pub async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo, NightfallError> {
        Ok(self.state.rooms.lock().await.get_room_info(room_id).await?)
    }

    /// Lobbies with a free seat.
    pub async fn open_rooms(&self) -> Vec<RoomInfo> {
        // Query without the lock so a busy room cannot stall other callers.
        let handles = self.state.rooms.lock().await.room_handles();
        let mut open = Vec::new();
        for handle in handles {
            if let Ok(info) = handle.get_info().await {
                if info.is_open() {
                    open.push(info);
                }
            }
        }
        open
    }

    pub async fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.state.rooms.lock().await.player_room(&player_id)
    }

    pub async fn close_room(&self, room_id: RoomId) -> Result<(), NightfallError> {
        Ok(self.state.rooms.lock().await.destroy_room(room_id).await?)
    }

    /// Stops every room.
    pub async fn shutdown(&self) {
        let mut rooms = self.state.rooms.lock().await;
        for room_id in rooms.room_ids() {
            let _ = rooms.destroy_room(room_id).await;
        }
        tracing::info!("nightfall host stopped");
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One player's live link to their table.
///
/// Dropping a connection without calling [`leave`](Self::leave) counts as a
/// lost connection: the seat is held for the reconnect grace period.
pub struct Connection {
    host: Host,
    player_id: PlayerId,
    room_id: RoomId,
    handle: SessionHandle,
    inbox: mpsc::UnboundedReceiver<RoomOutbound>,
    seq: u64,
    closed: bool,
}

impl Connection {
    fn new(
        host: Host,
        player_id: PlayerId,
        room_id: RoomId,
        handle: SessionHandle,
        inbox: mpsc::UnboundedReceiver<RoomOutbound>,
    ) -> Self {
        Self {
            host,
            player_id,
            room_id,
            handle,
            inbox,
            seq: 1,
            closed: false,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// Sends a command to the table.
    ///
    /// `Leave` is routed as a departure on this connection's handle and
    /// `Join` rebinds this connection to the handle it names. Everything
    /// else goes to the engine; rejections arrive through
    /// [`recv`](Self::recv).
    pub async fn send(&mut self, command: Command) -> Result<(), NightfallError> {
        match command {
            Command::Join { handle } => self.rebind(handle).await,
            Command::Leave { intentional, .. } => {
                let mut rooms = self.host.state.rooms.lock().await;
                rooms
                    .leave_room(self.player_id, self.handle, intentional)
                    .await?;
                self.closed = true;
                Ok(())
            }
            command => {
                let mut rooms = self.host.state.rooms.lock().await;
                Ok(rooms.route_command(self.player_id, command).await?)
            }
        }
    }

    /// Decodes one line of JSON into a [`Command`] and sends it.
    pub async fn send_line(&mut self, line: &str) -> Result<(), NightfallError> {
        let command: Command = self.host.state.codec.decode_line(line)?;
        self.send(command).await
    }

    async fn rebind(&mut self, handle: SessionHandle) -> Result<(), NightfallError> {
        if handle == self.handle {
            return Err(ProtocolError::InvalidMessage(format!(
                "{handle} is already this connection's handle"
            ))
            .into());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.host
            .state
            .rooms
            .lock()
            .await
            .join_room(self.player_id, self.room_id, handle, tx)
            .await?;
        self.inbox = rx;
        self.handle = handle;
        self.closed = false;
        Ok(())
    }

    /// Waits for the next message addressed to this player. `None` once
    /// the room has dropped the player or stopped.
    pub async fn recv(&mut self) -> Option<Envelope<RoomOutbound>> {
        let body = self.inbox.recv().await?;
        Some(self.stamp(body))
    }

    /// Returns a message if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Envelope<RoomOutbound>> {
        let body = self.inbox.try_recv().ok()?;
        Some(self.stamp(body))
    }

    fn stamp(&mut self, body: RoomOutbound) -> Envelope<RoomOutbound> {
        let seq = self.seq;
        self.seq += 1;
        Envelope {
            seq,
            room_id: self.room_id,
            to: Recipient::Player(self.player_id),
            body,
        }
    }

    /// Leaves the table on purpose, giving up the seat.
    pub async fn leave(mut self) -> Result<(), NightfallError> {
        let handle = self.handle;
        self.send(Command::Leave {
            handle,
            intentional: true,
        })
        .await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Drop is synchronous; report the lost connection from a task.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let host = self.host.clone();
        let player_id = self.player_id;
        let handle = self.handle;
        runtime.spawn(async move {
            let mut rooms = host.state.rooms.lock().await;
            if let Err(e) = rooms.leave_room(player_id, handle, false).await {
                tracing::debug!(%player_id, error = %e, "disconnect not delivered");
            }
        });
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("player_id", &self.player_id)
            .field("room_id", &self.room_id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
