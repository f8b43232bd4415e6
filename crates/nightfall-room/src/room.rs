//! Room actor: an isolated Tokio task that owns one game session.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands and clock ticks are handled one at a
//! time, so the session never needs a lock.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use nightfall_engine::{EngineConfig, GameError, GameEvent, GameSession, Outbound, Phase};
use nightfall_protocol::{Command, PlayerId, Recipient, RoomId, SessionHandle};
use nightfall_tick::PhaseClock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::{RoomConfig, RoomError, RoomHooks};

/// An outbound message from the room actor to a player's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum RoomOutbound {
    /// Narration or a private result.
    Event(GameEvent),
    /// One of your commands was refused. Configuration problems go to the
    /// whole table.
    Rejected(GameError),
}

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<RoomOutbound>;

/// Tells the manager that a player is no longer registered in a room.
pub(crate) type DepartureSender = mpsc::UnboundedSender<(PlayerId, RoomId)>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Register a player, or rebind them to a new connection.
    Join {
        player_id: PlayerId,
        handle: SessionHandle,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A connection went away, on purpose or not.
    Leave {
        player_id: PlayerId,
        handle: SessionHandle,
        intentional: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A game command from a player. Rejections come back on the player's
    /// channel.
    Command { sender: PlayerId, command: Command },

    GetInfo { reply: oneshot::Sender<RoomInfo> },

    Shutdown,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: Phase,
    pub registered: usize,
    pub active: usize,
    pub max_players: usize,
}

impl RoomInfo {
    /// In the lobby with a free seat.
    pub fn is_open(&self) -> bool {
        self.phase == Phase::NotStarted && self.registered < self.max_players
    }
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Registers `player_id` on `handle`, delivering its events to
    /// `sender`. Joining again with a new handle and sender rebinds the
    /// player; the old sender stops receiving.
    pub async fn join(
        &self,
        player_id: PlayerId,
        handle: SessionHandle,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                player_id,
                handle,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Reports that `handle` went away.
    pub async fn leave(
        &self,
        player_id: PlayerId,
        handle: SessionHandle,
        intentional: bool,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                player_id,
                handle,
                intentional,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Sends a game command (fire-and-forget).
    pub async fn send_command(&self, sender: PlayerId, command: Command) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Command { sender, command })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The room's notion of "now". Follows Tokio's clock so paused test time
/// applies to the engine too.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    session: GameSession,
    /// Per-player outbound channels, replaced on rejoin.
    senders: HashMap<PlayerId, PlayerSender>,
    hooks: RoomHooks,
    clock: PhaseClock,
    /// Last registered count reported to matchmaking.
    pool: usize,
    departures: Option<DepartureSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");
        self.sync_clock();

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                tick = self.clock.wait_for_tick() => self.on_tick(tick.at),
            }
            self.sync_clock();
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn on_tick(&mut self, at: Instant) {
        let _span = tracing::info_span!("room", room_id = %self.room_id).entered();
        if let Some(Ok(out)) = self.guarded("tick", |s| Ok(s.tick(at))) {
            self.deliver(out);
        }
    }

    /// Handles one command. Returns `false` on shutdown.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        let _span = tracing::info_span!("room", room_id = %self.room_id).entered();
        match cmd {
            RoomCommand::Join {
                player_id,
                handle,
                sender,
                reply,
            } => {
                let result = self.handle_join(player_id, handle, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                player_id,
                handle,
                intentional,
                reply,
            } => {
                let result = self.handle_leave(player_id, handle, intentional);
                let _ = reply.send(result);
            }
            RoomCommand::Command { sender, command } => self.handle_command(sender, command),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!("room shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        handle: SessionHandle,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        // Install the new sender first so the player sees their own join.
        let previous = self.senders.insert(player_id, sender);
        let now = now();
        let result = self.guarded("join", |s| s.join(player_id, handle, now));
        let failed = match result {
            Some(Ok(out)) => {
                self.deliver(out);
                return Ok(());
            }
            Some(Err(err)) => RoomError::Game(err),
            None => RoomError::Fault(self.room_id),
        };
        match previous {
            Some(previous) => {
                self.senders.insert(player_id, previous);
            }
            None => {
                self.senders.remove(&player_id);
            }
        }
        tracing::debug!(%player_id, error = %failed, "join refused");
        Err(failed)
    }

    fn handle_leave(
        &mut self,
        player_id: PlayerId,
        handle: SessionHandle,
        intentional: bool,
    ) -> Result<(), RoomError> {
        let now = now();
        match self.guarded("leave", |s| s.leave(player_id, handle, intentional, now)) {
            Some(Ok(out)) => {
                self.deliver(out);
                Ok(())
            }
            Some(Err(err)) => Err(err.into()),
            None => Err(RoomError::Fault(self.room_id)),
        }
    }

    fn handle_command(&mut self, sender: PlayerId, command: Command) {
        let name = command.name();
        let now = now();
        match self.guarded(name, |s| s.apply(sender, command, now)) {
            Some(Ok(out)) => self.deliver(out),
            Some(Err(err)) => {
                tracing::debug!(%sender, command = name, error = %err, "command rejected");
                if err.is_public() {
                    for player in self.session.roster().ids() {
                        self.send_to(player, RoomOutbound::Rejected(err.clone()));
                    }
                } else {
                    self.send_to(sender, RoomOutbound::Rejected(err));
                }
            }
            None => {}
        }
    }

    /// Runs `op` against the session inside a failure boundary. If `op`
    /// panics the session is put back exactly as it was, the fault is
    /// logged, and `None` is returned. The room keeps running either way.
    fn guarded<F>(&mut self, label: &str, op: F) -> Option<Result<Vec<Outbound>, GameError>>
    where
        F: FnOnce(&mut GameSession) -> Result<Vec<Outbound>, GameError>,
    {
        let snapshot = self.session.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| op(&mut self.session))) {
            Ok(result) => Some(result),
            Err(payload) => {
                self.session = snapshot;
                tracing::error!(
                    label,
                    reason = %panic_reason(payload.as_ref()),
                    "session handler panicked, state restored"
                );
                None
            }
        }
    }

    /// Delivers events to their recipients and notifies the hooks.
    fn deliver(&mut self, out: Vec<Outbound>) {
        let registered = self.session.roster().ids();
        for Outbound { to, event } in out {
            if let GameEvent::PlayerUnregistered { player, .. } = &event {
                if let Some(departures) = &self.departures {
                    let _ = departures.send((*player, self.room_id));
                }
            }
            if event.is_presentational() {
                let room_id = self.room_id;
                let presentation = &mut self.hooks.presentation;
                if let Err(payload) =
                    panic::catch_unwind(AssertUnwindSafe(|| presentation.on_event(room_id, &event)))
                {
                    tracing::error!(
                        reason = %panic_reason(payload.as_ref()),
                        "presentation hook panicked"
                    );
                }
            }
            let recipients: Vec<PlayerId> = match to {
                Recipient::Player(player) => vec![player],
                Recipient::All | Recipient::AllExcept(_) => self
                    .senders
                    .keys()
                    .copied()
                    .filter(|p| to.includes(*p))
                    .collect(),
            };
            for player in recipients {
                self.send_to(player, RoomOutbound::Event(event.clone()));
            }
        }

        // Departed players stop receiving once their farewell is out.
        self.senders.retain(|p, _| registered.contains(p));

        let pool = registered.len();
        if pool != self.pool {
            self.pool = pool;
            let room_id = self.room_id;
            let matchmaking = &mut self.hooks.matchmaking;
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| matchmaking.pool_changed(room_id, pool)))
            {
                tracing::error!(
                    reason = %panic_reason(payload.as_ref()),
                    "matchmaking notifier panicked"
                );
            }
        }
    }

    /// Sends to one player. Drops silently if their connection is gone.
    fn send_to(&self, player_id: PlayerId, msg: RoomOutbound) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Runs the clock only while something is waiting on a deadline.
    fn sync_clock(&mut self) {
        if self.session.needs_ticks() {
            self.clock.resume();
        } else {
            self.clock.pause();
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            phase: self.session.phase(),
            registered: self.session.roster().len(),
            active: self.session.active_players().len(),
            max_players: self.session.engine_config().max_players,
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room(
    room_id: RoomId,
    config: RoomConfig,
    engine: EngineConfig,
    hooks: RoomHooks,
    departures: DepartureSender,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let mut actor = RoomActor::new(room_id, &config, engine, hooks, rx);
    actor.departures = Some(departures);
    tokio::spawn(actor.run());
    RoomHandle {
        room_id,
        sender: tx,
    }
}

impl RoomActor {
    fn new(
        room_id: RoomId,
        config: &RoomConfig,
        engine: EngineConfig,
        hooks: RoomHooks,
        receiver: mpsc::Receiver<RoomCommand>,
    ) -> Self {
        let session = match config.rng_seed {
            Some(seed) => GameSession::with_seed(engine, seed),
            None => GameSession::new(engine),
        };
        Self {
            room_id,
            session,
            senders: HashMap::new(),
            hooks,
            clock: PhaseClock::new(config.clock.clone()),
            pool: 0,
            departures: None,
            receiver,
        }
    }
}
