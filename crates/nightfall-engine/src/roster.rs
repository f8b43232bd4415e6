//! The room's registration list and identity rebinder.
//!
//! A player's identity is their [`PlayerId`]. Their connection is a
//! [`SessionHandle`] that changes on every reconnect. The roster keeps the
//! id as the key and the *current* handle as the value, so rebinding after
//! a reconnect is a single value swap. Everything else in the engine
//! (roles, night actions, accusations, votes) is keyed by id and never
//! needs migrating.
//!
//! Presence follows the same lifecycle as a network session:
//!
//! ```text
//!   Connected ──(drop)──→ Disconnected ──(grace elapsed)──→ unregistered
//!       ↑                      │
//!       └──────(rejoin)────────┘
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use nightfall_protocol::{PlayerId, SessionHandle};

/// Connection state of a registered player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Connected,
    /// The connection dropped at `since`; the seat is released at
    /// `deadline` unless the player comes back first.
    Disconnected { since: Instant, deadline: Instant },
}

/// One registered player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub handle: SessionHandle,
    pub presence: Presence,
    pub registered_at: Instant,
}

/// Result of [`Roster::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A brand-new registration.
    New,
    /// A known player came back on a new connection.
    Rebound {
        previous: SessionHandle,
        was_disconnected: bool,
    },
}

/// Result of [`Roster::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The grace period started.
    GraceStarted { deadline: Instant },
    /// The handle belongs to a connection that has already been replaced.
    StaleHandle,
    /// The player is not registered.
    Unknown,
}

/// Registered players, keyed by stable id.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: BTreeMap<PlayerId, PlayerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `player` on `handle`, or rebinds an existing registration
    /// to the new handle and cancels any pending grace timer.
    pub fn register(
        &mut self,
        player: PlayerId,
        handle: SessionHandle,
        now: Instant,
    ) -> Registration {
        if let Some(record) = self.players.get_mut(&player) {
            let previous = std::mem::replace(&mut record.handle, handle);
            let was_disconnected = matches!(record.presence, Presence::Disconnected { .. });
            record.presence = Presence::Connected;
            tracing::debug!(%player, %previous, %handle, "session rebound");
            return Registration::Rebound {
                previous,
                was_disconnected,
            };
        }

        self.players.insert(
            player,
            PlayerRecord {
                handle,
                presence: Presence::Connected,
                registered_at: now,
            },
        );
        Registration::New
    }

    /// Starts the grace period for `player` if `handle` is still their live
    /// connection.
    pub fn disconnect(
        &mut self,
        player: PlayerId,
        handle: SessionHandle,
        now: Instant,
        grace: Duration,
    ) -> Departure {
        let Some(record) = self.players.get_mut(&player) else {
            return Departure::Unknown;
        };
        if record.handle != handle {
            return Departure::StaleHandle;
        }
        let deadline = now + grace;
        record.presence = Presence::Disconnected { since: now, deadline };
        Departure::GraceStarted { deadline }
    }

    /// Removes `player` entirely.
    pub fn unregister(&mut self, player: PlayerId) -> Option<PlayerRecord> {
        self.players.remove(&player)
    }

    /// Players whose grace period has run out by `now`, in id order.
    pub fn expired(&self, now: Instant) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, r)| {
                matches!(r.presence, Presence::Disconnected { deadline, .. } if deadline <= now)
            })
            .map(|(p, _)| *p)
            .collect()
    }

    /// `true` if anyone is waiting out a grace period.
    pub fn has_pending_grace(&self) -> bool {
        self.players
            .values()
            .any(|r| matches!(r.presence, Presence::Disconnected { .. }))
    }

    pub fn record(&self, player: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&player)
    }

    pub fn handle_of(&self, player: PlayerId) -> Option<SessionHandle> {
        self.players.get(&player).map(|r| r.handle)
    }

    /// `true` if `handle` is the live connection of `player`.
    pub fn is_live(&self, player: PlayerId, handle: SessionHandle) -> bool {
        self.handle_of(player) == Some(handle)
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    /// Registered ids in id order.
    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
