//! Core protocol types shared by every Nightfall layer.
//!
//! Everything in here is plain data: identities, the addressing enum used
//! for outbound events, and the closed set of commands a player can issue
//! to a game session. None of it knows about rooms, roles, or phases.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable identifier for a player.
///
/// This is the key for every per-player record in the engine: roles,
/// night actions, accusations and trial votes all hang off a `PlayerId`,
/// never off a connection. A player keeps the same id across any number of
/// reconnects.
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room (one game table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// An opaque handle for one live connection of a player.
///
/// Unlike [`PlayerId`], a handle is NOT stable: every reconnect produces a
/// fresh one. The engine stores the current handle as the *value* of the
/// player's roster entry so it can tell a late disconnect from an old
/// connection apart from the departure of the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(pub u64);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive an outbound event.
///
/// Game operations return a list of `(Recipient, event)` pairs and the
/// room layer fans them out to connections. Private results (a role
/// reveal, an investigation answer) use [`Recipient::Player`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every registered player in the room.
    All,

    /// One specific player.
    Player(PlayerId),

    /// Everyone except the given player.
    AllExcept(PlayerId),
}

impl Recipient {
    /// Returns `true` if `player` is among the addressees.
    pub fn includes(&self, player: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Player(p) => *p == player,
            Self::AllExcept(p) => *p != player,
        }
    }
}

// ---------------------------------------------------------------------------
// Command: the closed set of player inputs
// ---------------------------------------------------------------------------

/// Every input a player can send to a game session.
///
/// The router that turns chat text or UI clicks into these values lives
/// outside this workspace. The session matches on this enum exhaustively,
/// so adding a variant is a compile error until every layer handles it.
///
/// `#[serde(tag = "type")]` gives `{ "type": "Accuse", "target": 4 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Register for the room, or rebind an existing registration to a
    /// new connection.
    Join { handle: SessionHandle },

    /// Leave the room. `intentional == false` means the connection dropped
    /// and the player gets a grace period to come back.
    Leave { handle: SessionHandle, intentional: bool },

    /// Use this night's ability on `target`.
    NightAction { target: PlayerId },

    /// Accuse `target` during the day.
    Accuse { target: PlayerId },

    /// Vote in the running trial.
    Vote { guilty: bool },

    /// Ask the room to deal roles and begin.
    Start,

    /// Propose ending the current day early.
    Skip,

    /// Ask for a private reminder of one's role.
    MyRole,

    /// Ask for a private snapshot of the game.
    Status,
}

impl Command {
    /// A short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::NightAction { .. } => "night_action",
            Self::Accuse { .. } => "accuse",
            Self::Vote { .. } => "vote",
            Self::Start => "start",
            Self::Skip => "skip",
            Self::MyRole => "my_role",
            Self::Status => "status",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope: an addressed, sequenced outbound record
// ---------------------------------------------------------------------------

/// An outbound event stamped with its room and a per-room sequence number.
///
/// Rooms hand these to observers (logs, replays, the demo printer) so the
/// order in which events were produced survives fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Per-room, monotonically increasing.
    pub seq: u64,
    pub room_id: RoomId,
    pub to: Recipient,
    pub body: T,
}
