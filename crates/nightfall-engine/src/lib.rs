//! The Nightfall game engine.
//!
//! A table of registered players plays repeated games of a hidden-role
//! elimination game: a small team of eliminators removes one player each
//! night, and everyone else tries to find and convict them during the day.
//!
//! The engine is synchronous and clock-free. [`GameSession`] takes the
//! current [`Instant`](std::time::Instant) on every call and answers with
//! the [`Outbound`] events it produced; a room actor supplies commands and
//! periodic ticks and delivers the events.
//!
//! # Key types
//!
//! - [`GameSession`]: one table's state and every player-facing operation
//! - [`EngineConfig`] / [`GameConfig`]: room settings and the per-game
//!   template selected from the player count
//! - [`RoleAssignment`]: who holds which role and who is still in play
//! - [`Phase`]: where the game is in its cycle
//! - [`GameEvent`]: narration and private results
//! - [`GameError`]: why a command was refused

mod config;
mod error;
mod event;
mod night;
mod phase;
mod role;
mod roster;
mod session;
mod trial;
mod win;

pub use config::{
    EngineConfig, GameConfig, PhaseDurations, RoleCounts, RuleToggles, TemplateName, VerdictRule,
};
pub use error::{GameError, IllegalReason};
pub use event::{DepartureReason, GameEvent, Outbound};
pub use night::{
    EliminationOutcome, Finding, NightAction, NightActions, NightResolution, NightSlot,
    check_target, open_slots, resolve as resolve_night,
};
pub use phase::Phase;
pub use role::{RemovalCause, Role, RoleAssignment, RoleReveal, Seat, Side, Standing, assign_roles};
pub use roster::{Departure, PlayerRecord, Presence, Registration, Roster};
pub use session::GameSession;
pub use trial::{
    Accusation, AccusationLedger, AccuseOutcome, Tally, Trial, Verdict, VoteBreakdown,
};
pub use win::{IndependentResult, Winner, evaluate as evaluate_win, independent_result};

pub use nightfall_protocol::{Command, PlayerId, Recipient, SessionHandle};
