//! Room actors for Nightfall.
//!
//! Each room runs as an isolated Tokio task that owns one
//! [`GameSession`](nightfall_engine::GameSession). Commands arrive over an
//! mpsc channel, deadlines are checked on a [`PhaseClock`](nightfall_tick::PhaseClock),
//! and every event is routed to the players it is addressed to.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates/destroys rooms, routes players
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomOutbound`]: what a player's connection receives
//! - [`RoomHooks`]: presentation and matchmaking collaborators
//! - [`RoomConfig`]: actor settings (clock, channel size, seed)

mod config;
mod error;
mod hooks;
mod manager;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use hooks::{MatchmakingNotifier, NoopHook, PresentationHook, RoomHooks};
pub use manager::{HookFactory, RoomManager};
pub use room::{PlayerSender, RoomHandle, RoomInfo, RoomOutbound};
