//! # Nightfall
//!
//! A round-based hidden-role elimination game, hosted as one actor per
//! table.
//!
//! The engine decides everything synchronously; rooms serialize commands
//! and clock ticks onto it; this crate wires the layers together behind a
//! [`Host`] and one error type.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightfall::prelude::*;
//!
//! # async fn run() -> Result<(), NightfallError> {
//! nightfall::telemetry::init();
//! let host = Host::builder().settings(Settings::load()?).build()?;
//!
//! let mut conn = host.connect(PlayerId(1)).await?;
//! conn.send(Command::Status).await?;
//! while let Some(envelope) = conn.recv().await {
//!     println!("{:?}", envelope.body);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod host;
mod settings;
pub mod telemetry;

pub use error::NightfallError;
pub use host::{Connection, Host, HostBuilder};
pub use settings::{CONFIG_ENV, Settings};

/// Re-exports commonly used types for convenience.
///
/// ```rust
/// use nightfall::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Connection, Host, HostBuilder, NightfallError, Settings};

    pub use nightfall_protocol::{
        Codec, Command, Envelope, JsonCodec, PlayerId, Recipient, RoomId, SessionHandle,
    };

    pub use nightfall_engine::{
        EngineConfig, GameConfig, GameError, GameEvent, Phase, RemovalCause, Role, Side,
        TemplateName, VerdictRule, Winner,
    };

    pub use nightfall_room::{
        MatchmakingNotifier, NoopHook, PresentationHook, RoomConfig, RoomError, RoomHooks,
        RoomInfo, RoomOutbound,
    };

    pub use nightfall_tick::{ClockConfig, LatePolicy};
}
