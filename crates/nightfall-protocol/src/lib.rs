//! Shared vocabulary for Nightfall.
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`SessionHandle`], [`Recipient`],
//!   [`Command`], [`Envelope`]): identities and the closed command set.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): turning those values and
//!   the engine's events into bytes and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol crate has no notion of phases or roles. The engine builds
//! on these ids; the room layer uses [`Recipient`] to fan events out.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Command, Envelope, PlayerId, Recipient, RoomId, SessionHandle};
