//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, missing fields, or an
    /// unknown command tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed but unacceptable, e.g. an empty line where a command
    /// was expected.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
