//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with the ProbeStick protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Encoded command exceeds the transport payload budget.
    #[error("command too large: maximum {max} bytes, got {actual}")]
    CommandTooLarge {
        /// Maximum allowed length.
        max: usize,
        /// Actual encoded length.
        actual: usize,
    },

    /// Command failed to serialize.
    #[error("failed to encode command: {0}")]
    Encode(String),

    /// A complete JSON text did not match any known message schema.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A chunk payload could not be decoded (base64, UTF-8, or item parse).
    #[error("invalid chunk payload: {0}")]
    InvalidPayload(String),

    /// A chunk arrived without a request id to correlate it.
    #[error("chunk without request id")]
    MissingRequestId,

    /// An encoded chunk payload arrived without a declared CRC.
    #[error("encoded chunk without declared CRC")]
    MissingCrc,
}
