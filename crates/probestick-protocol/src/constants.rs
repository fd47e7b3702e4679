//! Protocol constants
//!
//! Limits imposed by the transport link and the stream reassembler.

/// Maximum size of a single outgoing payload in bytes.
///
/// The link layer does not fragment writes, so a command that does not fit
/// in one payload unit cannot be sent at all.
pub const MAX_PAYLOAD_SIZE: usize = 180;

/// Ceiling for the receive buffer in bytes.
///
/// If this much data accumulates without a complete message, the stream is
/// considered desynchronized and the buffer is discarded.
pub const MAX_BUFFER_SIZE: usize = 64_000;
