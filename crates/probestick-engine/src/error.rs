//! Engine error types.

use thiserror::Error;

use probestick_protocol::ProtocolError;

use crate::operation::OperationKind;
use crate::transport::TransportError;

/// Errors returned to command-issuing callers.
///
/// Everything inbound (malformed messages, integrity warnings, device
/// errors) is surfaced through the event queue instead; nothing the device
/// sends can make an engine call fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Another operation is already in flight.
    #[error("{current} already in progress")]
    Busy {
        /// The operation currently active.
        current: OperationKind,
    },

    /// The command could not be encoded (usually: too large to send).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport rejected the write.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
