//! Transport collaborator interface.

use thiserror::Error;

/// Errors the transport can report on a send attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No peer is connected.
    #[error("transport is not connected")]
    NotConnected,

    /// The write failed.
    #[error("send failed: {0}")]
    Send(String),
}

/// The outgoing half of the link the engine writes commands through.
///
/// The connect/discover/notify machinery behind it is the host's concern.
/// Inbound data and connection lifecycle come back into the engine as
/// calls to [`Engine::handle_rx`] and [`Engine::link_closed`], which the
/// host must serialize with every other engine call.
///
/// [`Engine::handle_rx`]: crate::Engine::handle_rx
/// [`Engine::link_closed`]: crate::Engine::link_closed
pub trait Transport {
    /// Write one encoded command payload to the peer.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}
