//! Unified error type for Tandem.

use tandem_channel::ChannelError;
use tandem_peer::PeerError;
use tandem_protocol::ProtocolError;

/// Top-level error that wraps all crate-specific errors.
///
/// Application code that talks to several layers can return this one
/// type and let `?` convert the rest.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// Malformed wire data.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The channel failed or was closed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Anything the peer engine reports, including remote failures.
    #[error(transparent)]
    Peer(#[from] PeerError),
}

impl TandemError {
    /// The remote error, if the other side's function failed.
    pub fn as_remote(&self) -> Option<&tandem_peer::RemoteError> {
        match self {
            Self::Peer(err) => err.as_remote(),
            _ => None,
        }
    }
}
