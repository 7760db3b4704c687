//! Error types for clustermesh-peer.

use clustermesh_state::PeerName;
use thiserror::Error;

/// Result type for clustermesh-peer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the gossip substrate or to local callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoding or decoding cluster state failed.
    #[error(transparent)]
    State(#[from] clustermesh_state::Error),

    /// The peer's action loop has been stopped.
    #[error("peer has been stopped")]
    Stopped,

    /// No outbound gossip channel has been registered yet.
    #[error("no gossip channel registered")]
    NotRegistered,

    /// The substrate does not know the destination peer.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerName),
}
