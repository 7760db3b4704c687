//! Error types for clustermesh-node.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bootstrapping or running a node.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// State error (peer name parsing, encoding)
    #[error("State error: {0}")]
    State(#[from] clustermesh_state::Error),

    /// Peer error
    #[error("Peer error: {0}")]
    Peer(#[from] clustermesh_peer::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
