//! Error types for clustermesh-state.

use thiserror::Error;

/// Result type for clustermesh-state operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling cluster state.
///
/// The merge engine itself never fails; everything here comes from the
/// boundary between bytes and values.
#[derive(Debug, Error)]
pub enum Error {
    /// An incoming payload was malformed or truncated.
    #[error("malformed cluster info payload: {0}")]
    Decode(#[source] bincode::Error),

    /// Serializing a value failed.
    #[error("failed to encode cluster info: {0}")]
    Encode(#[source] bincode::Error),

    /// A value would not fit in one wire payload.
    #[error("cluster info is {size} bytes encoded, limit is {limit}")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// A peer name was not six colon-separated hex octets.
    #[error("invalid peer name: {0:?}")]
    InvalidPeerName(String),
}
