//! Store error types.

use thiserror::Error;

/// Errors raised by the backing map store.
#[derive(Debug, Error)]
pub enum Error {
    /// The store has been shut down.
    #[error("store is not active")]
    NotActive,

    /// A remote store lost its cluster connection. Never raised by the
    /// in-process store.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The predicate uses an operator the store does not support.
    #[error("unsupported predicate operator: {0}")]
    Unsupported(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] mapcache_proto::Error),
}
