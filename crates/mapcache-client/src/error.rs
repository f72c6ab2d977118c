//! Client error types.

use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store rejected or could not serve the request.
    #[error("store error: {0}")]
    Store(#[from] mapcache_core::Error),

    /// A value could not be encoded for the store.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A stored value could not be decoded into the requested type.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The operation's deadline passed before it completed.
    #[error("operation timed out")]
    Timeout,

    /// The operation's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A listener subscription could not be installed.
    #[error("{0}")]
    Subscription(String),
}

impl Error {
    /// Check whether the error came from decoding a stored value.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}
