//! Serialization boundary between typed values and store payloads.
//!
//! Every value written through the cache is JSON-encoded and tagged
//! [`Payload::Json`]. Reads check the tag before parsing: an untagged blob is
//! a decode failure even if its bytes happen to be valid JSON.

use mapcache_proto::{EntryEventKind, EntryNotified, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A value could not be represented as JSON.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode value as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A stored payload could not be turned back into a typed value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not tagged as JSON.
    #[error("value of cached object with key '{key}' is not a JSON value")]
    NotJson { key: String },

    /// The JSON does not parse into the requested type.
    #[error("failed to decode cached object with key '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A notification that should carry a value carried none.
    #[error("notification for key '{key}' carries no value")]
    Missing { key: String },
}

impl DecodeError {
    /// Key of the entry that failed to decode.
    pub fn key(&self) -> &str {
        match self {
            DecodeError::NotJson { key }
            | DecodeError::Malformed { key, .. }
            | DecodeError::Missing { key } => key,
        }
    }
}

/// Encode a value as a JSON-tagged payload.
pub fn encode<T: Serialize>(value: &T) -> Result<Payload, EncodeError> {
    let bytes = serde_json::to_vec(value)?;
    Ok(Payload::json(bytes))
}

/// Decode the payload stored under `key`.
pub fn decode<T: DeserializeOwned>(key: &str, payload: &Payload) -> Result<T, DecodeError> {
    let bytes = payload.as_json().ok_or_else(|| DecodeError::NotJson {
        key: key.to_string(),
    })?;
    serde_json::from_slice(bytes).map_err(|source| DecodeError::Malformed {
        key: key.to_string(),
        source,
    })
}

/// Decode the new value of a notification.
///
/// Removals carry no new value and yield `Ok(None)` without attempting a
/// decode.
pub fn decode_notification<T: DeserializeOwned>(
    event: &EntryNotified,
) -> Result<Option<T>, DecodeError> {
    if event.kind == EntryEventKind::Removed {
        return Ok(None);
    }
    match &event.value {
        Some(payload) => decode(&event.key, payload).map(Some),
        None => Err(DecodeError::Missing {
            key: event.key.clone(),
        }),
    }
}

/// Decode the previous value of an update notification.
pub fn decode_previous<T: DeserializeOwned>(event: &EntryNotified) -> Result<T, DecodeError> {
    match &event.old_value {
        Some(payload) => decode(&event.key, payload),
        None => Err(DecodeError::Missing {
            key: event.key.clone(),
        }),
    }
}
