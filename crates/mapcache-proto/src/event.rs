//! Entry change notifications emitted by the map store.

use crate::payload::Payload;

/// Kind of change an entry went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryEventKind {
    /// A new key was written.
    Added,
    /// An existing key was overwritten.
    Updated,
    /// A key was removed.
    Removed,
}

impl EntryEventKind {
    /// Lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryEventKind::Added => "added",
            EntryEventKind::Updated => "updated",
            EntryEventKind::Removed => "removed",
        }
    }
}

impl std::fmt::Display for EntryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change notification for one entry of one map.
///
/// Notifications are transient: they exist only while being dispatched.
/// For `Added` and `Updated`, `value` carries the new payload. For `Updated`
/// and `Removed`, `old_value` carries the payload that was replaced or
/// removed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryNotified {
    /// Name of the map the entry belongs to.
    pub map_name: String,
    /// Entry key.
    pub key: String,
    /// Kind of change.
    pub kind: EntryEventKind,
    /// New value, if any.
    pub value: Option<Payload>,
    /// Previous value, if any.
    pub old_value: Option<Payload>,
    /// Name of the store member that emitted the event.
    pub source: String,
    /// Store-assigned sequence number, increasing in emission order.
    pub sequence: u64,
}

impl EntryNotified {
    /// Create an `Added` notification.
    pub fn added(map_name: impl Into<String>, key: impl Into<String>, value: Payload) -> Self {
        Self {
            map_name: map_name.into(),
            key: key.into(),
            kind: EntryEventKind::Added,
            value: Some(value),
            old_value: None,
            source: String::new(),
            sequence: 0,
        }
    }

    /// Create an `Updated` notification.
    pub fn updated(
        map_name: impl Into<String>,
        key: impl Into<String>,
        value: Payload,
        old_value: Payload,
    ) -> Self {
        Self {
            map_name: map_name.into(),
            key: key.into(),
            kind: EntryEventKind::Updated,
            value: Some(value),
            old_value: Some(old_value),
            source: String::new(),
            sequence: 0,
        }
    }

    /// Create a `Removed` notification.
    pub fn removed(
        map_name: impl Into<String>,
        key: impl Into<String>,
        old_value: Option<Payload>,
    ) -> Self {
        Self {
            map_name: map_name.into(),
            key: key.into(),
            kind: EntryEventKind::Removed,
            value: None,
            old_value,
            source: String::new(),
            sequence: 0,
        }
    }

    /// Set the emitting member.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}
