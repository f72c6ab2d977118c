//! Typed listener callbacks.

use std::sync::Arc;

use mapcache_proto::EntryNotified;

use crate::error::Error;

/// Receives typed change events for one map.
///
/// Exactly one method is called per store notification. Callbacks of one
/// registration run sequentially on the store's delivery task, so a slow
/// callback delays later events of that registration and eventually the
/// writers of the map. Panics are not caught.
pub trait Listener<T>: Send + Sync {
    /// A new key was written.
    fn on_add(&self, event: &EntryNotified, value: T);

    /// An existing key was overwritten.
    fn on_update(&self, event: &EntryNotified, value: T, old_value: T);

    /// A key was removed.
    fn on_delete(&self, event: &EntryNotified);

    /// The notification's value could not be decoded as `T`.
    fn on_error(&self, event: &EntryNotified, error: Error);
}

impl<T, L> Listener<T> for Arc<L>
where
    L: Listener<T> + ?Sized,
{
    fn on_add(&self, event: &EntryNotified, value: T) {
        (**self).on_add(event, value)
    }

    fn on_update(&self, event: &EntryNotified, value: T, old_value: T) {
        (**self).on_update(event, value, old_value)
    }

    fn on_delete(&self, event: &EntryNotified) {
        (**self).on_delete(event)
    }

    fn on_error(&self, event: &EntryNotified, error: Error) {
        (**self).on_error(event, error)
    }
}
