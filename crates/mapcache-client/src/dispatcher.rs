//! Change event dispatch.
//!
//! A [`Dispatcher`] turns raw store notifications into typed listener
//! callbacks. Each `add_listener` call installs exactly one store
//! subscription whose callback is a dispatcher; the [`ListenerRegistry`]
//! tracks those subscriptions through their lifecycle:
//!
//! ```text
//! Installing -> Active -> Removed
//! ```
//!
//! Dispatch never queues, batches or reorders: it runs inline on the store's
//! delivery task, one notification at a time.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use mapcache_core::{EntryListener, SubscriptionId};
use mapcache_proto::{EntryEventKind, EntryNotified};
use serde::de::DeserializeOwned;

use crate::codec::{self, DecodeError};
use crate::error::Error;
use crate::listener::Listener;

/// Which callback a notification was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Added,
    Updated,
    Deleted,
    Error,
}

/// Per-registration callback counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    added: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
    pub errors: u64,
}

impl DispatchCounts {
    /// Total callbacks fired.
    pub fn total(&self) -> u64 {
        self.added + self.updated + self.deleted + self.errors
    }
}

impl DispatchStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Added => &self.added,
            DispatchOutcome::Updated => &self.updated,
            DispatchOutcome::Deleted => &self.deleted,
            DispatchOutcome::Error => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> DispatchCounts {
        DispatchCounts {
            added: self.added.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Decodes raw notifications and invokes exactly one typed callback for each.
pub struct Dispatcher<T> {
    map_name: String,
    listener: Arc<dyn Listener<T>>,
    stats: Arc<DispatchStats>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Dispatcher<T>
where
    T: DeserializeOwned + 'static,
{
    /// Create a dispatcher feeding `listener` with events of `map_name`.
    pub fn new(map_name: impl Into<String>, listener: Arc<dyn Listener<T>>) -> Self {
        Self {
            map_name: map_name.into(),
            listener,
            stats: Arc::new(DispatchStats::new()),
            _marker: PhantomData,
        }
    }

    /// Map this dispatcher serves.
    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    /// Callback counters.
    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Route one notification to the matching callback.
    ///
    /// Removals go to `on_delete` without decoding. Additions and updates
    /// are decoded first; any decode failure goes to `on_error` instead of
    /// the regular callback.
    pub fn dispatch(&self, event: &EntryNotified) -> DispatchOutcome {
        let outcome = match event.kind {
            EntryEventKind::Removed => {
                self.listener.on_delete(event);
                DispatchOutcome::Deleted
            }
            EntryEventKind::Added => match Self::decode_new(event) {
                Ok(value) => {
                    self.listener.on_add(event, value);
                    DispatchOutcome::Added
                }
                Err(err) => self.fail(event, err),
            },
            EntryEventKind::Updated => {
                let decoded = Self::decode_new(event)
                    .and_then(|value| codec::decode_previous(event).map(|old| (value, old)));
                match decoded {
                    Ok((value, old)) => {
                        self.listener.on_update(event, value, old);
                        DispatchOutcome::Updated
                    }
                    Err(err) => self.fail(event, err),
                }
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Wrap the dispatcher as a raw store callback.
    pub fn into_entry_listener(self) -> EntryListener {
        let dispatcher = self;
        Arc::new(move |event: EntryNotified| {
            dispatcher.dispatch(&event);
        })
    }

    fn decode_new(event: &EntryNotified) -> Result<T, DecodeError> {
        match codec::decode_notification(event)? {
            Some(value) => Ok(value),
            None => Err(DecodeError::Missing {
                key: event.key.clone(),
            }),
        }
    }

    fn fail(&self, event: &EntryNotified, err: DecodeError) -> DispatchOutcome {
        tracing::warn!(
            map = %self.map_name,
            key = %event.key,
            kind = %event.kind,
            error = %err,
            "failed to decode entry notification"
        );
        self.listener.on_error(event, Error::Decode(err));
        DispatchOutcome::Error
    }
}

/// Lifecycle state of a listener subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The store subscription is being installed.
    Installing,
    /// Events are being dispatched.
    Active,
    /// Unsubscribed, or the session was shut down.
    Removed,
}

/// Handle returned by `add_listener`, used to remove the listener again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerRegistration {
    registration_id: u64,
    subscription_id: SubscriptionId,
    map_name: String,
}

impl ListenerRegistration {
    /// Registry-local identifier.
    pub fn registration_id(&self) -> u64 {
        self.registration_id
    }

    /// Store subscription backing this registration.
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Map the listener observes.
    pub fn map_name(&self) -> &str {
        &self.map_name
    }
}

struct RegistryEntry {
    map_name: String,
    state: SubscriptionState,
    subscription_id: Option<SubscriptionId>,
    stats: Arc<DispatchStats>,
    created_at: Instant,
}

/// Table of listener subscriptions installed through one cache.
///
/// Only installing and active registrations are kept. A removed registration
/// is dropped from the table; any id handed out earlier and no longer present
/// reads as `Removed`.
pub struct ListenerRegistry {
    entries: DashMap<u64, RegistryEntry>,
    next_registration_id: AtomicU64,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_registration_id: AtomicU64::new(1),
        }
    }

    /// Record a subscription that is about to be installed.
    pub fn begin(&self, map_name: &str, stats: Arc<DispatchStats>) -> u64 {
        let registration_id = self.next_registration_id.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(
            registration_id,
            RegistryEntry {
                map_name: map_name.to_string(),
                state: SubscriptionState::Installing,
                subscription_id: None,
                stats,
                created_at: Instant::now(),
            },
        );
        registration_id
    }

    /// Mark an installing subscription active.
    pub fn activate(
        &self,
        registration_id: u64,
        subscription_id: SubscriptionId,
    ) -> Option<ListenerRegistration> {
        let mut entry = self.entries.get_mut(&registration_id)?;
        if entry.state != SubscriptionState::Installing {
            return None;
        }
        entry.state = SubscriptionState::Active;
        entry.subscription_id = Some(subscription_id);

        tracing::debug!(
            registration_id,
            subscription_id = %subscription_id,
            map = %entry.map_name,
            "listener active"
        );
        Some(ListenerRegistration {
            registration_id,
            subscription_id,
            map_name: entry.map_name.clone(),
        })
    }

    /// Forget a subscription whose installation failed.
    pub fn abort(&self, registration_id: u64) {
        self.entries.remove(&registration_id);
    }

    /// Move an active registration to `Removed`.
    ///
    /// Returns `false` if it was not active.
    pub fn mark_removed(&self, registration: &ListenerRegistration) -> bool {
        let removed = self
            .entries
            .remove_if(&registration.registration_id, |_, entry| {
                entry.state == SubscriptionState::Active
            });
        match removed {
            Some((registration_id, entry)) => {
                tracing::debug!(
                    registration_id,
                    map = %entry.map_name,
                    lifetime_ms = entry.created_at.elapsed().as_millis() as u64,
                    "listener removed"
                );
                true
            }
            None => false,
        }
    }

    /// Move every registration to `Removed`, returning the subscriptions that
    /// were active.
    ///
    /// Installing registrations are dropped too, so their `activate` fails.
    pub fn remove_all(&self) -> Vec<(String, SubscriptionId)> {
        let ids: Vec<u64> = self.entries.iter().map(|entry| *entry.key()).collect();
        let mut removed = Vec::new();
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                if let (SubscriptionState::Active, Some(sub)) = (entry.state, entry.subscription_id)
                {
                    removed.push((entry.map_name, sub));
                }
            }
        }
        removed
    }

    /// Current state of a registration.
    ///
    /// `None` for an id this registry never issued.
    pub fn state(&self, registration: &ListenerRegistration) -> Option<SubscriptionState> {
        match self.entries.get(&registration.registration_id) {
            Some(entry) => Some(entry.state),
            None if registration.registration_id
                < self.next_registration_id.load(Ordering::SeqCst) =>
            {
                Some(SubscriptionState::Removed)
            }
            None => None,
        }
    }

    /// Number of registrations still tracked (installing or active).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no registration is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Callback counters of a tracked registration.
    pub fn stats(&self, registration: &ListenerRegistration) -> Option<DispatchCounts> {
        self.entries
            .get(&registration.registration_id)
            .map(|entry| entry.stats.snapshot())
    }

    /// Number of active registrations, optionally restricted to one map.
    pub fn active_count(&self, map_name: Option<&str>) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state == SubscriptionState::Active)
            .filter(|entry| map_name.map_or(true, |m| entry.map_name == m))
            .count()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
