//! Backing map store contract.
//!
//! A [`MapStore`] holds named maps of string keys to tagged [`Payload`]s,
//! evaluates predicates server-side and pushes [`EntryNotified`] events to
//! registered entry listeners. Typed layers build on this trait and never
//! assume a particular implementation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mapcache_proto::{EntryNotified, OperatorClass, Payload, Predicate};

use crate::error::Error;

/// Identifier of an installed entry listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw identifier value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Callback invoked by the store for every event on a map.
///
/// Callbacks for one subscription are invoked sequentially, in the order the
/// store emitted the events. A callback that blocks delays only its own
/// subscription, until that subscription's queue fills up.
pub type EntryListener = Arc<dyn Fn(EntryNotified) + Send + Sync>;

/// Predicate operator families a store accepts beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Ordering comparisons (`<`, `<=`, `>`, `>=`, between).
    pub comparisons: bool,
    /// LIKE / ILIKE patterns.
    pub patterns: bool,
}

impl StoreCapabilities {
    /// Capabilities of a store that understands the full predicate grammar.
    pub fn full() -> Self {
        Self {
            comparisons: true,
            patterns: true,
        }
    }

    /// Capabilities of a store limited to equality and boolean logic.
    pub fn equality_only() -> Self {
        Self {
            comparisons: false,
            patterns: false,
        }
    }

    /// Check whether an operator family is accepted.
    pub fn allows(&self, class: OperatorClass) -> bool {
        match class {
            OperatorClass::Equality | OperatorClass::Logical => true,
            OperatorClass::Comparison => self.comparisons,
            OperatorClass::Pattern => self.patterns,
        }
    }

    /// Reject the predicate if any node uses a disabled operator family.
    pub fn check(&self, predicate: &Predicate) -> Result<(), Error> {
        match predicate.find_unsupported(&|class: OperatorClass| self.allows(class)) {
            Some(node) => Err(Error::Unsupported(node.operator().to_string())),
            None => Ok(()),
        }
    }
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Contract of the backing distributed map store.
///
/// All operations fail with [`Error::NotActive`] once the store has been shut
/// down. Stores backed by a remote cluster report a lost connection as
/// [`Error::Unavailable`]; callers surface it unchanged and do not retry.
#[async_trait]
pub trait MapStore: Send + Sync {
    /// Name of the store member, stamped on emitted events.
    fn name(&self) -> &str;

    /// Predicate operator families this store evaluates.
    fn capabilities(&self) -> StoreCapabilities;

    /// Whether the store still accepts operations.
    fn is_running(&self) -> bool;

    /// Read the payload stored under `key`, or `None` when absent.
    async fn get(&self, map: &str, key: &str) -> Result<Option<Payload>, Error>;

    /// Unconditionally write `value` under `key`.
    ///
    /// Emits `Added` when the key was absent and `Updated` otherwise.
    async fn set(&self, map: &str, key: &str, value: Payload) -> Result<(), Error>;

    /// Remove `key`. Absence is not an error.
    ///
    /// Returns whether an entry was removed. Emits `Removed` only in that case.
    async fn delete(&self, map: &str, key: &str) -> Result<bool, Error>;

    /// All entries whose value satisfies `predicate`, ordered by key.
    async fn entries_with_predicate(
        &self,
        map: &str,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Payload)>, Error>;

    /// Install a listener receiving every event on `map` from now on.
    async fn add_entry_listener(
        &self,
        map: &str,
        listener: EntryListener,
    ) -> Result<SubscriptionId, Error>;

    /// Remove an installed listener.
    ///
    /// Returns `false` when the subscription was unknown.
    async fn remove_entry_listener(&self, map: &str, id: SubscriptionId) -> Result<bool, Error>;

    /// Number of entries in `map`.
    async fn size(&self, map: &str) -> Result<usize, Error>;

    /// Remove every entry of `map`, emitting `Removed` for each.
    async fn clear(&self, map: &str) -> Result<(), Error>;

    /// Names of all maps that currently exist.
    async fn map_names(&self) -> Result<Vec<String>, Error>;

    /// Stop the store. Installed listeners are dropped.
    async fn shutdown(&self) -> Result<(), Error>;
}
