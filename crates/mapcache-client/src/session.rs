//! Store sessions and raw map handles.
//!
//! A [`Session`] is a cheap-to-clone handle on a backing [`MapStore`]. Several
//! typed caches can share one session; whoever started it decides when it is
//! shut down.

use std::fmt;
use std::sync::Arc;

use mapcache_core::{EntryListener, MapStore, MemoryStore, SubscriptionId};
use mapcache_proto::{Payload, Predicate};

use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::Error;

struct SessionInner {
    store: Arc<dyn MapStore>,
    config: ClientConfig,
}

/// Handle on a backing map store.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start a session backed by an embedded in-process store member.
    pub async fn start(config: ClientConfig) -> Result<Self, Error> {
        let store = Arc::new(MemoryStore::new(config.store.clone()));
        Ok(Self::with_store(store, config))
    }

    /// Wrap an existing store.
    pub fn with_store(store: Arc<dyn MapStore>, config: ClientConfig) -> Self {
        tracing::info!(
            cluster = %config.cluster_name,
            client = %config.client_name,
            member = store.name(),
            "session started"
        );
        Self {
            inner: Arc::new(SessionInner { store, config }),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Client name of this session.
    pub fn name(&self) -> &str {
        &self.inner.config.client_name
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn MapStore> {
        &self.inner.store
    }

    /// Raw handle on the named map.
    pub fn map(&self, name: impl Into<String>) -> MapHandle {
        MapHandle {
            name: name.into(),
            store: Arc::clone(&self.inner.store),
        }
    }

    /// Context used by operations called without one.
    pub fn default_context(&self) -> Context {
        match self.inner.config.default_timeout {
            Some(timeout) => Context::with_timeout(timeout),
            None => Context::background(),
        }
    }

    /// Whether the backing store still accepts operations.
    pub fn is_running(&self) -> bool {
        self.inner.store.is_running()
    }

    /// Names of all maps in the store.
    pub async fn map_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.store.map_names().await?)
    }

    /// Shut the backing store down. Every clone of the session is affected.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.inner.store.shutdown().await?;
        tracing::info!(client = %self.inner.config.client_name, "session shut down");
        Ok(())
    }

    /// Check whether two handles refer to the same session.
    pub fn same_session(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_name", &self.inner.config.client_name)
            .field("cluster_name", &self.inner.config.cluster_name)
            .field("member", &self.inner.store.name())
            .finish()
    }
}

/// Untyped handle on one map.
///
/// Values pass through unchecked: nothing here encodes, decodes or verifies
/// the format tag of a payload.
#[derive(Clone)]
pub struct MapHandle {
    name: String,
    store: Arc<dyn MapStore>,
}

impl MapHandle {
    /// Map name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &str) -> Result<Option<Payload>, Error> {
        Ok(self.store.get(&self.name, key).await?)
    }

    pub async fn set(&self, key: &str, value: Payload) -> Result<(), Error> {
        Ok(self.store.set(&self.name, key, value).await?)
    }

    /// Remove `key`, returning whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        Ok(self.store.delete(&self.name, key).await?)
    }

    pub async fn entries_with_predicate(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Payload)>, Error> {
        Ok(self.store.entries_with_predicate(&self.name, predicate).await?)
    }

    pub async fn add_entry_listener(&self, listener: EntryListener) -> Result<SubscriptionId, Error> {
        Ok(self.store.add_entry_listener(&self.name, listener).await?)
    }

    pub async fn remove_entry_listener(&self, id: SubscriptionId) -> Result<bool, Error> {
        Ok(self.store.remove_entry_listener(&self.name, id).await?)
    }

    /// Number of entries in the map.
    pub async fn size(&self) -> Result<usize, Error> {
        Ok(self.store.size(&self.name).await?)
    }

    /// Remove every entry, emitting a removal event for each.
    pub async fn clear(&self) -> Result<(), Error> {
        Ok(self.store.clear(&self.name).await?)
    }
}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapHandle").field("name", &self.name).finish()
    }
}
