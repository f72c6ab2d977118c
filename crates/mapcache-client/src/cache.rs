//! Typed cache facade.
//!
//! [`TypedCache<T>`] stores values of one type `T` in named maps of the
//! backing store. Every write is JSON-encoded, every read is decoded and
//! checked, and listeners receive typed callbacks instead of raw
//! notifications.
//!
//! # Example
//!
//! ```ignore
//! use mapcache_client::{Cache, ClientConfig, TypedCache};
//! use mapcache_proto::Predicate;
//!
//! let cache = TypedCache::<Subscription>::start(ClientConfig::default()).await?;
//! cache.put("subs", "sub-1", &subscription).await?;
//! let open = cache.query("subs", &Predicate::eq("status", "OPEN")).await?;
//! cache.close().await?;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use mapcache_proto::Predicate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::config::ClientConfig;
use crate::context::Context;
use crate::dispatcher::{
    DispatchCounts, Dispatcher, ListenerRegistration, ListenerRegistry, SubscriptionState,
};
use crate::error::Error;
use crate::listener::Listener;
use crate::session::{MapHandle, Session};

/// Typed CRUD, query and listener operations over named maps.
///
/// Each operation has a form bounded by the session's default context and a
/// `*_with_context` form bounded by the caller's [`Context`].
#[async_trait]
pub trait Cache<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Write `value` under `key`, replacing any previous value.
    async fn put(&self, map: &str, key: &str, value: &T) -> Result<(), Error>;

    async fn put_with_context(
        &self,
        ctx: &Context,
        map: &str,
        key: &str,
        value: &T,
    ) -> Result<(), Error>;

    /// Read the value under `key`. Absence is `Ok(None)`.
    async fn get(&self, map: &str, key: &str) -> Result<Option<T>, Error>;

    async fn get_with_context(&self, ctx: &Context, map: &str, key: &str)
        -> Result<Option<T>, Error>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, map: &str, key: &str) -> Result<(), Error>;

    async fn delete_with_context(&self, ctx: &Context, map: &str, key: &str) -> Result<(), Error>;

    /// All values matching `predicate`, ordered by key.
    ///
    /// Fails as a whole if any matching value does not decode.
    async fn query(&self, map: &str, predicate: &Predicate) -> Result<Vec<T>, Error>;

    async fn query_with_context(
        &self,
        ctx: &Context,
        map: &str,
        predicate: &Predicate,
    ) -> Result<Vec<T>, Error>;

    /// Subscribe `listener` to every change of `map` from now on.
    async fn add_listener(
        &self,
        map: &str,
        listener: Arc<dyn Listener<T>>,
    ) -> Result<ListenerRegistration, Error>;

    async fn add_listener_with_context(
        &self,
        ctx: &Context,
        map: &str,
        listener: Arc<dyn Listener<T>>,
    ) -> Result<ListenerRegistration, Error>;

    /// Unsubscribe a listener. Returns `false` if it was not active.
    async fn remove_listener(&self, registration: &ListenerRegistration) -> Result<bool, Error>;

    async fn remove_listener_with_context(
        &self,
        ctx: &Context,
        registration: &ListenerRegistration,
    ) -> Result<bool, Error>;
}

/// Cache of `T` values over a store session.
///
/// The cache either owns the session it started ([`TypedCache::start`]) or
/// shares one created elsewhere ([`TypedCache::with_session`]). Only an
/// owning cache shuts the session down on [`TypedCache::close`]. Dropping a
/// cache never closes anything.
pub struct TypedCache<T> {
    session: Session,
    owns_session: bool,
    registry: ListenerRegistry,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Start a new session and a cache owning it.
    pub async fn start(config: ClientConfig) -> Result<Self, Error> {
        let session = Session::start(config).await?;
        Ok(Self::from_parts(session, true))
    }

    /// Create a cache on a shared session.
    pub fn with_session(session: Session) -> Self {
        Self::from_parts(session, false)
    }

    fn from_parts(session: Session, owns_session: bool) -> Self {
        Self {
            session,
            owns_session,
            registry: ListenerRegistry::new(),
            _marker: PhantomData,
        }
    }

    /// The underlying session.
    ///
    /// Unchecked: operations through the session bypass encoding, decoding
    /// and format checks.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Raw handle on the named map.
    ///
    /// Unchecked: payloads written here are not validated, and may make later
    /// typed reads fail with a decode error.
    pub fn raw_map(&self, name: impl Into<String>) -> MapHandle {
        self.session.map(name)
    }

    /// Whether this cache shuts the session down on close.
    pub fn owns_session(&self) -> bool {
        self.owns_session
    }

    /// Number of active listeners installed through this cache.
    pub fn listener_count(&self) -> usize {
        self.expire_if_stopped();
        self.registry.active_count(None)
    }

    /// Number of active listeners on one map.
    pub fn listener_count_for(&self, map: &str) -> usize {
        self.expire_if_stopped();
        self.registry.active_count(Some(map))
    }

    /// Lifecycle state of a registration made through this cache.
    pub fn subscription_state(
        &self,
        registration: &ListenerRegistration,
    ) -> Option<SubscriptionState> {
        self.expire_if_stopped();
        self.registry.state(registration)
    }

    /// Callback counters of an active registration made through this cache.
    pub fn listener_stats(&self, registration: &ListenerRegistration) -> Option<DispatchCounts> {
        self.expire_if_stopped();
        self.registry.stats(registration)
    }

    /// A session shut down elsewhere has dropped every store subscription;
    /// bring the registry in line.
    fn expire_if_stopped(&self) {
        if self.session.is_running() {
            return;
        }
        let expired = self.registry.remove_all();
        if !expired.is_empty() {
            tracing::debug!(
                listeners = expired.len(),
                "session stopped, listeners removed"
            );
        }
    }

    /// Release the cache.
    ///
    /// All listeners installed through this cache move to `Removed`. An
    /// owning cache shuts the session down; a sharing cache only
    /// unsubscribes its own listeners and leaves the session running.
    pub async fn close(&self) -> Result<(), Error> {
        let active = self.registry.remove_all();

        if self.owns_session {
            return self.session.shutdown().await;
        }

        let mut first_error = None;
        if self.session.is_running() {
            for (map, id) in &active {
                match self.session.map(map.as_str()).remove_entry_listener(*id).await {
                    Ok(_) => {}
                    Err(Error::Store(mapcache_core::Error::NotActive)) => {}
                    Err(err) => {
                        tracing::warn!(
                            map = %map,
                            subscription_id = %id,
                            error = %err,
                            "failed to remove listener on close"
                        );
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
        tracing::debug!(listeners = active.len(), "cache closed");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T> Cache<T> for TypedCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn put(&self, map: &str, key: &str, value: &T) -> Result<(), Error> {
        self.put_with_context(&self.session.default_context(), map, key, value)
            .await
    }

    async fn put_with_context(
        &self,
        ctx: &Context,
        map: &str,
        key: &str,
        value: &T,
    ) -> Result<(), Error> {
        let payload = codec::encode(value)?;
        let handle = self.session.map(map);
        ctx.run(handle.set(key, payload)).await
    }

    async fn get(&self, map: &str, key: &str) -> Result<Option<T>, Error> {
        self.get_with_context(&self.session.default_context(), map, key)
            .await
    }

    async fn get_with_context(
        &self,
        ctx: &Context,
        map: &str,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let handle = self.session.map(map);
        match ctx.run(handle.get(key)).await? {
            Some(payload) => Ok(Some(codec::decode(key, &payload)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, map: &str, key: &str) -> Result<(), Error> {
        self.delete_with_context(&self.session.default_context(), map, key)
            .await
    }

    async fn delete_with_context(&self, ctx: &Context, map: &str, key: &str) -> Result<(), Error> {
        let handle = self.session.map(map);
        ctx.run(handle.delete(key)).await?;
        Ok(())
    }

    async fn query(&self, map: &str, predicate: &Predicate) -> Result<Vec<T>, Error> {
        self.query_with_context(&self.session.default_context(), map, predicate)
            .await
    }

    async fn query_with_context(
        &self,
        ctx: &Context,
        map: &str,
        predicate: &Predicate,
    ) -> Result<Vec<T>, Error> {
        let handle = self.session.map(map);
        let entries = ctx.run(handle.entries_with_predicate(predicate)).await?;

        let mut values = Vec::with_capacity(entries.len());
        for (key, payload) in &entries {
            values.push(codec::decode(key, payload)?);
        }
        Ok(values)
    }

    async fn add_listener(
        &self,
        map: &str,
        listener: Arc<dyn Listener<T>>,
    ) -> Result<ListenerRegistration, Error> {
        self.add_listener_with_context(&self.session.default_context(), map, listener)
            .await
    }

    async fn add_listener_with_context(
        &self,
        ctx: &Context,
        map: &str,
        listener: Arc<dyn Listener<T>>,
    ) -> Result<ListenerRegistration, Error> {
        let dispatcher = Dispatcher::new(map, listener);
        let registration_id = self.registry.begin(map, Arc::clone(dispatcher.stats()));
        let handle = self.session.map(map);

        let subscription_id = match ctx
            .run(handle.add_entry_listener(dispatcher.into_entry_listener()))
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.registry.abort(registration_id);
                return Err(Error::Subscription(format!(
                    "failed to add listener: {}",
                    err
                )));
            }
        };

        match self.registry.activate(registration_id, subscription_id) {
            Some(registration) => {
                tracing::info!(
                    map,
                    subscription_id = %subscription_id,
                    "listener added"
                );
                Ok(registration)
            }
            None => {
                // The cache was closed while the subscription was installing.
                if let Err(err) = handle.remove_entry_listener(subscription_id).await {
                    tracing::debug!(map, error = %err, "failed to remove orphaned subscription");
                }
                Err(Error::Subscription(
                    "failed to add listener: cache closed during installation".to_string(),
                ))
            }
        }
    }

    async fn remove_listener(&self, registration: &ListenerRegistration) -> Result<bool, Error> {
        self.remove_listener_with_context(&self.session.default_context(), registration)
            .await
    }

    async fn remove_listener_with_context(
        &self,
        ctx: &Context,
        registration: &ListenerRegistration,
    ) -> Result<bool, Error> {
        self.expire_if_stopped();
        if !self.registry.mark_removed(registration) {
            return Ok(false);
        }
        let handle = self.session.map(registration.map_name());
        match ctx
            .run(handle.remove_entry_listener(registration.subscription_id()))
            .await
        {
            // Shutdown already dropped the subscription.
            Err(Error::Store(mapcache_core::Error::NotActive)) => Ok(true),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapcache_core::{
        EntryListener, Error as CoreError, MapStore, MemoryStore, StoreCapabilities, StoreConfig,
        SubscriptionId,
    };
    use parking_lot::Mutex;
    use mapcache_proto::Payload;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Subscription {
        subscriber_id: String,
    }

    fn sub(id: &str) -> Subscription {
        Subscription {
            subscriber_id: id.to_string(),
        }
    }

    struct NoopListener;

    impl Listener<Subscription> for NoopListener {
        fn on_add(&self, _event: &mapcache_proto::EntryNotified, _value: Subscription) {}
        fn on_update(
            &self,
            _event: &mapcache_proto::EntryNotified,
            _value: Subscription,
            _old_value: Subscription,
        ) {
        }
        fn on_delete(&self, _event: &mapcache_proto::EntryNotified) {}
        fn on_error(&self, _event: &mapcache_proto::EntryNotified, _error: Error) {}
    }

    async fn cache() -> TypedCache<Subscription> {
        TypedCache::start(ClientConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_put_get() {
        let cache = cache().await;
        cache.put("subs", "sub-1", &sub("a")).await.unwrap();
        assert_eq!(cache.get("subs", "sub-1").await.unwrap(), Some(sub("a")));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = cache().await;
        assert_eq!(cache.get("subs", "never").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let cache = cache().await;
        cache.put("subs", "sub-1", &sub("a")).await.unwrap();
        cache.delete("subs", "sub-1").await.unwrap();
        cache.delete("subs", "sub-1").await.unwrap();
        assert_eq!(cache.get("subs", "sub-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_rejects_binary_payload() {
        let cache = cache().await;
        cache
            .raw_map("subs")
            .set("blob", Payload::binary(&br#"{"subscriberId":"a"}"#[..]))
            .await
            .unwrap();

        let err = cache.get("subs", "blob").await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(
            err.to_string(),
            "value of cached object with key 'blob' is not a JSON value"
        );
    }

    #[tokio::test]
    async fn test_query_fails_fast_on_bad_entry() {
        let cache = cache().await;
        cache.put("subs", "a", &sub("a")).await.unwrap();
        cache
            .raw_map("subs")
            .set("b", Payload::json(&b"not json"[..]))
            .await
            .unwrap();

        let all = cache.query("subs", &Predicate::all()).await;
        assert!(matches!(all, Err(Error::Decode(_))));

        // The bad entry does not match this predicate, so it is never decoded.
        let matched = cache
            .query("subs", &Predicate::eq("subscriberId", "a"))
            .await
            .unwrap();
        assert_eq!(matched, vec![sub("a")]);
    }

    #[tokio::test]
    async fn test_query_unsupported_predicate() {
        let config = ClientConfig::default().with_store(StoreConfig::default().with_patterns(false));
        let cache = TypedCache::<Subscription>::start(config).await.unwrap();

        let err = cache
            .query("subs", &Predicate::like("subscriberId", "a%"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Store(mapcache_core::Error::Unsupported(ref op)) if op == "like"
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let cache = cache().await;
        let (ctx, handle) = Context::cancellable();
        handle.cancel();

        let err = cache
            .put_with_context(&ctx, "subs", "sub-1", &sub("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(cache.get("subs", "sub-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_listener_lifecycle() {
        let cache = cache().await;
        let registration = cache
            .add_listener("subs", Arc::new(NoopListener))
            .await
            .unwrap();
        assert_eq!(registration.map_name(), "subs");
        assert_eq!(cache.listener_count(), 1);
        assert_eq!(cache.listener_count_for("subs"), 1);
        assert_eq!(
            cache.subscription_state(&registration),
            Some(SubscriptionState::Active)
        );

        assert!(cache.remove_listener(&registration).await.unwrap());
        assert!(!cache.remove_listener(&registration).await.unwrap());
        assert_eq!(cache.listener_count(), 0);
        assert_eq!(
            cache.subscription_state(&registration),
            Some(SubscriptionState::Removed)
        );
    }

    #[tokio::test]
    async fn test_add_listener_on_stopped_store() {
        let cache = cache().await;
        cache.session().shutdown().await.unwrap();

        let err = cache
            .add_listener("subs", Arc::new(NoopListener))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Subscription(ref msg) if msg.starts_with("failed to add listener: ")));
        assert_eq!(cache.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_close_owned_session() {
        let cache = cache().await;
        assert!(cache.owns_session());
        let registration = cache
            .add_listener("subs", Arc::new(NoopListener))
            .await
            .unwrap();

        cache.close().await.unwrap();
        assert!(!cache.session().is_running());
        assert_eq!(
            cache.subscription_state(&registration),
            Some(SubscriptionState::Removed)
        );
    }

    #[tokio::test]
    async fn test_close_shared_session() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::with_store(store.clone(), ClientConfig::default());
        let cache = TypedCache::<Subscription>::with_session(session.clone());
        assert!(!cache.owns_session());

        cache
            .add_listener("subs", Arc::new(NoopListener))
            .await
            .unwrap();
        assert_eq!(store.subscription_count(), 1);

        cache.close().await.unwrap();
        assert!(session.is_running());
        assert_eq!(store.subscription_count(), 0);
        assert_eq!(cache.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_elsewhere_removes_listeners() {
        let session = Session::start(ClientConfig::default()).await.unwrap();
        let cache = TypedCache::<Subscription>::with_session(session.clone());
        let registration = cache
            .add_listener("subs", Arc::new(NoopListener))
            .await
            .unwrap();
        assert_eq!(cache.listener_count_for("subs"), 1);

        session.shutdown().await.unwrap();

        assert_eq!(
            cache.subscription_state(&registration),
            Some(SubscriptionState::Removed)
        );
        assert_eq!(cache.listener_count(), 0);
        assert_eq!(cache.listener_count_for("subs"), 0);
        assert!(!cache.remove_listener(&registration).await.unwrap());
        cache.close().await.unwrap();
    }

    /// Memory store whose unsubscribe fails for one chosen subscription.
    struct FlakyStore {
        inner: MemoryStore,
        fail_remove: Mutex<Option<SubscriptionId>>,
    }

    #[async_trait]
    impl MapStore for FlakyStore {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn capabilities(&self) -> StoreCapabilities {
            self.inner.capabilities()
        }

        fn is_running(&self) -> bool {
            self.inner.is_running()
        }

        async fn get(&self, map: &str, key: &str) -> Result<Option<Payload>, CoreError> {
            self.inner.get(map, key).await
        }

        async fn set(&self, map: &str, key: &str, value: Payload) -> Result<(), CoreError> {
            self.inner.set(map, key, value).await
        }

        async fn delete(&self, map: &str, key: &str) -> Result<bool, CoreError> {
            self.inner.delete(map, key).await
        }

        async fn entries_with_predicate(
            &self,
            map: &str,
            predicate: &Predicate,
        ) -> Result<Vec<(String, Payload)>, CoreError> {
            self.inner.entries_with_predicate(map, predicate).await
        }

        async fn add_entry_listener(
            &self,
            map: &str,
            listener: EntryListener,
        ) -> Result<SubscriptionId, CoreError> {
            self.inner.add_entry_listener(map, listener).await
        }

        async fn remove_entry_listener(
            &self,
            map: &str,
            id: SubscriptionId,
        ) -> Result<bool, CoreError> {
            if *self.fail_remove.lock() == Some(id) {
                return Err(CoreError::Unavailable("member left the cluster".to_string()));
            }
            self.inner.remove_entry_listener(map, id).await
        }

        async fn size(&self, map: &str) -> Result<usize, CoreError> {
            self.inner.size(map).await
        }

        async fn clear(&self, map: &str) -> Result<(), CoreError> {
            self.inner.clear(map).await
        }

        async fn map_names(&self) -> Result<Vec<String>, CoreError> {
            self.inner.map_names().await
        }

        async fn shutdown(&self) -> Result<(), CoreError> {
            self.inner.shutdown().await
        }
    }

    #[tokio::test]
    async fn test_close_unsubscribes_past_a_failure() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::default(),
            fail_remove: Mutex::new(None),
        });
        let session = Session::with_store(store.clone(), ClientConfig::default());
        let cache = TypedCache::<Subscription>::with_session(session);

        let mut registrations = Vec::new();
        for map in ["subs", "archive", "breakers"] {
            registrations.push(cache.add_listener(map, Arc::new(NoopListener)).await.unwrap());
        }
        assert_eq!(store.inner.subscription_count(), 3);
        *store.fail_remove.lock() = Some(registrations[1].subscription_id());

        let err = cache.close().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(CoreError::Unavailable(ref msg)) if msg == "member left the cluster"
        ));

        // Only the failing subscription is left behind.
        assert_eq!(store.inner.subscription_count(), 1);
        assert_eq!(cache.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_listener_surfaces_unavailable() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::default(),
            fail_remove: Mutex::new(None),
        });
        let session = Session::with_store(store.clone(), ClientConfig::default());
        let cache = TypedCache::<Subscription>::with_session(session);

        let registration = cache
            .add_listener("subs", Arc::new(NoopListener))
            .await
            .unwrap();
        *store.fail_remove.lock() = Some(registration.subscription_id());

        let err = cache.remove_listener(&registration).await.unwrap_err();
        assert!(matches!(err, Error::Store(CoreError::Unavailable(_))));
    }
}
