//! In-process map store.
//!
//! `MemoryStore` is a single-member implementation of [`MapStore`]. Each map
//! keeps its entries in a `BTreeMap` behind an async mutex; events are
//! published while that mutex is held, so every subscription observes the
//! map's writes in the order they were applied.
//!
//! Every subscription owns a bounded queue drained by its own delivery task.
//! A full queue makes writers to the map wait, which is how slow listeners
//! back-pressure the store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mapcache_proto::{EntryNotified, Payload, Predicate};
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};

use crate::config::StoreConfig;
use crate::error::Error;
use crate::logging::StoreLogger;
use crate::predicate::PredicateEvaluator;
use crate::store::{EntryListener, MapStore, StoreCapabilities, SubscriptionId};

/// One installed listener on a map.
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<EntryNotified>,
}

/// Entries and listeners of a single map.
#[derive(Default)]
struct MapShard {
    entries: Mutex<BTreeMap<String, Payload>>,
    listeners: RwLock<Vec<Subscriber>>,
}

impl MapShard {
    fn senders(&self) -> Vec<(SubscriptionId, mpsc::Sender<EntryNotified>)> {
        self.listeners
            .read()
            .iter()
            .map(|s| (s.id, s.sender.clone()))
            .collect()
    }
}

/// In-process [`MapStore`].
pub struct MemoryStore {
    config: StoreConfig,
    /// Maps keyed by name.
    maps: DashMap<String, Arc<MapShard>>,
    /// Map name of every live subscription.
    subscriptions: DashMap<SubscriptionId, String>,
    next_subscription_id: AtomicU64,
    /// Event sequence counter shared by all maps.
    sequence: AtomicU64,
    running: AtomicBool,
    logger: StoreLogger,
}

impl MemoryStore {
    /// Start a store with the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        let logger = StoreLogger::new(config.member_name.clone(), config.log_weight);
        logger.info(|| format!("member {} started", config.member_name));

        Self {
            config,
            maps: DashMap::new(),
            subscriptions: DashMap::new(),
            next_subscription_id: AtomicU64::new(1),
            sequence: AtomicU64::new(1),
            running: AtomicBool::new(true),
            logger,
        }
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of installed listeners across all maps.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn ensure_running(&self) -> Result<(), Error> {
        if self.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotActive)
        }
    }

    /// Existing shard for `map`, if any.
    fn shard(&self, map: &str) -> Option<Arc<MapShard>> {
        self.maps.get(map).map(|entry| Arc::clone(entry.value()))
    }

    /// Shard for `map`, creating it on first use.
    fn shard_or_create(&self, map: &str) -> Arc<MapShard> {
        if let Some(shard) = self.shard(map) {
            return shard;
        }
        let shard = self
            .maps
            .entry(map.to_string())
            .or_insert_with(|| Arc::new(MapShard::default()));
        Arc::clone(shard.value())
    }

    /// Stamp an event and hand it to every listener of the shard.
    ///
    /// Must be called while holding the shard's entry lock.
    async fn publish(&self, shard: &MapShard, event: EntryNotified) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let event = event
            .with_source(self.config.member_name.clone())
            .with_sequence(sequence);

        for (id, sender) in shard.senders() {
            if sender.send(event.clone()).await.is_err() {
                // Delivery task is gone; the subscription is being removed.
                tracing::debug!(
                    subscription_id = %id,
                    map = %event.map_name,
                    "dropped event for closed subscription"
                );
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl MapStore for MemoryStore {
    fn name(&self) -> &str {
        &self.config.member_name
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.config.capabilities()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn get(&self, map: &str, key: &str) -> Result<Option<Payload>, Error> {
        self.ensure_running()?;
        let Some(shard) = self.shard(map) else {
            return Ok(None);
        };
        let entries = shard.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, map: &str, key: &str, value: Payload) -> Result<(), Error> {
        self.ensure_running()?;
        let shard = self.shard_or_create(map);
        let mut entries = shard.entries.lock().await;

        let event = match entries.insert(key.to_string(), value.clone()) {
            Some(old) => EntryNotified::updated(map, key, value, old),
            None => EntryNotified::added(map, key, value),
        };
        tracing::debug!(map, key, kind = %event.kind, "entry written");
        self.publish(&shard, event).await;
        Ok(())
    }

    async fn delete(&self, map: &str, key: &str) -> Result<bool, Error> {
        self.ensure_running()?;
        let Some(shard) = self.shard(map) else {
            return Ok(false);
        };
        let mut entries = shard.entries.lock().await;

        match entries.remove(key) {
            Some(old) => {
                tracing::debug!(map, key, "entry removed");
                self.publish(&shard, EntryNotified::removed(map, key, Some(old)))
                    .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn entries_with_predicate(
        &self,
        map: &str,
        predicate: &Predicate,
    ) -> Result<Vec<(String, Payload)>, Error> {
        self.ensure_running()?;
        self.capabilities().check(predicate)?;

        let Some(shard) = self.shard(map) else {
            return Ok(Vec::new());
        };
        let entries = shard.entries.lock().await;
        let matched: Vec<(String, Payload)> = entries
            .iter()
            .filter(|(_, payload)| PredicateEvaluator::matches_payload(predicate, payload))
            .map(|(key, payload)| (key.clone(), payload.clone()))
            .collect();

        tracing::debug!(
            map,
            operator = predicate.operator(),
            scanned = entries.len(),
            matched = matched.len(),
            "predicate query"
        );
        Ok(matched)
    }

    async fn add_entry_listener(
        &self,
        map: &str,
        listener: EntryListener,
    ) -> Result<SubscriptionId, Error> {
        self.ensure_running()?;
        let id = SubscriptionId::new(self.next_subscription_id.fetch_add(1, Ordering::SeqCst));
        let (sender, mut receiver) = mpsc::channel(self.config.event_queue_capacity.max(1));

        // Callbacks run sequentially on this task. A panicking callback ends
        // delivery for its own subscription only.
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                listener(event);
            }
            tracing::debug!(subscription_id = %id, "delivery task finished");
        });

        let shard = self.shard_or_create(map);
        shard.listeners.write().push(Subscriber { id, sender });
        self.subscriptions.insert(id, map.to_string());

        self.logger
            .debug(|| format!("entry listener {} added to map {}", id, map));
        Ok(id)
    }

    async fn remove_entry_listener(&self, map: &str, id: SubscriptionId) -> Result<bool, Error> {
        self.ensure_running()?;
        if self.subscriptions.remove_if(&id, |_, m| m == map).is_none() {
            return Ok(false);
        }
        if let Some(shard) = self.shard(map) {
            // Dropping the sender ends the delivery task once its queue drains.
            shard.listeners.write().retain(|s| s.id != id);
        }

        self.logger
            .debug(|| format!("entry listener {} removed from map {}", id, map));
        Ok(true)
    }

    async fn size(&self, map: &str) -> Result<usize, Error> {
        self.ensure_running()?;
        match self.shard(map) {
            Some(shard) => Ok(shard.entries.lock().await.len()),
            None => Ok(0),
        }
    }

    async fn clear(&self, map: &str) -> Result<(), Error> {
        self.ensure_running()?;
        let Some(shard) = self.shard(map) else {
            return Ok(());
        };
        let mut entries = shard.entries.lock().await;
        let removed = std::mem::take(&mut *entries);
        let count = removed.len();

        for (key, old) in removed {
            self.publish(&shard, EntryNotified::removed(map, key, Some(old)))
                .await;
        }

        self.logger
            .info(|| format!("cleared {} entries from map {}", count, map));
        Ok(())
    }

    async fn map_names(&self) -> Result<Vec<String>, Error> {
        self.ensure_running()?;
        let mut names: Vec<String> = self.maps.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn shutdown(&self) -> Result<(), Error> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let subscriptions = self.subscriptions.len();
        self.subscriptions.clear();
        for shard in self.maps.iter() {
            shard.listeners.write().clear();
        }
        self.maps.clear();

        self.logger.info(|| {
            format!(
                "member {} shut down, {} listeners dropped",
                self.config.member_name, subscriptions
            )
        });
        Ok(())
    }
}
