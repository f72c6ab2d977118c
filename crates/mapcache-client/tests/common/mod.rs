//! Shared fixtures for the client integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use mapcache_client::{Error, Listener};
use mapcache_proto::{EntryEventKind, EntryNotified};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Cached value used throughout the scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscriber_id: String,
    #[serde(default)]
    pub publisher_id: String,
    #[serde(default)]
    pub retries: u32,
}

impl Subscription {
    pub fn new(subscriber_id: &str) -> Self {
        Self {
            subscriber_id: subscriber_id.to_string(),
            publisher_id: "pub-123".to_string(),
            retries: 0,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// One recorded listener callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Added {
        key: String,
        value: Subscription,
    },
    Updated {
        key: String,
        value: Subscription,
        old_value: Subscription,
    },
    Deleted {
        key: String,
    },
    Failed {
        key: String,
        kind: EntryEventKind,
        message: String,
    },
}

/// Listener that records every callback in order.
#[derive(Default)]
pub struct MockListener {
    received: Mutex<Vec<Received>>,
}

impl MockListener {
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn on_add_called(&self) -> bool {
        self.any(|r| matches!(r, Received::Added { .. }))
    }

    pub fn on_update_called(&self) -> bool {
        self.any(|r| matches!(r, Received::Updated { .. }))
    }

    pub fn on_delete_called(&self) -> bool {
        self.any(|r| matches!(r, Received::Deleted { .. }))
    }

    pub fn on_error_called(&self) -> bool {
        self.any(|r| matches!(r, Received::Failed { .. }))
    }

    fn any(&self, f: impl Fn(&Received) -> bool) -> bool {
        self.received.lock().iter().any(f)
    }
}

impl Listener<Subscription> for MockListener {
    fn on_add(&self, event: &EntryNotified, value: Subscription) {
        self.received.lock().push(Received::Added {
            key: event.key.clone(),
            value,
        });
    }

    fn on_update(&self, event: &EntryNotified, value: Subscription, old_value: Subscription) {
        self.received.lock().push(Received::Updated {
            key: event.key.clone(),
            value,
            old_value,
        });
    }

    fn on_delete(&self, event: &EntryNotified) {
        self.received.lock().push(Received::Deleted {
            key: event.key.clone(),
        });
    }

    fn on_error(&self, event: &EntryNotified, error: Error) {
        self.received.lock().push(Received::Failed {
            key: event.key.clone(),
            kind: event.kind,
            message: error.to_string(),
        });
    }
}

/// Poll `condition` every 10ms until it holds or 5s pass.
pub async fn eventually<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    eventually_within(Duration::from_secs(5), Duration::from_millis(10), condition).await
}

pub async fn eventually_within<F>(timeout: Duration, tick: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Run a future with a generous upper bound so a hang fails the test.
pub async fn bounded<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("operation hung")
}

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "mapcache_client=debug,mapcache_core=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
