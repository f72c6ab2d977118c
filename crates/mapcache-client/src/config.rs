//! Client configuration.

use std::time::Duration;

use mapcache_core::StoreConfig;

/// Default cluster name.
pub const DEFAULT_CLUSTER_NAME: &str = "dev";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name of the cluster to join.
    pub cluster_name: String,

    /// Client identifier reported to the store.
    pub client_name: String,

    /// Timeout applied by context-less operations. `None` waits indefinitely.
    pub default_timeout: Option<Duration>,

    /// Configuration of the embedded store member.
    pub store: StoreConfig,
}

impl ClientConfig {
    /// Create a configuration for the named cluster.
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            client_name: generate_client_name(),
            default_timeout: None,
            store: StoreConfig::default(),
        }
    }

    /// Set the client name.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Bound context-less operations by a timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Set the embedded store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_NAME)
    }
}

/// Generate a unique client name.
fn generate_client_name() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("client-{:x}-{}", timestamp, n)
}
