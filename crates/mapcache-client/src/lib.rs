//! mapcache client - Typed cache facade over a distributed map store.
//!
//! This crate turns the untyped map store of `mapcache-core` into a cache of
//! strongly-typed values, and translates raw change notifications into typed
//! listener callbacks.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use mapcache_client::{Cache, ClientConfig, TypedCache};
//! use mapcache_proto::Predicate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Start a session and a cache that owns it
//!     let cache = TypedCache::<Subscription>::start(ClientConfig::default()).await?;
//!
//!     // Write and read back
//!     cache.put("subs", "sub-1", &subscription).await?;
//!     let value = cache.get("subs", "sub-1").await?;
//!
//!     // Query by field
//!     let matches = cache.query("subs", &Predicate::eq("subscriberId", "a")).await?;
//!
//!     // React to changes
//!     let registration = cache.add_listener("subs", Arc::new(MyListener)).await?;
//!
//!     cache.remove_listener(&registration).await?;
//!     cache.close().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod session;

pub use cache::{Cache, TypedCache};
pub use codec::{DecodeError, EncodeError};
pub use config::ClientConfig;
pub use context::{CancelHandle, Context};
pub use dispatcher::{
    DispatchCounts, DispatchOutcome, DispatchStats, Dispatcher, ListenerRegistration,
    ListenerRegistry, SubscriptionState,
};
pub use error::Error;
pub use listener::Listener;
pub use session::{MapHandle, Session};

/// Re-export protocol types.
pub use mapcache_proto as proto;

// Store types needed to configure or embed a store
pub use mapcache_core::{LogWeight, MapStore, MemoryStore, StoreConfig};
