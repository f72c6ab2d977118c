//! mapcache core - Backing map store contract and in-process store.
//!
//! This crate defines what the typed cache layer expects from a distributed
//! map store ([`MapStore`]) and ships [`MemoryStore`], a single-member
//! implementation used to run the cache without a cluster.

pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod predicate;
pub mod store;

pub use config::StoreConfig;
pub use error::Error;
pub use logging::{LogWeight, StoreLogger};
pub use memory::MemoryStore;
pub use predicate::PredicateEvaluator;
pub use store::{EntryListener, MapStore, StoreCapabilities, SubscriptionId};

/// Re-export protocol types.
pub use mapcache_proto as proto;
