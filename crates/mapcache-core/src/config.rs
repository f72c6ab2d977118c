//! Store configuration.

use crate::logging::LogWeight;
use crate::store::StoreCapabilities;

/// Default member name reported as the source of entry events.
pub const DEFAULT_MEMBER_NAME: &str = "mapcache-member";

/// Default number of undelivered events buffered per subscription.
///
/// When a subscription's queue is full, writers to the map wait for the
/// listener to catch up.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Configuration for a [`MemoryStore`](crate::memory::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Member name stamped on emitted events.
    pub member_name: String,

    /// Per-subscription event queue capacity.
    pub event_queue_capacity: usize,

    /// Accept ordering comparisons in predicates.
    pub comparisons: bool,

    /// Accept LIKE / ILIKE patterns in predicates.
    pub patterns: bool,

    /// Minimum weight of store diagnostics forwarded to `tracing`.
    pub log_weight: LogWeight,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            member_name: DEFAULT_MEMBER_NAME.to_string(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            comparisons: true,
            patterns: true,
            log_weight: LogWeight::default(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration for the named member.
    pub fn new(member_name: impl Into<String>) -> Self {
        Self {
            member_name: member_name.into(),
            ..Default::default()
        }
    }

    /// Set the member name.
    pub fn with_member_name(mut self, name: impl Into<String>) -> Self {
        self.member_name = name.into();
        self
    }

    /// Set the per-subscription event queue capacity (minimum 1).
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable ordering comparisons.
    pub fn with_comparisons(mut self, enabled: bool) -> Self {
        self.comparisons = enabled;
        self
    }

    /// Enable or disable pattern matching.
    pub fn with_patterns(mut self, enabled: bool) -> Self {
        self.patterns = enabled;
        self
    }

    /// Set the store log weight.
    pub fn with_log_weight(mut self, weight: LogWeight) -> Self {
        self.log_weight = weight;
        self
    }

    /// Predicate capabilities implied by this configuration.
    pub fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            comparisons: self.comparisons,
            patterns: self.patterns,
        }
    }
}
