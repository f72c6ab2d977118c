//! mapcache protocol types.
//!
//! This crate defines the types exchanged with the map store: tagged value
//! payloads, predicate expressions and entry change notifications.
//!
//! # Modules
//!
//! - [`payload`] - Stored values and their wire-format tag
//! - [`value`] - Literal values used in predicates
//! - [`predicate`] - Predicate expressions for entry queries
//! - [`event`] - Entry change notifications
//! - [`error`] - Protocol error types
//!
//! # Wire format
//!
//! Structured values are UTF-8 JSON tagged [`Payload::Json`]. Anything else
//! is an opaque [`Payload::Binary`] blob that readers must reject when they
//! expect a structured value.
//!
//! ```ignore
//! use mapcache_proto::{Payload, Predicate};
//!
//! let payload = Payload::json(br#"{"subscriberId":"a"}"#.to_vec());
//! let predicate = Predicate::eq("subscriberId", "a");
//! ```

pub mod error;
pub mod event;
pub mod payload;
pub mod predicate;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use event::{EntryEventKind, EntryNotified};
pub use payload::Payload;
pub use predicate::{OperatorClass, Predicate};
pub use value::Value;
