//! Containers and Selectors
//!
//! This module holds the pull side of the bridge: the container consumers
//! read from, the configuration seam that builds it, and the selector layer
//! that gives each field its own subscription point.
//!
//! # Concepts
//!
//! ## Values and Tracked State
//!
//! A `TrackedState` maps field names to type-erased `Value`s. Each value
//! carries its own equality rule, which is what decides whether a write
//! counts as a change for that field.
//!
//! ## Stores
//!
//! A `Store` is the identity-stable container. Writes are merged in under
//! one lock, then only the watchers of changed fields are notified.
//!
//! ## Configuration
//!
//! `StoreConfig` decides how a container is built from the first tracked
//! state and how later states are pushed into it. Custom containers wrap a
//! `Store` and may carry fields of their own.
//!
//! ## Selectors
//!
//! `Selectors` exposes one `Selector` per field. Reading a selector inside
//! a consumer subscribes the consumer to that field alone.

mod value;
mod state;
#[allow(clippy::module_inception)]
mod store;
mod config;
mod selector;

pub use value::Value;
pub use state::TrackedState;
pub use store::{Store, StoreId, Subscription};
pub use config::{store_config, Container, DefaultStoreConfig, FnStoreConfig, StoreConfig};
pub use selector::{Selector, Selectors};
