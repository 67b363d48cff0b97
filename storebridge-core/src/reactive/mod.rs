//! Reactive Primitives
//!
//! This module implements the consumer side of the reactive system:
//! subscribers, the tracking context, and consumers.
//!
//! # Concepts
//!
//! ## Subscribers
//!
//! A Subscriber is an id plus a notification callback. Stores keep
//! subscribers in per-field watcher lists.
//!
//! ## Consumers
//!
//! A Consumer is a computation that reads fields through selectors. It runs
//! once when mounted and again whenever a field it read changes.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a selector is read, we check if there is an
//! active tracking context and, if so, subscribe the running consumer to the
//! field that was read.

mod context;
mod subscriber;
mod consumer;

pub use context::{Dependency, ReactiveContext};
pub use subscriber::{Subscriber, SubscriberId};
pub use consumer::Consumer;
