//! StoreBridge Core
//!
//! This crate bridges a push-model source computation into a pull-model
//! store with field-level subscriptions. It implements:
//!
//! - A source computation that re-runs on every recomputation of its scope
//!   and reports tracked state plus methods
//! - An identity-stable container, updated in place after each render
//! - Per-field selectors, so a consumer only re-runs when a field it read
//!   changes
//! - Ambient provider scopes for handing `{store, methods}` to consumers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: Values, tracked state, the default container, the store
//!   configuration seam, and the selector layer
//! - `reactive`: Subscribers, the tracking context, and consumers
//! - `bridge`: Bridges, providers, hook state, ambient scopes, and the
//!   render scheduler
//! - `error`: The error taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use storebridge_core::bridge::{Bridge, Hooks, Methods, Split};
//! use storebridge_core::reactive::Consumer;
//! use storebridge_core::store::TrackedState;
//!
//! // A source computation with one piece of state and one method
//! let bridge = Bridge::new(|hooks: &mut Hooks, initial: &i32| {
//!     let (count, set_count) = hooks.use_state(|| *initial)?;
//!     Ok(Split::new(
//!         TrackedState::new().with("count", count),
//!         Methods::new().with("set_count", move |n: i32| set_count.set(n)),
//!     ))
//! });
//!
//! // Mount a provider and a consumer inside its scope
//! let provider = bridge.mount(5)?;
//! let reader = bridge.clone();
//! let consumer = provider.scope(|| {
//!     Consumer::mount(move || {
//!         let count: i32 = reader.use_store()?.store.get("count")?;
//!         println!("Count: {count}");
//!         Ok(())
//!     })
//! })?;
//!
//! // Calling a method recomputes the source and updates the store
//! provider.scope(|| bridge.use_store()?.call::<i32, ()>("set_count", 6))?;
//! // Consumer re-runs, prints: "Count: 6"
//! ```

pub mod error;
pub mod reactive;
pub mod store;
pub mod bridge;

pub use bridge::{Adapted, Bridge, Hooks, Methods, Provider, Record, Split};
pub use error::{BridgeError, Result};
pub use reactive::Consumer;
pub use store::{Container, DefaultStoreConfig, Store, StoreConfig, TrackedState, Value};
