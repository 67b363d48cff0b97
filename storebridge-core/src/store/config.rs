//! Store Configuration
//!
//! The bridge never builds or writes a container directly. It goes through a
//! `StoreConfig`, which says how to build the container from the first
//! tracked state and how to push later tracked states into it.
//!
//! The default configuration builds a plain `Store`. A custom configuration
//! can return a richer container that wraps a `Store` and adds fields or
//! behavior of its own, as long as it keeps every tracked field present.

use super::{Store, TrackedState};

/// A container the bridge can hand to consumers.
///
/// Every container exposes the `Store` that holds its state; selectors and
/// the provider work through it. Clones must be handles to the same
/// container.
pub trait Container: Clone + Send + Sync + 'static {
    fn store(&self) -> &Store;
}

impl Container for Store {
    fn store(&self) -> &Store {
        self
    }
}

/// Strategy for building and updating a bridge's container.
pub trait StoreConfig: Send + Sync + 'static {
    type Container: Container;

    /// Build the container from the first tracked state.
    ///
    /// The returned container must hold every field of `initial`. A field
    /// left out here surfaces as `ContainerInvariant` on its first read.
    fn create_container(&self, initial: TrackedState) -> Self::Container;

    /// Push a new tracked state into an existing container.
    ///
    /// The default merges `next` into the store, keeping any fields the
    /// container added on its own.
    fn update_container(&self, container: &Self::Container, next: TrackedState) {
        container.store().set_state(next);
    }
}

/// Builds a plain `Store` holding exactly the tracked fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStoreConfig;

impl StoreConfig for DefaultStoreConfig {
    type Container = Store;

    fn create_container(&self, initial: TrackedState) -> Store {
        Store::new(initial)
    }
}

/// A configuration assembled from two closures.
pub struct FnStoreConfig<Create, Update> {
    create: Create,
    update: Update,
}

/// Build a `StoreConfig` from a create closure and an update closure.
///
/// # Example
///
/// ```rust,ignore
/// let config = store_config(
///     |initial| Store::new(initial.with("renders", 0)),
///     |store: &Store, next| store.set_state(next),
/// );
/// ```
pub fn store_config<C, Create, Update>(
    create: Create,
    update: Update,
) -> FnStoreConfig<Create, Update>
where
    C: Container,
    Create: Fn(TrackedState) -> C + Send + Sync + 'static,
    Update: Fn(&C, TrackedState) + Send + Sync + 'static,
{
    FnStoreConfig { create, update }
}

impl<C, Create, Update> StoreConfig for FnStoreConfig<Create, Update>
where
    C: Container,
    Create: Fn(TrackedState) -> C + Send + Sync + 'static,
    Update: Fn(&C, TrackedState) + Send + Sync + 'static,
{
    type Container = C;

    fn create_container(&self, initial: TrackedState) -> C {
        (self.create)(initial)
    }

    fn update_container(&self, container: &C, next: TrackedState) {
        (self.update)(container, next)
    }
}
