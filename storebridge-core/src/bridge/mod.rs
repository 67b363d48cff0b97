//! Hook-to-Store Bridge
//!
//! This module connects a push-model source computation, which is re-run
//! from scratch and returns fresh values each time, to a pull-model store
//! that consumers read field by field.
//!
//! # Overview
//!
//! 1. A `Bridge` is built once from a source computation and an optional
//!    store configuration.
//!
//! 2. `Bridge::mount` creates a `Provider`. Its first render runs the source
//!    and builds the container from the tracked half of the result.
//!
//! 3. Every later recomputation replaces the published methods and, after
//!    the render, pushes the tracked state into the same container if any
//!    field changed.
//!
//! 4. Code running inside `Provider::scope` (including consumers mounted
//!    there) gets `{store, methods}` from `Bridge::use_store`.
//!
//! # Construction Styles
//!
//! The canonical source returns a `Split` with its tracked state and methods
//! already apart. `Bridge::with_keys` adapts a source that returns a flat
//! `Record` plus two key lists into that form.

mod ambient;
mod hooks;
mod scheduler;
mod provider;
mod source;

pub use ambient::{lookup, provide, AmbientGuard, AmbientSnapshot, ContextKey};
pub use hooks::{Hooks, Setter};
pub use provider::{Adapted, DistributionContext, Provider};
pub use scheduler::Trigger;
pub use source::{Method, Methods, Record, Slot, Split};

use std::sync::Arc;

use tracing::debug;

use self::provider::SourceFn;
use crate::error::{BridgeError, Result};
use crate::store::{DefaultStoreConfig, StoreConfig};

/// A source computation bridged into a store.
///
/// # Type Parameters
///
/// - `Args`: The arguments the source is called with on every render.
/// - `C`: The store configuration building the container.
///
/// # Example
///
/// ```rust,ignore
/// let bridge = Bridge::new(|hooks: &mut Hooks, initial: &i32| {
///     let (count, set_count) = hooks.use_state(|| *initial)?;
///     Ok(Split::new(
///         TrackedState::new().with("count", count),
///         Methods::new().with("set_count", move |n: i32| set_count.set(n)),
///     ))
/// });
///
/// let provider = bridge.mount(5)?;
/// provider.scope(|| {
///     let adapted = bridge.use_store()?;
///     assert_eq!(adapted.store.get::<i32>("count")?, 5);
///     adapted.call::<i32, ()>("set_count", 6)
/// })?;
/// ```
pub struct Bridge<Args, C: StoreConfig = DefaultStoreConfig> {
    key: ContextKey,
    source: SourceFn<Args>,
    config: Arc<C>,
}

impl<Args> Bridge<Args, DefaultStoreConfig>
where
    Args: Clone + Send + Sync + 'static,
{
    /// Bridge a source that reports its own `{tracked, methods}` split.
    pub fn new<F>(source: F) -> Self
    where
        F: Fn(&mut Hooks, &Args) -> Result<Split> + Send + Sync + 'static,
    {
        Self {
            key: ContextKey::new(),
            source: Arc::new(source),
            config: Arc::new(DefaultStoreConfig),
        }
    }

    /// Bridge a source returning a flat `Record`, split by key lists.
    ///
    /// `state_keys` become tracked state and `action_keys` become methods.
    pub fn with_keys<F>(
        source: F,
        state_keys: &[&'static str],
        action_keys: &[&'static str],
    ) -> Self
    where
        F: Fn(&mut Hooks, &Args) -> Result<Record> + Send + Sync + 'static,
    {
        let state_keys = state_keys.to_vec();
        let action_keys = action_keys.to_vec();
        Self::new(move |hooks: &mut Hooks, args: &Args| {
            source(hooks, args)?.pick(&state_keys, &action_keys)
        })
    }
}

impl<Args, C> Bridge<Args, C>
where
    Args: Clone + Send + Sync + 'static,
    C: StoreConfig,
{
    /// Use a different store configuration.
    pub fn with_config<C2: StoreConfig>(self, config: C2) -> Bridge<Args, C2> {
        Bridge {
            key: self.key,
            source: self.source,
            config: Arc::new(config),
        }
    }

    /// The key this bridge's providers are made ambient under.
    pub fn key(&self) -> ContextKey {
        self.key
    }

    /// Mount a provider scope, running the source once with `args`.
    pub fn mount(&self, args: Args) -> Result<Provider<Args, C>> {
        debug!(key = ?self.key, "mounting provider");
        Provider::mount(self.key, Arc::clone(&self.source), Arc::clone(&self.config), args)
    }

    /// Get `{store, methods}` from the innermost provider scope.
    ///
    /// Fails with `MissingProvider` outside every scope of this bridge, or
    /// once the provider has unmounted.
    pub fn use_store(&self) -> Result<Adapted<C::Container>> {
        let context = lookup::<DistributionContext<C::Container>>(self.key)
            .filter(|context| context.is_mounted())
            .ok_or(BridgeError::MissingProvider {
                accessor: "use_store",
            })?;

        Ok(Adapted {
            store: context.selectors().clone(),
            methods: context.methods(),
        })
    }
}

impl<Args, C: StoreConfig> Clone for Bridge<Args, C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            source: Arc::clone(&self.source),
            config: Arc::clone(&self.config),
        }
    }
}

impl<Args, C: StoreConfig> std::fmt::Debug for Bridge<Args, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("key", &self.key)
            .field("config", &std::any::type_name::<C>())
            .finish()
    }
}
