//! Provider Implementation
//!
//! A Provider is one mounted scope of a bridge. It owns the container, the
//! hook state of the source computation, and the distribution context its
//! consumers read.
//!
//! # Render and Commit
//!
//! Every recomputation has two phases:
//!
//! 1. Render: run the source, check the tracked key set, and replace the
//!    published methods. Nothing shared is written except the methods.
//!
//! 2. Commit: compare the new tracked state against the last state pushed,
//!    field by field. If any field changed, push the full state into the
//!    container through the store configuration.
//!
//! The scheduler runs the commit of a render before it starts the next
//! render, so the container sees every tracked snapshot in order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::ambient::{self, ContextKey};
use super::hooks::Hooks;
use super::scheduler::{Render, Trigger};
use super::source::{Method, Methods, Split};
use crate::error::{BridgeError, Result};
use crate::store::{Container, Selectors, StoreConfig, TrackedState};

pub(crate) type SourceFn<Args> = Arc<dyn Fn(&mut Hooks, &Args) -> Result<Split> + Send + Sync>;

/// Run the source once inside a hook pass.
pub(crate) fn run_source<Args>(
    source: &SourceFn<Args>,
    hooks: &mut Hooks,
    args: &Args,
) -> Result<Split> {
    hooks.begin();
    let split = source(hooks, args)?;
    hooks.finish()?;
    Ok(split)
}

/// The `{container, methods}` pair a provider makes ambient.
pub struct DistributionContext<K: Container> {
    selectors: Selectors<K>,
    methods: RwLock<Methods>,
    mounted: AtomicBool,
}

impl<K: Container> DistributionContext<K> {
    pub fn selectors(&self) -> &Selectors<K> {
        &self.selectors
    }

    /// The methods of the latest render.
    pub fn methods(&self) -> Methods {
        self.methods.read().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

/// What a consumer gets from `Bridge::use_store`.
#[derive(Clone)]
pub struct Adapted<K: Container> {
    /// Per-field accessors over the container.
    pub store: Selectors<K>,
    /// The methods of the latest render.
    pub methods: Methods,
}

impl<K: Container> Adapted<K> {
    pub fn method(&self, name: &str) -> Result<&Method> {
        self.methods.get(name)
    }

    /// Call a method by name.
    pub fn call<A, R>(&self, name: &str, arg: A) -> Result<R>
    where
        A: 'static,
        R: 'static,
    {
        self.methods.call(name, arg)
    }

    /// The container behind the accessors.
    pub fn container(&self) -> &K {
        self.store.container()
    }
}

impl<K: Container> std::fmt::Debug for Adapted<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapted")
            .field("store", &self.store)
            .field("methods", &self.methods)
            .finish()
    }
}

struct ProviderInner<Args, C: StoreConfig> {
    source: SourceFn<Args>,
    config: Arc<C>,
    args: Mutex<Args>,
    hooks: Mutex<Hooks>,
    context: Arc<DistributionContext<C::Container>>,

    /// Tracked state of the latest commit.
    last_pushed: Mutex<TrackedState>,

    renders: AtomicU64,
    commits: AtomicU64,
    last_error: Mutex<Option<BridgeError>>,
}

impl<Args, C> ProviderInner<Args, C>
where
    Args: Clone + Send + Sync + 'static,
    C: StoreConfig,
{
    fn render_phase(&self) -> Result<TrackedState> {
        let args = self.args.lock().clone();
        let Split { tracked, methods } = {
            let mut hooks = self.hooks.lock();
            run_source(&self.source, &mut hooks, &args)?
        };

        {
            let last = self.last_pushed.lock();
            if !tracked.same_keys(&last) {
                return Err(BridgeError::ShapeChanged {
                    expected: last.key_names(),
                    found: tracked.key_names(),
                });
            }
        }

        *self.context.methods.write() = methods;
        let renders = self.renders.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(renders, "provider rendered");
        Ok(tracked)
    }

    fn commit_phase(&self, tracked: TrackedState) {
        let changed = {
            let mut last = self.last_pushed.lock();
            let changed = tracked.changed_fields(&last);
            if changed.is_empty() {
                trace!("tracked state unchanged, container left alone");
                return;
            }
            *last = tracked.clone();
            changed
        };

        let container = self.context.selectors.container();
        self.config.update_container(container, tracked);
        let commits = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(store = ?container.store().id(), ?changed, commits, "container updated");
    }
}

impl<Args, C> Render for ProviderInner<Args, C>
where
    Args: Clone + Send + Sync + 'static,
    C: StoreConfig,
{
    fn render(&self) -> Result<()> {
        let result = self.render_phase().map(|tracked| self.commit_phase(tracked));
        *self.last_error.lock() = result.as_ref().err().cloned();
        result
    }
}

/// A mounted scope of a bridge.
///
/// The container is created once, when the provider mounts, and lives as
/// long as the provider. Dropping the provider unmounts the scope.
pub struct Provider<Args, C: StoreConfig> {
    key: ContextKey,
    inner: Arc<ProviderInner<Args, C>>,
    trigger: Trigger,
}

impl<Args, C> Provider<Args, C>
where
    Args: Clone + Send + Sync + 'static,
    C: StoreConfig,
{
    /// First render: run the source and build the container from its
    /// tracked state.
    ///
    /// State written during the first render is committed before this
    /// returns.
    pub(crate) fn mount(
        key: ContextKey,
        source: SourceFn<Args>,
        config: Arc<C>,
        args: Args,
    ) -> Result<Self> {
        let trigger = Trigger::new();
        let mut hooks = Hooks::new(trigger.clone());
        let Split { tracked, methods } = run_source(&source, &mut hooks, &args)?;

        // Tracked fields the container left out stay declared, so their
        // reads fail as invariant violations until an update writes them.
        let container = config.create_container(tracked.clone());
        let selectors = Selectors::with_fields(container, tracked.keys());
        debug!(
            store = ?selectors.store().id(),
            fields = ?selectors.fields().collect::<Vec<_>>(),
            "container created"
        );

        let context = Arc::new(DistributionContext {
            selectors,
            methods: RwLock::new(methods),
            mounted: AtomicBool::new(true),
        });

        let inner = Arc::new(ProviderInner {
            source,
            config,
            args: Mutex::new(args),
            hooks: Mutex::new(hooks),
            context,
            last_pushed: Mutex::new(tracked),
            renders: AtomicU64::new(1),
            commits: AtomicU64::new(0),
            last_error: Mutex::new(None),
        });

        let target: Arc<dyn Render> = inner.clone();
        let target: Weak<dyn Render> = Arc::downgrade(&target);
        let provider = Self {
            key,
            inner,
            trigger,
        };
        provider.trigger.attach(target)?;
        Ok(provider)
    }

    /// Run `f` with this provider's context visible to `Bridge::use_store`.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        ambient::provide(self.key, self.inner.context.clone(), f)
    }

    /// Recompute with new arguments.
    ///
    /// The container is updated in place; its identity never changes.
    pub fn rerender(&self, args: Args) -> Result<()> {
        *self.inner.args.lock() = args;
        self.trigger.request()
    }

    /// Recompute with the current arguments.
    pub fn refresh(&self) -> Result<()> {
        self.trigger.request()
    }

    /// The re-evaluation trigger of this provider.
    pub fn trigger(&self) -> Trigger {
        self.trigger.clone()
    }

    pub fn args(&self) -> Args {
        self.inner.args.lock().clone()
    }

    pub fn container(&self) -> &C::Container {
        self.inner.context.selectors.container()
    }

    pub fn selectors(&self) -> &Selectors<C::Container> {
        &self.inner.context.selectors
    }

    /// The methods of the latest render.
    pub fn methods(&self) -> Methods {
        self.inner.context.methods()
    }

    /// Number of times the source has run, including the first render.
    pub fn render_count(&self) -> u64 {
        self.inner.renders.load(Ordering::SeqCst)
    }

    /// Number of container updates.
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Error of the latest recomputation, if it failed.
    pub fn last_error(&self) -> Option<BridgeError> {
        self.inner.last_error.lock().clone()
    }

    /// Tear down the scope. Same as dropping the provider.
    pub fn unmount(self) {}
}

impl<Args, C: StoreConfig> Drop for Provider<Args, C> {
    fn drop(&mut self) {
        let context = &self.inner.context;
        context.mounted.store(false, Ordering::SeqCst);
        let store = context.selectors.container().store();
        store.close();
        debug!(store = ?store.id(), "provider unmounted");
    }
}

impl<Args, C: StoreConfig> std::fmt::Debug for Provider<Args, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("store", &self.inner.context.selectors.store().id())
            .field("renders", &self.inner.renders.load(Ordering::SeqCst))
            .field("commits", &self.inner.commits.load(Ordering::SeqCst))
            .finish()
    }
}
