//! Consumer Implementation
//!
//! A Consumer is a computation that reads from stores through selectors and
//! re-runs whenever one of the fields it read changes. It plays the part a
//! component plays in a UI tree: it is mounted inside a provider scope,
//! reads a few fields, and re-evaluates only when those fields change.
//!
//! # How Consumers Work
//!
//! 1. When mounted, the consumer captures the ambient provider scopes and
//!    runs immediately to establish its subscriptions.
//!
//! 2. Every selector read during a run subscribes the consumer to that one
//!    field. Fields it did not read never wake it.
//!
//! 3. Before re-running, the consumer releases its old subscriptions and
//!    collects new ones during execution, so a consumer that stops reading a
//!    field stops hearing about it.
//!
//! 4. A notification that arrives while the consumer is already running is
//!    folded into one follow-up run after the current one completes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, trace};

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use crate::bridge::AmbientSnapshot;
use crate::error::{BridgeError, Result};
use crate::store::Subscription;

type RunFn = Box<dyn Fn() -> Result<()> + Send + Sync>;

struct ConsumerInner {
    /// The subscriber handed to stores; its callback re-runs this consumer.
    subscriber: Subscriber,

    /// The consumer body.
    run: RunFn,

    /// Provider scopes visible where the consumer was mounted.
    ambient: AmbientSnapshot,

    /// Subscriptions collected by the latest run.
    subscriptions: Mutex<Vec<Subscription>>,

    disposed: AtomicBool,
    running: AtomicBool,
    rerun: AtomicBool,
    run_count: AtomicUsize,

    /// Error of the latest run, if it failed.
    last_error: Mutex<Option<BridgeError>>,
}

impl ConsumerInner {
    fn execute(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.running.swap(true, Ordering::SeqCst) {
            self.rerun.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let result = loop {
            // Clear old subscriptions
            drop(std::mem::take(&mut *self.subscriptions.lock()));

            let result = {
                let _scope = self.ambient.enter();
                let ctx = ReactiveContext::enter(self.subscriber.clone());
                let result = (self.run)();
                *self.subscriptions.lock() = ctx.finish();
                result
            };

            let runs = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;
            trace!(consumer = ?self.subscriber.id(), runs, "consumer ran");

            if !self.rerun.swap(false, Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
                break result;
            }
        };

        self.running.store(false, Ordering::SeqCst);
        *self.last_error.lock() = result.as_ref().err().cloned();
        result
    }

    fn on_notify(weak: &Weak<ConsumerInner>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if let Err(err) = inner.execute() {
            error!(consumer = ?inner.subscriber.id(), %err, "consumer re-run failed");
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        drop(std::mem::take(&mut *self.subscriptions.lock()));
    }
}

/// A mounted reader that re-runs when the fields it read change.
///
/// Dropping the consumer unmounts it and releases its subscriptions.
///
/// # Example
///
/// ```rust,ignore
/// let consumer = provider.scope(|| {
///     Consumer::mount(move || {
///         let adapted = bridge.use_store()?;
///         println!("count = {}", adapted.store.get::<i32>("count")?);
///         Ok(())
///     })
/// })?;
/// ```
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

impl Consumer {
    /// Mount a consumer and run it once.
    ///
    /// An error from the first run is returned and nothing stays mounted.
    pub fn mount<F>(run: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<ConsumerInner>| {
            let weak = weak.clone();
            ConsumerInner {
                subscriber: Subscriber::new(move || ConsumerInner::on_notify(&weak)),
                run: Box::new(run),
                ambient: AmbientSnapshot::capture(),
                subscriptions: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
                last_error: Mutex::new(None),
            }
        });

        inner.execute()?;
        Ok(Self { inner })
    }

    /// Get the subscriber ID for this consumer.
    pub fn id(&self) -> SubscriberId {
        self.inner.subscriber.id()
    }

    /// Run the consumer now, regardless of notifications.
    pub fn execute(&self) -> Result<()> {
        self.inner.execute()
    }

    /// Unmount the consumer. It will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the consumer has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the consumer has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of fields the latest run subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Error returned by the latest run, if any.
    pub fn last_error(&self) -> Option<BridgeError> {
        self.inner.last_error.lock().clone()
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
