//! Reactive Context
//!
//! The reactive context tracks which consumer is currently running. This
//! enables automatic subscription: when a selector is read, the running
//! consumer is subscribed to exactly that field of exactly that store.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing consumer.
//! When a consumer runs, we push its subscriber onto the stack. When the run
//! completes, we pop it and hand back the subscriptions collected on the way.
//!
//! This design supports nested consumers (e.g., a consumer mounted from
//! inside another consumer's run).

use std::cell::RefCell;

use smallvec::SmallVec;

use super::{Subscriber, SubscriberId};
use crate::store::{StoreId, Subscription};

/// A field of a particular store that a consumer read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub store: StoreId,
    pub field: &'static str,
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The subscriber of the running consumer.
    subscriber: Subscriber,
    /// Fields read during this run, in first-read order.
    dependencies: SmallVec<[Dependency; 4]>,
    /// Subscription guards for those fields.
    subscriptions: Vec<Subscription>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any selector that is read will
    /// subscribe the subscriber to its field.
    pub fn enter(subscriber: Subscriber) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: SmallVec::new(),
                subscriptions: Vec::new(),
            });
        });

        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<Subscriber> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber.clone()))
    }

    /// Record a dependency for the running consumer.
    ///
    /// `subscribe` is called at most once per dependency and run, with the
    /// running consumer's subscriber. Returns whether the dependency was new.
    pub fn track_dependency<F>(dependency: Dependency, subscribe: F) -> bool
    where
        F: FnOnce(Subscriber) -> Subscription,
    {
        let subscriber = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            if entry.dependencies.contains(&dependency) {
                return None;
            }
            entry.dependencies.push(dependency);
            Some(entry.subscriber.clone())
        });

        let Some(subscriber) = subscriber else {
            return false;
        };

        // The store takes its own lock here, so the stack must not be borrowed.
        let subscription = subscribe(subscriber);
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.subscriptions.push(subscription);
            }
        });
        true
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Vec<Dependency> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.to_vec())
                .unwrap_or_default()
        })
    }

    /// Exit the context and take ownership of its subscriptions.
    pub fn finish(mut self) -> Vec<Subscription> {
        self.finished = true;
        self.pop().map(|entry| entry.subscriptions).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        // This helps catch bugs where contexts are mismatched.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.subscriber.id()
            );
        }
        popped
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            // Subscriptions of an abandoned run are released here.
            drop(self.pop());
        }
    }
}
