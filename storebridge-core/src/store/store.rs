//! Store Implementation
//!
//! A Store is the identity-stable container that holds the current tracked
//! state. Consumers never replace it; they read it, and the provider writes
//! into it.
//!
//! # How Stores Work
//!
//! 1. A write merges a partial state into the current one under a single
//!    lock, so readers see the state from before or after the write, never
//!    a mix.
//!
//! 2. The write computes which fields changed, using each value's own
//!    equality rule, and releases the lock.
//!
//! 3. Watchers of the changed fields are notified, each one at most once
//!    per write even if it watches several changed fields. Whole-state
//!    listeners are notified after them.
//!
//! # Observer Table
//!
//! Field watchers live in a table keyed by field name. This is what gives
//! selectors their isolation: a write to `b` never looks at the watchers of
//! `a`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use super::{TrackedState, Value};
use crate::reactive::{Subscriber, SubscriberId};

/// Unique identifier for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Listener = Arc<dyn Fn(&TrackedState, &TrackedState) + Send + Sync>;

#[derive(Default)]
struct Observers {
    fields: IndexMap<&'static str, SmallVec<[Subscriber; 4]>>,
    listeners: Vec<(SubscriberId, Listener)>,
    closed: bool,
}

struct StoreInner {
    id: StoreId,
    state: RwLock<TrackedState>,
    observers: RwLock<Observers>,
}

impl StoreInner {
    fn remove(&self, id: SubscriberId, field: Option<&'static str>) {
        let mut observers = self.observers.write();
        match field {
            Some(field) => {
                if let Some(watchers) = observers.fields.get_mut(field) {
                    watchers.retain(|s| s.id() != id);
                }
            }
            None => observers.listeners.retain(|(s, _)| *s != id),
        }
    }
}

/// Guard for a store subscription.
///
/// Dropping it removes the watcher or listener it was created for.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: SubscriberId,
    field: Option<&'static str>,
}

impl Subscription {
    fn inert(id: SubscriberId, field: Option<&'static str>) -> Self {
        Self {
            store: Weak::new(),
            id,
            field,
        }
    }

    /// The subscriber this subscription was registered for.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    /// The watched field, or `None` for a whole-state listener.
    pub fn field(&self) -> Option<&'static str> {
        self.field
    }

    /// Remove the subscription now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.remove(self.id, self.field);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("field", &self.field)
            .finish()
    }
}

/// The default container: a subscribable holder of tracked state.
///
/// Clones are handles to the same store.
///
/// # Example
///
/// ```rust,ignore
/// let store = Store::new(TrackedState::new().with("count", 5));
///
/// let _sub = store.subscribe(|next, _prev| println!("{next:?}"));
/// store.set_state(TrackedState::new().with("count", 6));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store holding `initial`.
    pub fn new(initial: TrackedState) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: StoreId::next(),
                state: RwLock::new(initial),
                observers: RwLock::new(Observers::default()),
            }),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snapshot of the full current state.
    pub fn state(&self) -> TrackedState {
        self.inner.state.read().clone()
    }

    /// Current value of one field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.state.read().get(field).cloned()
    }

    /// Merge `partial` into the state and notify observers of changed fields.
    pub fn set_state(&self, partial: TrackedState) {
        let (next, prev, changed) = {
            let mut state = self.inner.state.write();
            let prev = state.clone();
            state.merge(partial);
            let changed = state.changed_fields(&prev);
            (state.clone(), prev, changed)
        };
        self.notify(&changed, &next, &prev);
    }

    /// Replace the whole state. Fields absent from `next` are removed.
    pub fn replace_state(&self, next: TrackedState) {
        let (next, prev, changed) = {
            let mut state = self.inner.state.write();
            let prev = std::mem::replace(&mut *state, next);
            let mut changed = state.changed_fields(&prev);
            changed.extend(prev.keys().filter(|k| !state.contains_key(k)));
            (state.clone(), prev, changed)
        };
        self.notify(&changed, &next, &prev);
    }

    /// Compute a partial state from the current one and merge it.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&TrackedState) -> TrackedState,
    {
        let partial = f(&self.state());
        self.set_state(partial);
    }

    /// Register a listener called with `(next, prev)` after every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TrackedState, &TrackedState) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        let mut observers = self.inner.observers.write();
        if observers.closed {
            return Subscription::inert(id, None);
        }
        observers.listeners.push((id, Arc::new(listener)));
        self.subscription(id, None)
    }

    /// Add `subscriber` to the watchers of `field`.
    ///
    /// A subscriber already watching the field is not added twice.
    pub fn watch_field(&self, field: &'static str, subscriber: Subscriber) -> Subscription {
        let id = subscriber.id();
        let mut observers = self.inner.observers.write();
        if observers.closed {
            return Subscription::inert(id, Some(field));
        }
        let watchers = observers.fields.entry(field).or_default();
        if !watchers.iter().any(|s| s.id() == id) {
            watchers.push(subscriber);
        }
        self.subscription(id, Some(field))
    }

    /// Release every watcher and listener at once.
    ///
    /// Later subscriptions are accepted but never registered. State can
    /// still be read and written.
    pub fn close(&self) {
        let mut observers = self.inner.observers.write();
        observers.fields.clear();
        observers.listeners.clear();
        observers.closed = true;
        trace!(store = ?self.inner.id, "store closed");
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.observers.read().closed
    }

    /// Number of watchers registered on `field`.
    pub fn watcher_count(&self, field: &str) -> usize {
        self.inner
            .observers
            .read()
            .fields
            .get(field)
            .map_or(0, |w| w.len())
    }

    /// Number of whole-state listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.observers.read().listeners.len()
    }

    /// Total number of watchers and listeners.
    pub fn subscriber_count(&self) -> usize {
        let observers = self.inner.observers.read();
        observers.fields.values().map(|w| w.len()).sum::<usize>() + observers.listeners.len()
    }

    fn subscription(&self, id: SubscriberId, field: Option<&'static str>) -> Subscription {
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
            field,
        }
    }

    fn notify(&self, changed: &[&'static str], next: &TrackedState, prev: &TrackedState) {
        if changed.is_empty() {
            return;
        }
        trace!(store = ?self.inner.id, ?changed, "store changed");

        // Copy observers out so that none of them runs under our lock.
        let (watchers, listeners) = {
            let observers = self.inner.observers.read();
            let mut watchers: SmallVec<[Subscriber; 8]> = SmallVec::new();
            for field in changed {
                for subscriber in observers.fields.get(field).into_iter().flatten() {
                    if !watchers.iter().any(|s| s.id() == subscriber.id()) {
                        watchers.push(subscriber.clone());
                    }
                }
            }
            let listeners: Vec<Listener> = observers
                .listeners
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            (watchers, listeners)
        };

        for subscriber in watchers {
            subscriber.notify();
        }
        for listener in listeners {
            listener(next, prev);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("state", &*self.inner.state.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
