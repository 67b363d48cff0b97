//! Ambient Distribution
//!
//! A provider makes its distribution context visible to everything that
//! runs inside its scope. The scope is a thread-local stack: `provide`
//! pushes an entry for the duration of a closure, and `lookup` finds the
//! innermost entry for a key.
//!
//! Consumers outlive the closure they were mounted in, so they capture the
//! stack with `AmbientSnapshot::capture` and re-enter it on every later run.

use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies which bridge an ambient entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(u64);

impl ContextKey {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ContextKey {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AmbientEntry {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
}

thread_local! {
    static AMBIENT: RefCell<Vec<AmbientEntry>> = const { RefCell::new(Vec::new()) };
}

/// Pops the entries it pushed when dropped.
#[must_use = "the scope ends when the guard is dropped"]
pub struct AmbientGuard {
    depth: usize,
}

impl AmbientGuard {
    fn push(entries: impl IntoIterator<Item = AmbientEntry>) -> Self {
        AMBIENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            let depth = stack.len();
            stack.extend(entries);
            Self { depth }
        })
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        AMBIENT.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

/// Run `f` with `value` visible under `key`.
pub fn provide<R>(key: ContextKey, value: Arc<dyn Any + Send + Sync>, f: impl FnOnce() -> R) -> R {
    let _guard = AmbientGuard::push([AmbientEntry { key, value }]);
    f()
}

/// Innermost value provided under `key`, if it is a `T`.
pub fn lookup<T>(key: ContextKey) -> Option<Arc<T>>
where
    T: Send + Sync + 'static,
{
    let value = AMBIENT.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|entry| entry.key == key)
            .map(|entry| Arc::clone(&entry.value))
    })?;
    value.downcast::<T>().ok()
}

/// A copy of the ambient stack at one point in time.
#[derive(Clone, Default)]
pub struct AmbientSnapshot {
    entries: Vec<AmbientEntry>,
}

impl AmbientSnapshot {
    /// Capture the scopes visible on this thread right now.
    pub fn capture() -> Self {
        AMBIENT.with(|stack| Self {
            entries: stack.borrow().clone(),
        })
    }

    /// Make the captured scopes visible until the guard drops.
    pub fn enter(&self) -> AmbientGuard {
        AmbientGuard::push(self.entries.iter().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AmbientSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.key))
            .finish()
    }
}
