//! Field Values
//!
//! A `Value` is what a tracked field holds. It is type-erased so that one
//! store can carry fields of different types, and reference-counted so that
//! copying a snapshot never copies the payload.
//!
//! # Equality
//!
//! Change detection compares a field's new value against its previous one.
//! Two rules are available, chosen per value at construction. Value equality
//! is the default: `Value::new`, `TrackedState::with` and `Record::value` all
//! use it. Identity comparison is opt-in through the `shared` constructors.
//! A source computation builds fresh values on every run, so under identity
//! every field would count as changed on every run unless it sits behind an
//! `Arc` the computation keeps.
//!
//! - `Value::new` compares by `PartialEq` (identity short-circuits). This is
//!   the right rule for plain data such as counters, strings and flags, which
//!   a source computation rebuilds from scratch on every run.
//! - `Value::shared` compares by identity only. Two `Value`s are the same
//!   only if they point at the same allocation. Use it for large structures
//!   the source computation keeps behind an `Arc` and replaces wholesale.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

type EqFn = fn(&dyn Any, &dyn Any) -> bool;
type DebugFn = fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result;

fn eq_as<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn debug_as<T: fmt::Debug + 'static>(v: &dyn Any, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match v.downcast_ref::<T>() {
        Some(v) => v.fmt(f),
        None => f.write_str("?"),
    }
}

/// A type-erased, cheaply clonable field value.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    eq: Option<EqFn>,
    debug: Option<DebugFn>,
}

impl Value {
    /// Wrap a value compared by equality.
    pub fn new<T>(value: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
            eq: Some(eq_as::<T>),
            debug: Some(debug_as::<T>),
        }
    }

    /// Wrap a shared allocation compared by identity.
    pub fn shared<T>(value: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            inner: value,
            type_name: type_name::<T>(),
            eq: None,
            debug: None,
        }
    }

    /// Whether `other` should be treated as unchanged relative to `self`.
    pub fn same(&self, other: &Value) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match self.eq {
            Some(eq) => eq(&*self.inner, &*other.inner),
            None => false,
        }
    }

    /// Whether both values point at the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow the payload as `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Get a shared handle to the payload as `T`.
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// The Rust type name of the payload.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this value compares by identity only.
    pub fn is_identity_compared(&self) -> bool {
        self.eq.is_none()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.debug {
            Some(debug) => debug(&*self.inner, f),
            None => write!(f, "<{}>", self.type_name),
        }
    }
}
