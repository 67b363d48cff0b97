//! Selector Layer
//!
//! `Selectors` is a read-only view over a container with one accessor per
//! field. The field set is taken from the container's state, plus any fields
//! declared up front, when the view is built and never grows afterwards.
//!
//! Reading a field through its `Selector` inside a running consumer
//! subscribes that consumer to the one field. A write that leaves the field
//! equal to its previous value does not wake the consumer, whatever else the
//! write changed.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexSet;

use super::{Container, Store, Subscription, Value};
use crate::error::{BridgeError, Result};
use crate::reactive::{Dependency, ReactiveContext, Subscriber};

/// Per-field accessors over a container.
#[derive(Clone)]
pub struct Selectors<C: Container> {
    container: C,
    fields: Arc<IndexSet<&'static str>>,
}

impl<C: Container> Selectors<C> {
    /// Build accessors for every field the container holds right now.
    pub fn new(container: C) -> Self {
        let fields = container.store().state().keys().collect();
        Self {
            container,
            fields: Arc::new(fields),
        }
    }

    /// Build accessors for `fields` plus every field the container holds.
    ///
    /// A field in `fields` that the container lacks is still declared:
    /// reading it fails with `ContainerInvariant` until something writes it.
    pub fn with_fields<I>(container: C, fields: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        let mut declared: IndexSet<&'static str> = fields.into_iter().collect();
        declared.extend(container.store().state().keys());
        Self {
            container,
            fields: Arc::new(declared),
        }
    }

    /// The container the accessors read from.
    pub fn container(&self) -> &C {
        &self.container
    }

    /// The store inside the container.
    pub fn store(&self) -> &Store {
        self.container.store()
    }

    /// Field names, in the order the container declared them.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Get the accessor for `field`.
    pub fn select<T>(&self, field: &str) -> Result<Selector<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let field = self
            .fields
            .get(field)
            .copied()
            .ok_or_else(|| BridgeError::UndeclaredField {
                field: field.to_string(),
            })?;
        Ok(Selector {
            store: self.container.store().clone(),
            field,
            _marker: PhantomData,
        })
    }

    /// Tracked read of `field`, shorthand for `select(field)?.get()`.
    pub fn get<T>(&self, field: &str) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.select::<T>(field)?.get()
    }
}

impl<C: Container> fmt::Debug for Selectors<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selectors")
            .field("store", &self.container.store().id())
            .field("fields", &self.fields)
            .finish()
    }
}

/// Accessor for one field, typed as `T`.
pub struct Selector<T> {
    store: Store,
    field: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            field: self.field,
            _marker: PhantomData,
        }
    }
}

impl<T> Selector<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Read the field, subscribing the running consumer to it.
    pub fn get(&self) -> Result<T> {
        self.track();
        self.get_untracked()
    }

    /// Read the field without subscribing anyone.
    pub fn get_untracked(&self) -> Result<T> {
        let value = self.raw()?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| BridgeError::FieldType {
                field: self.field.to_string(),
                expected: type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// Read the type-erased value, subscribing the running consumer to it.
    pub fn value(&self) -> Result<Value> {
        self.track();
        self.raw()
    }

    /// Call `f` with the new value after every change of this field.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let reader = self.clone();
        self.store.watch_field(
            self.field,
            Subscriber::new(move || {
                if let Ok(value) = reader.get_untracked() {
                    f(value);
                }
            }),
        )
    }

    fn raw(&self) -> Result<Value> {
        self.store
            .get(self.field)
            .ok_or_else(|| BridgeError::ContainerInvariant {
                field: self.field.to_string(),
            })
    }

    fn track(&self) {
        let dependency = Dependency {
            store: self.store.id(),
            field: self.field,
        };
        ReactiveContext::track_dependency(dependency, |subscriber| {
            self.store.watch_field(self.field, subscriber)
        });
    }
}

impl<T> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("store", &self.store.id())
            .field("field", &self.field)
            .field("type", &type_name::<T>())
            .finish()
    }
}
