//! Tracked State
//!
//! `TrackedState` is the field-name to value map a store holds. It is also
//! what the source computation reports on every run and what the provider
//! copies into the container.

use std::fmt::{self, Debug};
use std::sync::Arc;

use indexmap::map::{IntoIter, Iter};
use indexmap::IndexMap;

use super::Value;
use crate::error::{BridgeError, Result};

/// An ordered mapping from field name to value.
#[derive(Clone, Default)]
pub struct TrackedState {
    fields: IndexMap<&'static str, Value>,
}

impl TrackedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a value compared by equality.
    ///
    /// Use `with_shared` for a field that should change only when its
    /// allocation does.
    pub fn with<T>(mut self, field: &'static str, value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.fields.insert(field, Value::new(value));
        self
    }

    /// Builder-style insert of a shared value compared by identity.
    pub fn with_shared<T>(mut self, field: &'static str, value: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.fields.insert(field, Value::shared(value));
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, field: &'static str, value: Value) -> Option<Value> {
        self.fields.insert(field, value)
    }

    /// Remove a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Get a field's value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a clone of a field's payload as `T`.
    pub fn get_as<T>(&self, field: &str) -> Result<T>
    where
        T: Clone + 'static,
    {
        let value = self
            .fields
            .get(field)
            .ok_or_else(|| BridgeError::ContainerInvariant {
                field: field.to_string(),
            })?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| BridgeError::FieldType {
                field: field.to_string(),
                expected: std::any::type_name::<T>(),
                found: value.type_name(),
            })
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub fn iter(&self) -> Iter<'_, &'static str, Value> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overwrite fields present in `partial`, keeping every other field.
    pub fn merge(&mut self, partial: TrackedState) {
        for (field, value) in partial.fields {
            self.fields.insert(field, value);
        }
    }

    /// Fields of `self` that are missing from `prev` or differ from it.
    pub fn changed_fields(&self, prev: &TrackedState) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(field, value)| match prev.fields.get(*field) {
                Some(old) => !old.same(value),
                None => true,
            })
            .map(|(field, _)| *field)
            .collect()
    }

    /// Same key set, and every field unchanged under its equality rule.
    pub fn same_as(&self, other: &TrackedState) -> bool {
        self.fields.len() == other.fields.len() && self.changed_fields(other).is_empty()
    }

    /// Whether both states declare exactly the same keys.
    pub fn same_keys(&self, other: &TrackedState) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.keys().all(|k| other.fields.contains_key(k))
    }

    pub(crate) fn key_names(&self) -> Vec<String> {
        self.fields.keys().map(|k| k.to_string()).collect()
    }
}

impl Debug for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

impl FromIterator<(&'static str, Value)> for TrackedState {
    fn from_iter<I: IntoIterator<Item = (&'static str, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TrackedState {
    type Item = (&'static str, Value);
    type IntoIter = IntoIter<&'static str, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a TrackedState {
    type Item = (&'a &'static str, &'a Value);
    type IntoIter = Iter<'a, &'static str, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
