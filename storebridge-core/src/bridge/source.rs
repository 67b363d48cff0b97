//! Source Computation Results
//!
//! Every run of a source computation yields tracked state and methods. The
//! canonical form is `Split`, where the computation sorts its own result
//! into the two halves. The keyed form returns one flat `Record` and lets
//! the bridge pick the halves out by name.

use std::any::{type_name, Any};
use std::fmt::{self, Debug};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{BridgeError, Result};
use crate::store::{TrackedState, Value};

/// A type-erased callable exposed by a source computation.
///
/// Methods are never compared for change detection. The provider replaces
/// them wholesale on every run, so a closure always sees the values of the
/// run that created it.
#[derive(Clone)]
pub struct Method {
    inner: Arc<dyn Any + Send + Sync>,
    signature: &'static str,
}

impl Method {
    /// Wrap a closure taking one argument.
    ///
    /// Closures with several arguments take a tuple; closures without any
    /// take `()`.
    pub fn new<A, R, F>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let f: Arc<dyn Fn(A) -> R + Send + Sync> = Arc::new(f);
        Self {
            inner: Arc::new(f),
            signature: type_name::<fn(A) -> R>(),
        }
    }

    /// The typed closure, if it was created as `Fn(A) -> R`.
    pub fn typed<A, R>(&self) -> Option<Arc<dyn Fn(A) -> R + Send + Sync>>
    where
        A: 'static,
        R: 'static,
    {
        self.inner
            .downcast_ref::<Arc<dyn Fn(A) -> R + Send + Sync>>()
            .cloned()
    }

    /// Call the method. `None` if the signature does not match.
    pub fn call<A, R>(&self, arg: A) -> Option<R>
    where
        A: 'static,
        R: 'static,
    {
        self.typed::<A, R>().map(|f| f(arg))
    }

    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// Whether both handles wrap the same closure.
    pub fn ptr_eq(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({})", self.signature)
    }
}

/// Named methods exposed to consumers.
#[derive(Clone, Default)]
pub struct Methods {
    entries: IndexMap<&'static str, Method>,
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a closure.
    pub fn with<A, R, F>(mut self, name: &'static str, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.entries.insert(name, Method::new(f));
        self
    }

    pub fn insert(&mut self, name: &'static str, method: Method) -> Option<Method> {
        self.entries.insert(name, method)
    }

    /// Look up a method by name.
    pub fn get(&self, name: &str) -> Result<&Method> {
        self.entries
            .get(name)
            .ok_or_else(|| BridgeError::UnknownMethod {
                name: name.to_string(),
            })
    }

    /// Look up a method and call it with `arg`.
    pub fn call<A, R>(&self, name: &str, arg: A) -> Result<R>
    where
        A: 'static,
        R: 'static,
    {
        let method = self.get(name)?;
        let f = method
            .typed::<A, R>()
            .ok_or_else(|| BridgeError::MethodSignature {
                name: name.to_string(),
                expected: type_name::<fn(A) -> R>(),
                found: method.signature(),
            })?;
        Ok(f(arg))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Debug for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// A source computation's result, already sorted into its two halves.
#[derive(Clone, Debug, Default)]
pub struct Split {
    pub tracked: TrackedState,
    pub methods: Methods,
}

impl Split {
    pub fn new(tracked: TrackedState, methods: Methods) -> Self {
        Self { tracked, methods }
    }
}

/// One entry of a flat `Record`.
#[derive(Clone, Debug)]
pub enum Slot {
    Value(Value),
    Method(Method),
}

/// A flat source result, picked apart by key lists.
#[derive(Clone, Debug, Default)]
pub struct Record {
    entries: IndexMap<&'static str, Slot>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value compared by equality.
    pub fn value<T>(mut self, key: &'static str, value: T) -> Self
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        self.entries.insert(key, Slot::Value(Value::new(value)));
        self
    }

    /// Add a shared value compared by identity.
    pub fn shared<T>(mut self, key: &'static str, value: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.entries.insert(key, Slot::Value(Value::shared(value)));
        self
    }

    /// Add a method.
    pub fn method<A, R, F>(mut self, key: &'static str, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.entries.insert(key, Slot::Method(Method::new(f)));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.entries.get(key)
    }

    /// Select `state_keys` as tracked state and `action_keys` as methods.
    ///
    /// Keys absent from the record are skipped. A key present under the
    /// wrong kind of slot is an error.
    pub fn pick(&self, state_keys: &[&'static str], action_keys: &[&'static str]) -> Result<Split> {
        let mut split = Split::default();

        for &key in state_keys {
            match self.entries.get(key) {
                Some(Slot::Value(value)) => {
                    split.tracked.insert(key, value.clone());
                }
                Some(Slot::Method(_)) => {
                    return Err(BridgeError::SlotKind {
                        key: key.to_string(),
                        expected: "value",
                    })
                }
                None => {}
            }
        }

        for &key in action_keys {
            match self.entries.get(key) {
                Some(Slot::Method(method)) => {
                    split.methods.insert(key, method.clone());
                }
                Some(Slot::Value(_)) => {
                    return Err(BridgeError::SlotKind {
                        key: key.to_string(),
                        expected: "method",
                    })
                }
                None => {}
            }
        }

        Ok(split)
    }
}
