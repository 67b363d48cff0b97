//! Hook State
//!
//! A source computation runs from scratch on every recomputation, so any
//! state it keeps between runs lives here, in slots owned by its provider.
//! Slots are matched to calls by position: the n-th `use_state` call of a
//! run gets the n-th slot. Calling hooks conditionally breaks that pairing
//! and is reported as `HookOrder`.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use super::Trigger;
use crate::error::{BridgeError, Result};

type Slot = Arc<dyn Any + Send + Sync>;

/// Per-provider hook slots, handed to the source computation on each run.
pub struct Hooks {
    slots: Vec<Slot>,
    cursor: usize,
    mounted: bool,
    trigger: Trigger,
}

impl Hooks {
    pub(crate) fn new(trigger: Trigger) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            mounted: false,
            trigger,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
    }

    /// Close a run, checking it used every slot the first run created.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if self.mounted && self.cursor != self.slots.len() {
            return Err(BridgeError::HookOrder { index: self.cursor });
        }
        self.mounted = true;
        Ok(())
    }

    /// State that survives recomputations.
    ///
    /// `init` runs on the first render only. The setter stores a new value
    /// and requests a recomputation of the provider.
    pub fn use_state<T, F>(&mut self, init: F) -> Result<(T, Setter<T>)>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let index = self.cursor;
        self.cursor += 1;

        let cell = match self.slots.get(index) {
            Some(slot) => Arc::clone(slot)
                .downcast::<Mutex<T>>()
                .map_err(|_| BridgeError::HookOrder { index })?,
            None if self.mounted => return Err(BridgeError::HookOrder { index }),
            None => {
                let cell = Arc::new(Mutex::new(init()));
                self.slots.push(cell.clone());
                cell
            }
        };

        let value = cell.lock().clone();
        let setter = Setter {
            cell,
            trigger: self.trigger.clone(),
        };
        Ok((value, setter))
    }

    /// The re-evaluation trigger of the owning provider.
    ///
    /// Hand it to whatever owns an input the source reads from outside hook
    /// state.
    pub fn trigger(&self) -> Trigger {
        self.trigger.clone()
    }

    /// Whether this is the first run of the source.
    pub fn is_first_render(&self) -> bool {
        !self.mounted
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("slots", &self.slots.len())
            .field("cursor", &self.cursor)
            .field("mounted", &self.mounted)
            .finish()
    }
}

/// Writes one hook slot and schedules a recomputation.
pub struct Setter<T> {
    cell: Arc<Mutex<T>>,
    trigger: Trigger,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            trigger: self.trigger.clone(),
        }
    }
}

impl<T> Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Store `value` and recompute.
    pub fn set(&self, value: T) {
        *self.cell.lock() = value;
        self.request();
    }

    /// Store `f(current)` and recompute.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        {
            let mut cell = self.cell.lock();
            let next = f(&cell);
            *cell = next;
        }
        self.request();
    }

    /// The value currently stored, which may be newer than the last render.
    pub fn get(&self) -> T {
        self.cell.lock().clone()
    }

    fn request(&self) {
        if let Err(err) = self.trigger.request() {
            error!(state = type_name::<T>(), %err, "recomputation after state update failed");
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("state", &type_name::<T>())
            .finish()
    }
}
