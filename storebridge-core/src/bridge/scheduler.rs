//! Render Scheduler
//!
//! The scheduler decides when a provider recomputes its source and commits
//! the result. Each provider owns one.
//!
//! # Algorithm
//!
//! Requests are counted, not coalesced:
//!
//! 1. A request while the scheduler is idle starts a flush on the calling
//!    thread.
//! 2. A request made during a flush (from a setter called inside a method,
//!    a consumer re-run, or the source itself) only bumps the pending count.
//! 3. The flush loop takes one pending request at a time and runs a full
//!    render followed by its commit before taking the next one.
//! 4. Requests made before the provider is attached (during its first
//!    render) wait, and are flushed when it attaches.
//!
//! This keeps container updates in recomputation order and never applies
//! the update of render N after render N+1 has started.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::Result;

/// Something the scheduler can render and commit.
pub(crate) trait Render: Send + Sync {
    fn render(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct QueueState {
    pending: usize,
    flushing: bool,
}

struct Scheduler {
    target: OnceLock<Weak<dyn Render>>,
    queue: Mutex<QueueState>,
}

impl Scheduler {
    fn flush(&self) -> Result<()> {
        let mut first_error = None;

        loop {
            {
                let mut queue = self.queue.lock();
                if queue.pending == 0 {
                    queue.flushing = false;
                    break;
                }
                queue.pending -= 1;
            }

            let Some(weak) = self.target.get() else {
                // Not attached yet: keep the request for `attach` to run.
                let mut queue = self.queue.lock();
                queue.pending += 1;
                queue.flushing = false;
                trace!(pending = queue.pending, "render deferred until attach");
                break;
            };

            let Some(target) = weak.upgrade() else {
                trace!("render requested with nothing mounted");
                let mut queue = self.queue.lock();
                queue.pending = 0;
                queue.flushing = false;
                break;
            };

            if let Err(err) = target.render() {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    warn!(%err, "queued render failed");
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Explicit re-evaluation trigger for one provider.
///
/// Whatever owns the inputs of a source computation calls `request` after
/// changing them. Setters returned by `Hooks::use_state` do so on their own.
#[derive(Clone)]
pub struct Trigger {
    scheduler: Arc<Scheduler>,
}

impl Trigger {
    pub(crate) fn new() -> Self {
        Self {
            scheduler: Arc::new(Scheduler {
                target: OnceLock::new(),
                queue: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Point the trigger at the provider it renders.
    ///
    /// Requests made before this point, such as a setter called during the
    /// first render, are flushed here.
    pub(crate) fn attach(&self, target: Weak<dyn Render>) -> Result<()> {
        if self.scheduler.target.set(target).is_err() {
            warn!("trigger attached twice");
            return Ok(());
        }

        {
            let mut queue = self.scheduler.queue.lock();
            if queue.pending == 0 || queue.flushing {
                return Ok(());
            }
            queue.flushing = true;
        }
        self.scheduler.flush()
    }

    /// Ask for one recomputation and commit.
    ///
    /// Runs the flush on this thread if none is in progress and returns the
    /// first render error of that flush. Inside a flush the request is
    /// queued and `Ok` is returned immediately.
    pub fn request(&self) -> Result<()> {
        {
            let mut queue = self.scheduler.queue.lock();
            queue.pending += 1;
            if queue.flushing {
                trace!(pending = queue.pending, "render queued");
                return Ok(());
            }
            queue.flushing = true;
        }
        self.scheduler.flush()
    }

    /// Whether a flush is running right now.
    pub fn is_flushing(&self) -> bool {
        self.scheduler.queue.lock().flushing
    }

    /// Requests waiting behind the current flush.
    pub fn pending(&self) -> usize {
        self.scheduler.queue.lock().pending
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.scheduler.queue.lock();
        f.debug_struct("Trigger")
            .field("pending", &queue.pending)
            .field("flushing", &queue.flushing)
            .finish()
    }
}
