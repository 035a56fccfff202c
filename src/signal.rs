//! Load completion signal and cancellation token
//!
//! A `LoadSignal` is handed out by `View::load_url` and completed by the view
//! when its load-finished event fires. Signals are observed on the view's own
//! thread, so they are `Rc`-backed; the cancellation token may be flipped
//! from any thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observable state of a `LoadSignal`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Completed,
    Failed(String),
}

#[derive(Debug)]
struct SignalInner {
    status: LoadStatus,
    completions: u32,
}

/// Completion signal for one navigation
#[derive(Debug, Clone)]
pub struct LoadSignal {
    inner: Rc<RefCell<SignalInner>>,
}

impl LoadSignal {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                status: LoadStatus::Pending,
                completions: 0,
            })),
        }
    }

    /// Current status
    pub fn status(&self) -> LoadStatus {
        self.inner.borrow().status.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.borrow().status == LoadStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.inner.borrow().status == LoadStatus::Completed
    }

    /// Number of times the load-finished event completed this signal.
    pub fn completions(&self) -> u32 {
        self.inner.borrow().completions
    }

    /// Mark the load finished. Only the first transition out of `Pending`
    /// changes the status.
    pub(crate) fn complete(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.status == LoadStatus::Pending {
            inner.status = LoadStatus::Completed;
            inner.completions += 1;
        }
    }

    pub(crate) fn fail(&self, reason: impl Into<String>) {
        let mut inner = self.inner.borrow_mut();
        if inner.status == LoadStatus::Pending {
            inner.status = LoadStatus::Failed(reason.into());
        }
    }
}

/// Cooperative cancellation flag shared between a waiter and its controller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
