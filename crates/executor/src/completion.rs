//! One-shot completion slot
//!
//! The worker fills the slot exactly once; the caller blocks on it with a
//! fail-safe timeout. A [`Responder`] dropped without answering fills the
//! slot with an error so the caller is never left waiting on a command that
//! will not run.

use evtlog_core::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot<T> {
    value: Mutex<Option<Result<T>>>,
    done: Condvar,
}

impl<T> Slot<T> {
    fn fill(&self, result: Result<T>) {
        let mut value = self.value.lock();
        if value.is_none() {
            *value = Some(result);
            self.done.notify_all();
        }
    }
}

/// Create a connected responder / waiter pair.
pub fn completion<T>() -> (Responder<T>, Pending<T>) {
    let slot = Arc::new(Slot {
        value: Mutex::new(None),
        done: Condvar::new(),
    });
    (
        Responder {
            slot: Some(Arc::clone(&slot)),
        },
        Pending { slot },
    )
}

/// Worker side of a completion slot.
pub struct Responder<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Responder<T> {
    /// Store the outcome and wake the caller.
    pub fn send(mut self, result: Result<T>) {
        if let Some(slot) = self.slot.take() {
            slot.fill(result);
        }
    }
}

impl<T> Drop for Responder<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.fill(Err(Error::internal("command abandoned before completion")));
        }
    }
}

impl<T> std::fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("answered", &self.slot.is_none())
            .finish()
    }
}

/// Caller side of a completion slot.
pub struct Pending<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Pending<T> {
    /// Block until the outcome arrives or `failsafe` expires.
    ///
    /// Expiry is reported as [`Error::ExecutorTimeout`]; a late answer is
    /// discarded.
    pub fn wait(self, failsafe: Duration) -> Result<T> {
        let deadline = Instant::now() + failsafe;
        let mut value = self.slot.value.lock();
        loop {
            if let Some(result) = value.take() {
                return result;
            }
            if self.slot.done.wait_until(&mut value, deadline).timed_out() {
                return value.take().unwrap_or(Err(Error::ExecutorTimeout {
                    waited_ms: failsafe.as_millis() as u64,
                }));
            }
        }
    }

    /// True once the worker has answered.
    pub fn is_complete(&self) -> bool {
        self.slot.value.lock().is_some()
    }
}
