//! Completion handles
//!
//! `promise()` creates the two halves of one operation's result channel:
//! - `Promise`: owned by the worker side, resolved at most once. Dropping an
//!   unresolved promise resolves it with an error, so no caller waits forever.
//! - `ResponseFuture`: owned by the caller; supports blocking, bounded,
//!   interruptible and polling waits.
//!
//! A failed wait (timeout, interruption) is itself a classified error and also
//! marks the request cancelled so the worker stops retrying.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use crossbeam::select;
use parking_lot::Mutex;

use crate::error::{ClientError, Result};
use crate::taxonomy::ClassifiedError;

/// What a waiter needs to render its own timeout / interruption diagnostics
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    pub meta_server: String,
    pub table: String,
    pub request: String,
    pub timeout_ms: u64,
}

struct Shared {
    cancelled: AtomicBool,
}

/// Create a connected promise / future pair
pub fn promise<T>(context: WaitContext) -> (Promise<T>, ResponseFuture<T>) {
    let (tx, rx) = channel::bounded(1);
    let shared = Arc::new(Shared {
        cancelled: AtomicBool::new(false),
    });
    let promise = Promise {
        tx: Some(tx),
        shared: Arc::clone(&shared),
    };
    let future = ResponseFuture {
        rx,
        shared,
        context,
    };
    (promise, future)
}

fn dropped() -> ClientError {
    ClientError::message("request dropped before completion")
}

// =============================================================================
// Promise
// =============================================================================

/// Worker half of a completion handle
pub struct Promise<T> {
    tx: Option<Sender<Result<T>>>,
    shared: Arc<Shared>,
}

impl<T> Promise<T> {
    /// Resolve the promise; returns false if it was already resolved
    pub fn complete(&mut self, result: Result<T>) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The caller may have stopped waiting; the result is then discarded
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.tx.is_none()
    }

    /// Whether the caller gave up on this operation
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(dropped()));
        }
    }
}

// =============================================================================
// ResponseFuture
// =============================================================================

/// Caller half of a completion handle
pub struct ResponseFuture<T> {
    rx: Receiver<Result<T>>,
    shared: Arc<Shared>,
    context: WaitContext,
}

impl<T> ResponseFuture<T> {
    /// A future that is already resolved
    pub fn ready(result: Result<T>, context: WaitContext) -> Self {
        let (mut promise, future) = promise(context);
        promise.complete(result);
        future
    }

    /// Block until the operation resolves
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or_else(|_| Err(dropped()))
    }

    /// Block for at most `timeout`
    ///
    /// On expiry the request is cancelled and an `ERR_TIMEOUT` diagnostic
    /// reporting `timeout` is returned.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T> {
        let reported_ms = timeout.as_millis() as u64;
        self.wait_reporting(timeout, reported_ms)
    }

    /// Bounded wait that reports `reported_ms` instead of the waited duration
    pub(crate) fn wait_reporting(self, timeout: Duration, reported_ms: u64) -> Result<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.cancel();
                let context = &self.context;
                Err(ClassifiedError::timeout(
                    &context.meta_server,
                    &context.table,
                    &context.request,
                    reported_ms,
                    format!("no result after {}ms", timeout.as_millis()),
                )
                .into())
            }
            Err(RecvTimeoutError::Disconnected) => Err(dropped()),
        }
    }

    /// Block until the operation resolves or `interrupter` fires
    pub fn wait_interruptible(self, interrupter: &Interrupter) -> Result<T> {
        select! {
            recv(self.rx) -> result => result.unwrap_or_else(|_| Err(dropped())),
            recv(interrupter.inner.signal) -> _ => {
                self.cancel();
                Err(ClassifiedError::thread_interrupted(&self.context.table, interrupter.reason()).into())
            }
        }
    }

    /// Non-blocking poll; yields the outcome once, then `None`
    pub fn try_get(&mut self) -> Option<Result<T>> {
        self.rx.try_recv().ok()
    }

    /// Tell the worker the caller no longer wants the result
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    pub fn context(&self) -> &WaitContext {
        &self.context
    }
}

// =============================================================================
// Interrupter
// =============================================================================

/// Cancellation signal for interruptible waits
///
/// Clones share one signal. Firing it wakes every current and future waiter.
#[derive(Clone)]
pub struct Interrupter {
    inner: Arc<InterruptState>,
}

struct InterruptState {
    /// Dropped (set to None) to fire the signal
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
    reason: Mutex<String>,
}

impl Interrupter {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            inner: Arc::new(InterruptState {
                trigger: Mutex::new(Some(tx)),
                signal: rx,
                reason: Mutex::new(String::new()),
            }),
        }
    }

    /// Fire the signal; the first reason wins
    pub fn interrupt(&self, reason: impl Into<String>) {
        let mut trigger = self.inner.trigger.lock();
        if trigger.is_some() {
            *self.inner.reason.lock() = reason.into();
            trigger.take();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.trigger.lock().is_none()
    }

    pub fn reason(&self) -> String {
        self.inner.reason.lock().clone()
    }
}

impl Default for Interrupter {
    fn default() -> Self {
        Self::new()
    }
}
