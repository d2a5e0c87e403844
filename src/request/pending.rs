//! Pending requests
//!
//! One `PendingRequest` exists per logical caller operation; retries reuse it.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::base::Gpid;
use crate::error::Result;
use crate::taxonomy::ClassifiedError;

use super::{OperationKind, Promise, Request};

/// Position of a request in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Sent,
    Retrying,
}

/// An in-flight operation
pub struct PendingRequest<T> {
    pub operation: OperationKind,
    pub request: Request,
    pub body: Bytes,
    pub gpid: Gpid,

    /// Effective timeout in milliseconds (the caller's, or the floor)
    pub timeout_ms: u64,

    /// Decodes a successful reply payload
    pub decode: fn(&[u8]) -> Result<T>,

    attempts: u32,
    state: RequestState,
    deadline: Instant,
    promise: Promise<T>,
}

impl<T> PendingRequest<T> {
    pub fn new(
        operation: OperationKind,
        request: Request,
        body: Bytes,
        gpid: Gpid,
        timeout: Duration,
        decode: fn(&[u8]) -> Result<T>,
        promise: Promise<T>,
    ) -> Self {
        Self {
            operation,
            request,
            body,
            gpid,
            timeout_ms: timeout.as_millis() as u64,
            decode,
            attempts: 0,
            state: RequestState::Created,
            deadline: Instant::now() + timeout,
            promise,
        }
    }

    /// Time left before the absolute deadline, `None` once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.promise.is_cancelled()
    }

    /// SENT: one more attempt goes out
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.state = RequestState::Sent;
    }

    /// RETRYING: the last attempt failed and another one will follow
    pub fn mark_retrying(&mut self) {
        self.state = RequestState::Retrying;
    }

    /// SUCCEEDED
    pub fn succeed(mut self, value: T) {
        self.promise.complete(Ok(value));
    }

    /// FAILED
    pub fn fail(mut self, error: ClassifiedError) {
        self.promise.complete(Err(error.into()));
    }
}
