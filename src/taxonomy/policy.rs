//! Error classification policy
//!
//! Which remote codes mean "routing is stale", which mean "try again later"
//! and which are final. The sets are configurable because servers grow new
//! codes faster than clients are released.

use std::collections::HashSet;

use crate::base::ErrorCode;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller's wait was cancelled
    ThreadInterrupted,

    /// No reply within the remaining deadline
    Timeout,

    /// The replica no longer serves the partition; routing is stale
    NotServing,

    /// Overload or temporary unavailability on the replica
    TransientRemote,

    /// The request can never succeed as sent
    PermanentRemote,

    /// No meta server reachable, or the table is unknown
    TopologyUnavailable,
}

impl ErrorKind {
    /// Whether the dispatcher may issue another attempt for this kind
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::NotServing | ErrorKind::TransientRemote)
    }
}

/// Maps remote error codes to error kinds
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    /// Codes that trigger a topology refresh before retrying
    routing: HashSet<ErrorCode>,

    /// Codes retried against the same primary after a backoff
    transient: HashSet<ErrorCode>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            routing: [
                ErrorCode::ObjectNotFound,
                ErrorCode::InvalidState,
                ErrorCode::ParentPartitionMisused,
                ErrorCode::SessionReset,
                ErrorCode::NotEnoughMember,
                ErrorCode::NetworkFailure,
            ]
            .into_iter()
            .collect(),
            transient: [
                ErrorCode::Busy,
                ErrorCode::Splitting,
                ErrorCode::ForwardToOthers,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl ErrorPolicy {
    /// Classify a remote or local error code
    ///
    /// `ERR_TIMEOUT` and `ERR_THREAD_INTERRUPTED` are fixed; they cannot be
    /// reconfigured as retryable.
    pub fn classify(&self, code: ErrorCode) -> ErrorKind {
        match code {
            ErrorCode::Timeout => ErrorKind::Timeout,
            ErrorCode::ThreadInterrupted => ErrorKind::ThreadInterrupted,
            code if self.routing.contains(&code) => ErrorKind::NotServing,
            code if self.transient.contains(&code) => ErrorKind::TransientRemote,
            _ => ErrorKind::PermanentRemote,
        }
    }

    /// Treat `code` as a stale-routing signal
    pub fn with_routing(mut self, code: ErrorCode) -> Self {
        self.transient.remove(&code);
        self.routing.insert(code);
        self
    }

    /// Treat `code` as transient
    pub fn with_transient(mut self, code: ErrorCode) -> Self {
        self.routing.remove(&code);
        self.transient.insert(code);
        self
    }

    /// Treat `code` as permanent
    pub fn with_permanent(mut self, code: ErrorCode) -> Self {
        self.routing.remove(&code);
        self.transient.remove(&code);
        self
    }
}
