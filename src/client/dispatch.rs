//! Dispatcher
//!
//! Runs one pending request to completion on a worker thread.
//!
//! ## Retry Loop
//! Each iteration:
//! 1. Stop if the caller cancelled the wait.
//! 2. Resolve the partition's current configuration snapshot.
//! 3. Re-check the absolute deadline; an expired deadline fails with
//!    `ERR_TIMEOUT` without sending.
//! 4. An unknown primary fails immediately.
//! 5. Send with the remaining time and classify the outcome:
//!    - NotServing: refresh topology synchronously within the deadline, then retry
//!    - TransientRemote: back off, then retry the same partition
//!    - anything else: fail
//!
//! Attempts for one request are strictly sequential since the whole loop
//! runs on a single worker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use crate::base::ErrorCode;
use crate::config::RetryPolicy;
use crate::network::{RpcRequest, Transport};
use crate::request::PendingRequest;
use crate::taxonomy::{ClassifiedError, ErrorContext, ErrorKind, ErrorPolicy};
use crate::topology::TableHandler;

/// Everything a worker needs to dispatch requests for one table
pub(crate) struct Dispatcher {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) table: TableHandler,
    pub(crate) error_policy: Arc<ErrorPolicy>,
    pub(crate) retry_policy: RetryPolicy,
}

impl Dispatcher {
    /// Drive `pending` to exactly one of success or failure
    pub(crate) fn run<T>(&self, mut pending: PendingRequest<T>) {
        let partition_index = pending.gpid.partition_index as u32;
        let mut last_primary: Option<SocketAddr> = None;

        loop {
            if pending.is_cancelled() {
                // Dropping the request resolves its promise; nobody is waiting
                tracing::debug!(gpid = %pending.gpid, attempts = pending.attempts(), "Request cancelled by caller");
                return;
            }

            let config = self.table.get_replica_config(partition_index);

            let Some(remaining) = pending.remaining() else {
                let replica = last_primary.or(config.primary);
                tracing::debug!(gpid = %pending.gpid, attempts = pending.attempts(), "Deadline passed before sending");
                let error = self.replica_error(&pending, ErrorKind::Timeout, ErrorCode::Timeout, replica);
                return pending.fail(error);
            };

            let Some(primary) = config.primary else {
                tracing::debug!(gpid = %pending.gpid, "Primary of partition is unknown");
                let error =
                    self.replica_error(&pending, ErrorKind::NotServing, ErrorCode::ObjectNotFound, None);
                return pending.fail(error);
            };

            pending.begin_attempt();
            last_primary = Some(primary);
            tracing::trace!(
                table = self.table.name(),
                gpid = %pending.gpid,
                primary = %primary,
                attempt = pending.attempts(),
                "Sending {}",
                pending.operation
            );

            let rpc = RpcRequest {
                gpid: pending.gpid,
                operation: pending.operation,
                body: pending.body.clone(),
            };

            let rpc_error = match self.transport.send(primary, &rpc, remaining) {
                Ok(payload) => {
                    return match (pending.decode)(&payload) {
                        Ok(value) => pending.succeed(value),
                        Err(e) => {
                            tracing::warn!(gpid = %pending.gpid, "Undecodable reply: {}", e);
                            let error = self.replica_error(
                                &pending,
                                ErrorKind::PermanentRemote,
                                ErrorCode::InvalidData,
                                Some(primary),
                            );
                            pending.fail(error)
                        }
                    };
                }
                Err(e) => e,
            };

            let kind = self.error_policy.classify(rpc_error.code);
            tracing::debug!(
                gpid = %pending.gpid,
                primary = %primary,
                attempt = pending.attempts(),
                code = %rpc_error.code,
                ?kind,
                "Attempt failed: {}",
                rpc_error.message
            );

            match kind {
                ErrorKind::NotServing => {
                    if let Err(e) = self.table.refresh_before(pending.deadline()) {
                        tracing::debug!(table = self.table.name(), "Refresh after routing error failed: {}", e);
                    }
                }
                ErrorKind::TransientRemote => {}
                _ => {
                    let error = self.replica_error(&pending, kind, rpc_error.code, Some(primary));
                    return pending.fail(error);
                }
            }

            if pending.attempts() >= self.retry_policy.max_attempts {
                tracing::warn!(
                    gpid = %pending.gpid,
                    attempts = pending.attempts(),
                    code = %rpc_error.code,
                    "Retries exhausted"
                );
                let replica = self.table.get_replica_config(partition_index).primary.or(Some(primary));
                let error = self.replica_error(&pending, kind, rpc_error.code, replica);
                return pending.fail(error);
            }

            pending.mark_retrying();
            let backoff = self.retry_policy.backoff(pending.attempts());
            if let Some(remaining) = pending.remaining() {
                thread::sleep(backoff.min(remaining));
            }
        }
    }

    fn replica_error<T>(
        &self,
        pending: &PendingRequest<T>,
        kind: ErrorKind,
        code: ErrorCode,
        replica: Option<SocketAddr>,
    ) -> ClassifiedError {
        let context = ErrorContext::new()
            .meta_server(self.table.meta_list())
            .table(self.table.name())
            .operation(pending.operation.name())
            .request(&pending.request)
            .replica_server(replica)
            .gpid(pending.gpid)
            .timeout_ms(pending.timeout_ms);
        ClassifiedError::replica(kind, code, context)
    }
}
