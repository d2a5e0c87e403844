//! Table handle
//!
//! Key-value operations on one open table. Every operation comes in two
//! forms: `async_*` returns a completion handle immediately, the plain form
//! blocks on that handle and returns the value or the rendered diagnostic.

use std::sync::Arc;
use std::time::Duration;

use crate::base::{ErrorCode, Gpid};
use crate::error::{ClientError, Result};
use crate::request::{
    decode_exist_reply, decode_get_reply, decode_unit_reply, promise, OperationBody,
    OperationKind, PendingRequest, Request, ResponseFuture, WaitContext,
};
use crate::taxonomy::{ClassifiedError, ErrorContext, ErrorKind};
use crate::topology::TableHandler;

use super::dispatch::Dispatcher;
use super::ClientInner;

/// Extra time a blocking call waits past the request deadline, so the
/// dispatcher's own diagnostic wins over a generic await timeout
const AWAIT_GRACE: Duration = Duration::from_millis(200);

/// Handle on one open table; cheap to clone and share between threads
#[derive(Clone)]
pub struct Table {
    client: Arc<ClientInner>,
    dispatcher: Arc<Dispatcher>,
    operation_timeout: Duration,
}

impl Table {
    pub(crate) fn new(
        client: Arc<ClientInner>,
        dispatcher: Arc<Dispatcher>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            client,
            dispatcher,
            operation_timeout,
        }
    }

    pub fn name(&self) -> &str {
        self.dispatcher.table.name()
    }

    /// Routing view of this table
    pub fn handler(&self) -> &TableHandler {
        &self.dispatcher.table
    }

    /// Timeout applied when a caller passes 0
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    // =========================================================================
    // Async Operations
    // =========================================================================

    /// Read a value; resolves to `None` when the key is absent
    pub fn async_get(
        &self,
        hash_key: &[u8],
        sort_key: &[u8],
        timeout_ms: u64,
    ) -> ResponseFuture<Option<Vec<u8>>> {
        let body = OperationBody::Get {
            hash_key: hash_key.to_vec(),
            sort_key: sort_key.to_vec(),
        };
        self.submit(body, timeout_ms, decode_get_reply)
    }

    /// Write a value; a `ttl_seconds` of 0 means no expiry
    pub fn async_set(
        &self,
        hash_key: &[u8],
        sort_key: &[u8],
        value: &[u8],
        ttl_seconds: u32,
        timeout_ms: u64,
    ) -> ResponseFuture<()> {
        let body = OperationBody::Put {
            hash_key: hash_key.to_vec(),
            sort_key: sort_key.to_vec(),
            value: value.to_vec(),
            ttl_seconds,
        };
        self.submit(body, timeout_ms, decode_unit_reply)
    }

    /// Delete a value; deleting an absent key succeeds
    pub fn async_del(&self, hash_key: &[u8], sort_key: &[u8], timeout_ms: u64) -> ResponseFuture<()> {
        let body = OperationBody::Remove {
            hash_key: hash_key.to_vec(),
            sort_key: sort_key.to_vec(),
        };
        self.submit(body, timeout_ms, decode_unit_reply)
    }

    /// Check whether a key exists
    pub fn async_exist(&self, hash_key: &[u8], sort_key: &[u8], timeout_ms: u64) -> ResponseFuture<bool> {
        let body = OperationBody::Exist {
            hash_key: hash_key.to_vec(),
            sort_key: sort_key.to_vec(),
        };
        self.submit(body, timeout_ms, decode_exist_reply)
    }

    // =========================================================================
    // Blocking Operations
    // =========================================================================

    pub fn get(&self, hash_key: &[u8], sort_key: &[u8], timeout_ms: u64) -> Result<Option<Vec<u8>>> {
        let future = self.async_get(hash_key, sort_key, timeout_ms);
        self.await_result(future, timeout_ms)
    }

    pub fn set(
        &self,
        hash_key: &[u8],
        sort_key: &[u8],
        value: &[u8],
        ttl_seconds: u32,
        timeout_ms: u64,
    ) -> Result<()> {
        let future = self.async_set(hash_key, sort_key, value, ttl_seconds, timeout_ms);
        self.await_result(future, timeout_ms)
    }

    pub fn del(&self, hash_key: &[u8], sort_key: &[u8], timeout_ms: u64) -> Result<()> {
        let future = self.async_del(hash_key, sort_key, timeout_ms);
        self.await_result(future, timeout_ms)
    }

    pub fn exist(&self, hash_key: &[u8], sort_key: &[u8], timeout_ms: u64) -> Result<bool> {
        let future = self.async_exist(hash_key, sort_key, timeout_ms);
        self.await_result(future, timeout_ms)
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn effective_timeout(&self, timeout_ms: u64) -> Duration {
        if timeout_ms == 0 {
            self.operation_timeout
        } else {
            Duration::from_millis(timeout_ms)
        }
    }

    fn await_result<T>(&self, future: ResponseFuture<T>, timeout_ms: u64) -> Result<T> {
        let timeout = self.effective_timeout(timeout_ms);
        future.wait_reporting(timeout + AWAIT_GRACE, timeout.as_millis() as u64)
    }

    /// Create the pending request for `body` and hand it to a worker
    fn submit<T>(&self, body: OperationBody, timeout_ms: u64, decode: fn(&[u8]) -> Result<T>) -> ResponseFuture<T>
    where
        T: Send + 'static,
    {
        let timeout = self.effective_timeout(timeout_ms);
        let request = body.describe();
        let table = &self.dispatcher.table;
        let context = WaitContext {
            meta_server: table.meta_list().to_string(),
            table: table.name().to_string(),
            request: request.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };

        let gpid = table.gpid_for_key(body.hash_key(), body.sort_key());
        let encoded = match body.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                let error = self.encode_failure(body.kind(), &request, gpid, timeout, &e);
                return ResponseFuture::ready(Err(error.into()), context);
            }
        };

        let (promise, future) = promise(context);
        let pending = PendingRequest::new(body.kind(), request, encoded, gpid, timeout, decode, promise);

        let dispatcher = Arc::clone(&self.dispatcher);
        self.client.pool.spawn(move || dispatcher.run(pending));
        future
    }

    /// Diagnostic for a request body that could not be serialized
    fn encode_failure(
        &self,
        operation: OperationKind,
        request: &Request,
        gpid: Gpid,
        timeout: Duration,
        cause: &ClientError,
    ) -> ClassifiedError {
        let table = &self.dispatcher.table;
        let primary = table.get_replica_config(gpid.partition_index as u32).primary;
        let context = ErrorContext::new()
            .meta_server(table.meta_list())
            .table(table.name())
            .operation(operation.name())
            .request(request)
            .replica_server(primary)
            .gpid(gpid)
            .timeout_ms(timeout.as_millis() as u64);
        ClassifiedError::replica(ErrorKind::PermanentRemote, ErrorCode::InvalidData, context)
            .with_detail(format!("Failed to encode request: {}", cause))
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("handler", &self.dispatcher.table)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}
