//! Classified errors and their rendering
//!
//! A `ClassifiedError` is an immutable value; `Display` is a pure function of
//! it, so equal values always render byte-identical text.

use std::fmt;
use std::net::SocketAddr;

use crate::base::{ErrorCode, Gpid};

use super::ErrorKind;

/// Name of the underlying error class shown in every classified diagnostic
pub const REPLICATION_ERROR: &str = "ReplicationError";

/// How the bracketed context list is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextLayout {
    /// `[a=1, b=2]`, gpid bare. Used for failures observed while waiting on a
    /// completion handle and for topology failures.
    Spaced,

    /// `[a=1,b=2]`, gpid in parentheses. Used for failures reported by the
    /// dispatcher for a specific replica.
    Compact,
}

/// Context fields of a diagnostic; absent fields are not rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub meta_server: Option<String>,
    pub table: Option<String>,
    pub operation: Option<String>,
    pub request: Option<String>,
    pub replica_server: Option<SocketAddr>,
    pub gpid: Option<Gpid>,
    pub timeout_ms: Option<u64>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta_server(mut self, meta_server: impl Into<String>) -> Self {
        self.meta_server = Some(meta_server.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn request(mut self, request: impl fmt::Display) -> Self {
        self.request = Some(request.to_string());
        self
    }

    pub fn replica_server(mut self, replica_server: Option<SocketAddr>) -> Self {
        self.replica_server = replica_server;
        self
    }

    pub fn gpid(mut self, gpid: Gpid) -> Self {
        self.gpid = Some(gpid);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    fn render(&self, layout: ContextLayout) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(7);

        if let Some(meta_server) = &self.meta_server {
            fields.push(format!("metaServer={}", meta_server));
        }
        if let Some(table) = &self.table {
            fields.push(format!("table={}", table));
        }
        if let Some(operation) = &self.operation {
            fields.push(format!("operation={}", operation));
        }
        if let Some(request) = &self.request {
            fields.push(format!("request={}", request));
        }
        if let Some(replica_server) = &self.replica_server {
            fields.push(format!("replicaServer={}", replica_server));
        }
        if let Some(gpid) = &self.gpid {
            match layout {
                ContextLayout::Spaced => fields.push(format!("gpid={}", gpid)),
                ContextLayout::Compact => fields.push(format!("gpid=({})", gpid)),
            }
        }
        if let Some(timeout_ms) = self.timeout_ms {
            fields.push(format!("timeout={}ms", timeout_ms));
        }

        let separator = match layout {
            ContextLayout::Spaced => ", ",
            ContextLayout::Compact => ",",
        };
        format!("[{}]", fields.join(separator))
    }
}

/// A normalized, contextualized failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    kind: ErrorKind,
    code: ErrorCode,
    layout: ContextLayout,
    context: ErrorContext,
    detail: String,
}

impl ClassifiedError {
    // =========================================================================
    // Builders
    // =========================================================================

    /// The caller's wait on a completion handle was interrupted
    pub fn thread_interrupted(table: &str, cause: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::ThreadInterrupted,
            code: ErrorCode::ThreadInterrupted,
            layout: ContextLayout::Spaced,
            context: ErrorContext::new().table(table),
            detail: format!("Thread was interrupted: {}", cause),
        }
    }

    /// No result arrived on a completion handle within the caller's timeout
    pub fn timeout(
        meta_server: &str,
        table: &str,
        request: impl fmt::Display,
        timeout_ms: u64,
        cause: impl fmt::Display,
    ) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            code: ErrorCode::Timeout,
            layout: ContextLayout::Spaced,
            context: ErrorContext::new()
                .meta_server(meta_server)
                .table(table)
                .request(request)
                .timeout_ms(timeout_ms),
            detail: format!("Timeout on Future await: {}", cause),
        }
    }

    /// A replica attempt failed terminally
    ///
    /// `context` is expected to carry the full replica field set; the trailing
    /// sentence is chosen by `code`.
    pub fn replica(kind: ErrorKind, code: ErrorCode, context: ErrorContext) -> Self {
        let detail = replica_sentence(code, context.replica_server.is_none()).to_string();
        Self {
            kind,
            code,
            layout: ContextLayout::Compact,
            context,
            detail,
        }
    }

    /// The topology for a table could not be obtained
    pub fn topology_unavailable(
        code: ErrorCode,
        meta_server: &str,
        table: &str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::TopologyUnavailable,
            code,
            layout: ContextLayout::Spaced,
            context: ErrorContext::new().meta_server(meta_server).table(table),
            detail: detail.into(),
        }
    }

    /// Replace the trailing sentence
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            REPLICATION_ERROR,
            self.code,
            self.context.render(self.layout)
        )?;
        if !self.detail.is_empty() {
            write!(f, " {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

/// Trailing sentence for a replica failure
fn replica_sentence(code: ErrorCode, primary_unknown: bool) -> &'static str {
    if primary_unknown {
        return "The primary replica of this partition is unknown!";
    }
    match code {
        ErrorCode::SessionReset => "Disconnected from the replica-server due to internal error!",
        ErrorCode::Timeout => "The operation is timed out!",
        ErrorCode::ObjectNotFound => "The replica server doesn't serve this partition!",
        ErrorCode::Busy => "Rate of requests exceeds the throughput limit!",
        ErrorCode::InvalidState => "The target replica is not primary!",
        ErrorCode::Splitting => "The table is executing partition split!",
        ErrorCode::DiskInsufficient => "The replica server disk space is insufficient!",
        _ => "",
    }
}
