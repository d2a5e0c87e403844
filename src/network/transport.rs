//! Transport contract
//!
//! The only thing the dispatcher knows about the network: send an opaque
//! request to an address with a timeout, get bytes or a coded error back.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::base::{ErrorCode, Gpid};
use crate::request::OperationKind;

/// A failed RPC, as reported by a transport or a meta client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// No reply within the allotted time
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }
}

/// One attempt of an operation on a partition
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub gpid: Gpid,
    pub operation: OperationKind,
    pub body: Bytes,
}

/// Sends operation RPCs to replica servers
///
/// Implementations must return within `timeout`, answering
/// `ErrorCode::Timeout` when no reply arrived in time.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        address: SocketAddr,
        request: &RpcRequest,
        timeout: Duration,
    ) -> std::result::Result<Bytes, RpcError>;
}
