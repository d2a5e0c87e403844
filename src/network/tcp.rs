//! TCP adapter
//!
//! Implements both the replica transport and the meta-server query contract
//! over the framed codec. Idle connections are kept per address and reused.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::base::{ErrorCode, Gpid};
use crate::topology::{MetaClient, QueryConfigResponse};

use super::codec::{read_frame, write_frame, CodecError, Frame, MessageType};
use super::{RpcError, RpcRequest, Transport};

/// Request payloads understood by servers speaking this adapter's protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireRequest {
    Operation {
        gpid: Gpid,
        operation: u8,
        timeout_ms: u64,
        body: Vec<u8>,
    },
    QueryConfig {
        table: String,
    },
}

impl WireRequest {
    fn message_type(&self) -> MessageType {
        match self {
            WireRequest::Operation { .. } => MessageType::Operation,
            WireRequest::QueryConfig { .. } => MessageType::QueryConfig,
        }
    }
}

/// Blocking TCP transport
#[derive(Default)]
pub struct TcpTransport {
    /// Idle connections by peer address
    idle: Mutex<HashMap<SocketAddr, TcpStream>>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// One request/reply exchange; returns the reply payload on `ERR_OK`
    fn call(
        &self,
        address: SocketAddr,
        request: &WireRequest,
        timeout: Duration,
    ) -> Result<Bytes, RpcError> {
        // Socket timeouts of zero mean "block forever"
        let timeout = timeout.max(Duration::from_millis(1));

        let payload = bincode::serialize(request)
            .map_err(|e| RpcError::new(ErrorCode::InvalidData, e.to_string()))?;
        let frame = Frame::new(request.message_type() as i32, payload);

        let mut stream = self.checkout(address, timeout)?;
        let reply = exchange(&mut stream, &frame, timeout).map_err(|e| {
            tracing::debug!("Exchange with {} failed: {}", address, e);
            to_rpc_error(e)
        })?;
        self.idle.lock().insert(address, stream);

        match ErrorCode::from_i32(reply.code) {
            ErrorCode::Ok => Ok(reply.payload),
            code => Err(RpcError::new(
                code,
                String::from_utf8_lossy(&reply.payload).into_owned(),
            )),
        }
    }

    fn checkout(&self, address: SocketAddr, timeout: Duration) -> Result<TcpStream, RpcError> {
        if let Some(stream) = self.idle.lock().remove(&address) {
            return Ok(stream);
        }
        let stream = TcpStream::connect_timeout(&address, timeout)
            .map_err(|e| to_rpc_error(CodecError::Io(e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| to_rpc_error(CodecError::Io(e)))?;
        Ok(stream)
    }
}

fn exchange(stream: &mut TcpStream, frame: &Frame, timeout: Duration) -> Result<Frame, CodecError> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    write_frame(stream, frame)?;
    read_frame(stream)
}

fn to_rpc_error(error: CodecError) -> RpcError {
    match error {
        CodecError::Io(e) => match e.kind() {
            // Unix reports an expired socket timeout as WouldBlock, Windows as TimedOut
            IoErrorKind::TimedOut | IoErrorKind::WouldBlock => RpcError::timeout(e.to_string()),
            _ => RpcError::new(ErrorCode::NetworkFailure, e.to_string()),
        },
        CodecError::Protocol(message) => RpcError::new(ErrorCode::InvalidData, message),
    }
}

impl Transport for TcpTransport {
    fn send(
        &self,
        address: SocketAddr,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<Bytes, RpcError> {
        let wire = WireRequest::Operation {
            gpid: request.gpid,
            operation: request.operation as u8,
            timeout_ms: timeout.as_millis() as u64,
            body: request.body.to_vec(),
        };
        self.call(address, &wire, timeout)
    }
}

impl MetaClient for TcpTransport {
    fn query_config(
        &self,
        meta_server: SocketAddr,
        table: &str,
        timeout: Duration,
    ) -> Result<QueryConfigResponse, RpcError> {
        let wire = WireRequest::QueryConfig {
            table: table.to_string(),
        };
        let payload = self.call(meta_server, &wire, timeout)?;
        bincode::deserialize(&payload).map_err(|e| RpcError::new(ErrorCode::InvalidData, e.to_string()))
    }
}
