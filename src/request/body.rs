//! Operation bodies
//!
//! Bodies are bincode-encoded and travel through the dispatcher as opaque
//! `Bytes`; only transports and servers look inside.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

use super::{OperationKind, Request};

/// Payload of one key-value operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationBody {
    Get {
        hash_key: Vec<u8>,
        sort_key: Vec<u8>,
    },
    Put {
        hash_key: Vec<u8>,
        sort_key: Vec<u8>,
        value: Vec<u8>,
        ttl_seconds: u32,
    },
    Remove {
        hash_key: Vec<u8>,
        sort_key: Vec<u8>,
    },
    Exist {
        hash_key: Vec<u8>,
        sort_key: Vec<u8>,
    },
}

impl OperationBody {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationBody::Get { .. } => OperationKind::Get,
            OperationBody::Put { .. } => OperationKind::Put,
            OperationBody::Remove { .. } => OperationKind::Remove,
            OperationBody::Exist { .. } => OperationKind::Exist,
        }
    }

    pub fn hash_key(&self) -> &[u8] {
        match self {
            OperationBody::Get { hash_key, .. }
            | OperationBody::Put { hash_key, .. }
            | OperationBody::Remove { hash_key, .. }
            | OperationBody::Exist { hash_key, .. } => hash_key,
        }
    }

    pub fn sort_key(&self) -> &[u8] {
        match self {
            OperationBody::Get { sort_key, .. }
            | OperationBody::Put { sort_key, .. }
            | OperationBody::Remove { sort_key, .. }
            | OperationBody::Exist { sort_key, .. } => sort_key,
        }
    }

    /// Diagnostic descriptor of this body
    pub fn describe(&self) -> Request {
        let request = Request::new(self.hash_key(), self.sort_key());
        match self {
            OperationBody::Put { value, .. } => request.with_value_length(value.len()),
            _ => request,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|e| ClientError::with_cause("failed to encode operation body", e))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| ClientError::with_cause("failed to decode operation body", e))
    }
}

/// Encode a typed reply payload
pub fn encode_reply<T: Serialize>(reply: &T) -> Result<Bytes> {
    bincode::serialize(reply)
        .map(Bytes::from)
        .map_err(|e| ClientError::with_cause("failed to encode reply", e))
}

/// Reply of `get`: the value, if present
pub fn decode_get_reply(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    bincode::deserialize(bytes).map_err(|e| ClientError::with_cause("malformed get reply", e))
}

/// Reply of `exist`
pub fn decode_exist_reply(bytes: &[u8]) -> Result<bool> {
    bincode::deserialize(bytes).map_err(|e| ClientError::with_cause("malformed exist reply", e))
}

/// Reply of `put` / `remove`: empty
pub fn decode_unit_reply(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        Ok(())
    } else {
        Err(ClientError::message(format!(
            "unexpected {} byte payload in empty reply",
            bytes.len()
        )))
    }
}
