//! Server error codes
//!
//! Codes carried by replica and meta replies. The textual names are part of
//! the diagnostic format and must match the server's spelling exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error code reported by a replica server, a meta server or the client itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    Unknown = 1,
    Timeout = 2,
    ObjectNotFound = 3,
    SessionReset = 4,
    Busy = 5,
    InvalidState = 6,
    Splitting = 7,
    DiskInsufficient = 8,
    ParentPartitionMisused = 9,
    NotEnoughMember = 10,
    NetworkFailure = 11,
    ForwardToOthers = 12,
    InvalidParameters = 13,
    AppNotExist = 14,
    AppDropped = 15,
    InvalidData = 16,
    HandlerNotFound = 17,
    ThreadInterrupted = 18,
}

impl ErrorCode {
    const ALL: [ErrorCode; 19] = [
        ErrorCode::Ok,
        ErrorCode::Unknown,
        ErrorCode::Timeout,
        ErrorCode::ObjectNotFound,
        ErrorCode::SessionReset,
        ErrorCode::Busy,
        ErrorCode::InvalidState,
        ErrorCode::Splitting,
        ErrorCode::DiskInsufficient,
        ErrorCode::ParentPartitionMisused,
        ErrorCode::NotEnoughMember,
        ErrorCode::NetworkFailure,
        ErrorCode::ForwardToOthers,
        ErrorCode::InvalidParameters,
        ErrorCode::AppNotExist,
        ErrorCode::AppDropped,
        ErrorCode::InvalidData,
        ErrorCode::HandlerNotFound,
        ErrorCode::ThreadInterrupted,
    ];

    /// Server-side spelling of the code
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "ERR_OK",
            ErrorCode::Unknown => "ERR_UNKNOWN",
            ErrorCode::Timeout => "ERR_TIMEOUT",
            ErrorCode::ObjectNotFound => "ERR_OBJECT_NOT_FOUND",
            ErrorCode::SessionReset => "ERR_SESSION_RESET",
            ErrorCode::Busy => "ERR_BUSY",
            ErrorCode::InvalidState => "ERR_INVALID_STATE",
            ErrorCode::Splitting => "ERR_SPLITTING",
            ErrorCode::DiskInsufficient => "ERR_DISK_INSUFFICIENT",
            ErrorCode::ParentPartitionMisused => "ERR_PARENT_PARTITION_MISUSED",
            ErrorCode::NotEnoughMember => "ERR_NOT_ENOUGH_MEMBER",
            ErrorCode::NetworkFailure => "ERR_NETWORK_FAILURE",
            ErrorCode::ForwardToOthers => "ERR_FORWARD_TO_OTHERS",
            ErrorCode::InvalidParameters => "ERR_INVALID_PARAMETERS",
            ErrorCode::AppNotExist => "ERR_APP_NOT_EXIST",
            ErrorCode::AppDropped => "ERR_APP_DROPPED",
            ErrorCode::InvalidData => "ERR_INVALID_DATA",
            ErrorCode::HandlerNotFound => "ERR_HANDLER_NOT_FOUND",
            ErrorCode::ThreadInterrupted => "ERR_THREAD_INTERRUPTED",
        }
    }

    /// Decode a wire value; unrecognised values map to `Unknown`
    pub fn from_i32(value: i32) -> ErrorCode {
        Self::ALL
            .iter()
            .copied()
            .find(|code| *code as i32 == value)
            .unwrap_or(ErrorCode::Unknown)
    }

    pub fn is_ok(&self) -> bool {
        *self == ErrorCode::Ok
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
