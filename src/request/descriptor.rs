//! Request descriptors
//!
//! A small, printable summary of an operation's key and value shape. It is
//! only used for diagnostics; the actual body travels as an opaque blob.

use std::fmt;

/// Kind of operation, as named in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationKind {
    Get = 0x01,
    Put = 0x02,
    Remove = 0x03,
    Exist = 0x04,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Get => "get",
            OperationKind::Put => "put",
            OperationKind::Remove => "remove",
            OperationKind::Exist => "exist",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Printable summary of one caller request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub hash_key: Vec<u8>,
    pub sort_key: Option<Vec<u8>>,
    pub sort_key_count: i32,
    pub value_length: i32,
}

impl Request {
    /// Keys longer than this are cut in diagnostics
    pub const KEY_PREVIEW_LEN: usize = 32;

    pub fn new(hash_key: impl Into<Vec<u8>>, sort_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            sort_key: Some(sort_key.into()),
            sort_key_count: 0,
            value_length: -1,
        }
    }

    /// Request addressing a whole hash key (no single sort key)
    pub fn for_hash_key(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            sort_key: None,
            sort_key_count: 0,
            value_length: -1,
        }
    }

    pub fn with_value_length(mut self, value_length: usize) -> Self {
        self.value_length = i32::try_from(value_length).unwrap_or(i32::MAX);
        self
    }

    pub fn with_sort_key_count(mut self, count: usize) -> Self {
        self.sort_key_count = i32::try_from(count).unwrap_or(i32::MAX);
        self
    }
}

fn preview(key: &[u8]) -> String {
    let end = key.len().min(Request::KEY_PREVIEW_LEN);
    String::from_utf8_lossy(&key[..end]).into_owned()
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[hashKey[:32]=\"{}\"", preview(&self.hash_key))?;
        if let Some(sort_key) = &self.sort_key {
            write!(f, ",sortKey[:32]=\"{}\"", preview(sort_key))?;
        }
        write!(
            f,
            ",sortKeyCount={},valueLength={}]",
            self.sort_key_count, self.value_length
        )
    }
}
