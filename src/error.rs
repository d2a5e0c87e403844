//! Error types for replikv
//!
//! Provides a unified error type for all client operations. Every message is
//! prefixed with the client version tag so a diagnostic pasted from a log
//! always says which client produced it.

use thiserror::Error;

use crate::taxonomy::ClassifiedError;
use crate::VERSION_TAG;

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Unified error type for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    // -------------------------------------------------------------------------
    // Plain Errors
    // -------------------------------------------------------------------------
    /// A client error with a free-form message. An attached cause is kept as
    /// the error source but never changes the rendered message.
    #[error("{}: {}", VERSION_TAG, .message)]
    Message {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // -------------------------------------------------------------------------
    // Classified Errors
    // -------------------------------------------------------------------------
    /// A failure classified by the error taxonomy
    #[error("{}: {}", VERSION_TAG, .0)]
    Replication(Box<ClassifiedError>),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("{}: invalid configuration: {}", VERSION_TAG, .0)]
    Config(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("{}: IO error: {}", VERSION_TAG, .0)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Plain error with a message
    pub fn message(message: impl Into<String>) -> Self {
        ClientError::Message {
            message: message.into(),
            source: None,
        }
    }

    /// Plain error with a message and an underlying cause
    pub fn with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ClientError::Message {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// The classified diagnostic, if this error came out of the taxonomy
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ClientError::Replication(classified) => Some(&**classified),
            _ => None,
        }
    }
}

impl From<ClassifiedError> for ClientError {
    fn from(classified: ClassifiedError) -> Self {
        ClientError::Replication(Box::new(classified))
    }
}
