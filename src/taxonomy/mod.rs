//! Error Taxonomy Module
//!
//! Turns low-level failures (remote error codes, local timeouts, interrupted
//! waits, unreachable meta servers) into one classified, fully rendered
//! diagnostic per failed operation.
//!
//! ## Diagnostic Format
//! ```text
//! ReplicationError: <ERR_CODE>: [<context fields>] <sentence>
//! ```
//! The context lists, in this order and only when meaningful for the kind:
//! `metaServer, table, operation, request, replicaServer, gpid, timeout`.
//!
//! ## Kinds
//! | Kind                | Retried                         |
//! |---------------------|---------------------------------|
//! | ThreadInterrupted   | never                           |
//! | Timeout             | never (deadline is exhausted)   |
//! | NotServing          | after a topology refresh        |
//! | TransientRemote     | after a bounded backoff         |
//! | PermanentRemote     | never                           |
//! | TopologyUnavailable | bounded meta-server retry only  |

mod classified;
mod policy;

pub use classified::{ClassifiedError, ContextLayout, ErrorContext, REPLICATION_ERROR};
pub use policy::{ErrorKind, ErrorPolicy};
