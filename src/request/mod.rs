//! Request Module
//!
//! Everything that describes one logical caller operation while it is in
//! flight.
//!
//! ## Lifecycle
//! ```text
//!  CREATED ──► SENT ──► SUCCEEDED
//!               │  ▲
//!               ▼  │
//!             RETRYING
//!               │
//!               ▼
//!             FAILED
//! ```
//! A `PendingRequest` owns the only `Promise` of its operation, so reaching a
//! terminal state consumes it and the caller's `ResponseFuture` observes
//! exactly one outcome.

mod body;
mod descriptor;
mod future;
mod pending;

pub use body::{decode_exist_reply, decode_get_reply, decode_unit_reply, encode_reply, OperationBody};
pub use descriptor::{OperationKind, Request};
pub use future::{promise, Interrupter, Promise, ResponseFuture, WaitContext};
pub use pending::{PendingRequest, RequestState};
