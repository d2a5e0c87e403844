//! Network Module
//!
//! Transport plumbing between the dispatcher and the cluster.
//!
//! ## Architecture
//! - `Transport`: the narrow contract the dispatcher depends on
//! - `WorkerPool`: threads that run dispatches off the caller's thread
//! - `codec` + `TcpTransport`: a framed TCP adapter for real clusters,
//!   implementing both the replica and the meta contracts

pub mod codec;
mod pool;
mod tcp;
mod transport;

pub use pool::WorkerPool;
pub use tcp::{TcpTransport, WireRequest};
pub use transport::{RpcError, RpcRequest, Transport};
