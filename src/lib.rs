//! # replikv
//!
//! Client library for a partitioned, replicated key-value store:
//! - Topology discovery and caching from a list of meta servers
//! - Deterministic key → partition routing (CRC-64)
//! - Per-request retry / failover on stale routing, busy replicas and timeouts
//! - One classified, fully rendered diagnostic per failed operation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Client / Table                            │
//! │          get · set · del · exist (+ async_* forms)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ PendingRequest + ResponseFuture
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Worker Pool / Dispatcher                    │
//! │          (retry loop, absolute deadline, taxonomy)           │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ replica config snapshot          │ send
//!            ▼                                  ▼
//!   ┌─────────────────┐                 ┌─────────────────┐
//!   │ ClusterManager  │                 │    Transport    │
//!   │ (PartitionMap)  │                 │  (TCP / mock)   │
//!   └────────┬────────┘                 └─────────────────┘
//!            │ query_config
//!            ▼
//!   ┌─────────────────┐
//!   │   MetaClient    │
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod base;
pub mod routing;
pub mod taxonomy;
pub mod request;
pub mod topology;
pub mod network;
pub mod client;
pub mod mock;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use base::{ErrorCode, Gpid};
pub use client::{Client, Table};
pub use config::{ClientOptions, RetryPolicy, TableOptions};
pub use error::{ClientError, Result};
pub use request::{Interrupter, ResponseFuture};
pub use taxonomy::{ClassifiedError, ErrorKind, ErrorPolicy};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of replikv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of every rendered client error
pub const VERSION_TAG: &str = concat!("replikv-rust-", env!("CARGO_PKG_VERSION"));
