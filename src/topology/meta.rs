//! Meta server contract
//!
//! The cluster manager asks one meta server at a time for a table's
//! partition configuration; choosing which one is the manager's job.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::RpcError;

use super::ReplicaConfiguration;

/// Configuration of one partition as reported by a meta server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfiguration {
    pub partition_index: u32,
    pub config: ReplicaConfiguration,
}

/// Reply to a partition configuration query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfigResponse {
    pub app_id: i32,
    pub partition_count: u32,
    pub partitions: Vec<PartitionConfiguration>,
}

/// Queries meta servers for table topology
///
/// A missing table is reported as `ERR_OBJECT_NOT_FOUND` or
/// `ERR_APP_NOT_EXIST`; an unreachable meta server as any other code.
pub trait MetaClient: Send + Sync {
    fn query_config(
        &self,
        meta_server: SocketAddr,
        table: &str,
        timeout: Duration,
    ) -> std::result::Result<QueryConfigResponse, RpcError>;
}
