//! Topology Module
//!
//! Cluster topology as seen by the client: which replica server is primary
//! for each partition of each open table.
//!
//! ## Components
//! - `MetaClient`: contract for querying meta servers
//! - `PartitionMap`: versioned per-partition replica configurations
//! - `ClusterManager`: meta list, table registry and background refresh
//! - `TableHandler`: a cheap, cloneable view of one open table

mod cluster;
mod meta;
mod partition_map;
mod table;

pub use cluster::ClusterManager;
pub use meta::{MetaClient, PartitionConfiguration, QueryConfigResponse};
pub use partition_map::{ApplyStats, PartitionMap, ReplicaConfiguration};
pub use table::TableHandler;
