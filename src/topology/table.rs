//! Table handler
//!
//! Resolves keys to partitions and partitions to replica configurations for
//! one open table.

use std::sync::Arc;
use std::time::Instant;

use crate::base::Gpid;
use crate::routing;
use crate::taxonomy::ClassifiedError;

use super::cluster::ClusterInner;
use super::{ApplyStats, PartitionMap, ReplicaConfiguration};

/// Handle on one open table
///
/// Clones share the partition map, so a refresh triggered through any of
/// them is visible to all.
#[derive(Clone)]
pub struct TableHandler {
    map: Arc<PartitionMap>,
    cluster: Arc<ClusterInner>,
}

impl TableHandler {
    pub(crate) fn new(map: Arc<PartitionMap>, cluster: Arc<ClusterInner>) -> Self {
        Self { map, cluster }
    }

    pub fn name(&self) -> &str {
        self.map.table_name()
    }

    pub fn app_id(&self) -> i32 {
        self.map.app_id()
    }

    pub fn partition_count(&self) -> u32 {
        self.map.partition_count()
    }

    /// Meta server list as configured
    pub fn meta_list(&self) -> &str {
        self.cluster.meta_list()
    }

    /// Partition id owning a key hash
    pub fn get_gpid_by_hash(&self, hash: u64) -> Gpid {
        let partition_index = routing::partition_index(hash, self.map.partition_count());
        self.map.gpid(partition_index)
    }

    /// Partition id owning a key
    pub fn gpid_for_key(&self, hash_key: &[u8], sort_key: &[u8]) -> Gpid {
        self.get_gpid_by_hash(routing::key_hash(hash_key, sort_key))
    }

    /// Current configuration of a partition
    ///
    /// Never blocks. An unknown configuration schedules a background refresh
    /// and is returned as is.
    pub fn get_replica_config(&self, partition_index: u32) -> Arc<ReplicaConfiguration> {
        let config = self.map.get(partition_index);
        if config.is_unknown() {
            self.request_refresh();
        }
        config
    }

    /// Re-query the meta servers and apply newer configurations
    pub fn refresh(&self) -> Result<ApplyStats, ClassifiedError> {
        self.cluster.refresh(&self.map, None)
    }

    /// Like `refresh`, but gives up once `deadline` passes
    pub fn refresh_before(&self, deadline: Instant) -> Result<ApplyStats, ClassifiedError> {
        self.cluster.refresh(&self.map, Some(deadline))
    }

    /// Schedule a background refresh; returns immediately
    pub fn request_refresh(&self) {
        self.cluster.request_refresh(self.map.table_name());
    }

    /// Whether two handles share one partition map
    pub fn shares_map_with(&self, other: &TableHandler) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }
}

impl std::fmt::Debug for TableHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandler")
            .field("name", &self.name())
            .field("app_id", &self.app_id())
            .field("partition_count", &self.partition_count())
            .finish()
    }
}
