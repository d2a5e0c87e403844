//! Partition map
//!
//! Per-table array of versioned replica configurations.
//!
//! ## Concurrency
//! - Each partition slot is an `ArcSwap`: readers load an immutable snapshot
//!   without locking, writers publish a whole new configuration object.
//! - Writers are serialized by `publish_lock` so the version check and the
//!   swap happen atomically with respect to each other.
//! - A configuration is only replaced by one with a strictly greater
//!   `config_version`; stale or duplicate updates are dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::base::Gpid;

use super::QueryConfigResponse;

/// Replica group of one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfiguration {
    /// Monotonically increasing per partition (the server's ballot)
    pub config_version: i64,

    /// Current primary, `None` when unknown
    pub primary: Option<SocketAddr>,

    pub secondaries: Vec<SocketAddr>,
}

impl ReplicaConfiguration {
    /// Version of the "unknown" sentinel; any real configuration is newer
    pub const UNKNOWN_VERSION: i64 = -1;

    pub fn new(config_version: i64, primary: SocketAddr, secondaries: Vec<SocketAddr>) -> Self {
        Self {
            config_version,
            primary: Some(primary),
            secondaries,
        }
    }

    /// Sentinel for a partition whose configuration has not been learned
    pub fn unknown() -> Self {
        Self {
            config_version: Self::UNKNOWN_VERSION,
            primary: None,
            secondaries: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.primary.is_none()
    }
}

/// Outcome of applying a meta reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Partitions whose configuration was replaced
    pub applied: usize,

    /// Partitions whose update was not newer than the cached one
    pub stale: usize,

    /// Entries naming a partition outside the table
    pub ignored: usize,
}

/// Topology of one open table
pub struct PartitionMap {
    table_name: String,
    app_id: i32,
    partition_count: u32,
    slots: Vec<ArcSwap<ReplicaConfiguration>>,
    publish_lock: Mutex<()>,
}

impl PartitionMap {
    /// Create a map with every partition unknown
    pub fn new(table_name: impl Into<String>, app_id: i32, partition_count: u32) -> Self {
        let slots = (0..partition_count)
            .map(|_| ArcSwap::from_pointee(ReplicaConfiguration::unknown()))
            .collect();
        Self {
            table_name: table_name.into(),
            app_id,
            partition_count,
            slots,
            publish_lock: Mutex::new(()),
        }
    }

    /// Create a map and populate it from a meta reply
    pub fn from_response(table_name: impl Into<String>, response: &QueryConfigResponse) -> Self {
        let map = Self::new(table_name, response.app_id, response.partition_count);
        map.apply(response);
        map
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn app_id(&self) -> i32 {
        self.app_id
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn gpid(&self, partition_index: u32) -> Gpid {
        Gpid::new(self.app_id, partition_index as i32)
    }

    /// Current snapshot of a partition's configuration
    ///
    /// Out-of-range indexes yield the unknown sentinel.
    pub fn get(&self, partition_index: u32) -> Arc<ReplicaConfiguration> {
        match self.slots.get(partition_index as usize) {
            Some(slot) => slot.load_full(),
            None => Arc::new(ReplicaConfiguration::unknown()),
        }
    }

    /// Publish a configuration if it is newer than the cached one
    ///
    /// Returns true when the configuration was replaced.
    pub fn publish(&self, partition_index: u32, config: ReplicaConfiguration) -> bool {
        let Some(slot) = self.slots.get(partition_index as usize) else {
            return false;
        };

        let _guard = self.publish_lock.lock();
        let current = slot.load();
        if config.config_version <= current.config_version {
            tracing::debug!(
                table = %self.table_name,
                partition = partition_index,
                cached = current.config_version,
                received = config.config_version,
                "Discarding stale replica configuration"
            );
            return false;
        }
        slot.store(Arc::new(config));
        true
    }

    /// Apply every partition entry of a meta reply
    pub fn apply(&self, response: &QueryConfigResponse) -> ApplyStats {
        let mut stats = ApplyStats::default();

        if response.app_id != self.app_id {
            tracing::warn!(
                table = %self.table_name,
                cached_app_id = self.app_id,
                received_app_id = response.app_id,
                "Meta reply is for a different table instance, ignoring"
            );
            stats.ignored = response.partitions.len();
            return stats;
        }

        for partition in &response.partitions {
            if partition.partition_index >= self.partition_count {
                stats.ignored += 1;
            } else if self.publish(partition.partition_index, partition.config.clone()) {
                stats.applied += 1;
            } else {
                stats.stale += 1;
            }
        }
        stats
    }

    /// Number of partitions with a known primary
    pub fn known_partitions(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.load().is_unknown()).count()
    }
}
