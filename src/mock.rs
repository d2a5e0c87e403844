//! In-memory cluster for tests.
//!
//! `MockCluster` plays both external collaborators of the client: it answers
//! meta queries and serves key-value operations as a set of replica servers,
//! entirely in process.
//!
//! # Features
//!
//! - **Tables**: create tables with any partition count; primaries are spread
//!   over three fake replica servers
//! - **Topology changes**: move or clear a partition's primary (bumping its
//!   configuration version), drop a table
//! - **Fault injection**: one-shot or sticky error codes per partition, reply
//!   delays, unreachable meta servers
//! - **Counting**: meta queries (total and per meta server) and replica sends
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use replikv::mock::MockCluster;
//! use replikv::{Client, ClientOptions};
//!
//! let cluster = Arc::new(MockCluster::new());
//! cluster.create_table("temp", 8);
//!
//! let options = ClientOptions::builder()
//!     .meta_servers("127.0.0.1:34601")
//!     .build()
//!     .unwrap();
//! let client = Client::new(options, cluster.clone(), cluster.clone()).unwrap();
//! let table = client.open_table("temp").unwrap();
//!
//! table.set(b"user", b"name", b"alice", 0, 0).unwrap();
//! assert_eq!(table.get(b"user", b"name", 0).unwrap(), Some(b"alice".to_vec()));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::base::ErrorCode;
use crate::network::{RpcError, RpcRequest, Transport};
use crate::request::{encode_reply, OperationBody};
use crate::topology::{MetaClient, PartitionConfiguration, QueryConfigResponse, ReplicaConfiguration};

/// Number of fake replica servers
const REPLICA_COUNT: u16 = 3;

/// Port of the first fake replica server
const FIRST_REPLICA_PORT: u16 = 34801;

struct MockPartition {
    config: ReplicaConfiguration,
    data: BTreeMap<(Vec<u8>, Vec<u8>), Vec<u8>>,

    /// Codes returned, one per send, before any other handling
    faults: VecDeque<ErrorCode>,

    /// Code returned on every send while set
    sticky_fault: Option<ErrorCode>,
}

struct MockTable {
    app_id: i32,
    partitions: Vec<MockPartition>,
}

impl MockTable {
    fn response(&self) -> QueryConfigResponse {
        QueryConfigResponse {
            app_id: self.app_id,
            partition_count: self.partitions.len() as u32,
            partitions: self
                .partitions
                .iter()
                .enumerate()
                .map(|(index, partition)| PartitionConfiguration {
                    partition_index: index as u32,
                    config: partition.config.clone(),
                })
                .collect(),
        }
    }
}

/// In-process meta server and replica servers
#[derive(Default)]
pub struct MockCluster {
    tables: RwLock<HashMap<String, MockTable>>,
    next_app_id: AtomicI32,

    /// Meta servers that refuse queries
    down_metas: Mutex<HashSet<SocketAddr>>,

    /// Delay applied to every replica send (milliseconds)
    reply_delay_ms: AtomicU64,

    meta_queries: Mutex<HashMap<SocketAddr, usize>>,
    send_count: AtomicUsize,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the `index`-th fake replica server
    pub fn replica_address(index: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], FIRST_REPLICA_PORT + index % REPLICA_COUNT))
    }

    // =========================================================================
    // Topology
    // =========================================================================

    /// Create a table and return its app id
    ///
    /// Partition `i` starts with primary `replica_address(i)` at version 1.
    pub fn create_table(&self, name: &str, partition_count: u32) -> i32 {
        let app_id = self.next_app_id.fetch_add(1, Ordering::Relaxed) + 1;
        let partitions = (0..partition_count)
            .map(|index| {
                let primary = Self::replica_address(index as u16);
                let secondaries = (1..REPLICA_COUNT)
                    .map(|offset| Self::replica_address(index as u16 + offset))
                    .collect();
                MockPartition {
                    config: ReplicaConfiguration::new(1, primary, secondaries),
                    data: BTreeMap::new(),
                    faults: VecDeque::new(),
                    sticky_fault: None,
                }
            })
            .collect();

        self.tables
            .write()
            .insert(name.to_string(), MockTable { app_id, partitions });
        app_id
    }

    /// Remove a table; replicas answer `ERR_APP_DROPPED` afterwards
    pub fn drop_table(&self, name: &str) {
        self.tables.write().remove(name);
    }

    /// Make `primary` the primary of a partition; returns the new version
    pub fn move_primary(&self, table: &str, partition_index: u32, primary: SocketAddr) -> Option<i64> {
        self.update_partition(table, partition_index, |partition| {
            let config = &mut partition.config;
            config.secondaries.retain(|address| *address != primary);
            if let Some(old) = config.primary.replace(primary) {
                config.secondaries.push(old);
            }
            config.config_version += 1;
            config.config_version
        })
    }

    /// Leave a partition without a primary; returns the new version
    pub fn clear_primary(&self, table: &str, partition_index: u32) -> Option<i64> {
        self.update_partition(table, partition_index, |partition| {
            let config = &mut partition.config;
            if let Some(old) = config.primary.take() {
                config.secondaries.push(old);
            }
            config.config_version += 1;
            config.config_version
        })
    }

    /// Configuration the meta server currently reports for a partition
    pub fn replica_config(&self, table: &str, partition_index: u32) -> Option<ReplicaConfiguration> {
        self.tables
            .read()
            .get(table)
            .and_then(|t| t.partitions.get(partition_index as usize))
            .map(|partition| partition.config.clone())
    }

    // =========================================================================
    // Fault Injection
    // =========================================================================

    /// Fail the next `count` sends to a partition with `code`
    pub fn inject_fault(&self, table: &str, partition_index: u32, code: ErrorCode, count: usize) {
        self.update_partition(table, partition_index, |partition| {
            partition.faults.extend(std::iter::repeat(code).take(count));
        });
    }

    /// Fail every send to a partition with `code` until cleared with `None`
    pub fn set_sticky_fault(&self, table: &str, partition_index: u32, code: Option<ErrorCode>) {
        self.update_partition(table, partition_index, |partition| {
            partition.sticky_fault = code;
        });
    }

    /// Make a meta server refuse (or accept again) queries
    pub fn set_meta_down(&self, meta_server: SocketAddr, down: bool) {
        let mut down_metas = self.down_metas.lock();
        if down {
            down_metas.insert(meta_server);
        } else {
            down_metas.remove(&meta_server);
        }
    }

    /// Delay every replica reply
    pub fn set_reply_delay(&self, delay: Duration) {
        self.reply_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Total meta queries received
    pub fn meta_query_count(&self) -> usize {
        self.meta_queries.lock().values().sum()
    }

    /// Meta queries received by one meta server
    pub fn meta_queries_to(&self, meta_server: SocketAddr) -> usize {
        self.meta_queries.lock().get(&meta_server).copied().unwrap_or(0)
    }

    /// Total replica sends received
    pub fn send_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    fn update_partition<R>(
        &self,
        table: &str,
        partition_index: u32,
        f: impl FnOnce(&mut MockPartition) -> R,
    ) -> Option<R> {
        let mut tables = self.tables.write();
        tables
            .get_mut(table)
            .and_then(|t| t.partitions.get_mut(partition_index as usize))
            .map(f)
    }

    fn serve(&self, address: SocketAddr, request: &RpcRequest) -> Result<Bytes, RpcError> {
        let mut tables = self.tables.write();
        let table = tables
            .values_mut()
            .find(|t| t.app_id == request.gpid.app_id)
            .ok_or_else(|| RpcError::new(ErrorCode::AppDropped, "table was dropped"))?;
        let partition = usize::try_from(request.gpid.partition_index)
            .ok()
            .and_then(|index| table.partitions.get_mut(index))
            .ok_or_else(|| RpcError::new(ErrorCode::InvalidParameters, "no such partition"))?;

        if let Some(code) = partition.faults.pop_front().or(partition.sticky_fault) {
            return Err(RpcError::new(code, "injected fault"));
        }
        if partition.config.primary != Some(address) {
            return Err(RpcError::new(
                ErrorCode::ObjectNotFound,
                format!("{} is not primary of {}", address, request.gpid),
            ));
        }

        let body = OperationBody::decode(&request.body)
            .map_err(|e| RpcError::new(ErrorCode::InvalidData, e.to_string()))?;
        let reply = match body {
            OperationBody::Get { hash_key, sort_key } => {
                encode_reply(&partition.data.get(&(hash_key, sort_key)).cloned())
            }
            // TTL is accepted but not enforced
            OperationBody::Put {
                hash_key,
                sort_key,
                value,
                ..
            } => {
                partition.data.insert((hash_key, sort_key), value);
                Ok(Bytes::new())
            }
            OperationBody::Remove { hash_key, sort_key } => {
                partition.data.remove(&(hash_key, sort_key));
                Ok(Bytes::new())
            }
            OperationBody::Exist { hash_key, sort_key } => {
                encode_reply(&partition.data.contains_key(&(hash_key, sort_key)))
            }
        };
        reply.map_err(|e| RpcError::new(ErrorCode::InvalidData, e.to_string()))
    }
}

impl Transport for MockCluster {
    fn send(&self, address: SocketAddr, request: &RpcRequest, timeout: Duration) -> Result<Bytes, RpcError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);

        let delay = Duration::from_millis(self.reply_delay_ms.load(Ordering::Relaxed));
        if delay >= timeout {
            thread::sleep(timeout);
            return Err(RpcError::timeout(format!("no reply from {} within {:?}", address, timeout)));
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.serve(address, request)
    }
}

impl MetaClient for MockCluster {
    fn query_config(
        &self,
        meta_server: SocketAddr,
        table: &str,
        _timeout: Duration,
    ) -> Result<QueryConfigResponse, RpcError> {
        *self.meta_queries.lock().entry(meta_server).or_insert(0) += 1;

        if self.down_metas.lock().contains(&meta_server) {
            return Err(RpcError::new(
                ErrorCode::NetworkFailure,
                format!("connection to {} refused", meta_server),
            ));
        }

        self.tables
            .read()
            .get(table)
            .map(MockTable::response)
            .ok_or_else(|| RpcError::new(ErrorCode::ObjectNotFound, format!("table {} not found", table)))
    }
}
