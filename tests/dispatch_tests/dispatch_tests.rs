//! Tests for request dispatch and failover
//!
//! These tests verify:
//! - Basic get/set/del/exist operations
//! - Recovery from stale routing via topology refresh
//! - Backoff-and-retry for transient errors
//! - Immediate failure for permanent errors
//! - Absolute deadlines and timeouts
//! - Concurrent operations never cross-resolve

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use replikv::mock::MockCluster;
use replikv::network::RpcError;
use replikv::taxonomy::ErrorKind;
use replikv::topology::{MetaClient, QueryConfigResponse};
use replikv::{
    Client, ClientError, ClientOptions, ErrorCode, ErrorPolicy, ResponseFuture, RetryPolicy, Table, TableOptions,
};

// =============================================================================
// Helper Functions
// =============================================================================

const META_LIST: &str = "127.0.0.1:34601,127.0.0.1:34602,127.0.0.1:34603";

fn setup_table(partitions: u32) -> (Arc<MockCluster>, Client, Table) {
    setup_table_with(partitions, TableOptions::default())
}

fn setup_table_with(partitions: u32, table_options: TableOptions) -> (Arc<MockCluster>, Client, Table) {
    let cluster = Arc::new(MockCluster::new());
    cluster.create_table("temp", partitions);

    let options = ClientOptions::builder()
        .meta_servers(META_LIST)
        .async_workers(4)
        .refresh_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let client = Client::new(options, cluster.clone(), cluster.clone()).unwrap();
    let table = client.open_table_with("temp", table_options).unwrap();
    (cluster, client, table)
}

/// Meta client that, once stalled, uses up every timeout it is given
struct StallingMeta {
    cluster: Arc<MockCluster>,
    stalled: AtomicBool,
}

impl MetaClient for StallingMeta {
    fn query_config(
        &self,
        meta_server: SocketAddr,
        table: &str,
        timeout: Duration,
    ) -> Result<QueryConfigResponse, RpcError> {
        if self.stalled.load(Ordering::SeqCst) {
            thread::sleep(timeout);
            return Err(RpcError::timeout("meta server did not answer"));
        }
        self.cluster.query_config(meta_server, table, timeout)
    }
}

fn partition_of(table: &Table, hash_key: &[u8]) -> u32 {
    table.handler().gpid_for_key(hash_key, b"").partition_index as u32
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_set_get_exist_del() {
    let (_cluster, _client, table) = setup_table(8);

    table.set(b"user", b"name", b"alice", 0, 0).unwrap();
    assert_eq!(table.get(b"user", b"name", 0).unwrap(), Some(b"alice".to_vec()));
    assert!(table.exist(b"user", b"name", 0).unwrap());

    table.del(b"user", b"name", 0).unwrap();
    assert_eq!(table.get(b"user", b"name", 0).unwrap(), None);
    assert!(!table.exist(b"user", b"name", 0).unwrap());
}

#[test]
fn test_client_rejects_unusable_options() {
    let cluster = Arc::new(MockCluster::new());
    cluster.create_table("temp", 4);

    let no_workers = ClientOptions {
        meta_servers: META_LIST.to_string(),
        async_workers: 0,
        ..Default::default()
    };
    let result = Client::new(no_workers, cluster.clone(), cluster.clone());
    assert!(matches!(result, Err(ClientError::Config(_))));

    let zero_timeout = ClientOptions {
        meta_servers: META_LIST.to_string(),
        operation_timeout: Duration::ZERO,
        ..Default::default()
    };
    let result = Client::new(zero_timeout, cluster.clone(), cluster.clone());
    assert!(matches!(result, Err(ClientError::Config(_))));

    let options = ClientOptions::builder().meta_servers(META_LIST).build().unwrap();
    let client = Client::new(options, cluster.clone(), cluster.clone()).unwrap();
    let table_options = TableOptions::default().operation_timeout(Duration::ZERO);
    assert!(matches!(
        client.open_table_with("temp", table_options),
        Err(ClientError::Config(_))
    ));
}

#[test]
fn test_get_missing_key() {
    let (_cluster, _client, table) = setup_table(4);
    assert_eq!(table.get(b"nobody", b"", 0).unwrap(), None);
}

#[test]
fn test_overwrite_value() {
    let (_cluster, _client, table) = setup_table(4);
    table.set(b"k", b"s", b"v1", 0, 0).unwrap();
    table.set(b"k", b"s", b"v2", 60, 0).unwrap();
    assert_eq!(table.get(b"k", b"s", 0).unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_empty_hash_key_routes_by_sort_key() {
    let (_cluster, _client, table) = setup_table(4);
    table.set(b"", b"only-sort", b"v", 0, 0).unwrap();
    assert_eq!(table.get(b"", b"only-sort", 0).unwrap(), Some(b"v".to_vec()));
}

// =============================================================================
// Failover Tests
// =============================================================================

#[test]
fn test_stale_routing_recovers_after_refresh() {
    let (cluster, _client, table) = setup_table(4);
    let pidx = partition_of(&table, b"user");
    let old_primary = table.handler().get_replica_config(pidx).primary.unwrap();

    let target = MockCluster::replica_address(pidx as u16 + 1);
    assert_ne!(target, old_primary);
    cluster.move_primary("temp", pidx, target);

    let queries_before = cluster.meta_query_count();
    table.set(b"user", b"name", b"bob", 0, 0).unwrap();

    // First attempt hit the old primary, the second the new one
    assert_eq!(cluster.send_count(), 2);
    assert!(cluster.meta_query_count() > queries_before);
    assert_eq!(table.handler().get_replica_config(pidx).primary, Some(target));
    assert_eq!(table.get(b"user", b"name", 0).unwrap(), Some(b"bob".to_vec()));
}

#[test]
fn test_transient_error_is_retried() {
    let (cluster, _client, table) = setup_table(4);
    let pidx = partition_of(&table, b"user");
    cluster.inject_fault("temp", pidx, ErrorCode::Busy, 2);

    table.set(b"user", b"name", b"carol", 0, 0).unwrap();
    assert_eq!(cluster.send_count(), 3);
}

#[test]
fn test_transient_error_exhausts_retries() {
    let (cluster, _client, table) = setup_table_with(4, TableOptions::for_test());
    let pidx = partition_of(&table, b"user");
    cluster.set_sticky_fault("temp", pidx, Some(ErrorCode::Busy));

    let err = table.set(b"user", b"name", b"v", 0, 0).unwrap_err();
    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::TransientRemote);
    assert_eq!(classified.code(), ErrorCode::Busy);
    assert!(err.to_string().ends_with("Rate of requests exceeds the throughput limit!"));
    assert_eq!(cluster.send_count(), 2);
}

#[test]
fn test_routing_error_exhausts_retries() {
    let (cluster, _client, table) = setup_table(4);
    let pidx = partition_of(&table, b"user");
    cluster.set_sticky_fault("temp", pidx, Some(ErrorCode::ObjectNotFound));

    let err = table.get(b"user", b"name", 0).unwrap_err();
    assert_eq!(err.classified().unwrap().code(), ErrorCode::ObjectNotFound);
    assert_eq!(cluster.send_count(), RetryPolicy::default().max_attempts as usize);
}

#[test]
fn test_permanent_error_fails_after_one_attempt() {
    let (cluster, _client, table) = setup_table(4);
    let pidx = partition_of(&table, b"user");
    cluster.inject_fault("temp", pidx, ErrorCode::InvalidParameters, 1);

    let err = table.set(b"user", b"name", b"v", 0, 0).unwrap_err();
    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::PermanentRemote);
    assert_eq!(classified.code(), ErrorCode::InvalidParameters);
    assert!(err.to_string().contains("ERR_INVALID_PARAMETERS: [metaServer="));
    assert_eq!(cluster.send_count(), 1);
}

#[test]
fn test_dropped_table_is_permanent() {
    let (cluster, _client, table) = setup_table(4);
    cluster.drop_table("temp");

    let err = table.get(b"user", b"name", 0).unwrap_err();
    assert_eq!(err.classified().unwrap().code(), ErrorCode::AppDropped);
    assert_eq!(cluster.send_count(), 1);
}

#[test]
fn test_error_policy_is_configurable() {
    let cluster = Arc::new(MockCluster::new());
    cluster.create_table("temp", 4);
    let options = ClientOptions::builder()
        .meta_servers(META_LIST)
        .error_policy(ErrorPolicy::default().with_permanent(ErrorCode::Busy))
        .build()
        .unwrap();
    let client = Client::new(options, cluster.clone(), cluster.clone()).unwrap();
    let table = client.open_table("temp").unwrap();
    cluster.inject_fault("temp", partition_of(&table, b"user"), ErrorCode::Busy, 1);

    let err = table.set(b"user", b"name", b"v", 0, 0).unwrap_err();
    assert_eq!(err.classified().unwrap().kind(), ErrorKind::PermanentRemote);
    assert_eq!(cluster.send_count(), 1);
}

#[test]
fn test_unknown_primary_fails_without_sending() {
    let (cluster, _client, table) = setup_table(4);
    let pidx = partition_of(&table, b"user");
    cluster.clear_primary("temp", pidx);
    table.handler().refresh().unwrap();

    let err = table.get(b"user", b"name", 0).unwrap_err();
    let classified = err.classified().unwrap();
    assert_eq!(classified.code(), ErrorCode::ObjectNotFound);
    assert!(classified.context().replica_server.is_none());
    assert!(err.to_string().ends_with("The primary replica of this partition is unknown!"));
    assert!(!err.to_string().contains("replicaServer="));
    assert_eq!(cluster.send_count(), 0);
}

// =============================================================================
// Deadline Tests
// =============================================================================

#[test]
fn test_slow_replica_times_out() {
    let (cluster, _client, table) = setup_table(4);
    cluster.set_reply_delay(Duration::from_millis(500));

    let start = Instant::now();
    let err = table.get(b"user", b"name", 100).unwrap_err();
    assert!(start.elapsed() < Duration::from_millis(450));

    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::Timeout);
    assert!(err.to_string().ends_with("timeout=100ms] The operation is timed out!"));
}

#[test]
fn test_table_timeout_override() {
    let options = TableOptions::default().operation_timeout(Duration::from_millis(150));
    let (cluster, _client, table) = setup_table_with(4, options);
    cluster.set_reply_delay(Duration::from_secs(1));

    let err = table.get(b"user", b"name", 0).unwrap_err();
    assert!(err.to_string().contains("timeout=150ms]"));
}

#[test]
fn test_retries_stop_at_deadline() {
    let policy = RetryPolicy {
        max_attempts: 1000,
        initial_backoff: Duration::from_millis(40),
        max_backoff: Duration::from_millis(40),
        multiplier: 1.0,
    };
    let (cluster, _client, table) = setup_table_with(4, TableOptions::default().retry_policy(policy));
    let pidx = partition_of(&table, b"user");
    cluster.set_sticky_fault("temp", pidx, Some(ErrorCode::Busy));

    let start = Instant::now();
    let err = table.get(b"user", b"name", 200).unwrap_err();
    let elapsed = start.elapsed();

    // Total latency is bounded by the caller's budget, not attempts x timeout
    assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
    assert_eq!(err.classified().unwrap().code(), ErrorCode::Timeout);
    assert!(cluster.send_count() < 20);
}

#[test]
fn test_routing_refresh_respects_deadline() {
    let cluster = Arc::new(MockCluster::new());
    cluster.create_table("temp", 4);
    let meta = Arc::new(StallingMeta {
        cluster: cluster.clone(),
        stalled: AtomicBool::new(false),
    });

    let options = ClientOptions::builder()
        .meta_servers(META_LIST)
        .meta_query_timeout(Duration::from_secs(1))
        .refresh_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let client = Client::new(options, meta.clone(), cluster.clone()).unwrap();
    let table = client.open_table_with("temp", TableOptions::for_test()).unwrap();

    let gpid = table.handler().gpid_for_key(b"user", b"name");
    cluster.set_sticky_fault("temp", gpid.partition_index as u32, Some(ErrorCode::ObjectNotFound));
    meta.stalled.store(true, Ordering::SeqCst);

    let start = Instant::now();
    let err = table.async_set(b"user", b"name", b"v", 0, 200).wait().unwrap_err();
    let elapsed = start.elapsed();
    assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);

    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::Timeout);
    assert!(err.to_string().contains(&format!("gpid=({}),timeout=200ms]", gpid)));

    // A blocking call still gets the replica diagnostic, not an await timeout
    let err = table.set(b"user", b"name", b"v", 0, 200).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("replicaServer="), "{}", rendered);
    assert!(rendered.ends_with("timeout=200ms] The operation is timed out!"), "{}", rendered);
}

#[test]
fn test_cancelled_request_stops_retrying() {
    let policy = RetryPolicy {
        max_attempts: 10_000,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(10),
        multiplier: 1.0,
    };
    let (cluster, _client, table) = setup_table_with(4, TableOptions::default().retry_policy(policy));
    cluster.set_sticky_fault("temp", partition_of(&table, b"user"), Some(ErrorCode::Busy));

    let future = table.async_get(b"user", b"name", 10_000);
    assert!(future.wait_timeout(Duration::from_millis(50)).is_err());

    thread::sleep(Duration::from_millis(100));
    let sends = cluster.send_count();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(cluster.send_count(), sends);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_operations_resolve_their_own_handles() {
    const THREADS: usize = 8;
    const OPS: usize = 50;

    let (_cluster, _client, table) = setup_table(2);
    let mut handles = Vec::with_capacity(THREADS);
    for t in 0..THREADS {
        let table = table.clone();
        handles.push(thread::spawn(move || {
            for i in 0..OPS {
                let sort_key = format!("{}:{}", t, i);
                let value = format!("value-{}-{}", t, i);
                table.set(b"shared", sort_key.as_bytes(), value.as_bytes(), 0, 0).unwrap();
                let read = table.get(b"shared", sort_key.as_bytes(), 0).unwrap();
                assert_eq!(read, Some(value.into_bytes()));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_async_fan_out() {
    let (_cluster, _client, table) = setup_table(4);

    let futures: Vec<ResponseFuture<()>> = (0..100)
        .map(|i| {
            let key = format!("key-{}", i);
            table.async_set(key.as_bytes(), b"s", key.as_bytes(), 0, 0)
        })
        .collect();
    for future in futures {
        future.wait().unwrap();
    }

    let futures: Vec<_> = (0..100)
        .map(|i| table.async_get(format!("key-{}", i).as_bytes(), b"s", 0))
        .collect();
    for (i, future) in futures.into_iter().enumerate() {
        assert_eq!(future.wait().unwrap(), Some(format!("key-{}", i).into_bytes()));
    }
}
