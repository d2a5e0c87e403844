//! Tests for rendered diagnostics
//!
//! These tests verify:
//! - Literal diagnostic text for each error kind
//! - The version tag prefix on every client error
//! - Replica diagnostics produced by the full dispatch pipeline
//! - The effective timeout reported when a caller passes 0

use std::sync::Arc;
use std::time::Duration;

use replikv::mock::MockCluster;
use replikv::request::Request;
use replikv::taxonomy::ErrorKind;
use replikv::{
    ClassifiedError, Client, ClientError, ClientOptions, ErrorCode, TableOptions, VERSION_TAG,
};

// =============================================================================
// Helper Functions
// =============================================================================

const META_LIST: &str = "127.0.0.1:34601,127.0.0.1:34602,127.0.0.1:34603";

fn request() -> Request {
    Request::new("hashKey", "sortKey")
}

fn setup_client(meta_list: &str) -> (Arc<MockCluster>, Client) {
    let cluster = Arc::new(MockCluster::new());
    cluster.create_table("temp", 8);

    let options = ClientOptions::builder()
        .meta_servers(meta_list)
        .refresh_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let client = Client::new(options, cluster.clone(), cluster.clone()).unwrap();
    (cluster, client)
}

// =============================================================================
// Builder Rendering Tests
// =============================================================================

#[test]
fn test_thread_interrupted() {
    let err: ClientError = ClassifiedError::thread_interrupted("test", "intxxx").into();
    let expected = format!(
        "{}: ReplicationError: ERR_THREAD_INTERRUPTED: [table=test] Thread was interrupted: intxxx",
        VERSION_TAG
    );
    assert_eq!(err.to_string(), expected);
}

#[test]
fn test_timeout() {
    let err: ClientError = ClassifiedError::timeout(META_LIST, "test", request(), 1000, "tmxxx").into();
    let expected = format!(
        "{}: ReplicationError: ERR_TIMEOUT: [metaServer={}, table=test, request={}, timeout=1000ms] \
         Timeout on Future await: tmxxx",
        VERSION_TAG,
        META_LIST,
        request()
    );
    assert_eq!(err.to_string(), expected);
}

#[test]
fn test_version() {
    let err = ClientError::message("test");
    assert_eq!(err.to_string(), format!("{}: test", VERSION_TAG));

    let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline");
    let err = ClientError::with_cause("test", cause);
    assert_eq!(err.to_string(), format!("{}: test", VERSION_TAG));
}

#[test]
fn test_topology_unavailable_rendering() {
    let err = ClassifiedError::topology_unavailable(
        ErrorCode::ObjectNotFound,
        META_LIST,
        "nosuch",
        "The table doesn't exist!",
    );
    assert_eq!(
        err.to_string(),
        format!(
            "ReplicationError: ERR_OBJECT_NOT_FOUND: [metaServer={}, table=nosuch] The table doesn't exist!",
            META_LIST
        )
    );
    assert_eq!(err.kind(), ErrorKind::TopologyUnavailable);
}

// =============================================================================
// Pipeline Diagnostics Tests
// =============================================================================

#[test]
fn test_handle_replication_error() {
    let (cluster, client) = setup_client(META_LIST);
    let table = client.open_table_with("temp", TableOptions::for_test()).unwrap();
    let handler = table.handler();

    let gpid = handler.gpid_for_key(b"hashKey", b"sortKey");
    let partition_index = gpid.partition_index as u32;
    cluster.set_sticky_fault("temp", partition_index, Some(ErrorCode::ObjectNotFound));
    let queries_before = cluster.meta_query_count();

    let timeout = 1000;
    let err = table
        .set(b"hashKey", b"sortKey", b"value", 0, timeout)
        .unwrap_err();

    // A routing error refreshes topology before failing
    assert!(cluster.meta_query_count() > queries_before);

    let server = handler.get_replica_config(partition_index).primary.unwrap();
    let expected = format!(
        "{}: ReplicationError: ERR_OBJECT_NOT_FOUND: [metaServer={},table=temp,operation=put,\
         request={},replicaServer={},gpid=({}),timeout={}ms] The replica server doesn't serve this partition!",
        VERSION_TAG,
        client.meta_list(),
        request().with_value_length(5),
        server,
        gpid,
        timeout
    );
    assert_eq!(err.to_string(), expected);

    let classified = err.classified().unwrap();
    assert_eq!(classified.kind(), ErrorKind::NotServing);
    assert_eq!(classified.code(), ErrorCode::ObjectNotFound);
}

#[test]
fn test_timeout_is_zero() {
    // The meta list keeps its configured spacing in diagnostics
    let meta_list = "127.0.0.1:34601,127.0.0.1:34602, 127.0.0.1:34603";
    let (cluster, client) = setup_client(meta_list);
    let table = client.open_table_with("temp", TableOptions::for_test()).unwrap();
    let handler = table.handler();

    let gpid = handler.gpid_for_key(b"hashKey", b"sortKey");
    cluster.set_reply_delay(Duration::from_secs(5));

    let err = table.set(b"hashKey", b"sortKey", b"value", 0, 0).unwrap_err();

    let server = handler
        .get_replica_config(gpid.partition_index as u32)
        .primary
        .unwrap();
    let expected = format!(
        "{}: ReplicationError: ERR_TIMEOUT: [metaServer={},table=temp,operation=put,\
         request={},replicaServer={},gpid=({}),timeout=1000ms] The operation is timed out!",
        VERSION_TAG,
        meta_list,
        request().with_value_length(5),
        server,
        gpid
    );
    assert_eq!(err.to_string(), expected);
    assert_eq!(err.classified().unwrap().kind(), ErrorKind::Timeout);
}

#[test]
fn test_open_missing_table_diagnostic() {
    let (_cluster, client) = setup_client(META_LIST);
    let err = client.open_table("nosuch").unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "{}: ReplicationError: ERR_OBJECT_NOT_FOUND: [metaServer={}, table=nosuch] \
             The table doesn't exist!",
            VERSION_TAG, META_LIST
        )
    );
}

#[test]
fn test_same_error_renders_identically() {
    let (cluster, client) = setup_client(META_LIST);
    let table = client.open_table_with("temp", TableOptions::for_test()).unwrap();
    let gpid = table.handler().gpid_for_key(b"hashKey", b"sortKey");
    cluster.set_sticky_fault("temp", gpid.partition_index as u32, Some(ErrorCode::InvalidParameters));

    let first = table.get(b"hashKey", b"sortKey", 500).unwrap_err().to_string();
    let second = table.get(b"hashKey", b"sortKey", 500).unwrap_err().to_string();
    assert_eq!(first, second);
    assert!(first.ends_with("timeout=500ms]"));
}
