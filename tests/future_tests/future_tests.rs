//! Tests for completion handles
//!
//! These tests verify:
//! - Interrupting a wait yields a terminal ERR_THREAD_INTERRUPTED diagnostic
//! - Bounded waits report their own timeout
//! - Polling observes the outcome exactly once
//! - Promises are never silently dropped

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use replikv::mock::MockCluster;
use replikv::request::{promise, WaitContext};
use replikv::taxonomy::ErrorKind;
use replikv::{Client, ClientOptions, Interrupter, ResponseFuture, Table, VERSION_TAG};

// =============================================================================
// Helper Functions
// =============================================================================

const META_LIST: &str = "127.0.0.1:34601";

fn setup_table(name: &str) -> (Arc<MockCluster>, Client, Table) {
    let cluster = Arc::new(MockCluster::new());
    cluster.create_table(name, 4);
    let options = ClientOptions::builder()
        .meta_servers(META_LIST)
        .refresh_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let client = Client::new(options, cluster.clone(), cluster.clone()).unwrap();
    let table = client.open_table(name).unwrap();
    (cluster, client, table)
}

// =============================================================================
// Interruption Tests
// =============================================================================

#[test]
fn test_interrupted_wait_is_classified() {
    let (cluster, _client, table) = setup_table("test");
    cluster.set_reply_delay(Duration::from_millis(500));

    let future = table.async_get(b"hashKey", b"sortKey", 0);
    let interrupter = Interrupter::new();
    let remote = interrupter.clone();
    let firing = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.interrupt("intxxx");
    });

    let err = future.wait_interruptible(&interrupter).unwrap_err();
    firing.join().unwrap();

    assert_eq!(
        err.to_string(),
        format!(
            "{}: ReplicationError: ERR_THREAD_INTERRUPTED: [table=test] Thread was interrupted: intxxx",
            VERSION_TAG
        )
    );
    assert_eq!(err.classified().unwrap().kind(), ErrorKind::ThreadInterrupted);
}

#[test]
fn test_interrupter_wakes_every_waiter() {
    let interrupter = Interrupter::new();
    let mut waiters = Vec::new();
    for _ in 0..4 {
        let (promise, future) = promise::<u32>(WaitContext {
            table: "test".to_string(),
            ..Default::default()
        });
        let interrupter = interrupter.clone();
        waiters.push(thread::spawn(move || {
            let result = future.wait_interruptible(&interrupter);
            drop(promise);
            result
        }));
    }

    thread::sleep(Duration::from_millis(20));
    interrupter.interrupt("shutdown");
    for waiter in waiters {
        let err = waiter.join().unwrap().unwrap_err();
        assert!(err.to_string().ends_with("Thread was interrupted: shutdown"));
    }
}

#[test]
fn test_completed_before_interrupt_wins() {
    let (_cluster, _client, table) = setup_table("temp");
    let future = table.async_set(b"k", b"s", b"v", 0, 0);
    let interrupter = Interrupter::new();
    assert!(future.wait_interruptible(&interrupter).is_ok());
}

// =============================================================================
// Bounded Wait Tests
// =============================================================================

#[test]
fn test_wait_timeout_reports_waited_duration() {
    let (cluster, _client, table) = setup_table("temp");
    cluster.set_reply_delay(Duration::from_millis(300));

    let future = table.async_get(b"hashKey", b"sortKey", 1000);
    let err = future.wait_timeout(Duration::from_millis(50)).unwrap_err();

    let rendered = err.to_string();
    assert!(rendered.contains(&format!(
        "ERR_TIMEOUT: [metaServer={}, table=temp, request=[hashKey[:32]=\"hashKey\"",
        META_LIST
    )));
    assert!(rendered.contains("timeout=50ms] Timeout on Future await:"));
    assert_eq!(err.classified().unwrap().kind(), ErrorKind::Timeout);
}

// =============================================================================
// Polling Tests
// =============================================================================

#[test]
fn test_try_get_yields_once() {
    let (_cluster, _client, table) = setup_table("temp");
    let mut future: ResponseFuture<()> = table.async_set(b"k", b"s", b"v", 0, 0);

    let mut outcome = None;
    for _ in 0..200 {
        if let Some(result) = future.try_get() {
            outcome = Some(result);
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(outcome.unwrap().is_ok());
    assert!(future.try_get().is_none());
}

#[test]
fn test_ready_future() {
    let future = ResponseFuture::ready(Ok(7u32), WaitContext::default());
    assert_eq!(future.wait().unwrap(), 7);
}

// =============================================================================
// Drop Tests
// =============================================================================

#[test]
fn test_dropped_promise_resolves_future() {
    let (promise, future) = promise::<u32>(WaitContext::default());
    thread::spawn(move || drop(promise)).join().unwrap();
    let err = future.wait().unwrap_err();
    assert!(err.to_string().ends_with("request dropped before completion"));
}
