//! Cluster Manager
//!
//! Owns the meta server list and the registry of open tables, and keeps every
//! open table's partition map fresh.
//!
//! ## Refresh paths
//! - Synchronous: `open_table` and routing failures call `refresh` on the
//!   calling (worker) thread.
//! - Background: a refresher thread wakes on a timer, or on demand through
//!   `request_refresh`, and refreshes tables that still have live handles.
//!
//! Meta servers are queried round robin starting from the last one that
//! answered, with a capped number of attempts per refresh. A refresh made on
//! behalf of a request also stops at that request's deadline.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::RwLock;

use crate::base::ErrorCode;
use crate::config::ClientOptions;
use crate::error::Result;
use crate::taxonomy::ClassifiedError;

use super::{ApplyStats, MetaClient, PartitionMap, QueryConfigResponse, TableHandler};

/// State shared by the manager, its refresher thread and every table handle
pub(crate) struct ClusterInner {
    /// Meta server list as configured, for diagnostics
    meta_list: String,
    meta_addresses: Vec<SocketAddr>,
    meta: Arc<dyn MetaClient>,

    /// Index of the meta server that answered last
    meta_cursor: AtomicUsize,
    meta_query_timeout: Duration,
    meta_query_attempts: usize,

    tables: RwLock<HashMap<String, Weak<PartitionMap>>>,
    refresh_tx: Sender<String>,
}

impl ClusterInner {
    pub(crate) fn meta_list(&self) -> &str {
        &self.meta_list
    }

    /// Query meta servers round robin for a table's configuration
    ///
    /// With a `deadline`, each query is capped by the time left and the round
    /// robin stops once it passes.
    pub(crate) fn query_meta(
        &self,
        table: &str,
        deadline: Option<Instant>,
    ) -> std::result::Result<QueryConfigResponse, ClassifiedError> {
        let count = self.meta_addresses.len();
        let start = self.meta_cursor.load(Ordering::Relaxed);
        let mut last_error = None;
        let mut queried = 0;

        for attempt in 0..self.meta_query_attempts {
            let timeout = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining.min(self.meta_query_timeout),
                    _ => {
                        tracing::debug!(table, queried, "Deadline passed during meta queries");
                        return Err(ClassifiedError::topology_unavailable(
                            ErrorCode::Timeout,
                            &self.meta_list,
                            table,
                            format!("Deadline passed after {} meta queries", queried),
                        ));
                    }
                },
                None => self.meta_query_timeout,
            };

            let index = (start + attempt) % count;
            let meta_server = self.meta_addresses[index];
            queried += 1;

            match self.meta.query_config(meta_server, table, timeout) {
                Ok(response) => {
                    self.meta_cursor.store(index, Ordering::Relaxed);
                    if response.partition_count == 0 {
                        return Err(ClassifiedError::topology_unavailable(
                            ErrorCode::InvalidData,
                            &self.meta_list,
                            table,
                            "The meta server reported a table without partitions!",
                        ));
                    }
                    return Ok(response);
                }
                Err(e) if matches!(e.code, ErrorCode::ObjectNotFound | ErrorCode::AppNotExist) => {
                    tracing::warn!(table, meta = %meta_server, "Table does not exist");
                    return Err(ClassifiedError::topology_unavailable(
                        e.code,
                        &self.meta_list,
                        table,
                        "The table doesn't exist!",
                    ));
                }
                Err(e) => {
                    tracing::debug!(
                        table,
                        meta = %meta_server,
                        attempt = attempt + 1,
                        error = %e,
                        "Meta query failed, trying next meta server"
                    );
                    last_error = Some(e);
                }
            }
        }

        let (code, cause) = match last_error {
            Some(e) => (e.code, e.message),
            None => (ErrorCode::NetworkFailure, "no meta query issued".to_string()),
        };
        tracing::warn!(table, attempts = self.meta_query_attempts, %code, "No meta server reachable");
        Err(ClassifiedError::topology_unavailable(
            code,
            &self.meta_list,
            table,
            format!(
                "No meta server is reachable after {} attempts: {}",
                self.meta_query_attempts, cause
            ),
        ))
    }

    /// Refresh one table's partition map synchronously
    pub(crate) fn refresh(
        &self,
        map: &PartitionMap,
        deadline: Option<Instant>,
    ) -> std::result::Result<ApplyStats, ClassifiedError> {
        let response = self.query_meta(map.table_name(), deadline)?;
        let stats = map.apply(&response);
        tracing::debug!(
            table = map.table_name(),
            applied = stats.applied,
            stale = stats.stale,
            "Refreshed table configuration"
        );
        Ok(stats)
    }

    /// Ask the refresher thread to refresh a table soon; never blocks
    pub(crate) fn request_refresh(&self, table: &str) {
        if self.refresh_tx.try_send(table.to_string()).is_err() {
            tracing::trace!(table, "Refresh queue full or closed, skipping");
        }
    }

    fn live_table(&self, name: &str) -> Option<Arc<PartitionMap>> {
        self.tables.read().get(name).and_then(Weak::upgrade)
    }

    fn refresh_by_name(&self, name: &str) {
        if let Some(map) = self.live_table(name) {
            if let Err(e) = self.refresh(&map, None) {
                tracing::warn!(table = name, "Background refresh failed: {}", e);
            }
        }
    }

    fn refresh_all(&self) {
        let live: Vec<Arc<PartitionMap>> = {
            let mut tables = self.tables.write();
            tables.retain(|_, weak| weak.strong_count() > 0);
            tables.values().filter_map(Weak::upgrade).collect()
        };
        for map in live {
            if let Err(e) = self.refresh(&map, None) {
                tracing::warn!(table = map.table_name(), "Periodic refresh failed: {}", e);
            }
        }
    }
}

/// Discovers and caches cluster topology for open tables
pub struct ClusterManager {
    inner: Arc<ClusterInner>,
    shutdown_tx: Option<Sender<()>>,
    refresher: Option<JoinHandle<()>>,
}

impl ClusterManager {
    /// Bound on queued background refresh requests
    const REFRESH_QUEUE_CAPACITY: usize = 64;

    /// Create a manager and start its background refresher
    pub fn new(options: &ClientOptions, meta: Arc<dyn MetaClient>) -> Result<Self> {
        let meta_addresses = options.meta_addresses()?;
        let (refresh_tx, refresh_rx) = channel::bounded(Self::REFRESH_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let inner = Arc::new(ClusterInner {
            meta_list: options.meta_servers.clone(),
            meta_query_attempts: options.meta_query_attempts_for(meta_addresses.len()),
            meta_addresses,
            meta,
            meta_cursor: AtomicUsize::new(0),
            meta_query_timeout: options.meta_query_timeout,
            tables: RwLock::new(HashMap::new()),
            refresh_tx,
        });

        let refresher = {
            let inner = Arc::clone(&inner);
            let interval = options.refresh_interval;
            thread::Builder::new()
                .name("replikv-refresher".to_string())
                .spawn(move || run_refresher(inner, refresh_rx, shutdown_rx, interval))?
        };

        Ok(Self {
            inner,
            shutdown_tx: Some(shutdown_tx),
            refresher: Some(refresher),
        })
    }

    /// Open a table, fetching its topology synchronously
    ///
    /// Opening an already open table returns a handle on the same partition
    /// map, so configuration updates are shared.
    pub fn open_table(&self, name: &str) -> std::result::Result<TableHandler, ClassifiedError> {
        if let Some(map) = self.inner.live_table(name) {
            return Ok(TableHandler::new(map, Arc::clone(&self.inner)));
        }

        let response = self.inner.query_meta(name, None)?;
        let map = {
            let mut tables = self.inner.tables.write();
            // Another thread may have opened it while we queried
            match tables.get(name).and_then(Weak::upgrade) {
                Some(existing) => {
                    existing.apply(&response);
                    existing
                }
                None => {
                    let map = Arc::new(PartitionMap::from_response(name, &response));
                    tables.insert(name.to_string(), Arc::downgrade(&map));
                    map
                }
            }
        };

        tracing::info!(
            table = name,
            app_id = map.app_id(),
            partitions = map.partition_count(),
            "Opened table"
        );
        Ok(TableHandler::new(map, Arc::clone(&self.inner)))
    }

    pub fn meta_list(&self) -> &str {
        self.inner.meta_list()
    }

    /// Names of tables that still have live handles
    pub fn open_tables(&self) -> Vec<String> {
        self.inner
            .tables
            .read()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl Drop for ClusterManager {
    fn drop(&mut self) {
        // Disconnecting the shutdown channel wakes the refresher
        self.shutdown_tx.take();
        if let Some(refresher) = self.refresher.take() {
            if refresher.join().is_err() {
                tracing::error!("Refresher thread terminated abnormally");
            }
        }
    }
}

fn run_refresher(
    inner: Arc<ClusterInner>,
    refresh_rx: Receiver<String>,
    shutdown_rx: Receiver<()>,
    interval: Duration,
) {
    let ticker = channel::tick(interval);
    loop {
        let running = select! {
            recv(shutdown_rx) -> _ => false,
            recv(refresh_rx) -> name => match name {
                Ok(name) => {
                    inner.refresh_by_name(&name);
                    true
                }
                Err(_) => false,
            },
            recv(ticker) -> _ => {
                inner.refresh_all();
                true
            }
        };
        if !running {
            break;
        }
    }
    tracing::debug!("Refresher stopped");
}
