//! Client Module
//!
//! The caller-facing API: a `Client` bound to one cluster and the `Table`
//! handles it opens.
//!
//! ## Responsibilities
//! - Open tables through the cluster manager
//! - Turn each caller operation into one pending request
//! - Run pending requests on the worker pool so callers never block on
//!   dispatch, only (optionally) on the completion handle
//!
//! ## Timeouts
//! A caller timeout of 0 means "use the table's default". The effective value
//! is the absolute deadline of the request and the value reported in every
//! diagnostic.

mod dispatch;
mod table;

pub use table::Table;

use std::sync::Arc;

use crate::config::{ClientOptions, TableOptions};
use crate::error::{ClientError, Result};
use crate::network::{TcpTransport, Transport, WorkerPool};
use crate::topology::{ClusterManager, MetaClient};

use dispatch::Dispatcher;

/// State shared between a client and the tables it opened
pub(crate) struct ClientInner {
    pub(crate) options: ClientOptions,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) pool: WorkerPool,
}

/// Entry point for talking to one cluster
///
/// Constructed explicitly and passed by reference; there is no process-wide
/// instance. Tables opened from a client stay usable after the client is
/// dropped, but their topology is no longer refreshed in the background.
pub struct Client {
    inner: Arc<ClientInner>,
    cluster: ClusterManager,
}

impl Client {
    /// Create a client over the given meta and replica collaborators
    ///
    /// Fails with `ClientError::Config` if the options are unusable, also when
    /// they were assembled without the builder.
    pub fn new(
        options: ClientOptions,
        meta: Arc<dyn MetaClient>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        options.validate()?;
        let cluster = ClusterManager::new(&options, meta)?;
        let pool = WorkerPool::new(options.async_workers)?;

        tracing::info!(
            meta_servers = %options.meta_servers,
            workers = options.async_workers,
            "Client started"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                options,
                transport,
                pool,
            }),
            cluster,
        })
    }

    /// Create a client using the TCP transport for both meta and replica traffic
    pub fn connect_tcp(options: ClientOptions) -> Result<Self> {
        let transport = Arc::new(TcpTransport::new());
        Self::new(options, transport.clone(), transport)
    }

    /// Open a table with default table options
    pub fn open_table(&self, name: &str) -> Result<Table> {
        self.open_table_with(name, TableOptions::default())
    }

    /// Open a table
    ///
    /// Fetches the table's topology synchronously and fails with a classified
    /// error if the table does not exist or no meta server is reachable.
    pub fn open_table_with(&self, name: &str, table_options: TableOptions) -> Result<Table> {
        if table_options.operation_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ClientError::Config("operation_timeout must be positive".to_string()));
        }
        let handler = self.cluster.open_table(name)?;
        let options = &self.inner.options;

        let dispatcher = Dispatcher {
            transport: Arc::clone(&self.inner.transport),
            table: handler,
            error_policy: Arc::new(options.error_policy.clone()),
            retry_policy: table_options
                .retry_policy
                .unwrap_or_else(|| options.retry_policy.clone()),
        };
        let operation_timeout = table_options
            .operation_timeout
            .unwrap_or(options.operation_timeout);

        Ok(Table::new(
            Arc::clone(&self.inner),
            Arc::new(dispatcher),
            operation_timeout,
        ))
    }

    /// Meta server list as configured
    pub fn meta_list(&self) -> &str {
        self.cluster.meta_list()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Names of tables with live handles
    pub fn open_tables(&self) -> Vec<String> {
        self.cluster.open_tables()
    }
}
