//! Configuration for replikv
//!
//! Centralized client configuration with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::taxonomy::ErrorPolicy;

/// Main configuration for a client instance
#[derive(Debug, Clone)]
pub struct ClientOptions {
    // -------------------------------------------------------------------------
    // Cluster Configuration
    // -------------------------------------------------------------------------
    /// Comma separated meta server list, kept verbatim for diagnostics
    pub meta_servers: String,

    // -------------------------------------------------------------------------
    // Request Configuration
    // -------------------------------------------------------------------------
    /// Default timeout, also the floor applied when a caller passes 0
    pub operation_timeout: Duration,

    /// Retry budget and backoff shape for failed attempts
    pub retry_policy: RetryPolicy,

    /// Which remote codes are routing, transient or permanent
    pub error_policy: ErrorPolicy,

    /// Number of dispatch worker threads
    pub async_workers: usize,

    // -------------------------------------------------------------------------
    // Topology Configuration
    // -------------------------------------------------------------------------
    /// Timeout of one meta server query
    pub meta_query_timeout: Duration,

    /// Cap on meta queries per refresh (round robin); `None` means twice the
    /// number of meta servers
    pub meta_query_attempts: Option<usize>,

    /// Period of the background topology refresh
    pub refresh_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            meta_servers: "127.0.0.1:34601".to_string(),
            operation_timeout: Duration::from_millis(1000),
            retry_policy: RetryPolicy::default(),
            error_policy: ErrorPolicy::default(),
            async_workers: 4,
            meta_query_timeout: Duration::from_millis(1000),
            meta_query_attempts: None,
            refresh_interval: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    /// Create a new options builder
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Parsed meta server addresses, in configured order
    pub fn meta_addresses(&self) -> Result<Vec<SocketAddr>> {
        let addresses = self
            .meta_servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<SocketAddr>().map_err(|e| {
                    ClientError::Config(format!("invalid meta server address '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if addresses.is_empty() {
            return Err(ClientError::Config("empty meta server list".to_string()));
        }
        Ok(addresses)
    }

    /// Meta query cap for a cluster with `meta_count` meta servers
    pub fn meta_query_attempts_for(&self, meta_count: usize) -> usize {
        self.meta_query_attempts.unwrap_or(meta_count * 2).max(1)
    }

    /// Reject options a client cannot run with
    pub(crate) fn validate(&self) -> Result<()> {
        self.meta_addresses()?;
        if self.async_workers == 0 {
            return Err(ClientError::Config("async_workers must be at least 1".to_string()));
        }
        if self.operation_timeout.is_zero() {
            return Err(ClientError::Config("operation_timeout must be positive".to_string()));
        }
        if self.meta_query_timeout.is_zero() {
            return Err(ClientError::Config("meta_query_timeout must be positive".to_string()));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(ClientError::Config(
                "retry_policy.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ClientOptions
#[derive(Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the meta server list ("ip:port,ip:port,...")
    pub fn meta_servers(mut self, meta_servers: impl Into<String>) -> Self {
        self.options.meta_servers = meta_servers.into();
        self
    }

    /// Set the default operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.options.operation_timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.options.retry_policy = policy;
        self
    }

    /// Set the error classification policy
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.options.error_policy = policy;
        self
    }

    /// Set the number of dispatch workers
    pub fn async_workers(mut self, count: usize) -> Self {
        self.options.async_workers = count;
        self
    }

    /// Set the meta query timeout
    pub fn meta_query_timeout(mut self, timeout: Duration) -> Self {
        self.options.meta_query_timeout = timeout;
        self
    }

    /// Cap the number of meta queries per refresh
    pub fn meta_query_attempts(mut self, attempts: usize) -> Self {
        self.options.meta_query_attempts = Some(attempts);
        self
    }

    /// Set the background refresh period
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.options.refresh_interval = interval;
        self
    }

    pub fn build(self) -> Result<ClientOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Retry budget for one pending request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,

    /// Backoff before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for any single backoff
    pub max_backoff: Duration,

    /// Growth factor between consecutive backoffs
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff to wait after the `attempt`-th failure (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Per-table options given to `open_table`
///
/// Unset fields fall back to the client-wide values in `ClientOptions`.
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    /// Default timeout for operations on this table
    pub operation_timeout: Option<Duration>,

    /// Retry policy for operations on this table
    pub retry_policy: Option<RetryPolicy>,
}

impl TableOptions {
    /// Options suitable for tests: fail fast, no retries beyond the first refresh
    pub fn for_test() -> Self {
        Self {
            operation_timeout: None,
            retry_policy: Some(RetryPolicy {
                max_attempts: 2,
                ..Default::default()
            }),
        }
    }

    /// Override the default operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Override the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }
}
