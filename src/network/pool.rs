//! Worker Pool
//!
//! A fixed set of threads draining one shared job queue.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread pool running dispatch jobs
///
/// A panicking job is logged and the worker keeps serving the queue.
/// Dropping the pool closes the queue, lets the workers finish what is
/// already queued and joins them.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("replikv-worker-{}", id))
                .spawn(move || run_jobs(rx))?;
            workers.push(handle);
        }
        Ok(Self {
            tx: Some(tx),
            workers,
        })
    }

    /// Queue a job; never blocks
    ///
    /// If the pool is shutting down the job is dropped, which resolves any
    /// promise it owns with an error.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sent = self
            .tx
            .as_ref()
            .map(|tx| tx.send(Box::new(job)).is_ok())
            .unwrap_or(false);
        if !sent {
            tracing::warn!("Worker pool is shut down, dropping job");
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the sender ends every worker's recv loop
        self.tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("Worker thread terminated abnormally");
            }
        }
    }
}

fn run_jobs(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let message = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Dispatch job panicked: {}", message);
        }
    }
    tracing::trace!("Worker exits because the pool is closed");
}
