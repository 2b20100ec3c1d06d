//! Bounded background worker shared by queued sinks
//!
//! Slow transports (search index, datastore) accept a record by enqueueing it
//! and return immediately. One worker thread drains the queue in batches and
//! hands each batch to a [`BatchHandler`].

use crate::core::{LoggerError, LoggerMetrics, OverflowPolicy, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const BATCH_SIZE: usize = 50;
const BATCH_TIMEOUT_MS: u64 = 10;

/// Default time `flush` waits for the queue to drain
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time `Drop` waits for the worker thread to finish
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer side of a [`BackgroundWorker`]. Runs on the worker thread.
pub trait BatchHandler<T>: Send + 'static {
    /// Called once on the worker thread before the first batch
    fn on_start(&mut self) {}

    /// Deliver one batch. Failures are reported by the handler itself; the
    /// worker keeps running.
    fn handle_batch(&mut self, batch: &[T]);
}

/// Settings for a [`BackgroundWorker`]
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub flush_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow_policy: OverflowPolicy::default(),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use]
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

/// A named worker thread fed through a bounded channel
pub struct BackgroundWorker<T: Send + 'static> {
    name: String,
    sender: Option<Sender<T>>,
    handle: Option<JoinHandle<()>>,
    /// Records accepted but not yet handed to the handler
    pending: Arc<AtomicUsize>,
    metrics: Arc<LoggerMetrics>,
    config: WorkerConfig,
}

impl<T: Send + 'static> BackgroundWorker<T> {
    /// Spawn the worker thread
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity is zero or the thread cannot be spawned
    pub fn spawn<H: BatchHandler<T>>(
        name: impl Into<String>,
        handler: H,
        config: WorkerConfig,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self> {
        let name = name.into();
        if config.capacity == 0 {
            return Err(LoggerError::config(
                name,
                "queue capacity must be greater than zero",
            ));
        }

        let (sender, receiver) = bounded::<T>(config.capacity);
        let pending = Arc::new(AtomicUsize::new(0));
        let pending_clone = Arc::clone(&pending);
        let mut handler = handler;

        let handle = thread::Builder::new()
            .name(format!("{}-worker", name))
            .spawn(move || {
                handler.on_start();

                let mut batch = Vec::with_capacity(BATCH_SIZE);
                let mut deliver = |batch: &mut Vec<T>| {
                    let count = batch.len();
                    // A panicking handler must not kill the worker
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handler.handle_batch(batch)
                    }));
                    if outcome.is_err() {
                        eprintln!(
                            "[LOGGER CRITICAL] Sink worker panicked while delivering {} records",
                            count
                        );
                    }
                    batch.clear();
                    pending_clone.fetch_sub(count, Ordering::AcqRel);
                };

                loop {
                    match receiver.recv() {
                        Ok(record) => batch.push(record),
                        // Channel closed and drained
                        Err(_) => break,
                    }

                    while batch.len() < BATCH_SIZE {
                        match receiver.try_recv() {
                            Ok(record) => batch.push(record),
                            Err(_) => break,
                        }
                    }

                    if batch.len() < BATCH_SIZE {
                        // Small batch - wait a bit for more records
                        thread::sleep(Duration::from_millis(BATCH_TIMEOUT_MS));
                        while batch.len() < BATCH_SIZE {
                            match receiver.try_recv() {
                                Ok(record) => batch.push(record),
                                Err(_) => break,
                            }
                        }
                    }

                    deliver(&mut batch);
                }
            })
            .map_err(|e| {
                LoggerError::io_operation("spawn sink worker", format!("worker '{}'", name), e)
            })?;

        Ok(Self {
            name,
            sender: Some(sender),
            handle: Some(handle),
            pending,
            metrics,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records accepted but not yet delivered
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Enqueue a record, applying the overflow policy when the queue is full.
    /// Records dropped by the policy are counted in the metrics, not returned
    /// as errors.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::LoggerStopped`] when the worker is gone.
    pub fn submit(&self, record: T) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(LoggerError::LoggerStopped)?;

        // Count before sending so the worker never decrements below zero
        self.pending.fetch_add(1, Ordering::AcqRel);

        let rejected = match sender.try_send(record) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                self.metrics.record_dropped();
                return Err(LoggerError::LoggerStopped);
            }
            Err(TrySendError::Full(record)) => record,
        };

        self.metrics.record_queue_full();

        match self.config.overflow_policy {
            OverflowPolicy::DropNewest => {
                self.metrics.record_dropped();
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                if sender.send_timeout(rejected, timeout).is_ok() {
                    return Ok(());
                }
                self.metrics.record_dropped();
            }
            OverflowPolicy::AlertAndDrop => self.alert_and_drop(),
        }

        self.pending.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    /// Drop a record with a stderr alert on the first drop and every 1000th
    fn alert_and_drop(&self) {
        let dropped_count = self.metrics.record_dropped();

        if dropped_count == 0 || (dropped_count + 1) % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Sink '{}' queue full, {} records dropped. \
                 Consider increasing the queue capacity.",
                self.name,
                dropped_count + 1
            );
        }
    }

    /// Wait until every accepted record has been delivered, or the flush
    /// timeout elapses
    ///
    /// # Errors
    ///
    /// Returns an error if records are still pending at the timeout
    pub fn flush(&self) -> Result<()> {
        let start = Instant::now();

        loop {
            let pending = self.pending();
            if pending == 0 {
                return Ok(());
            }
            if start.elapsed() >= self.config.flush_timeout {
                return Err(LoggerError::other(format!(
                    "sink '{}' flush timed out after {:?} with {} records pending",
                    self.name, self.config.flush_timeout, pending
                )));
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl<T: Send + 'static> Drop for BackgroundWorker<T> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued, then exit
        drop(self.sender.take());

        if let Some(handle) = self.handle.take() {
            let start = Instant::now();
            let timeout = self.config.shutdown_timeout;

            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[LOGGER ERROR] Sink worker '{}' panicked during shutdown: {:?}",
                            self.name, e
                        );
                    }
                    break;
                }

                if start.elapsed() >= timeout {
                    eprintln!(
                        "[LOGGER WARNING] Sink worker '{}' did not finish within {:?}. \
                         {} records may be lost.",
                        self.name,
                        timeout,
                        self.pending()
                    );
                    break;
                }

                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
