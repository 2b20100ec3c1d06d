//! Datastore appender
//!
//! Hands each JSON record to an externally supplied async [`RecordReceiver`].
//! Records are queued and awaited one by one on a worker thread that owns a
//! current-thread tokio runtime, so the logging caller never waits on the
//! datastore. Receiver failures are reported and never retried.

use super::worker::{BackgroundWorker, BatchHandler, WorkerConfig};
use crate::core::{Appender, LoggerError, LoggerMetrics, Result, SinkPayload};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Persists one JSON record
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use trace_fanout_logger::appenders::RecordReceiver;
///
/// struct StdoutStore;
///
/// #[async_trait]
/// impl RecordReceiver for StdoutStore {
///     async fn receive(&self, record: Value) -> trace_fanout_logger::Result<()> {
///         println!("{}", record);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RecordReceiver: Send + Sync + 'static {
    async fn receive(&self, record: Value) -> Result<()>;
}

/// Adapts an async closure into a [`RecordReceiver`]
///
/// ```
/// use trace_fanout_logger::appenders::FnReceiver;
///
/// let receiver = FnReceiver::new(|record: serde_json::Value| async move {
///     assert!(record.is_object());
///     Ok::<(), trace_fanout_logger::LoggerError>(())
/// });
/// ```
pub struct FnReceiver<F> {
    func: F,
}

impl<F> FnReceiver<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> RecordReceiver for FnReceiver<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn receive(&self, record: Value) -> Result<()> {
        (self.func)(record).await
    }
}

struct ReceiverHandler {
    runtime: Runtime,
    receiver: Arc<dyn RecordReceiver>,
    metrics: Arc<LoggerMetrics>,
}

impl BatchHandler<Value> for ReceiverHandler {
    fn handle_batch(&mut self, batch: &[Value]) {
        for record in batch {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.runtime
                    .block_on(self.receiver.receive(record.clone()))
            }));

            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "receiver panicked".to_string(),
            };
            self.metrics.record_sink_failure();
            eprintln!("[LOGGER ERROR] Database receiver failed: {}", error);
        }
    }
}

/// Queues JSON payloads for a [`RecordReceiver`]
pub struct DatabaseAppender {
    worker: BackgroundWorker<Value>,
}

impl DatabaseAppender {
    /// Start the receiver worker
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the worker thread cannot be created
    pub fn spawn(
        receiver: Arc<dyn RecordReceiver>,
        config: WorkerConfig,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| LoggerError::io_operation("build receiver runtime", "database sink", e))?;

        let handler = ReceiverHandler {
            runtime,
            receiver,
            metrics: Arc::clone(&metrics),
        };
        let worker = BackgroundWorker::spawn("database", handler, config, metrics)?;

        Ok(Self { worker })
    }

    /// Records queued but not yet received
    pub fn pending(&self) -> usize {
        self.worker.pending()
    }
}

impl Appender for DatabaseAppender {
    fn append(&self, payload: &SinkPayload) -> Result<()> {
        let record = payload
            .as_json()
            .cloned()
            .ok_or_else(|| LoggerError::formatter("database", "expected a JSON payload"))?;
        self.worker.submit(record)
    }

    fn flush(&self) -> Result<()> {
        self.worker.flush()
    }

    fn name(&self) -> &str {
        "database"
    }
}
