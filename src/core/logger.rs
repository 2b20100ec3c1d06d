//! Main logger implementation
//!
//! The logger owns a write-once list of sink registrations. Each call is
//! normalized into one [`NormalizedRecord`], correlated with the active APM
//! transaction, and handed to every registration whose level filter accepts it.
//! Sink errors and panics are contained per sink; `log` itself never fails.

use super::{
    appender::Appender,
    correlation::{ApmAgent, CorrelationResolver},
    error::{LoggerError, Result},
    format::FormatPipeline,
    log_event::{ErrorEvent, LogEvent, MessageEvent},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    payload::Payload,
    record::NormalizedRecord,
};
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// One sink together with its level filter and format pipeline
pub struct SinkRegistration {
    appender: Box<dyn Appender>,
    min_level: LogLevel,
    pipeline: FormatPipeline,
}

impl SinkRegistration {
    pub fn new<A: Appender + 'static>(
        appender: A,
        min_level: LogLevel,
        pipeline: FormatPipeline,
    ) -> Self {
        Self::boxed(Box::new(appender), min_level, pipeline)
    }

    pub fn boxed(appender: Box<dyn Appender>, min_level: LogLevel, pipeline: FormatPipeline) -> Self {
        Self {
            appender,
            min_level,
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        self.appender.name()
    }

    pub fn min_level(&self) -> &LogLevel {
        &self.min_level
    }

    pub fn pipeline(&self) -> &FormatPipeline {
        &self.pipeline
    }

    pub fn accepts(&self, level: &LogLevel) -> bool {
        self.min_level.permits(level)
    }
}

impl std::fmt::Debug for SinkRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistration")
            .field("appender", &self.appender.name())
            .field("min_level", &self.min_level)
            .field("pipeline", &self.pipeline.name())
            .finish()
    }
}

pub struct Logger {
    registrations: Vec<SinkRegistration>,
    resolver: CorrelationResolver,
    metrics: Arc<LoggerMetrics>,
}

impl Logger {
    /// Logger with no sinks and no APM agent
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            resolver: CorrelationResolver::disabled(),
            metrics: Arc::new(LoggerMetrics::new()),
        }
    }

    /// Log a message or an error.
    ///
    /// Errors are forwarded to the APM agent first. The call returns once every
    /// accepting sink has been handed the record; it never fails and never
    /// panics because of a sink.
    pub fn log(&self, event: impl Into<LogEvent>) {
        let event = event.into();

        if let LogEvent::Error(ref error) = event {
            if self.resolver.capture_error(error) {
                self.metrics.record_apm_capture();
            }
        }

        let record = NormalizedRecord::from_event(event, self.resolver.resolve());
        self.dispatch(&record);
    }

    /// Build the record `log` would dispatch, without dispatching it
    pub fn normalize(&self, event: impl Into<LogEvent>) -> NormalizedRecord {
        NormalizedRecord::from_event(event.into(), self.resolver.resolve())
    }

    /// Hand a record to every registration that accepts its level, in
    /// registration order, isolating each sink's errors and panics.
    ///
    /// Returns the number of sinks that accepted the record without error.
    pub fn dispatch(&self, record: &NormalizedRecord) -> usize {
        let mut delivered = 0;

        for registration in &self.registrations {
            if !registration.accepts(record.level()) {
                continue;
            }

            let append_result = catch_unwind(AssertUnwindSafe(|| {
                let payload = registration.pipeline.format(record);
                registration.appender.append(&payload)
            }));

            match append_result {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOGGER ERROR] Appender '{}' failed: {}",
                        registration.name(),
                        e
                    );
                    self.metrics.record_sink_failure();
                }
                Err(panic_info) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Appender '{}' panicked: {}. \
                         Other appenders continue to function.",
                        registration.name(),
                        panic_message(&*panic_info)
                    );
                    self.metrics.record_sink_failure();
                }
            }
        }

        self.metrics.record_logged();
        delivered
    }

    pub fn log_with(&self, level: impl Into<LogLevel>, message: impl Into<String>, payload: Payload) {
        self.log(MessageEvent::new(level, message).with_payload(payload));
    }

    /// Log a Rust error at `error` level and forward it to the APM agent
    pub fn log_error<E: StdError + ?Sized>(&self, error: &E) {
        self.log(ErrorEvent::from_error(error));
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Error, message));
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Warn, message));
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Info, message));
    }

    #[inline]
    pub fn http(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Http, message));
    }

    #[inline]
    pub fn verbose(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Verbose, message));
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Debug, message));
    }

    #[inline]
    pub fn silly(&self, message: impl Into<String>) {
        self.log(MessageEvent::new(LogLevel::Silly, message));
    }

    /// Flush every sink. All sinks are flushed even if one fails; the first
    /// error is returned.
    pub fn flush(&self) -> Result<()> {
        let mut first_error: Option<LoggerError> = None;

        for registration in &self.registrations {
            let flush_result = catch_unwind(AssertUnwindSafe(|| registration.appender.flush()));
            let error = match flush_result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(panic_info) => LoggerError::other(format!(
                    "appender '{}' panicked during flush: {}",
                    registration.name(),
                    panic_message(&*panic_info)
                )),
            };
            eprintln!(
                "[LOGGER ERROR] Appender '{}' flush failed: {}",
                registration.name(),
                error
            );
            first_error.get_or_insert(error);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Names of the registered sinks, in registration order
    pub fn sink_names(&self) -> Vec<&str> {
        self.registrations.iter().map(SinkRegistration::name).collect()
    }

    pub fn registrations(&self) -> &[SinkRegistration] {
        &self.registrations
    }

    pub fn sink_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn resolver(&self) -> &CorrelationResolver {
        &self.resolver
    }

    /// Get the logger metrics
    ///
    /// # Example
    ///
    /// ```
    /// use trace_fanout_logger::Logger;
    ///
    /// let logger = Logger::new();
    /// logger.info("no sinks yet");
    /// assert_eq!(logger.metrics().total_logged(), 1);
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn shared_metrics(&self) -> Arc<LoggerMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("registrations", &self.registrations)
            .field("resolver", &self.resolver)
            .finish()
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use trace_fanout_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .sink(ConsoleAppender::new(), LogLevel::Info, FormatPipeline::cli())
///     .build();
/// assert_eq!(logger.sink_names(), vec!["console"]);
/// ```
pub struct LoggerBuilder {
    registrations: Vec<SinkRegistration>,
    apm: Option<Arc<dyn ApmAgent>>,
    metrics: Option<Arc<LoggerMetrics>>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            apm: None,
            metrics: None,
        }
    }

    /// Register a sink. Sinks receive records in registration order.
    #[must_use = "builder methods return a new value"]
    pub fn sink<A: Appender + 'static>(
        mut self,
        appender: A,
        min_level: LogLevel,
        pipeline: FormatPipeline,
    ) -> Self {
        self.registrations
            .push(SinkRegistration::new(appender, min_level, pipeline));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn registration(mut self, registration: SinkRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Attach an APM agent used for correlation ids and error capture
    #[must_use = "builder methods return a new value"]
    pub fn apm(mut self, agent: Arc<dyn ApmAgent>) -> Self {
        self.apm = Some(agent);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn apm_opt(mut self, agent: Option<Arc<dyn ApmAgent>>) -> Self {
        self.apm = agent;
        self
    }

    /// Share a metrics instance with queued sinks so their drops are counted
    /// alongside the logger's own counters
    #[must_use = "builder methods return a new value"]
    pub fn metrics(mut self, metrics: Arc<LoggerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        let resolver = match self.apm {
            Some(agent) => CorrelationResolver::new(agent),
            None => CorrelationResolver::disabled(),
        };

        Logger {
            registrations: self.registrations,
            resolver,
            metrics: self.metrics.unwrap_or_default(),
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation::Correlation;
    use crate::core::format::SinkPayload;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Recording {
        name: &'static str,
        seen: Arc<Mutex<Vec<SinkPayload>>>,
        order: Option<Arc<Mutex<Vec<&'static str>>>>,
    }

    impl Appender for Recording {
        fn append(&self, payload: &SinkPayload) -> Result<()> {
            self.seen.lock().push(payload.clone());
            if let Some(order) = &self.order {
                order.lock().push(self.name);
            }
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    struct Failing;

    impl Appender for Failing {
        fn append(&self, _payload: &SinkPayload) -> Result<()> {
            Err(LoggerError::writer("disk unplugged"))
        }

        fn flush(&self) -> Result<()> {
            Err(LoggerError::writer("disk unplugged"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Panicking;

    impl Appender for Panicking {
        fn append(&self, _payload: &SinkPayload) -> Result<()> {
            panic!("sink exploded")
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct FixedAgent {
        captured: Mutex<Vec<ErrorEvent>>,
    }

    impl ApmAgent for FixedAgent {
        fn current_transaction(&self) -> Option<Correlation> {
            Some(Correlation::new("trace-1", "tx-1"))
        }

        fn capture_error(&self, error: &ErrorEvent) {
            self.captured.lock().push(error.clone());
        }
    }

    fn recording(name: &'static str, order: &Arc<Mutex<Vec<&'static str>>>) -> Recording {
        Recording {
            name,
            seen: Arc::default(),
            order: Some(Arc::clone(order)),
        }
    }

    #[test]
    fn test_dispatches_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::builder()
            .sink(recording("a", &order), LogLevel::Silly, FormatPipeline::json())
            .sink(recording("b", &order), LogLevel::Silly, FormatPipeline::file())
            .sink(recording("c", &order), LogLevel::Silly, FormatPipeline::cli())
            .build();

        logger.info("hello");

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
        assert_eq!(logger.sink_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_level_filter_skips_sinks() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::builder()
            .sink(recording("errors-only", &order), LogLevel::Error, FormatPipeline::json())
            .sink(recording("verbose", &order), LogLevel::Verbose, FormatPipeline::json())
            .build();

        logger.debug("too chatty");
        logger.http("GET /");
        logger.error("bad");

        assert_eq!(*order.lock(), vec!["verbose", "errors-only", "verbose"]);
    }

    #[test]
    fn test_failing_and_panicking_sinks_do_not_block_others() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tail = recording("tail", &order);
        let logger = Logger::builder()
            .sink(Failing, LogLevel::Silly, FormatPipeline::file())
            .sink(Panicking, LogLevel::Silly, FormatPipeline::file())
            .sink(tail.clone(), LogLevel::Silly, FormatPipeline::json())
            .build();

        logger.warn("still delivered");

        assert_eq!(tail.seen.lock().len(), 1);
        assert_eq!(logger.metrics().sink_failures(), 2);
        assert_eq!(logger.metrics().total_logged(), 1);
    }

    #[test]
    fn test_error_event_is_captured_and_correlated() {
        let agent = Arc::new(FixedAgent {
            captured: Mutex::new(Vec::new()),
        });
        let sink = Recording {
            name: "json",
            ..Default::default()
        };
        let logger = Logger::builder()
            .apm(agent.clone())
            .sink(sink.clone(), LogLevel::Verbose, FormatPipeline::json())
            .build();

        logger.log(ErrorEvent::new("Error", "boom", "Error: boom"));

        assert_eq!(agent.captured.lock().len(), 1);
        assert_eq!(logger.metrics().apm_captures(), 1);
        let seen = sink.seen.lock();
        let json = seen[0].as_json().unwrap();
        assert_eq!(json["level"], "error");
        assert_eq!(json["message"], "boom");
        assert_eq!(json["traceId"], "trace-1");
        assert_eq!(json["transactionId"], "tx-1");
        assert_eq!(json["name"], "Error");
    }

    #[test]
    fn test_flush_reports_first_error_but_flushes_all() {
        let logger = Logger::builder()
            .sink(Failing, LogLevel::Info, FormatPipeline::file())
            .sink(Recording::default(), LogLevel::Info, FormatPipeline::file())
            .build();

        assert!(logger.flush().is_err());
    }

    #[test]
    fn test_normalize_without_apm_has_no_correlation() {
        let logger = Logger::new();
        let record = logger.normalize(MessageEvent::new(LogLevel::Info, "x"));
        assert!(record.correlation().is_empty());
    }
}
