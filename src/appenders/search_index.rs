//! Search index appender
//!
//! Enriches each JSON payload into an ECS-style document and ships documents
//! to a daily index (`{prefix}-YYYY.MM.DD`) through the `_bulk` API from a
//! background worker. The index template is installed once, when the worker
//! starts.

use super::worker::{BackgroundWorker, BatchHandler, WorkerConfig};
use crate::core::{
    Appender, CorrelationResolver, LoggerError, LoggerMetrics, Result, SinkPayload,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Template sent to the backend before the first document
pub fn index_template() -> Value {
    json!({
        "index_patterns": ["logs-*"],
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "index": {
                "refresh_interval": "5s"
            }
        },
        "mappings": {
            "_source": { "enabled": true }
        }
    })
}

/// Wire access to a search backend
///
/// Implementations are called from the worker thread only.
pub trait IndexTransport: Send + 'static {
    /// Install (or overwrite) a named index template
    fn put_template(&self, name: &str, template: &Value) -> Result<()>;

    /// Send a newline-delimited `_bulk` request body
    fn bulk(&self, body: String) -> Result<()>;

    fn endpoint(&self) -> &str;
}

/// [`IndexTransport`] over HTTP with optional basic auth
pub struct HttpIndexTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    credentials: Option<(String, String)>,
}

impl HttpIndexTransport {
    /// # Errors
    ///
    /// Returns an error if the endpoint is empty or the HTTP client cannot be built
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(LoggerError::config("search_index", "endpoint must not be empty"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LoggerError::search_index(&endpoint, e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            credentials: None,
        })
    }

    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response> {
        let request = match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        };

        let response = request
            .send()
            .map_err(|e| LoggerError::search_index(&self.endpoint, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LoggerError::search_index(
                &self.endpoint,
                format!("HTTP {}: {}", status, body),
            ));
        }
        Ok(response)
    }
}

impl IndexTransport for HttpIndexTransport {
    fn put_template(&self, name: &str, template: &Value) -> Result<()> {
        let url = format!("{}/_template/{}", self.endpoint, name);
        self.send(self.client.put(url).json(template))?;
        Ok(())
    }

    fn bulk(&self, body: String) -> Result<()> {
        let url = format!("{}/_bulk", self.endpoint);
        let response = self.send(
            self.client
                .post(url)
                .header("Content-Type", "application/x-ndjson")
                .body(body),
        )?;

        // `_bulk` answers 200 even when individual items fail
        let summary: Value = response
            .json()
            .map_err(|e| LoggerError::search_index(&self.endpoint, e.to_string()))?;
        if summary.get("errors").and_then(Value::as_bool) == Some(true) {
            return Err(LoggerError::search_index(
                &self.endpoint,
                "bulk request reported item failures",
            ));
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IndexTransport for Box<dyn IndexTransport> {
    fn put_template(&self, name: &str, template: &Value) -> Result<()> {
        (**self).put_template(name, template)
    }

    fn bulk(&self, body: String) -> Result<()> {
        (**self).bulk(body)
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// One queued document and its target index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub index: String,
    pub document: Value,
}

/// Render documents as a `_bulk` body
pub fn bulk_body(documents: &[IndexDocument]) -> String {
    let mut body = String::new();
    for doc in documents {
        body.push_str(&json!({ "index": { "_index": doc.index } }).to_string());
        body.push('\n');
        body.push_str(&doc.document.to_string());
        body.push('\n');
    }
    body
}

struct IndexBatchHandler<T: IndexTransport> {
    transport: T,
    template_name: String,
    metrics: Arc<LoggerMetrics>,
}

impl<T: IndexTransport> BatchHandler<IndexDocument> for IndexBatchHandler<T> {
    fn on_start(&mut self) {
        if let Err(e) = self
            .transport
            .put_template(&self.template_name, &index_template())
        {
            eprintln!(
                "[LOGGER WARNING] Failed to install index template '{}': {}",
                self.template_name, e
            );
        }
    }

    fn handle_batch(&mut self, batch: &[IndexDocument]) {
        if let Err(e) = self.transport.bulk(bulk_body(batch)) {
            eprintln!(
                "[LOGGER ERROR] Search index delivery of {} records failed: {}",
                batch.len(),
                e
            );
            for _ in batch {
                self.metrics.record_sink_failure();
            }
        }
    }
}

/// Ships JSON payloads to a search backend without blocking the caller
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use trace_fanout_logger::appenders::{HttpIndexTransport, SearchIndexAppender, WorkerConfig};
/// use trace_fanout_logger::LoggerMetrics;
///
/// let transport = HttpIndexTransport::new("http://localhost:9200")?;
/// let appender = SearchIndexAppender::spawn(
///     transport,
///     "logs",
///     WorkerConfig::default(),
///     Arc::new(LoggerMetrics::new()),
/// )?;
/// # Ok::<(), trace_fanout_logger::LoggerError>(())
/// ```
pub struct SearchIndexAppender {
    worker: BackgroundWorker<IndexDocument>,
    index_prefix: String,
    resolver: CorrelationResolver,
}

impl SearchIndexAppender {
    /// Start the delivery worker
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be started
    pub fn spawn<T: IndexTransport>(
        transport: T,
        index_prefix: impl Into<String>,
        config: WorkerConfig,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self> {
        let index_prefix = index_prefix.into();
        let handler = IndexBatchHandler {
            transport,
            template_name: format!("template_{}", index_prefix),
            metrics: Arc::clone(&metrics),
        };
        let worker = BackgroundWorker::spawn("search_index", handler, config, metrics)?;

        Ok(Self {
            worker,
            index_prefix,
            resolver: CorrelationResolver::disabled(),
        })
    }

    /// Use the APM agent to fill in trace ids missing from a record
    #[must_use]
    pub fn with_resolver(mut self, resolver: CorrelationResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn index_prefix(&self) -> &str {
        &self.index_prefix
    }

    /// Records queued but not yet shipped
    pub fn pending(&self) -> usize {
        self.worker.pending()
    }

    /// Build the document and index name for one payload
    ///
    /// # Errors
    ///
    /// Returns a formatter error if the payload is not a JSON object
    pub fn to_document(&self, payload: &SinkPayload) -> Result<IndexDocument> {
        let object = payload
            .as_json()
            .and_then(Value::as_object)
            .ok_or_else(|| {
                LoggerError::formatter("search_index", "expected a JSON object payload")
            })?;

        let mut document: Map<String, Value> = object.clone();
        document.insert(
            "@timestamp".to_string(),
            Value::String(payload.timestamp().to_rfc3339()),
        );

        let mut trace_id = object.get("traceId").and_then(Value::as_str).map(str::to_string);
        let mut transaction_id = object
            .get("transactionId")
            .and_then(Value::as_str)
            .map(str::to_string);
        if trace_id.is_none() && transaction_id.is_none() {
            let correlation = self.resolver.resolve();
            trace_id = correlation.trace_id;
            transaction_id = correlation.transaction_id;
        }
        if let Some(id) = trace_id {
            document.insert("trace".to_string(), json!({ "id": id }));
        }
        if let Some(id) = transaction_id {
            document.insert("transaction".to_string(), json!({ "id": id }));
        }

        Ok(IndexDocument {
            index: format!(
                "{}-{}",
                self.index_prefix,
                payload.timestamp().format("%Y.%m.%d")
            ),
            document: Value::Object(document),
        })
    }
}

impl Appender for SearchIndexAppender {
    fn append(&self, payload: &SinkPayload) -> Result<()> {
        let document = self.to_document(payload)?;
        self.worker.submit(document)
    }

    fn flush(&self) -> Result<()> {
        self.worker.flush()
    }

    fn name(&self) -> &str {
        "search_index"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ApmAgent, Correlation, ErrorEvent, FormatPipeline, LogLevel, MessageEvent, NormalizedRecord,
    };
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    #[derive(Default, Clone)]
    struct MemoryTransport {
        templates: Arc<Mutex<Vec<(String, Value)>>>,
        bodies: Arc<Mutex<Vec<String>>>,
    }

    impl IndexTransport for MemoryTransport {
        fn put_template(&self, name: &str, template: &Value) -> Result<()> {
            self.templates.lock().push((name.to_string(), template.clone()));
            Ok(())
        }

        fn bulk(&self, body: String) -> Result<()> {
            self.bodies.lock().push(body);
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "memory"
        }
    }

    struct FixedAgent;

    impl ApmAgent for FixedAgent {
        fn current_transaction(&self) -> Option<Correlation> {
            Some(Correlation::new("apm-trace", "apm-tx"))
        }

        fn capture_error(&self, _error: &ErrorEvent) {}
    }

    fn json_payload(correlation: Correlation) -> SinkPayload {
        let at = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
        let record = NormalizedRecord::from_event_at(
            MessageEvent::new(LogLevel::Info, "indexed").with_field("userId", 7).into(),
            correlation,
            at,
        );
        FormatPipeline::json().format(&record)
    }

    fn appender(transport: MemoryTransport) -> SearchIndexAppender {
        SearchIndexAppender::spawn(
            transport,
            "logs",
            WorkerConfig::default(),
            Arc::new(LoggerMetrics::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_template_contract() {
        let template = index_template();
        assert_eq!(template["index_patterns"], json!(["logs-*"]));
        assert_eq!(template["settings"]["number_of_shards"], 1);
        assert_eq!(template["settings"]["number_of_replicas"], 0);
        assert_eq!(template["settings"]["index"]["refresh_interval"], "5s");
        assert_eq!(template["mappings"]["_source"]["enabled"], true);
    }

    #[test]
    fn test_document_shape() {
        let appender = appender(MemoryTransport::default());
        let doc = appender
            .to_document(&json_payload(Correlation::new("t1", "x1")))
            .unwrap();

        assert_eq!(doc.index, "logs-2025.01.08");
        assert_eq!(doc.document["@timestamp"], "2025-01-08T10:30:45+00:00");
        assert_eq!(doc.document["message"], "indexed");
        assert_eq!(doc.document["userId"], 7);
        assert_eq!(doc.document["trace"]["id"], "t1");
        assert_eq!(doc.document["transaction"]["id"], "x1");
    }

    #[test]
    fn test_missing_ids_come_from_apm() {
        let appender = appender(MemoryTransport::default())
            .with_resolver(CorrelationResolver::new(Arc::new(FixedAgent)));
        let doc = appender.to_document(&json_payload(Correlation::none())).unwrap();

        assert_eq!(doc.document["trace"]["id"], "apm-trace");
        assert_eq!(doc.document["transaction"]["id"], "apm-tx");
        assert!(doc.document.get("traceId").is_none());
    }

    #[test]
    fn test_rejects_text_payload() {
        let appender = appender(MemoryTransport::default());
        let record = NormalizedRecord::from_event(
            MessageEvent::new(LogLevel::Info, "plain").into(),
            Correlation::none(),
        );
        let text = FormatPipeline::file().format(&record);
        assert!(matches!(
            appender.append(&text),
            Err(LoggerError::FormatterError { .. })
        ));
    }

    #[test]
    fn test_installs_template_once_and_ships_bulk() {
        let transport = MemoryTransport::default();
        let appender = appender(transport.clone());

        for _ in 0..3 {
            appender.append(&json_payload(Correlation::none())).unwrap();
        }
        appender.flush().unwrap();

        let templates = transport.templates.lock();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].0, "template_logs");

        let shipped: usize = transport
            .bodies
            .lock()
            .iter()
            .map(|body| body.lines().count())
            .sum();
        // One action line plus one source line per document
        assert_eq!(shipped, 6);
    }

    #[test]
    fn test_failed_bulk_counts_sink_failures() {
        struct RejectingTransport;

        impl IndexTransport for RejectingTransport {
            fn put_template(&self, _name: &str, _template: &Value) -> Result<()> {
                Ok(())
            }

            fn bulk(&self, _body: String) -> Result<()> {
                Err(LoggerError::search_index("memory", "cluster unavailable"))
            }

            fn endpoint(&self) -> &str {
                "memory"
            }
        }

        let metrics = Arc::new(LoggerMetrics::new());
        let appender = SearchIndexAppender::spawn(
            RejectingTransport,
            "logs",
            WorkerConfig::default(),
            Arc::clone(&metrics),
        )
        .unwrap();

        for _ in 0..3 {
            appender.append(&json_payload(Correlation::none())).unwrap();
        }
        appender.flush().unwrap();

        assert_eq!(metrics.sink_failures(), 3);
        assert_eq!(metrics.dropped_count(), 0);
    }

    #[test]
    fn test_bulk_body_format() {
        let body = bulk_body(&[IndexDocument {
            index: "logs-2025.01.08".to_string(),
            document: json!({"message": "m"}),
        }]);
        assert_eq!(
            body,
            "{\"index\":{\"_index\":\"logs-2025.01.08\"}}\n{\"message\":\"m\"}\n"
        );
    }
}
