//! Format pipelines turning a [`NormalizedRecord`] into a sink payload
//!
//! - `Cli`: colorized single line for terminals
//! - `File`: logfmt line with a fixed field order, for rotating files
//! - `Json`: ordered JSON object, for the search index and datastore
//!
//! Every pipeline renders all extra fields. Line pipelines escape control
//! characters so one record always occupies exactly one line.

use super::log_level::LogLevel;
use super::payload::FieldValue;
use super::record::{
    NormalizedRecord, LEVEL_KEY, MESSAGE_KEY, TIMESTAMP_KEY, TRACE_ID_KEY, TRANSACTION_ID_KEY,
};
use super::timestamp::TimestampFormat;
use chrono::{DateTime, Utc};
use colored::Colorize;

/// Rendered record body
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    Text(String),
    Json(serde_json::Value),
}

/// What a sink receives: the rendered body plus the routing metadata
/// sinks need without re-parsing the body.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkPayload {
    level: LogLevel,
    timestamp: DateTime<Utc>,
    body: PayloadBody,
}

impl SinkPayload {
    pub fn new(level: LogLevel, timestamp: DateTime<Utc>, body: PayloadBody) -> Self {
        Self {
            level,
            timestamp,
            body,
        }
    }

    pub fn level(&self) -> &LogLevel {
        &self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn body(&self) -> &PayloadBody {
        &self.body
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            PayloadBody::Text(text) => Some(text),
            PayloadBody::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            PayloadBody::Json(value) => Some(value),
            PayloadBody::Text(_) => None,
        }
    }

    /// Body as a line of text; JSON bodies are serialized compactly.
    pub fn to_line(&self) -> String {
        match &self.body {
            PayloadBody::Text(text) => text.clone(),
            PayloadBody::Json(value) => value.to_string(),
        }
    }
}

/// Pure record-to-payload transformation attached to each sink registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatPipeline {
    /// Human-readable terminal line
    ///
    /// Example: `2025-01-08 10:30:45 [info] Request processed [traceId=ab transactionId=cd] route=/health`
    Cli {
        colors: bool,
        timestamp_format: TimestampFormat,
    },

    /// Stable logfmt line
    ///
    /// Example: `timestamp="2025-01-08 10:30:45" level=info traceId=ab message="Request processed" route=/health`
    File { timestamp_format: TimestampFormat },

    /// JSON object with every record field
    ///
    /// Example: `{"timestamp":"2025-01-08 10:30:45","level":"info","message":"Request processed","route":"/health"}`
    Json { timestamp_format: TimestampFormat },
}

impl FormatPipeline {
    pub fn cli() -> Self {
        FormatPipeline::Cli {
            colors: true,
            timestamp_format: TimestampFormat::default(),
        }
    }

    pub fn file() -> Self {
        FormatPipeline::File {
            timestamp_format: TimestampFormat::default(),
        }
    }

    pub fn json() -> Self {
        FormatPipeline::Json {
            timestamp_format: TimestampFormat::default(),
        }
    }

    /// Replace the timestamp rendering of this pipeline
    #[must_use]
    pub fn with_timestamp_format(self, format: TimestampFormat) -> Self {
        match self {
            FormatPipeline::Cli { colors, .. } => FormatPipeline::Cli {
                colors,
                timestamp_format: format,
            },
            FormatPipeline::File { .. } => FormatPipeline::File {
                timestamp_format: format,
            },
            FormatPipeline::Json { .. } => FormatPipeline::Json {
                timestamp_format: format,
            },
        }
    }

    /// Toggle ANSI colors; no effect on non-terminal pipelines
    #[must_use]
    pub fn with_colors(self, enabled: bool) -> Self {
        match self {
            FormatPipeline::Cli {
                timestamp_format, ..
            } => FormatPipeline::Cli {
                colors: enabled,
                timestamp_format,
            },
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatPipeline::Cli { .. } => "cli",
            FormatPipeline::File { .. } => "file",
            FormatPipeline::Json { .. } => "json",
        }
    }

    /// Format a record according to this pipeline
    pub fn format(&self, record: &NormalizedRecord) -> SinkPayload {
        let body = match self {
            FormatPipeline::Cli {
                colors,
                timestamp_format,
            } => PayloadBody::Text(format_cli(record, *colors, timestamp_format)),
            FormatPipeline::File { timestamp_format } => {
                PayloadBody::Text(format_logfmt(record, timestamp_format))
            }
            FormatPipeline::Json { timestamp_format } => {
                PayloadBody::Json(format_json(record, timestamp_format))
            }
        };

        SinkPayload::new(record.level().clone(), record.timestamp(), body)
    }
}

fn format_cli(record: &NormalizedRecord, colors: bool, timestamp_format: &TimestampFormat) -> String {
    let mut line = format!(
        "{} [{}] {}",
        timestamp_format.format(&record.timestamp()),
        record.level(),
        escape_control(record.message())
    );

    if !record.correlation().is_empty() {
        let mut ids = Vec::with_capacity(2);
        if let Some(trace_id) = record.trace_id() {
            ids.push(format!("{}={}", TRACE_ID_KEY, escape_control(trace_id)));
        }
        if let Some(transaction_id) = record.transaction_id() {
            ids.push(format!("{}={}", TRANSACTION_ID_KEY, escape_control(transaction_id)));
        }
        line.push_str(&format!(" [{}]", ids.join(" ")));
    }

    for (key, value) in record.extra().iter() {
        line.push(' ');
        line.push_str(&escape_control(key));
        line.push('=');
        line.push_str(&escape_control(&value.to_string()));
    }

    if colors {
        line.color(record.level().color_code()).to_string()
    } else {
        line
    }
}

fn format_logfmt(record: &NormalizedRecord, timestamp_format: &TimestampFormat) -> String {
    let mut parts = Vec::with_capacity(5 + record.extra().len());

    parts.push(format!(
        "{}={}",
        TIMESTAMP_KEY,
        escape_logfmt_value(&timestamp_format.format(&record.timestamp()))
    ));
    parts.push(format!(
        "{}={}",
        LEVEL_KEY,
        escape_logfmt_value(record.level().as_str())
    ));
    if let Some(trace_id) = record.trace_id() {
        parts.push(format!("{}={}", TRACE_ID_KEY, escape_logfmt_value(trace_id)));
    }
    if let Some(transaction_id) = record.transaction_id() {
        parts.push(format!(
            "{}={}",
            TRANSACTION_ID_KEY,
            escape_logfmt_value(transaction_id)
        ));
    }
    // Message is always quoted
    parts.push(format!("{}={}", MESSAGE_KEY, quote_logfmt_value(record.message())));

    for (key, value) in record.extra().iter() {
        let formatted_value = match value {
            FieldValue::String(s) => quote_logfmt_value(s),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Null => "null".to_string(),
            FieldValue::Json(v) => quote_logfmt_value(&v.to_string()),
        };
        parts.push(format!("{}={}", escape_logfmt_key(key), formatted_value));
    }

    parts.join(" ")
}

fn format_json(record: &NormalizedRecord, timestamp_format: &TimestampFormat) -> serde_json::Value {
    let mut json_obj = serde_json::Map::new();

    json_obj.insert(
        TIMESTAMP_KEY.to_string(),
        timestamp_format.to_json_value(&record.timestamp()),
    );
    json_obj.insert(
        LEVEL_KEY.to_string(),
        serde_json::Value::String(record.level().to_string()),
    );
    json_obj.insert(
        MESSAGE_KEY.to_string(),
        serde_json::Value::String(record.message().to_string()),
    );
    if let Some(trace_id) = record.trace_id() {
        json_obj.insert(
            TRACE_ID_KEY.to_string(),
            serde_json::Value::String(trace_id.to_string()),
        );
    }
    if let Some(transaction_id) = record.transaction_id() {
        json_obj.insert(
            TRANSACTION_ID_KEY.to_string(),
            serde_json::Value::String(transaction_id.to_string()),
        );
    }

    for (key, value) in record.extra().iter() {
        json_obj.insert(key.to_string(), value.to_json_value());
    }

    serde_json::Value::Object(json_obj)
}

/// Escape newlines, carriage returns and tabs to prevent log injection
fn escape_control(value: &str) -> String {
    value
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Escape a logfmt key; keys that cannot stand bare are quoted, never altered
fn escape_logfmt_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '=' | '\\'));
    if bare {
        key.to_string()
    } else {
        quote_logfmt_value(key)
    }
}

/// Escape a logfmt value (quote if it contains spaces or special chars)
fn escape_logfmt_value(value: &str) -> String {
    if value.is_empty() || value.contains([' ', '"', '=', '\n', '\r', '\t']) {
        quote_logfmt_value(value)
    } else {
        value.to_string()
    }
}

fn quote_logfmt_value(value: &str) -> String {
    format!(
        "\"{}\"",
        escape_control(&value.replace('\\', "\\\\").replace('"', "\\\""))
    )
}
