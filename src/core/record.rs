//! Canonical record handed to every sink

use super::correlation::Correlation;
use super::log_event::{ErrorEvent, LogEvent, MessageEvent};
use super::log_level::LogLevel;
use super::payload::{FieldValue, Payload};
use chrono::{DateTime, Utc};

pub const LEVEL_KEY: &str = "level";
pub const MESSAGE_KEY: &str = "message";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const TRACE_ID_KEY: &str = "traceId";
pub const TRANSACTION_ID_KEY: &str = "transactionId";
pub const ERROR_NAME_KEY: &str = "name";
pub const STACK_TRACE_KEY: &str = "stackTrace";

/// Keys owned by the record itself; payload entries with these names are discarded.
pub const RESERVED_KEYS: [&str; 5] = [
    LEVEL_KEY,
    MESSAGE_KEY,
    TIMESTAMP_KEY,
    TRACE_ID_KEY,
    TRANSACTION_ID_KEY,
];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Immutable, normalized form of one log call
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    level: LogLevel,
    message: String,
    timestamp: DateTime<Utc>,
    correlation: Correlation,
    extra: Payload,
}

impl NormalizedRecord {
    /// Normalize an event, stamping it with the current time.
    pub fn from_event(event: LogEvent, correlation: Correlation) -> Self {
        Self::from_event_at(event, correlation, Utc::now())
    }

    pub fn from_event_at(
        event: LogEvent,
        correlation: Correlation,
        timestamp: DateTime<Utc>,
    ) -> Self {
        match event {
            LogEvent::Message(message) => Self::from_message(message, correlation, timestamp),
            LogEvent::Error(error) => Self::from_error(error, correlation, timestamp),
        }
    }

    fn from_message(
        event: MessageEvent,
        correlation: Correlation,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let extra = event
            .payload
            .into_iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .collect();

        Self {
            level: event.level,
            message: event.message,
            timestamp,
            correlation,
            extra,
        }
    }

    fn from_error(event: ErrorEvent, correlation: Correlation, timestamp: DateTime<Utc>) -> Self {
        let extra = Payload::new()
            .with_field(ERROR_NAME_KEY, event.name)
            .with_field(STACK_TRACE_KEY, event.stack_trace);

        Self {
            level: LogLevel::Error,
            message: event.message,
            timestamp,
            correlation,
            extra,
        }
    }

    pub fn level(&self) -> &LogLevel {
        &self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.correlation.trace_id.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.correlation.transaction_id.as_deref()
    }

    /// Fields beyond level, message, timestamp and correlation ids
    pub fn extra(&self) -> &Payload {
        &self.extra
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.extra.get(key)
    }
}
