//! The two shapes a log call can take

use super::log_level::LogLevel;
use super::payload::{FieldValue, Payload};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

/// A single logical log call
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Message(MessageEvent),
    Error(ErrorEvent),
}

impl LogEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, LogEvent::Error(_))
    }
}

impl From<MessageEvent> for LogEvent {
    fn from(event: MessageEvent) -> Self {
        LogEvent::Message(event)
    }
}

impl From<ErrorEvent> for LogEvent {
    fn from(event: ErrorEvent) -> Self {
        LogEvent::Error(event)
    }
}

/// Plain leveled message with optional extra fields
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub level: LogLevel,
    pub message: String,
    pub payload: Payload,
}

impl MessageEvent {
    pub fn new(level: impl Into<LogLevel>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            payload: Payload::new(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.payload.add_field(key, value);
        self
    }
}

/// An error to record at `error` level and forward to the APM agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub name: String,
    pub message: String,
    pub stack_trace: String,
}

impl ErrorEvent {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }

    /// Capture a Rust error.
    ///
    /// `name` is the last segment of the error's static type name, so a trait
    /// object (`dyn Error + Send + Sync`) is named `Error`. The stack trace is a
    /// backtrace when one can be captured (`RUST_BACKTRACE`), otherwise the
    /// `source()` chain.
    pub fn from_error<E: StdError + ?Sized>(error: &E) -> Self {
        let name = short_type_name(std::any::type_name::<E>());
        let backtrace = Backtrace::capture();
        let stack_trace = if backtrace.status() == BacktraceStatus::Captured {
            format!("{}: {}\n{}", name, error, backtrace)
        } else {
            render_source_chain(&name, error)
        };

        Self {
            name,
            message: error.to_string(),
            stack_trace,
        }
    }
}

fn short_type_name(full: &str) -> String {
    // Strip `dyn`, auto-trait bounds and generic arguments before taking the
    // last path segment.
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    let full = full.split(" + ").next().unwrap_or(full);
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn render_source_chain<E: StdError + ?Sized>(name: &str, error: &E) -> String {
    let mut rendered = format!("{}: {}", name, error);
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str("\n    caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct ConnectionLost {
        cause: std::io::Error,
    }

    impl fmt::Display for ConnectionLost {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection lost")
        }
    }

    impl StdError for ConnectionLost {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.cause)
        }
    }

    #[test]
    fn test_from_error_captures_name_and_message() {
        let err = ConnectionLost {
            cause: std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"),
        };
        let event = ErrorEvent::from_error(&err);

        assert_eq!(event.name, "ConnectionLost");
        assert_eq!(event.message, "connection lost");
        assert!(event.stack_trace.contains("connection lost"));
    }

    #[test]
    fn test_source_chain_rendering() {
        let err = ConnectionLost {
            cause: std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"),
        };
        let rendered = render_source_chain("ConnectionLost", &err);
        assert_eq!(
            rendered,
            "ConnectionLost: connection lost\n    caused by: read timed out"
        );
    }

    #[test]
    fn test_from_error_through_trait_object() {
        let boxed: Box<dyn StdError + Send + Sync> = Box::new(ConnectionLost {
            cause: std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"),
        });
        let event = ErrorEvent::from_error(&*boxed);
        assert_eq!(event.name, "Error");
        assert_eq!(event.message, "connection lost");

        let plain: Box<dyn StdError> = Box::new(std::fmt::Error);
        assert_eq!(ErrorEvent::from_error(&*plain).name, "Error");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("my_app::Wrapper<alloc::string::String>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(
            short_type_name("dyn core::error::Error + core::marker::Send + core::marker::Sync"),
            "Error"
        );
    }

    #[test]
    fn test_message_event_builder() {
        let event = MessageEvent::new(LogLevel::Http, "GET /health")
            .with_field("status", 200)
            .with_field("durationMs", 3);

        assert_eq!(event.level, LogLevel::Http);
        assert_eq!(event.payload.len(), 2);
        assert!(!LogEvent::from(event).is_error());
    }
}
