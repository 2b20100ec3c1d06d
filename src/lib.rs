//! # Trace Fanout Logger
//!
//! A process-wide logging facade that fans each log call out to several
//! sinks, each with its own level filter and output format, and correlates
//! every record with the active APM transaction.
//!
//! ## Features
//!
//! - **Fan-out**: console, rotating file, search index and datastore sinks,
//!   called in registration order
//! - **Correlation**: `traceId` / `transactionId` from an [`ApmAgent`] on every record
//! - **Isolation**: a failing or panicking sink never affects the others or the caller
//! - **Non-blocking delivery**: network sinks queue records for a background worker
//!
//! ## Example
//!
//! ```
//! use trace_fanout_logger::prelude::*;
//!
//! let logger = Logger::builder()
//!     .sink(ConsoleAppender::new(), LogLevel::Info, FormatPipeline::cli())
//!     .build();
//!
//! logger.log(MessageEvent::new(LogLevel::Info, "user signed in").with_field("userId", 42));
//! logger.log(ErrorEvent::new("TimeoutError", "upstream timed out", ""));
//! ```

pub mod appenders;
pub mod config;
pub mod core;
pub mod global;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{
        ConsoleAppender, DatabaseAppender, FnReceiver, RecordReceiver, RotatingFileAppender,
        RotationPolicy, RotationStrategy, SearchIndexAppender,
    };
    pub use crate::config::LoggerConfig;
    pub use crate::core::{
        ApmAgent, Appender, Correlation, ErrorEvent, FieldValue, FormatPipeline, LogEvent,
        LogLevel, Logger, LoggerBuilder, LoggerError, LoggerMetrics, MessageEvent,
        NormalizedRecord, OverflowPolicy, Payload, Result, SinkPayload, SinkRegistration,
        TimestampFormat,
    };
    pub use crate::global::{configure, logger, LoggerSetup};
}

pub use appenders::{ConsoleAppender, RotatingFileAppender};
pub use config::LoggerConfig;
pub use core::{
    ApmAgent, Appender, Correlation, CorrelationResolver, ErrorEvent, FieldValue, FormatPipeline,
    LogEvent, LogLevel, Logger, LoggerBuilder, LoggerError, LoggerMetrics, MessageEvent, NoopApm,
    NormalizedRecord, OverflowPolicy, Payload, PayloadBody, Result, SinkPayload,
    SinkRegistration, TimestampFormat,
};
pub use global::{configure, logger, LoggerCell, LoggerSetup};
