//! Core logger types and traits

pub mod appender;
pub mod correlation;
pub mod error;
pub mod format;
pub mod log_event;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod payload;
pub mod record;
pub mod timestamp;

pub use appender::Appender;
pub use correlation::{ApmAgent, Correlation, CorrelationResolver, NoopApm};
pub use error::{LoggerError, Result};
pub use format::{FormatPipeline, PayloadBody, SinkPayload};
pub use log_event::{ErrorEvent, LogEvent, MessageEvent};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder, SinkRegistration};
pub use metrics::LoggerMetrics;
pub use overflow_policy::OverflowPolicy;
pub use payload::{FieldValue, Payload};
pub use record::NormalizedRecord;
pub use timestamp::TimestampFormat;
