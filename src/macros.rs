//! Logging macros for ergonomic log message formatting.
//!
//! Each macro formats its arguments like `format!` and logs the result at a
//! fixed level. The first argument is anything with a `log` method taking a
//! [`MessageEvent`](crate::MessageEvent), usually a [`Logger`](crate::Logger)
//! or the process-wide `logger()`.
//!
//! # Examples
//!
//! ```
//! use trace_fanout_logger::prelude::*;
//! use trace_fanout_logger::info;
//!
//! let logger = Logger::new();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a formatted message at any level, including custom ones.
///
/// # Examples
///
/// ```
/// # use trace_fanout_logger::prelude::*;
/// # let logger = Logger::new();
/// use trace_fanout_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, "audit", "User {} exported a report", 42);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($crate::MessageEvent::new($level, format!($($arg)+)))
    };
}

/// Log an error-level message.
///
/// ```
/// # use trace_fanout_logger::prelude::*;
/// # let logger = Logger::new();
/// use trace_fanout_logger::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log an http-level message, for request/response summaries.
///
/// ```
/// # use trace_fanout_logger::prelude::*;
/// # let logger = Logger::new();
/// use trace_fanout_logger::http;
/// http!(logger, "GET {} -> {}", "/health", 200);
/// ```
#[macro_export]
macro_rules! http {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Http, $($arg)+)
    };
}

/// Log a verbose-level message.
#[macro_export]
macro_rules! verbose {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Verbose, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log a silly-level message, the most detailed level.
#[macro_export]
macro_rules! silly {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Silly, $($arg)+)
    };
}
