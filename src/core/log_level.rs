//! Log level definitions
//!
//! Levels follow the npm ordering, most severe first:
//! `error`, `warn`, `info`, `http`, `verbose`, `debug`, `silly`.
//! Any other name is carried as [`LogLevel::Custom`] and passes every level filter.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Http,
    Verbose,
    Debug,
    Silly,
    /// Free-form level name, kept verbatim
    Custom(String),
}

impl LogLevel {
    /// All named levels, most severe first
    pub const NAMED: [LogLevel; 7] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Http,
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Silly,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Silly => "silly",
            LogLevel::Custom(name) => name,
        }
    }

    /// Numeric severity, 0 being the most severe. `None` for custom levels.
    pub fn severity(&self) -> Option<u8> {
        match self {
            LogLevel::Error => Some(0),
            LogLevel::Warn => Some(1),
            LogLevel::Info => Some(2),
            LogLevel::Http => Some(3),
            LogLevel::Verbose => Some(4),
            LogLevel::Debug => Some(5),
            LogLevel::Silly => Some(6),
            LogLevel::Custom(_) => None,
        }
    }

    /// Whether a sink with `self` as minimum level accepts a record at `level`.
    ///
    /// Custom levels on either side have no rank and are always accepted.
    pub fn permits(&self, level: &LogLevel) -> bool {
        match (self.severity(), level.severity()) {
            (Some(threshold), Some(severity)) => severity <= threshold,
            _ => true,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, LogLevel::Custom(_))
    }

    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Error => Red,
            LogLevel::Warn => Yellow,
            LogLevel::Info => Green,
            LogLevel::Http => Green,
            LogLevel::Verbose => Cyan,
            LogLevel::Debug => Blue,
            LogLevel::Silly => Magenta,
            LogLevel::Custom(_) => White,
        }
    }
}

impl PartialOrd for LogLevel {
    /// More severe levels compare greater; custom levels are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(b.cmp(&a)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Never fails: unknown names become [`LogLevel::Custom`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LogLevel::from(s))
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "http" => LogLevel::Http,
            "verbose" => LogLevel::Verbose,
            "debug" => LogLevel::Debug,
            "silly" => LogLevel::Silly,
            _ => LogLevel::Custom(s.to_string()),
        }
    }
}

impl From<String> for LogLevel {
    fn from(s: String) -> Self {
        LogLevel::from(s.as_str())
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Custom(name) => name,
            named => named.as_str().to_string(),
        }
    }
}
