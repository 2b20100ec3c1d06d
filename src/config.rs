//! Logger configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Environment variables override file values.

use crate::appenders::{RotationPolicy, RotationStrategy, WorkerConfig};
use crate::core::{LogLevel, LoggerError, OverflowPolicy, Result, TimestampFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which sinks to register and how
///
/// # Example
///
/// ```
/// use trace_fanout_logger::config::LoggerConfig;
///
/// let config = LoggerConfig::from_toml_str(r#"
///     [console]
///     level = "debug"
///
///     [search_index]
///     enabled = true
///     endpoint = "http://search:9200"
/// "#).unwrap();
///
/// assert!(config.search_index.enabled);
/// assert!(!config.database.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub console: ConsoleConfig,
    pub file: FileConfig,
    pub search_index: SearchIndexConfig,
    pub database: DatabaseConfig,
    /// strftime pattern for the console and file timestamps
    pub timestamp_format: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            search_index: SearchIndexConfig::default(),
            database: DatabaseConfig::default(),
            timestamp_format: crate::core::timestamp::DEFAULT_TIMESTAMP_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub level: LogLevel,
    pub colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            colors: true,
        }
    }
}

/// When the log file rotates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    #[default]
    Daily,
    Hourly,
    Size,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub filename: String,
    pub extension: String,
    pub level: LogLevel,
    pub rotation: RotationKind,
    /// Only used with `rotation = "size"`
    pub max_size_bytes: u64,
    pub max_backups: usize,
    pub compress: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            filename: "logs".to_string(),
            extension: ".log".to_string(),
            level: LogLevel::Verbose,
            rotation: RotationKind::Daily,
            max_size_bytes: 100 * 1024 * 1024,
            max_backups: 14,
            compress: false,
        }
    }
}

impl FileConfig {
    /// `{directory}/{filename}{extension}`
    pub fn path(&self) -> PathBuf {
        self.directory
            .join(format!("{}{}", self.filename, self.extension))
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        let strategy = match self.rotation {
            RotationKind::Daily => RotationStrategy::Daily { hour: 0 },
            RotationKind::Hourly => RotationStrategy::Hourly,
            RotationKind::Size => RotationStrategy::Size {
                max_bytes: self.max_size_bytes,
            },
            RotationKind::Never => RotationStrategy::Never,
        };

        RotationPolicy::new()
            .with_strategy(strategy)
            .with_max_backups(self.max_backups)
            .with_compression(self.compress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchIndexConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index_prefix: String,
    pub level: LogLevel,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            index_prefix: "logs".to_string(),
            level: LogLevel::Verbose,
            queue_capacity: 1024,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl SearchIndexConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_capacity(self.queue_capacity)
            .with_overflow_policy(self.overflow_policy.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub level: LogLevel,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: LogLevel::Verbose,
            queue_capacity: 1024,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_capacity(self.queue_capacity)
            .with_overflow_policy(self.overflow_policy.clone())
    }
}

impl LoggerConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has wrongly typed fields
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LoggerError::config("config", e.to_string()))
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "read config file",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment, in production)
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOGGER_CONSOLE_LEVEL") {
            self.console.level = LogLevel::from(level.trim());
        }
        if let Some(dir) = lookup("LOGGER_FILE_DIR") {
            self.file.directory = PathBuf::from(dir);
        }
        if let Some(enabled) = lookup("LOGGER_DATABASE_ENABLED") {
            self.database.enabled = parse_flag(&enabled);
        }
        if let Some(enabled) = lookup("ELASTICSEARCH_ENABLED") {
            self.search_index.enabled = parse_flag(&enabled);
        }
        if let Some(url) = lookup("ELASTICSEARCH_SERVER_URL") {
            self.search_index.endpoint = url;
        }
        if let Some(username) = lookup("ELASTICSEARCH_USERNAME") {
            self.search_index.username = Some(username);
        }
        if let Some(password) = lookup("ELASTICSEARCH_PASSWORD") {
            self.search_index.password = Some(password);
        }
        self
    }

    pub fn timestamp(&self) -> TimestampFormat {
        TimestampFormat::from_pattern(&self.timestamp_format)
    }

    /// Check settings that cannot work at runtime
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found
    pub fn validate(&self) -> Result<()> {
        if self.file.filename.trim().is_empty() {
            return Err(LoggerError::config("file", "filename must not be empty"));
        }
        if self.file.rotation == RotationKind::Size && self.file.max_size_bytes == 0 {
            return Err(LoggerError::config(
                "file",
                "max_size_bytes must be greater than zero for size rotation",
            ));
        }
        if self.search_index.enabled {
            if self.search_index.endpoint.trim().is_empty() {
                return Err(LoggerError::config("search_index", "endpoint must not be empty"));
            }
            if self.search_index.queue_capacity == 0 {
                return Err(LoggerError::config(
                    "search_index",
                    "queue_capacity must be greater than zero",
                ));
            }
        }
        if self.database.enabled && self.database.queue_capacity == 0 {
            return Err(LoggerError::config(
                "database",
                "queue_capacity must be greater than zero",
            ));
        }
        if self.timestamp_format.trim().is_empty() {
            return Err(LoggerError::config("timestamp_format", "pattern must not be empty"));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
