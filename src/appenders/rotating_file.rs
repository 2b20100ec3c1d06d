//! Rotating file appender with automatic log rotation
//!
//! The active file keeps a fixed name; on rotation it becomes backup `.1`,
//! older backups shift up by one and the oldest beyond `max_backup_files` is
//! deleted. Backups may be gzip-compressed.

use crate::core::{Appender, LoggerError, Result, SinkPayload};
use chrono::{DateTime, Local, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Rotation strategy defining when to rotate log files
///
/// # Examples
///
/// ```
/// use trace_fanout_logger::appenders::RotationStrategy;
///
/// // Rotate when file exceeds 100 MB
/// let size_strategy = RotationStrategy::Size { max_bytes: 100 * 1024 * 1024 };
///
/// // Rotate daily at midnight
/// let daily_strategy = RotationStrategy::Daily { hour: 0 };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Rotate when file exceeds size in bytes
    Size { max_bytes: u64 },

    /// Rotate once per local day, at the given hour (0-23)
    Daily { hour: u8 },

    /// Rotate hourly
    Hourly,

    /// No rotation (useful for testing or when external rotation is used)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Daily { hour: 0 }
    }
}

impl RotationStrategy {
    /// Create a daily rotation strategy
    ///
    /// # Panics
    ///
    /// Panics if hour is greater than 23
    #[must_use]
    pub fn daily(hour: u8) -> Self {
        assert!(hour <= 23, "Hour must be between 0 and 23");
        RotationStrategy::Daily { hour }
    }

    /// Decide whether a file last rotated at `last` must rotate at `now`
    pub fn is_due(&self, current_size: u64, last: SystemTime, now: SystemTime) -> bool {
        match self {
            RotationStrategy::Never => false,

            RotationStrategy::Size { max_bytes } => current_size >= *max_bytes,

            RotationStrategy::Daily { hour } => {
                let now: DateTime<Local> = now.into();
                let last: DateTime<Local> = last.into();

                // Rotate if we're on a different day and past the target hour
                now.date_naive() != last.date_naive() && now.hour() >= u32::from(*hour)
            }

            RotationStrategy::Hourly => {
                now.duration_since(last).unwrap_or(Duration::ZERO) >= Duration::from_secs(3600)
            }
        }
    }
}

/// Configuration for rotating file appender
///
/// # Examples
///
/// ```
/// use trace_fanout_logger::appenders::{RotationPolicy, RotationStrategy};
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Size { max_bytes: 50 * 1024 * 1024 })
///     .with_max_backups(7)
///     .with_compression(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Rotation strategy defining when to rotate
    pub strategy: RotationStrategy,
    /// Maximum number of rotated files to keep
    pub max_backup_files: usize,
    /// Whether to compress rotated files
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_files: 14,
            compress: false,
        }
    }
}

impl RotationPolicy {
    /// Create a new rotation policy with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// Mutable file state, guarded by the appender's lock
struct FileState {
    writer: Option<LineWriter<File>>,
    current_size: u64,
    /// Timestamp of the last rotation (used for time-based strategies)
    last_rotation: SystemTime,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
}

/// Rotating file appender
///
/// Writes each payload as one line. Appends from concurrent callers are
/// serialized by an internal lock, so lines never interleave.
///
/// # Examples
///
/// ```no_run
/// use trace_fanout_logger::appenders::{RotatingFileAppender, RotationPolicy, RotationStrategy};
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Daily { hour: 0 })
///     .with_max_backups(7)
///     .with_compression(true);
/// let appender = RotatingFileAppender::with_policy("logs/logs.log", policy).unwrap();
/// ```
pub struct RotatingFileAppender {
    base_path: PathBuf,
    policy: RotationPolicy,
    state: Mutex<FileState>,
}

const MAX_DELETION_FAILURES: usize = 5;

impl RotatingFileAppender {
    /// Create a new rotating file appender with the default (daily) policy
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// Create a new rotating file appender with custom policy
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size, last_rotation) = Self::open_file(&base_path)?;

        Ok(Self {
            base_path,
            policy,
            state: Mutex::new(FileState {
                writer: Some(LineWriter::new(file)),
                current_size,
                last_rotation,
                deletion_failure_count: 0,
            }),
        })
    }

    fn open_file(path: &Path) -> Result<(File, u64, SystemTime)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_appender(path.display().to_string(), format!("Failed to open: {}", e))
            })?;

        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_appender(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;

        // Use file modification time as last rotation time, or current time if unavailable
        let last_rotation = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        Ok((file, metadata.len(), last_rotation))
    }

    /// Get backup file path for given index
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut path = self.base_path.clone();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("logs.log")
            .to_string();
        path.set_file_name(format!("{}.{}", filename, index));
        path
    }

    fn remove_oldest_backups(&self, state: &mut FileState) -> Result<()> {
        let oldest = self.backup_path(self.policy.max_backup_files);
        let mut deletion_failed = false;

        for candidate in [gz_path(&oldest), oldest] {
            if candidate.exists() {
                if let Err(e) = fs::remove_file(&candidate) {
                    deletion_failed = true;
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove oldest backup {}: {} (failure #{}/{})",
                        candidate.display(),
                        e,
                        state.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    );
                }
            }
        }

        if !deletion_failed {
            state.deletion_failure_count = 0;
            return Ok(());
        }

        state.deletion_failure_count += 1;
        if state.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!(
                    "Rotation aborted: failed to delete old backup files {} consecutive times",
                    state.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }

    /// Perform log rotation
    fn rotate(&self, state: &mut FileState) -> Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.policy.max_backup_files == 0 {
            // No backups kept: truncate in place
            let file = File::create(&self.base_path).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to truncate log file: {}", e),
                )
            })?;
            state.writer = Some(LineWriter::new(file));
            state.current_size = 0;
            state.last_rotation = SystemTime::now();
            return Ok(());
        }

        self.remove_oldest_backups(state)?;

        for i in (1..self.policy.max_backup_files).rev() {
            let old_path = self.backup_path(i);
            let new_path = self.backup_path(i + 1);

            for (from, to) in [(gz_path(&old_path), gz_path(&new_path)), (old_path, new_path)] {
                if from.exists() {
                    if fs::rename(&from, &to).is_err() {
                        // On some platforms, rename fails if destination exists
                        let _ = fs::remove_file(&to);
                        fs::rename(&from, &to).map_err(|e| {
                            LoggerError::file_rotation(
                                from.display().to_string(),
                                format!("Failed to rotate backup files: {}", e),
                            )
                        })?;
                    }
                }
            }
        }

        let backup_path = self.backup_path(1);
        if self.base_path.exists() {
            fs::rename(&self.base_path, &backup_path).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                compress_file(&backup_path)?;
            }
        }

        let (file, _, _) = Self::open_file(&self.base_path)?;
        state.writer = Some(LineWriter::new(file));
        state.current_size = 0;
        state.last_rotation = SystemTime::now();

        Ok(())
    }

    /// Get current file size
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    /// Get base path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Get rotation policy
    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Get the timestamp of the last rotation
    #[must_use]
    pub fn last_rotation(&self) -> SystemTime {
        self.state.lock().last_rotation
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Compress a rotated file, replacing it with `<name>.gz`
///
/// The original is only removed after the compressed copy is fully written.
fn compress_file(path: &Path) -> Result<()> {
    use std::io::BufReader;

    let gz = gz_path(path);
    let mut tmp_name = gz.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let temp_gz = PathBuf::from(tmp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_gz).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_gz.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let written = std::io::copy(&mut reader, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut inner| inner.flush());
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_gz);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp_gz, &gz).map_err(|e| {
        let _ = fs::remove_file(&temp_gz);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }

    Ok(())
}

impl Appender for RotatingFileAppender {
    fn name(&self) -> &str {
        "rotating_file"
    }

    fn append(&self, payload: &SinkPayload) -> Result<()> {
        let mut state = self.state.lock();

        if self
            .policy
            .strategy
            .is_due(state.current_size, state.last_rotation, SystemTime::now())
        {
            if let Err(e) = self.rotate(&mut state) {
                // Keep writing to the current file rather than losing records
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );

                if state.writer.is_none() {
                    let (file, size, last_rotation) = Self::open_file(&self.base_path)?;
                    state.writer = Some(LineWriter::new(file));
                    state.current_size = size;
                    state.last_rotation = last_rotation;
                }

                // Prevent retrying the rotation on every write
                state.current_size = 0;
                state.last_rotation = SystemTime::now();
            }
        }

        let mut line = payload.to_line();
        line.push('\n');

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::file_appender(
                self.base_path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        state.current_size += line.len() as u64;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(ref mut writer) = self.state.lock().writer {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.state.get_mut().writer.take() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Correlation, FormatPipeline, LogLevel, MessageEvent, NormalizedRecord};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn line(message: &str) -> SinkPayload {
        let record = NormalizedRecord::from_event(
            MessageEvent::new(LogLevel::Info, message).into(),
            Correlation::none(),
        );
        FormatPipeline::file().format(&record)
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> SystemTime {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().into()
    }

    #[test]
    #[should_panic(expected = "Hour must be between 0 and 23")]
    fn test_daily_strategy_invalid_hour() {
        let _ = RotationStrategy::daily(24);
    }

    #[test]
    fn test_is_due() {
        let last = local(2025, 3, 10, 23);

        assert!(!RotationStrategy::Never.is_due(u64::MAX, last, local(2025, 3, 12, 1)));
        assert!(RotationStrategy::Size { max_bytes: 10 }.is_due(10, last, last));
        assert!(!RotationStrategy::Size { max_bytes: 10 }.is_due(9, last, last));

        let daily = RotationStrategy::Daily { hour: 2 };
        assert!(!daily.is_due(0, last, local(2025, 3, 11, 1)));
        assert!(daily.is_due(0, last, local(2025, 3, 11, 2)));
        assert!(!daily.is_due(0, local(2025, 3, 11, 0), local(2025, 3, 11, 23)));

        assert!(RotationStrategy::Hourly.is_due(0, last, last + Duration::from_secs(3600)));
        assert!(!RotationStrategy::Hourly.is_due(0, last, last + Duration::from_secs(60)));
    }

    #[test]
    fn test_writes_one_line_per_payload() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("logs").join("logs.log");
        let appender = RotatingFileAppender::with_policy(
            &path,
            RotationPolicy::new().with_strategy(RotationStrategy::Never),
        )?;

        appender.append(&line("first"))?;
        appender.append(&line("second"))?;
        appender.flush()?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("message=\"first\""));
        assert_eq!(appender.current_size(), content.len() as u64);
        Ok(())
    }

    #[test]
    fn test_line_reaches_disk_without_flush() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let appender = RotatingFileAppender::with_policy(
            &path,
            RotationPolicy::new().with_strategy(RotationStrategy::Never),
        )?;

        appender.append(&line("shutdown imminent"))?;

        // The appender stays alive; nothing flushes or drops it
        let content = fs::read_to_string(&path)?;
        assert!(content.contains("message=\"shutdown imminent\""));
        assert!(content.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn test_log_rotation_size_based() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let policy = RotationPolicy::new()
            .with_strategy(RotationStrategy::Size { max_bytes: 100 })
            .with_max_backups(2);
        let appender = RotatingFileAppender::with_policy(&path, policy)?;

        for i in 0..20 {
            appender.append(&line(&format!("Message number {}", i)))?;
        }
        appender.flush()?;

        assert!(path.exists());
        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());
        Ok(())
    }

    #[test]
    fn test_rotation_with_compression() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let policy = RotationPolicy::new()
            .with_strategy(RotationStrategy::Size { max_bytes: 50 })
            .with_max_backups(3)
            .with_compression(true);
        let appender = RotatingFileAppender::with_policy(&path, policy)?;

        for i in 0..5 {
            appender.append(&line(&format!("Compressible message {}", i)))?;
        }
        appender.flush()?;

        assert!(dir.path().join("app.log.1.gz").exists());
        assert!(!dir.path().join("app.log.1").exists());
        Ok(())
    }

    #[test]
    fn test_no_rotation_with_never_strategy() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let policy = RotationPolicy::new().with_strategy(RotationStrategy::Never);
        let appender = RotatingFileAppender::with_policy(&path, policy)?;

        for i in 0..50 {
            appender.append(&line(&format!("Message {}", i)))?;
        }
        appender.flush()?;

        assert!(!dir.path().join("app.log.1").exists());
        assert_eq!(fs::read_to_string(&path)?.lines().count(), 50);
        Ok(())
    }
}
