//! Console appender implementation

use crate::core::{Appender, LogLevel, Result, SinkPayload};
use parking_lot::Mutex;
use std::io::Write;

/// Where one console stream goes
enum Stream {
    Stdout,
    Stderr,
    Writer(Mutex<Box<dyn Write + Send>>),
}

impl Stream {
    fn write_line(&self, line: &str) -> Result<()> {
        match self {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{}", line)?;
            }
            Stream::Stderr => {
                let mut err = std::io::stderr().lock();
                writeln!(err, "{}", line)?;
            }
            Stream::Writer(writer) => {
                writeln!(writer.lock(), "{}", line)?;
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        match self {
            Stream::Stdout => std::io::stdout().flush()?,
            Stream::Stderr => std::io::stderr().flush()?,
            Stream::Writer(writer) => writer.lock().flush()?,
        }
        Ok(())
    }
}

/// Writes each payload as one line: `error` records go to stderr, everything
/// else to stdout.
pub struct ConsoleAppender {
    out: Stream,
    err: Stream,
    stderr_levels: Vec<LogLevel>,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            out: Stream::Stdout,
            err: Stream::Stderr,
            stderr_levels: vec![LogLevel::Error],
        }
    }

    /// Route output to custom writers instead of the process streams
    ///
    /// # Example
    ///
    /// ```
    /// use trace_fanout_logger::appenders::ConsoleAppender;
    ///
    /// let appender = ConsoleAppender::with_writers(Box::new(std::io::sink()), Box::new(std::io::sink()));
    /// ```
    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Stream::Writer(Mutex::new(out)),
            err: Stream::Writer(Mutex::new(err)),
            stderr_levels: vec![LogLevel::Error],
        }
    }

    /// Set which levels are written to the error stream
    #[must_use]
    pub fn with_stderr_levels(mut self, levels: Vec<LogLevel>) -> Self {
        self.stderr_levels = levels;
        self
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&self, payload: &SinkPayload) -> Result<()> {
        let line = payload.to_line();

        if self.stderr_levels.contains(payload.level()) {
            self.err.write_line(&line)
        } else {
            self.out.write_line(&line)
        }
    }

    fn flush(&self) -> Result<()> {
        // Flush both since we write to both
        self.out.flush()?;
        self.err.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Correlation, FormatPipeline, MessageEvent, NormalizedRecord};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn payload(level: LogLevel, message: &str) -> SinkPayload {
        let record = NormalizedRecord::from_event(
            MessageEvent::new(level, message).into(),
            Correlation::none(),
        );
        FormatPipeline::cli().with_colors(false).format(&record)
    }

    #[test]
    fn test_routes_errors_to_stderr() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let appender = ConsoleAppender::with_writers(Box::new(out.clone()), Box::new(err.clone()));

        appender.append(&payload(LogLevel::Info, "ready")).unwrap();
        appender.append(&payload(LogLevel::Error, "failed")).unwrap();
        appender.flush().unwrap();

        assert!(out.contents().contains("[info] ready"));
        assert!(!out.contents().contains("failed"));
        assert!(err.contents().contains("[error] failed"));
    }

    #[test]
    fn test_custom_stderr_levels() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let appender = ConsoleAppender::with_writers(Box::new(out.clone()), Box::new(err.clone()))
            .with_stderr_levels(vec![LogLevel::Error, LogLevel::Warn]);

        appender.append(&payload(LogLevel::Warn, "slow query")).unwrap();

        assert!(out.contents().is_empty());
        assert_eq!(err.contents().lines().count(), 1);
    }
}
