//! Appender trait for log output destinations

use super::{error::Result, format::SinkPayload};

/// A sink accepting formatted records.
///
/// `append` takes `&self`: the logger calls it without holding any lock, so
/// implementations synchronize internally and must tolerate concurrent calls.
/// It should return promptly; slow transports enqueue and deliver in the
/// background.
pub trait Appender: Send + Sync {
    fn append(&self, payload: &SinkPayload) -> Result<()>;
    fn flush(&self) -> Result<()>;
    fn name(&self) -> &str;
}
