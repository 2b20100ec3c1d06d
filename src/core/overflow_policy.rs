//! Overflow policies for background sink queues
//!
//! Search-index and datastore sinks enqueue records for a worker thread. When
//! that queue is full, these policies decide what happens to the new record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Policy for handling a full sink queue
///
/// # Example
///
/// ```
/// use trace_fanout_logger::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: alert and drop
/// let policy = OverflowPolicy::default();
///
/// // Wait briefly for room, then drop
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the new record silently; only metrics track it
    DropNewest,

    /// Wait for space up to the timeout, then drop.
    ///
    /// This delays the logging caller; keep the timeout short.
    BlockWithTimeout(Duration),

    /// Drop the new record and warn on stderr (first drop, then every 1000th)
    #[default]
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}
