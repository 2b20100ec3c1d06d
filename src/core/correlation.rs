//! APM capability and trace correlation lookup

use super::log_event::ErrorEvent;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Identifiers of the transaction active at log time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl Correlation {
    /// No active trace
    pub const fn none() -> Self {
        Self {
            trace_id: None,
            transaction_id: None,
        }
    }

    pub fn new(trace_id: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self {
            trace_id: Some(trace_id.into()),
            transaction_id: Some(transaction_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.transaction_id.is_none()
    }
}

/// Application performance monitoring agent, as seen by the logger
///
/// Both methods are called on the logging hot path and must not block.
///
/// # Example
///
/// ```
/// use trace_fanout_logger::core::{ApmAgent, Correlation, ErrorEvent};
///
/// struct FixedAgent;
///
/// impl ApmAgent for FixedAgent {
///     fn current_transaction(&self) -> Option<Correlation> {
///         Some(Correlation::new("trace-1", "tx-1"))
///     }
///
///     fn capture_error(&self, _error: &ErrorEvent) {}
/// }
/// ```
pub trait ApmAgent: Send + Sync {
    /// Ids of the transaction currently active on this thread, if any
    fn current_transaction(&self) -> Option<Correlation>;

    /// Report an error to the APM backend
    fn capture_error(&self, error: &ErrorEvent);

    /// Whether the agent is running. Inactive agents are never queried.
    fn is_active(&self) -> bool {
        true
    }
}

/// Stand-in used when no APM agent is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopApm;

impl ApmAgent for NoopApm {
    fn current_transaction(&self) -> Option<Correlation> {
        None
    }

    fn capture_error(&self, _error: &ErrorEvent) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// Resolves correlation ids and forwards errors to the configured agent.
///
/// A panicking agent is treated as "no correlation" / "capture skipped".
#[derive(Clone)]
pub struct CorrelationResolver {
    agent: Arc<dyn ApmAgent>,
}

impl CorrelationResolver {
    pub fn new(agent: Arc<dyn ApmAgent>) -> Self {
        Self { agent }
    }

    /// Resolver backed by [`NoopApm`]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopApm))
    }

    pub fn agent(&self) -> &Arc<dyn ApmAgent> {
        &self.agent
    }

    pub fn resolve(&self) -> Correlation {
        if !self.agent.is_active() {
            return Correlation::none();
        }

        match catch_unwind(AssertUnwindSafe(|| self.agent.current_transaction())) {
            Ok(Some(correlation)) => correlation,
            Ok(None) => Correlation::none(),
            Err(_) => {
                eprintln!("[LOGGER WARNING] APM agent panicked while resolving the current transaction");
                Correlation::none()
            }
        }
    }

    /// Returns whether the agent accepted the capture without panicking
    pub fn capture_error(&self, error: &ErrorEvent) -> bool {
        if !self.agent.is_active() {
            return false;
        }

        match catch_unwind(AssertUnwindSafe(|| self.agent.capture_error(error))) {
            Ok(()) => true,
            Err(_) => {
                eprintln!("[LOGGER WARNING] APM agent panicked while capturing an error");
                false
            }
        }
    }
}

impl Default for CorrelationResolver {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for CorrelationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationResolver")
            .field("active", &self.agent.is_active())
            .finish()
    }
}
