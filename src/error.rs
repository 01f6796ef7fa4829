//! Error types for the bridge and its worker.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::CorrelationToken;

/// Error payload carried back from the worker when a task fails.
/// Errors are information, not failures: the worker keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the whole context chain on one line.
        Self::new(format!("{err:#}"))
    }
}

/// Everything `submit` and a [`TaskHandle`](crate::bridge::TaskHandle) can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The task ran and raised an error on the worker.
    #[error("task failed: {0}")]
    Task(#[from] TaskError),

    /// The worker is terminated or never came up.
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error("malformed options: {0}")]
    MalformedOptions(String),

    /// Every token in the numeric range has been handed out.
    #[error("correlation tokens exhausted")]
    TokensExhausted,

    #[error("task {token} timed out after {after:?}")]
    TimedOut {
        token: CorrelationToken,
        after: Duration,
    },

    /// The bridge went away before the task completed.
    #[error("task {0} orphaned: bridge dropped before completion")]
    Orphaned(CorrelationToken),
}

impl BridgeError {
    /// True for errors raised by the task itself rather than by the bridge.
    pub fn is_task_error(&self) -> bool {
        matches!(self, Self::Task(_))
    }
}
