//! Task descriptors and the messages exchanged with the worker.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, TaskError};

/// Identifies exactly one in-flight submission. Echoed verbatim by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(pub u64);

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Options accepted by `submit`, mirroring `{ args, method }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitOptions {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub method: Option<String>,
}

impl SubmitOptions {
    pub fn args(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            method: None,
        }
    }

    /// Invoke `method` on the reference instead of the reference itself.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Parse a dynamic options object. `null` means "no options".
    pub fn from_json(value: Value) -> Result<Self, BridgeError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| BridgeError::MalformedOptions(e.to_string()))
    }
}

/// A unit of work for the worker. Never mutated once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Invoke a standalone callable.
    DirectCall { callable: String, args: Vec<Value> },
    /// Invoke a named member of a dispatched object.
    MethodCall {
        receiver: String,
        method: String,
        args: Vec<Value>,
    },
}

impl Task {
    /// Resolve `{ callable, options }` into a task, rejecting malformed input.
    pub fn from_options(callable: &str, options: SubmitOptions) -> Result<Self, BridgeError> {
        if callable.trim().is_empty() {
            return Err(BridgeError::MalformedOptions(
                "callable reference is empty".to_string(),
            ));
        }
        match options.method {
            Some(method) if method.trim().is_empty() => Err(BridgeError::MalformedOptions(
                "method selector is empty".to_string(),
            )),
            Some(method) => Ok(Task::MethodCall {
                receiver: callable.to_string(),
                method,
                args: options.args,
            }),
            None => Ok(Task::DirectCall {
                callable: callable.to_string(),
                args: options.args,
            }),
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            Task::DirectCall { args, .. } | Task::MethodCall { args, .. } => args,
        }
    }

    /// `callable` or `receiver.method`, for logs.
    pub fn label(&self) -> String {
        match self {
            Task::DirectCall { callable, .. } => callable.clone(),
            Task::MethodCall {
                receiver, method, ..
            } => format!("{receiver}.{method}"),
        }
    }
}

/// Outcome of a single task. Exactly one of result or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success(Value),
    Error(TaskError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> Result<Value, TaskError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Error(err) => Err(err),
        }
    }
}

/// Bridge → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub token: CorrelationToken,
    pub task: Task,
}

/// Worker → bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub token: CorrelationToken,
    pub outcome: Outcome,
}
