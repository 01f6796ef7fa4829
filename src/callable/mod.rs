pub mod factorial;
pub mod services;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::TaskError;
use crate::task::{Outcome, Task};

/// Something the worker can run: a standalone function, an object with
/// named methods, or both.
#[async_trait]
pub trait Callable: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Members reachable through a method selector.
    fn methods(&self) -> &[&str] {
        &[]
    }

    async fn call(&self, args: &[Value]) -> Result<Value>;

    async fn call_method(&self, method: &str, _args: &[Value]) -> Result<Value> {
        bail!("{} has no method {}", self.name(), method)
    }
}

/// Describes a registered callable for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableDescription {
    pub name: String,
    pub description: String,
    pub methods: Vec<String>,
}

/// The closed dispatch table the worker resolves tasks against.
/// RwLock allows runtime registration + parallel reads.
pub struct CallableRegistry {
    callables: RwLock<HashMap<String, Arc<dyn Callable>>>,
}

impl Default for CallableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self {
            callables: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding the built-in algorithms.
    pub async fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(factorial::Factorial)).await;
        registry.register(Arc::new(services::Services)).await;
        registry
    }

    pub async fn register(&self, callable: Arc<dyn Callable>) {
        let name = callable.name().to_string();
        self.callables.write().await.insert(name, callable);
    }

    pub async fn unregister(&self, name: &str) {
        self.callables.write().await.remove(name);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Callable>> {
        self.callables.read().await.get(name).cloned()
    }

    /// Run a task. Every failure becomes an `Outcome::Error`.
    pub async fn invoke(&self, task: &Task) -> Outcome {
        let result = match task {
            Task::DirectCall { callable, args } => match self.get(callable).await {
                Some(target) => target.call(args).await,
                None => Err(anyhow::anyhow!("unknown callable: {}", callable)),
            },
            Task::MethodCall {
                receiver,
                method,
                args,
            } => match self.get(receiver).await {
                Some(target) => target.call_method(method, args).await,
                None => Err(anyhow::anyhow!("unknown callable: {}", receiver)),
            },
        };
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) => Outcome::Error(TaskError::from(e)),
        }
    }

    pub async fn descriptions(&self) -> Vec<CallableDescription> {
        let mut descriptions: Vec<_> = self
            .callables
            .read()
            .await
            .values()
            .map(|c| CallableDescription {
                name: c.name().to_string(),
                description: c.description().to_string(),
                methods: c.methods().iter().map(|m| m.to_string()).collect(),
            })
            .collect();
        descriptions.sort_by(|a, b| a.name.cmp(&b.name));
        descriptions
    }
}

/// Read argument `index` as a non-negative integer.
pub fn arg_u64(args: &[Value], index: usize) -> Result<u64> {
    match args.get(index) {
        Some(value) => match value.as_u64() {
            Some(n) => Ok(n),
            None => bail!("argument {} must be a non-negative integer, got {}", index, value),
        },
        None => bail!("missing argument {}", index),
    }
}

/// Read argument `index` as a number.
pub fn arg_f64(args: &[Value], index: usize) -> Result<f64> {
    match args.get(index) {
        Some(value) => match value.as_f64() {
            Some(n) => Ok(n),
            None => bail!("argument {} must be a number, got {}", index, value),
        },
        None => bail!("missing argument {}", index),
    }
}
