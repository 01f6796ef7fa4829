//! Submit tasks to a worker and await their results.
//!
//! The worker only exchanges fire-and-forget messages, so the bridge pairs
//! every dispatch with a [`CorrelationToken`] and keeps a caller-side table
//! of pending requests. A router task drains the completion channel, looks
//! each token up, and settles the matching [`TaskHandle`]. The token is the
//! only thing that crosses the boundary; completion order is irrelevant.

mod handle;
mod pending;

pub use handle::TaskHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::consts::DEFAULT_TOKEN_BASE;
use crate::error::BridgeError;
use crate::events::{Event, EventBus};
use crate::executor::Executor;
use crate::task::{Completion, CorrelationToken, Dispatch, SubmitOptions, Task};
use pending::{Lookup, PendingTable};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// First correlation token handed out.
    pub token_base: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            token_base: DEFAULT_TOKEN_BASE,
        }
    }
}

/// Counters over the bridge's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub submitted: u64,
    pub settled: u64,
    pub reclaimed: u64,
    /// Late completions for reclaimed tokens that were no longer remembered.
    pub expired: u64,
    /// Completions whose token matched nothing. Always a protocol defect.
    pub unmatched: u64,
}

/// State shared between submitters and the completion router.
struct Shared {
    table: Mutex<PendingTable>,
    events: EventBus,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, PendingTable> {
        lock(&self.table)
    }

    fn settle(&self, completion: Completion) {
        let Completion { token, outcome } = completion;
        let lookup = self.table().resolve(token);
        match lookup {
            Lookup::Pending(request) => {
                let success = outcome.is_success();
                debug!(
                    %token,
                    task = %request.label,
                    success,
                    elapsed = ?request.submitted_at.elapsed(),
                    "settling task"
                );
                if request.settle.send(outcome).is_err() {
                    debug!(%token, "caller dropped its handle before completion");
                }
                self.events.emit(Event::Settled { token, success });
            }
            Lookup::Reclaimed => {
                debug!(%token, "late completion for a reclaimed task");
            }
            Lookup::Expired => {
                debug!(%token, "late completion for a reclaimed task no longer tracked");
            }
            Lookup::Unknown => {
                error!(%token, "completion for unknown correlation token");
                self.events.emit(Event::UnmatchedCompletion { token });
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns a worker and exposes `submit` → [`TaskHandle`].
///
/// Construct one explicitly and pass it (usually in an `Arc`) to whatever
/// needs to offload work.
pub struct TaskBridge {
    executor: Mutex<Box<dyn Executor>>,
    shared: Arc<Shared>,
    router: Mutex<Option<JoinHandle<()>>>,
    terminated: AtomicBool,
}

impl TaskBridge {
    /// Start `executor` and the completion router. Must be called from
    /// within a tokio runtime.
    pub fn start(mut executor: Box<dyn Executor>, config: BridgeConfig) -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            BridgeError::ExecutorUnavailable("task bridge needs a tokio runtime".to_string())
        })?;

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        executor.start(completions_tx)?;

        let shared = Arc::new(Shared {
            table: Mutex::new(PendingTable::new(config.token_base)),
            events: EventBus::default(),
        });
        let router = runtime.spawn(route_completions(completions_rx, Arc::clone(&shared)));

        info!(token_base = config.token_base, "task bridge started");
        Ok(Self {
            executor: Mutex::new(executor),
            shared,
            router: Mutex::new(Some(router)),
            terminated: AtomicBool::new(false),
        })
    }

    /// Submit `callable` with `options`. Interface misuse fails here; task
    /// failures arrive later through the handle.
    pub fn submit(&self, callable: &str, options: SubmitOptions) -> Result<TaskHandle, BridgeError> {
        let task = Task::from_options(callable, options)?;
        self.submit_task(task)
    }

    pub fn submit_task(&self, task: Task) -> Result<TaskHandle, BridgeError> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(BridgeError::ExecutorUnavailable(
                "bridge has been terminated".to_string(),
            ));
        }

        let label = task.label();
        let (token, receiver) = self.shared.table().insert(label.clone()).inspect_err(|e| {
            error!(task = %label, error = %e, "cannot allocate a correlation token");
        })?;

        // The entry exists before the worker can possibly answer.
        if let Err(e) = lock(&self.executor).dispatch(Dispatch { token, task }) {
            self.shared.table().discard(token);
            warn!(%token, task = %label, error = %e, "dispatch failed");
            return Err(e);
        }

        debug!(%token, task = %label, "dispatched");
        Ok(TaskHandle::new(token, receiver))
    }

    /// Submit and wait at most `timeout`. On timeout the pending entry is
    /// reclaimed and [`BridgeError::TimedOut`] returned; the task itself
    /// keeps running on the worker.
    pub async fn submit_with_timeout(
        &self,
        callable: &str,
        options: SubmitOptions,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        let mut handle = self.submit(callable, options)?;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(result) => result,
            Err(_) => self.give_up(handle, timeout).await,
        }
    }

    /// Reclaim a handle whose wait timed out. If the completion slipped in
    /// after the deadline but before the reclaim, its result is kept.
    async fn give_up(&self, handle: TaskHandle, timeout: Duration) -> Result<Value, BridgeError> {
        let token = handle.token();
        if self.reclaim(token) {
            warn!(%token, ?timeout, "gave up waiting for task");
            return Err(BridgeError::TimedOut {
                token,
                after: timeout,
            });
        }
        debug!(%token, "task settled as its timeout fired; keeping the result");
        handle.await
    }

    /// Drop the pending entry for `token` without settling it. Its handle
    /// resolves to [`BridgeError::Orphaned`].
    pub fn reclaim(&self, token: CorrelationToken) -> bool {
        let reclaimed = self.shared.table().reclaim(token);
        if reclaimed {
            debug!(%token, "pending request reclaimed");
        }
        reclaimed
    }

    /// Stop the router and the worker. Requests still pending are left
    /// unsettled; returns how many.
    pub fn terminate(&self) -> usize {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return 0;
        }
        if let Some(router) = lock(&self.router).take() {
            router.abort();
        }
        lock(&self.executor).terminate();

        let orphaned = self.shared.table().len();
        if orphaned > 0 {
            warn!(orphaned, "task bridge terminated with requests still pending");
        } else {
            info!("task bridge terminated");
        }
        self.shared.events.emit(Event::Terminated { orphaned });
        orphaned
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.table().len()
    }

    pub fn stats(&self) -> BridgeStats {
        self.shared.table().stats
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }
}

impl Drop for TaskBridge {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn route_completions(mut completions: mpsc::UnboundedReceiver<Completion>, shared: Arc<Shared>) {
    while let Some(completion) = completions.recv().await {
        shared.settle(completion);
    }
    debug!("completion channel closed");
}
