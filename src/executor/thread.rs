//! Worker executor backed by a dedicated OS thread.
//!
//! The thread drives its own current-thread tokio runtime. Each dispatch is
//! spawned onto that runtime behind a semaphore, so `max_concurrent = 1`
//! runs tasks one at a time in dispatch order and anything larger lets them
//! overlap and complete in whatever order they finish.
//!
//! Terminating never waits on the thread: a task stuck in synchronous code
//! keeps the thread alive until it returns, but its result is discarded.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{debug, error, info};

use super::{CompletionSender, Executor};
use crate::callable::CallableRegistry;
use crate::consts::{DEFAULT_MAX_CONCURRENT, WORKER_THREAD_NAME};
use crate::error::{BridgeError, TaskError};
use crate::task::{Completion, Dispatch, Outcome, Task};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_concurrent: usize,
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            thread_name: WORKER_THREAD_NAME.to_string(),
        }
    }
}

/// Runs tasks from a [`CallableRegistry`] on a separate thread.
pub struct ThreadExecutor {
    registry: Arc<CallableRegistry>,
    config: ExecutorConfig,
    inbox: Option<mpsc::UnboundedSender<Dispatch>>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    /// Set on terminate; finished tasks check it before reporting.
    closed: Arc<AtomicBool>,
    started: bool,
}

impl ThreadExecutor {
    pub fn new(registry: Arc<CallableRegistry>, config: ExecutorConfig) -> Self {
        Self {
            registry,
            config,
            inbox: None,
            shutdown: None,
            thread: None,
            closed: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }
}

impl Executor for ThreadExecutor {
    fn start(&mut self, completions: CompletionSender) -> Result<(), BridgeError> {
        if self.started {
            return Err(BridgeError::ExecutorUnavailable(
                "executor already started".to_string(),
            ));
        }
        if self.config.max_concurrent == 0 {
            return Err(BridgeError::ExecutorUnavailable(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                BridgeError::ExecutorUnavailable(format!("failed to build worker runtime: {e}"))
            })?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent));
        let closed = Arc::clone(&self.closed);

        let thread = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                runtime.block_on(worker_loop(
                    inbox_rx,
                    shutdown_rx,
                    completions,
                    registry,
                    permits,
                    closed,
                ));
                // Dropping the runtime cancels whatever is still in flight.
                drop(runtime);
            })
            .map_err(|e| {
                BridgeError::ExecutorUnavailable(format!("failed to spawn worker thread: {e}"))
            })?;

        info!(
            thread = %self.config.thread_name,
            max_concurrent = self.config.max_concurrent,
            "worker started"
        );

        self.started = true;
        self.inbox = Some(inbox_tx);
        self.shutdown = Some(shutdown_tx);
        self.thread = Some(thread);
        Ok(())
    }

    fn dispatch(&self, dispatch: Dispatch) -> Result<(), BridgeError> {
        let inbox = self
            .inbox
            .as_ref()
            .ok_or_else(|| BridgeError::ExecutorUnavailable("executor is not running".to_string()))?;
        inbox
            .send(dispatch)
            .map_err(|_| BridgeError::ExecutorUnavailable("worker thread has exited".to_string()))
    }

    fn terminate(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.inbox = None;
        if let Some(thread) = self.thread.take() {
            // Joined off the caller's thread; a busy task must not stall it.
            let reaper = std::thread::Builder::new()
                .name(format!("{}-reaper", self.config.thread_name))
                .spawn(move || {
                    if thread.join().is_err() {
                        error!("worker thread panicked during shutdown");
                    }
                });
            if let Err(e) = reaper {
                debug!(error = %e, "could not spawn reaper; worker thread detached");
            }
            info!("worker terminated");
        }
    }

    fn is_running(&self) -> bool {
        self.inbox.as_ref().is_some_and(|inbox| !inbox.is_closed())
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn worker_loop(
    mut inbox: mpsc::UnboundedReceiver<Dispatch>,
    mut shutdown: oneshot::Receiver<()>,
    completions: CompletionSender,
    registry: Arc<CallableRegistry>,
    permits: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let dispatch = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            message = inbox.recv() => match message {
                Some(dispatch) => dispatch,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let registry = Arc::clone(&registry);
        let completions = completions.clone();
        let closed = Arc::clone(&closed);
        tokio::spawn(async move {
            let Dispatch { token, task } = dispatch;
            debug!(%token, task = %task.label(), "running task");
            let outcome = execute(&registry, &task).await;
            drop(permit);
            if closed.load(Ordering::Acquire) {
                debug!(%token, "worker terminated while task ran; completion dropped");
                return;
            }
            if completions.send(Completion { token, outcome }).is_err() {
                debug!(%token, "bridge stopped listening; completion dropped");
            }
        });
    }
    debug!("worker loop exited");
}

/// Run a task, turning errors and panics alike into an `Outcome::Error`.
pub async fn execute(registry: &CallableRegistry, task: &Task) -> Outcome {
    match AssertUnwindSafe(registry.invoke(task)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Outcome::Error(TaskError::new(format!(
            "{} panicked: {}",
            task.label(),
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
