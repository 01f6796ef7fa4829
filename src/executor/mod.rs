//! The worker side of the bridge.
//!
//! An [`Executor`] receives [`Dispatch`] messages, runs each task away from
//! the caller, and reports a [`Completion`] on the channel it was started
//! with. Dispatching is fire-and-forget: the only coupling between a
//! dispatch and its completion is the token they share.

pub mod mock;
pub mod thread;

use tokio::sync::mpsc;

use crate::error::BridgeError;
use crate::task::{Completion, Dispatch};

pub use thread::{ExecutorConfig, ThreadExecutor};

/// Where an executor reports completions.
pub type CompletionSender = mpsc::UnboundedSender<Completion>;

/// An isolated execution context for tasks.
pub trait Executor: Send {
    /// Bring the execution context up. Completions go to `completions`.
    fn start(&mut self, completions: CompletionSender) -> Result<(), BridgeError>;

    /// Hand a task to the worker. Fails only if the worker cannot accept it.
    fn dispatch(&self, dispatch: Dispatch) -> Result<(), BridgeError>;

    /// Tear the execution context down. No completions are sent afterwards.
    fn terminate(&mut self);

    fn is_running(&self) -> bool;
}
