use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CompletionSender, Executor};
use crate::error::BridgeError;
use crate::task::{Completion, CorrelationToken, Dispatch, Outcome};

/// A scripted executor for tests. Runs nothing: it records every dispatch
/// and lets the test decide when, in what order, and how often
/// completions arrive. Clones share state, so keep one and box the other.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Default)]
struct ScriptState {
    completions: Option<CompletionSender>,
    dispatched: Vec<Dispatch>,
    start_failure: Option<String>,
    terminated: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor whose `start` fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        let executor = Self::default();
        executor.state().start_failure = Some(reason.to_string());
        executor
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every dispatch received so far, in arrival order.
    pub fn dispatched(&self) -> Vec<Dispatch> {
        self.state().dispatched.clone()
    }

    pub fn was_terminated(&self) -> bool {
        self.state().terminated
    }

    /// Emit a completion for `token`. Returns false once the executor can
    /// no longer report anything.
    pub fn complete(&self, token: CorrelationToken, outcome: Outcome) -> bool {
        let state = self.state();
        match &state.completions {
            Some(tx) if !state.terminated => tx.send(Completion { token, outcome }).is_ok(),
            _ => false,
        }
    }
}

impl Executor for ScriptedExecutor {
    fn start(&mut self, completions: CompletionSender) -> Result<(), BridgeError> {
        let mut state = self.state();
        if let Some(reason) = &state.start_failure {
            return Err(BridgeError::ExecutorUnavailable(reason.clone()));
        }
        if state.completions.is_some() {
            return Err(BridgeError::ExecutorUnavailable(
                "executor already started".to_string(),
            ));
        }
        state.completions = Some(completions);
        Ok(())
    }

    fn dispatch(&self, dispatch: Dispatch) -> Result<(), BridgeError> {
        let mut state = self.state();
        if state.terminated || state.completions.is_none() {
            return Err(BridgeError::ExecutorUnavailable(
                "executor is not running".to_string(),
            ));
        }
        state.dispatched.push(dispatch);
        Ok(())
    }

    fn terminate(&mut self) {
        let mut state = self.state();
        state.terminated = true;
        state.completions = None;
    }

    fn is_running(&self) -> bool {
        let state = self.state();
        state.completions.is_some() && !state.terminated
    }
}
