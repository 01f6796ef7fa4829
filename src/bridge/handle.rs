use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::task::{CorrelationToken, Outcome};

/// The caller's side of one submission. Resolves exactly once: with the
/// task's result, with its error, or with [`BridgeError::Orphaned`] if the
/// pending request was dropped unsettled (bridge dropped or entry reclaimed).
#[derive(Debug)]
#[must_use = "a task handle does nothing unless awaited"]
pub struct TaskHandle {
    token: CorrelationToken,
    receiver: oneshot::Receiver<Outcome>,
}

impl TaskHandle {
    pub(crate) fn new(token: CorrelationToken, receiver: oneshot::Receiver<Outcome>) -> Self {
        Self { token, receiver }
    }

    pub fn token(&self) -> CorrelationToken {
        self.token
    }
}

impl Future for TaskHandle {
    type Output = Result<Value, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.into_result().map_err(BridgeError::Task)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::Orphaned(this.token))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use serde_json::json;

    #[tokio::test]
    async fn success_resolves() {
        let (tx, rx) = oneshot::channel();
        let handle = TaskHandle::new(CorrelationToken(1), rx);
        tx.send(Outcome::Success(json!(120))).unwrap();
        assert_eq!(handle.await.unwrap(), json!(120));
    }

    #[tokio::test]
    async fn error_rejects() {
        let (tx, rx) = oneshot::channel();
        let handle = TaskHandle::new(CorrelationToken(1), rx);
        tx.send(Outcome::Error(TaskError::new("division by zero"))).unwrap();
        let err = handle.await.unwrap_err();
        assert_eq!(err, BridgeError::Task(TaskError::new("division by zero")));
    }

    #[tokio::test]
    async fn dropped_sender_orphans() {
        let (tx, rx) = oneshot::channel::<Outcome>();
        let handle = TaskHandle::new(CorrelationToken(4), rx);
        drop(tx);
        assert_eq!(handle.await.unwrap_err(), BridgeError::Orphaned(CorrelationToken(4)));
    }
}
