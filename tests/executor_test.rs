use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use polyworker::BridgeError;
use polyworker::callable::{Callable, CallableRegistry};
use polyworker::executor::{Executor, ExecutorConfig, ThreadExecutor};
use polyworker::task::{Completion, CorrelationToken, Dispatch, Outcome, Task};

/// Reports the name of the thread it runs on.
struct WhereAmI;

#[async_trait]
impl Callable for WhereAmI {
    fn name(&self) -> &str {
        "where_am_i"
    }

    fn description(&self) -> &str {
        "name of the current thread"
    }

    async fn call(&self, _args: &[Value]) -> Result<Value> {
        Ok(json!(std::thread::current().name()))
    }
}

/// Blocks its thread for the given number of milliseconds.
struct Busy;

#[async_trait]
impl Callable for Busy {
    fn name(&self) -> &str {
        "busy"
    }

    fn description(&self) -> &str {
        "synchronous sleep"
    }

    async fn call(&self, args: &[Value]) -> Result<Value> {
        let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
        std::thread::sleep(Duration::from_millis(ms));
        Ok(json!(ms))
    }
}

async fn executor(thread_name: &str) -> ThreadExecutor {
    let registry = CallableRegistry::with_builtins().await;
    registry.register(Arc::new(WhereAmI)).await;
    registry.register(Arc::new(Busy)).await;
    ThreadExecutor::new(
        Arc::new(registry),
        ExecutorConfig {
            thread_name: thread_name.to_string(),
            ..ExecutorConfig::default()
        },
    )
}

fn direct(token: u64, callable: &str, args: Vec<Value>) -> Dispatch {
    Dispatch {
        token: CorrelationToken(token),
        task: Task::DirectCall {
            callable: callable.to_string(),
            args,
        },
    }
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Completion>) -> Option<Completion> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no completion within 5s")
}

#[tokio::test]
async fn completion_echoes_the_dispatched_token() {
    let mut worker = executor("echo-token").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    worker.start(tx).unwrap();
    assert!(worker.is_running());

    worker.dispatch(direct(41, "factorial", vec![json!(5)])).unwrap();

    let completion = recv(&mut rx).await.unwrap();
    assert_eq!(completion.token, CorrelationToken(41));
    assert_eq!(completion.outcome, Outcome::Success(json!(120)));
}

#[tokio::test]
async fn tasks_run_off_the_caller_thread() {
    let mut worker = executor("offload-check").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    worker.start(tx).unwrap();

    worker.dispatch(direct(1, "where_am_i", vec![])).unwrap();

    let completion = recv(&mut rx).await.unwrap();
    assert_eq!(completion.outcome, Outcome::Success(json!("offload-check")));
    assert_ne!(std::thread::current().name(), Some("offload-check"));
}

#[tokio::test]
async fn method_calls_reach_the_receiver_method() {
    let mut worker = executor("methods").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    worker.start(tx).unwrap();

    worker
        .dispatch(Dispatch {
            token: CorrelationToken(2),
            task: Task::MethodCall {
                receiver: "services".to_string(),
                method: "factorial".to_string(),
                args: vec![json!(4)],
            },
        })
        .unwrap();

    let completion = recv(&mut rx).await.unwrap();
    assert_eq!(completion.outcome, Outcome::Success(json!(24)));
}

#[tokio::test]
async fn task_errors_become_completion_data() {
    let mut worker = executor("errors").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    worker.start(tx).unwrap();

    worker.dispatch(direct(3, "factorial", vec![json!("five")])).unwrap();
    worker.dispatch(direct(4, "factorial", vec![json!(1)])).unwrap();

    let failed = recv(&mut rx).await.unwrap();
    assert_eq!(failed.token, CorrelationToken(3));
    assert!(matches!(failed.outcome, Outcome::Error(ref e) if e.message.contains("non-negative integer")));

    let ok = recv(&mut rx).await.unwrap();
    assert_eq!(ok.token, CorrelationToken(4));
    assert!(ok.outcome.is_success());
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut worker = executor("twice").await;
    let (tx, _rx) = mpsc::unbounded_channel();
    worker.start(tx.clone()).unwrap();

    let err = worker.start(tx).unwrap_err();
    assert!(matches!(err, BridgeError::ExecutorUnavailable(ref s) if s.contains("already started")));
}

#[tokio::test]
async fn terminate_stops_all_completions() {
    let mut worker = executor("terminate").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    worker.start(tx).unwrap();

    worker.terminate();
    assert!(!worker.is_running());

    let err = worker.dispatch(direct(5, "factorial", vec![json!(5)])).unwrap_err();
    assert!(matches!(err, BridgeError::ExecutorUnavailable(_)));

    // The worker's completion sender is gone with its thread.
    assert!(recv(&mut rx).await.is_none());
}

#[tokio::test]
async fn terminate_does_not_wait_for_a_busy_task() {
    let mut worker = executor("busy").await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    worker.start(tx).unwrap();

    worker.dispatch(direct(6, "busy", vec![json!(1500)])).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    worker.terminate();
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "terminate blocked for {:?}",
        started.elapsed()
    );
    assert!(!worker.is_running());

    // The busy task finishes on its own, but its result is never reported.
    assert!(recv(&mut rx).await.is_none());
}
