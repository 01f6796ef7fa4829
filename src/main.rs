use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use polyworker::bridge::{BridgeConfig, TaskBridge};
use polyworker::callable::CallableRegistry;
use polyworker::consts::{DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT, DEFAULT_TOKEN_BASE};
use polyworker::executor::{ExecutorConfig, ThreadExecutor};
use polyworker::invocation;

#[derive(Parser)]
#[command(
    name = "polyworker",
    version,
    about = "Offload work to a worker thread and await the answer."
)]
struct Cli {
    /// Tasks the worker runs at once
    #[arg(short, long, default_value_t = DEFAULT_MAX_CONCURRENT)]
    concurrency: usize,

    /// Per-invocation timeout in seconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// First correlation token handed out
    #[arg(long, default_value_t = DEFAULT_TOKEN_BASE)]
    token_base: u64,

    /// List available callables and exit
    #[arg(short, long, default_value_t = false)]
    list: bool,

    /// Run a single invocation and exit (e.g. "factorial 5")
    #[arg(short, long)]
    run: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so results on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let registry = Arc::new(CallableRegistry::with_builtins().await);

    if cli.list {
        for callable in registry.descriptions().await {
            if callable.methods.is_empty() {
                println!("{:<12} {}", callable.name, callable.description);
            } else {
                println!(
                    "{:<12} {} [{}]",
                    callable.name,
                    callable.description,
                    callable.methods.join(", ")
                );
            }
        }
        return Ok(());
    }

    let executor = ThreadExecutor::new(
        Arc::clone(&registry),
        ExecutorConfig {
            max_concurrent: cli.concurrency,
            ..ExecutorConfig::default()
        },
    );
    let bridge = TaskBridge::start(
        Box::new(executor),
        BridgeConfig {
            token_base: cli.token_base,
        },
    )?;
    let timeout = Duration::from_secs(cli.timeout);

    // Single invocation mode
    if let Some(line) = cli.run {
        let ok = evaluate(&bridge, &line, timeout).await;
        bridge.terminate();
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    // REPL: async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\npolyworker> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Ctrl+D (EOF)
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        evaluate(&bridge, line, timeout).await;
    }

    bridge.terminate();
    Ok(())
}

/// Parse one invocation, offload it, and print the outcome.
async fn evaluate(bridge: &TaskBridge, line: &str, timeout: Duration) -> bool {
    let invocation = match invocation::parse(line) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return false;
        }
    };
    match bridge
        .submit_with_timeout(&invocation.callable, invocation.options, timeout)
        .await
    {
        Ok(value) => {
            println!("=> {}", invocation::render(&value));
            true
        }
        Err(e) => {
            eprintln!("error: {}", e);
            false
        }
    }
}
