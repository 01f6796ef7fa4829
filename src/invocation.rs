//! Launcher input: `callable[.method] [arg ...]`.
//!
//! Each argument is parsed as JSON when it can be (`5`, `true`, `[1,2]`)
//! and kept as a plain string otherwise. Arguments are whitespace
//! separated, so JSON arguments must not contain spaces.

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::task::SubmitOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub callable: String,
    pub options: SubmitOptions,
}

pub fn parse(line: &str) -> Result<Invocation> {
    let mut parts = line.split_whitespace();
    let target = parts.next().context("empty invocation")?;

    let (callable, method) = match target.split_once('.') {
        Some((callable, method)) => (callable, Some(method)),
        None => (target, None),
    };
    if callable.is_empty() {
        bail!("missing callable name in {:?}", target);
    }
    if method.is_some_and(str::is_empty) {
        bail!("missing method name in {:?}", target);
    }

    Ok(Invocation {
        callable: callable.to_string(),
        options: SubmitOptions {
            args: parts.map(parse_arg).collect(),
            method: method.map(str::to_string),
        },
    })
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Strings print bare; everything else as JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
