use anyhow::Result;
use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::Value;

use super::{Callable, arg_u64};

/// `n!` for a single non-negative integer argument.
pub struct Factorial;

/// Iterative factorial with arbitrary precision.
pub fn factorial(n: u64) -> BigUint {
    (1..=n).map(BigUint::from).product()
}

/// Numbers that fit in a u64 stay numbers; larger ones become decimal strings.
pub fn factorial_value(n: u64) -> Result<Value> {
    let result = factorial(n);
    Ok(match u64::try_from(&result) {
        Ok(small) => Value::from(small),
        Err(_) => Value::String(result.to_string()),
    })
}

#[async_trait]
impl Callable for Factorial {
    fn name(&self) -> &str {
        "factorial"
    }

    fn description(&self) -> &str {
        "n! for a non-negative integer n"
    }

    async fn call(&self, args: &[Value]) -> Result<Value> {
        factorial_value(arg_u64(args, 0)?)
    }
}
