use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use super::factorial::factorial_value;
use super::{Callable, arg_f64, arg_u64};

const METHODS: &[&str] = &["factorial", "divide"];

/// An object reference: only reachable through a method selector.
pub struct Services;

#[async_trait]
impl Callable for Services {
    fn name(&self) -> &str {
        "services"
    }

    fn description(&self) -> &str {
        "service object; invoke one of its methods"
    }

    fn methods(&self) -> &[&str] {
        METHODS
    }

    async fn call(&self, _args: &[Value]) -> Result<Value> {
        bail!("services is an object, not a function; select one of: {}", METHODS.join(", "))
    }

    async fn call_method(&self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "factorial" => factorial_value(arg_u64(args, 0)?),
            "divide" => {
                let dividend = arg_f64(args, 0)?;
                let divisor = arg_f64(args, 1)?;
                if divisor == 0.0 {
                    bail!("division by zero");
                }
                Ok(Value::from(dividend / divisor))
            }
            _ => bail!("services has no method {}", method),
        }
    }
}
