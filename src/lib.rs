pub mod bridge;
pub mod callable;
pub mod consts;
pub mod error;
pub mod events;
pub mod executor;
pub mod invocation;
pub mod task;

pub use bridge::{BridgeConfig, TaskBridge, TaskHandle};
pub use error::{BridgeError, TaskError};
pub use task::{CorrelationToken, SubmitOptions, Task};
