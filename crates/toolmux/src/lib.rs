//! Concurrent tool-execution engine for agent runtimes.
//!
//! Takes the batch of tool-invocation requests produced by one model turn,
//! runs every invocation concurrently, merges their intermediate events into
//! a single ordered backpressured stream, and assembles a results list in
//! submission order once the stream is drained.

pub mod config;
pub mod execution;
pub mod handler;
pub mod observability;
pub mod telemetry;
pub mod validation;
mod worker;

pub use config::{ExecutorConfig, FailurePolicy};
pub use execution::{execute_tools, ExecutionEvent, ToolExecutor};
pub use handler::{tool_stream, FunctionHandler, ToolHandler, ToolStream, ToolStreamItem};
pub use telemetry::{NoopTelemetry, OtelTelemetry, Telemetry};
pub use validation::{validate_requests, ValidationOutcome, INVALID_TOOL_NAME};

pub use toolmux_core::{
    Content, ExecutionRecord, InvocationResult, InvocationStatus, ToolError, ToolNotification,
    ToolRequest, ToolResult,
};
