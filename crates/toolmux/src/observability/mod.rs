//! Observability for tool execution.
//!
//! OpenTelemetry metrics for tool invocations, recorded per finished
//! invocation by the telemetry layer.

pub mod metrics;

pub use metrics::ToolCallMetrics;
