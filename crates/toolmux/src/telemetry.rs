use std::time::Duration;

use tracing::Span;

use toolmux_core::{InvocationResult, ToolRequest};

use crate::observability::ToolCallMetrics;

/// Telemetry seam for tool invocations. Every method has a no-op default
/// and none of them can fail, so instrumentation can never abort a batch.
pub trait Telemetry: Send + Sync {
    /// Opens a span scoping one invocation; the worker's entire run is
    /// instrumented with it.
    fn start_span(&self, _request: &ToolRequest) -> Span {
        Span::none()
    }

    /// Closes the span with the terminal result attached.
    fn end_span(&self, _span: &Span, _result: &InvocationResult) {}

    /// Reports one finished invocation to metrics.
    fn record_usage(
        &self,
        _request: &ToolRequest,
        _duration: Duration,
        _success: bool,
        _tool_name: &str,
    ) {
    }
}

pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// Production telemetry: a tracing span per invocation plus OpenTelemetry
/// counters and histograms.
pub struct OtelTelemetry {
    metrics: ToolCallMetrics,
}

impl OtelTelemetry {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("toolmux");
        Self {
            metrics: ToolCallMetrics::new(&meter),
        }
    }
}

impl Default for OtelTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry for OtelTelemetry {
    fn start_span(&self, request: &ToolRequest) -> Span {
        tracing::info_span!(
            "tool_call",
            tool.name = %request.name,
            request.id = %request.id,
            status = tracing::field::Empty,
        )
    }

    fn end_span(&self, span: &Span, result: &InvocationResult) {
        span.record("status", result.status.as_str());
    }

    fn record_usage(
        &self,
        _request: &ToolRequest,
        duration: Duration,
        success: bool,
        tool_name: &str,
    ) {
        self.metrics
            .record_tool_call(tool_name, duration.as_secs_f64() * 1000.0, success);
    }
}
