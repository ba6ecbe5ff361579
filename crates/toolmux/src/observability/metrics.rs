use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Per-invocation metrics: call count, duration, success/failure split.
pub struct ToolCallMetrics {
    calls_counter: Counter<u64>,
    duration_histogram: Histogram<f64>,
    success_counter: Counter<u64>,
    failure_counter: Counter<u64>,
}

impl ToolCallMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            calls_counter: meter
                .u64_counter("tool.calls")
                .with_description("Number of tool invocations")
                .with_unit("{call}")
                .build(),

            duration_histogram: meter
                .f64_histogram("tool.duration")
                .with_description("Duration of tool invocations")
                .with_unit("ms")
                .build(),

            success_counter: meter
                .u64_counter("tool.success")
                .with_description("Number of successful tool invocations")
                .with_unit("{call}")
                .build(),

            failure_counter: meter
                .u64_counter("tool.failure")
                .with_description("Number of failed tool invocations")
                .with_unit("{call}")
                .build(),
        }
    }

    /// Record one finished invocation.
    pub fn record_tool_call(&self, tool_name: &str, duration_ms: f64, success: bool) {
        let attributes = &[
            KeyValue::new("tool.name", tool_name.to_string()),
            KeyValue::new("success", success),
        ];

        self.calls_counter.add(1, attributes);
        self.duration_histogram.record(duration_ms, attributes);

        let tool_attr = &[KeyValue::new("tool.name", tool_name.to_string())];
        if success {
            self.success_counter.add(1, tool_attr);
        } else {
            self.failure_counter.add(1, tool_attr);
        }
    }
}
