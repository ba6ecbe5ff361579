use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// What to do when a tool handler reports a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Convert the failure into a per-invocation error result and keep the
    /// batch running.
    #[default]
    Downgrade,
    /// Surface the failure as a batch error once every worker has drained.
    Propagate,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Upper bound on how long a worker waits for its handler's next event.
    pub tool_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
    /// Best-effort batch cancellation; in-flight handler calls are aborted,
    /// not interrupted gracefully.
    pub cancellation_token: Option<CancellationToken>,
}

impl ExecutorConfig {
    pub fn from_env() -> Self {
        let tool_timeout = std::env::var("TOOLMUX_TOOL_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis);

        let failure_policy = match std::env::var("TOOLMUX_FAILURE_POLICY")
            .map(|raw| raw.to_lowercase())
            .as_deref()
        {
            Ok("propagate") => FailurePolicy::Propagate,
            _ => FailurePolicy::Downgrade,
        };

        Self {
            tool_timeout,
            failure_policy,
            cancellation_token: None,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }
}
