use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, Instrument};

use toolmux_core::{
    Content, ExecutionRecord, InvocationResult, ToolError, ToolRequest, ToolResult,
};

use crate::config::FailurePolicy;
use crate::execution::ExecutionEvent;
use crate::handler::{ToolHandler, ToolStreamItem};
use crate::telemetry::Telemetry;

/// Item a worker pushes onto the shared channel. `Done` is the completion
/// sentinel, distinct from every real event.
pub(crate) enum WorkerItem {
    Event(ExecutionEvent),
    Done,
}

pub(crate) struct WorkerContext {
    pub index: usize,
    pub request: ToolRequest,
    pub handler: Arc<dyn ToolHandler>,
    pub telemetry: Arc<dyn Telemetry>,
    pub tx: mpsc::UnboundedSender<(usize, WorkerItem)>,
    pub ack: Arc<Notify>,
    pub tool_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
}

/// Guarantees the scheduler sees this worker's sentinel exactly once, even
/// if the worker unwinds mid-stream.
struct SentinelGuard {
    index: usize,
    tx: mpsc::UnboundedSender<(usize, WorkerItem)>,
    fired: bool,
}

impl SentinelGuard {
    fn new(index: usize, tx: mpsc::UnboundedSender<(usize, WorkerItem)>) -> Self {
        Self {
            index,
            tx,
            fired: false,
        }
    }

    fn fire(&mut self) {
        if !self.fired {
            self.fired = true;
            let _ = self.tx.send((self.index, WorkerItem::Done));
        }
    }
}

impl Drop for SentinelGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

enum DriveOutcome {
    Terminal(ToolResult<Vec<Content>>),
    /// The handler stream ended without a terminal result.
    StreamExhausted,
    /// The scheduler dropped the receiving side mid-invocation.
    ConsumerGone,
}

/// Wraps one invocation: span, timing, handler delegation, event relay,
/// uniform result shaping. Returns the invocation's terminal value; the
/// scheduler collects it at the slot matching the request's submission
/// position.
pub(crate) async fn run_worker(ctx: WorkerContext) -> ToolResult<InvocationResult> {
    let span = ctx.telemetry.start_span(&ctx.request);
    let mut guard = SentinelGuard::new(ctx.index, ctx.tx.clone());
    let mut record = ExecutionRecord::start(&ctx.request.name);

    let outcome = drive(&ctx).instrument(span.clone()).await;

    let terminal = match outcome {
        DriveOutcome::Terminal(terminal) => terminal,
        DriveOutcome::ConsumerGone => {
            guard.fire();
            return Err(ToolError::ExecutionError(format!(
                "event stream for tool '{}' closed before completion",
                ctx.request.name
            )));
        }
        DriveOutcome::StreamExhausted => {
            guard.fire();
            panic!(
                "tool stream for '{}' (request {}) ended without a terminal result",
                ctx.request.name, ctx.request.id
            );
        }
    };

    let success = terminal.is_ok();
    let (result, failure) = match terminal {
        Ok(content) => (InvocationResult::success(&ctx.request.id, content), None),
        Err(err) => (
            InvocationResult::error(&ctx.request.id, err.to_string()),
            Some(err),
        ),
    };

    if failure.is_none() || ctx.failure_policy == FailurePolicy::Downgrade {
        let _ = relay(&ctx, ExecutionEvent::Result(result.clone())).await;
    }
    guard.fire();

    let duration = record.finish(success);
    ctx.telemetry
        .record_usage(&ctx.request, duration, success, &ctx.request.name);
    ctx.telemetry.end_span(&span, &result);
    debug!(
        tool = %record.tool_name,
        started_at = %record.started_at,
        duration_ms = duration.as_millis() as u64,
        success,
        "tool invocation finished"
    );

    match (failure, ctx.failure_policy) {
        (Some(err), FailurePolicy::Propagate) => Err(err),
        _ => Ok(result),
    }
}

/// Pulls events off the handler stream and relays them. After each pushed
/// event the worker blocks until the consumer acknowledges it, so it is
/// never more than one event ahead.
async fn drive(ctx: &WorkerContext) -> DriveOutcome {
    let mut stream = ctx.handler.stream(&ctx.request);

    loop {
        let next = match ctx.tool_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    return DriveOutcome::Terminal(Err(ToolError::Timeout(format!(
                        "tool '{}' produced no output within {}ms",
                        ctx.request.name,
                        limit.as_millis()
                    ))));
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(ToolStreamItem::Notification(notification)) => {
                let event = ExecutionEvent::Notification {
                    request_id: ctx.request.id.clone(),
                    notification,
                };
                if !relay(ctx, event).await {
                    return DriveOutcome::ConsumerGone;
                }
            }
            Some(ToolStreamItem::Result(terminal)) => return DriveOutcome::Terminal(terminal),
            None => return DriveOutcome::StreamExhausted,
        }
    }
}

/// Pushes one event and blocks until the consumer acknowledges it. Returns
/// false if the consumer went away instead.
async fn relay(ctx: &WorkerContext, event: ExecutionEvent) -> bool {
    if ctx.tx.send((ctx.index, WorkerItem::Event(event))).is_err() {
        return false;
    }
    tokio::select! {
        _ = ctx.ack.notified() => true,
        _ = ctx.tx.closed() => false,
    }
}
