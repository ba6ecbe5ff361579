use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::debug;

use toolmux_core::{InvocationResult, ToolNotification, ToolRequest};

use crate::config::ExecutorConfig;
use crate::handler::ToolHandler;
use crate::telemetry::{NoopTelemetry, Telemetry};
use crate::validation::validate_requests;
use crate::worker::{run_worker, WorkerContext, WorkerItem};

/// One item of the merged batch stream.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Notification {
        request_id: String,
        notification: ToolNotification,
    },
    /// An invocation's terminal result, also collected into the results
    /// list once the stream closes.
    Result(InvocationResult),
}

/// Runs one batch of tool invocations concurrently and multiplexes their
/// events into a single ordered, backpressured stream.
pub struct ToolExecutor {
    handler: Arc<dyn ToolHandler>,
    telemetry: Arc<dyn Telemetry>,
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            handler,
            telemetry: Arc::new(NoopTelemetry),
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the batch, spawns one worker per valid request, and returns
    /// the merged event stream. Once the stream is drained, `invalid_ids`
    /// holds the ids of rejected requests and `results` holds one result per
    /// submitted request, in submission order.
    ///
    /// Workers push `(worker_index, item)` pairs onto one shared channel and
    /// block on their own `Notify` until the consumer acknowledges each
    /// event, so no worker is ever more than one event ahead and no worker
    /// is blocked by a sibling's pace.
    pub fn execute(
        &self,
        requests: Vec<ToolRequest>,
        invalid_ids: Arc<Mutex<Vec<String>>>,
        results: Arc<Mutex<Vec<InvocationResult>>>,
    ) -> BoxStream<'static, Result<ExecutionEvent>> {
        let handler = Arc::clone(&self.handler);
        let telemetry = Arc::clone(&self.telemetry);
        let config = self.config.clone();

        try_stream! {
            let submitted: Vec<String> = requests.iter().map(|r| r.id.clone()).collect();
            let outcome = validate_requests(requests);
            if !outcome.invalid_ids.is_empty() {
                invalid_ids
                    .lock()
                    .await
                    .extend(outcome.invalid_ids.iter().cloned());
            }
            let rejected: HashSet<String> = outcome.invalid_ids.into_iter().collect();

            let (tx, mut rx) = mpsc::unbounded_channel();
            let mut acks = Vec::with_capacity(outcome.valid.len());
            let mut handles = Vec::with_capacity(outcome.valid.len());
            for (index, request) in outcome.valid.into_iter().enumerate() {
                let ack = Arc::new(Notify::new());
                acks.push(Arc::clone(&ack));
                handles.push(tokio::spawn(run_worker(WorkerContext {
                    index,
                    request,
                    handler: Arc::clone(&handler),
                    telemetry: Arc::clone(&telemetry),
                    tx: tx.clone(),
                    ack,
                    tool_timeout: config.tool_timeout,
                    failure_policy: config.failure_policy,
                })));
            }
            drop(tx);
            debug!(
                workers = handles.len(),
                rejected = rejected.len(),
                "dispatching tool batch"
            );

            let mut remaining = handles.len();
            let mut cancelled = false;
            while remaining > 0 {
                let next = match config.cancellation_token.as_ref() {
                    Some(token) => tokio::select! {
                        _ = token.cancelled() => {
                            cancelled = true;
                            break;
                        }
                        next = rx.recv() => next,
                    },
                    None => rx.recv().await,
                };
                match next {
                    Some((index, WorkerItem::Event(event))) => {
                        yield event;
                        acks[index].notify_one();
                    }
                    Some((_, WorkerItem::Done)) => remaining -= 1,
                    None => {
                        Err(anyhow!(
                            "tool event channel closed with {remaining} workers outstanding"
                        ))?;
                    }
                }
            }

            if cancelled {
                debug!("tool batch cancelled, aborting in-flight workers");
                for handle in &handles {
                    handle.abort();
                }
            } else {
                let mut batch_error = None;
                let mut completed = Vec::with_capacity(handles.len());
                for handle in handles {
                    match handle.await.context("tool worker task failed")? {
                        Ok(result) => completed.push(Some(result)),
                        Err(err) => {
                            if batch_error.is_none() {
                                batch_error = Some(err);
                            }
                            completed.push(None);
                        }
                    }
                }

                // Merge synthesized and worker results back into submission
                // order; both sequences are already ordered within their class.
                let mut synthesized = outcome.error_results.into_iter();
                let mut finished = completed.into_iter();
                let mut ordered = Vec::with_capacity(submitted.len());
                for id in &submitted {
                    if rejected.contains(id) {
                        if let Some(result) = synthesized.next() {
                            ordered.push(result);
                        }
                    } else if let Some(result) = finished.next().flatten() {
                        ordered.push(result);
                    }
                }
                results.lock().await.extend(ordered);

                if let Some(err) = batch_error {
                    Err(anyhow::Error::new(err).context("tool invocation failed"))?;
                }
            }
        }
        .boxed()
    }
}

/// Reference entry point: default configuration, no telemetry.
pub fn execute_tools(
    handler: Arc<dyn ToolHandler>,
    requests: Vec<ToolRequest>,
    invalid_ids: Arc<Mutex<Vec<String>>>,
    results: Arc<Mutex<Vec<InvocationResult>>>,
) -> BoxStream<'static, Result<ExecutionEvent>> {
    ToolExecutor::new(handler).execute(requests, invalid_ids, results)
}
