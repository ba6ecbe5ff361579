use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::Content;

/// One request to execute a named tool, as issued in a single model turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Success,
    Error,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Success => "success",
            InvocationStatus::Error => "error",
        }
    }
}

/// Terminal record of one invocation. Produced exactly once per request,
/// either by the tool handler or synthesized by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvocationResult {
    pub id: String,
    pub status: InvocationStatus,
    pub content: Vec<Content>,
}

impl InvocationResult {
    pub fn success(id: impl Into<String>, content: Vec<Content>) -> Self {
        Self {
            id: id.into(),
            status: InvocationStatus::Success,
            content,
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: InvocationStatus::Error,
            content: vec![Content::text(message)],
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == InvocationStatus::Error
    }
}

/// Intermediate message emitted by a tool while it runs. Opaque to the
/// engine, relayed to the caller in emission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolNotification {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl ToolNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Per-invocation bookkeeping, consumed by telemetry once the worker
/// finishes and discarded with it.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub duration: Option<Duration>,
    pub success: bool,
}

impl ExecutionRecord {
    pub fn start(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            duration: None,
            success: false,
        }
    }

    pub fn finish(&mut self, success: bool) -> Duration {
        let duration = self.started.elapsed();
        self.duration = Some(duration);
        self.success = success;
        duration
    }
}
