use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use toolmux_core::{InvocationResult, ToolRequest};

/// Sentinel a rejected request is renamed to so downstream bookkeeping can
/// still correlate it without ever dispatching it.
pub const INVALID_TOOL_NAME: &str = "INVALID_TOOL_NAME";

pub const MAX_TOOL_NAME_LEN: usize = 64;

static TOOL_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Requests cleared for execution, in submission order.
    pub valid: Vec<ToolRequest>,
    /// Rejected requests, renamed to the sentinel, in submission order.
    pub rejected: Vec<ToolRequest>,
    /// Synthesized error results for the rejected requests, in submission
    /// order.
    pub error_results: Vec<InvocationResult>,
    pub invalid_ids: Vec<String>,
}

/// Splits a batch into executable and rejected requests. Malformed input is
/// always represented as data; this never fails and one bad entry cannot
/// abort the batch.
pub fn validate_requests(requests: Vec<ToolRequest>) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for mut request in requests {
        match check_tool_name(&request.name) {
            Ok(()) => outcome.valid.push(request),
            Err(reason) => {
                warn!(id = %request.id, "rejected tool request: {reason}");
                outcome
                    .error_results
                    .push(InvocationResult::error(&request.id, &reason));
                outcome.invalid_ids.push(request.id.clone());
                request.name = INVALID_TOOL_NAME.to_string();
                outcome.rejected.push(request);
            }
        }
    }

    outcome
}

fn check_tool_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("tool name is missing".to_string());
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(format!(
            "tool name exceeds {MAX_TOOL_NAME_LEN} characters ({} provided)",
            name.len()
        ));
    }
    if !TOOL_NAME_RE.is_match(name) {
        return Err(format!(
            "tool name '{name}' had invalid characters, it must match [A-Za-z0-9_-]+"
        ));
    }
    Ok(())
}
