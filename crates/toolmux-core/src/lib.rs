//! Core data model for the toolmux execution engine.
//!
//! Everything here is scoped to one batch of tool invocations: requests as
//! issued by a model turn, the content and results tools produce, and the
//! typed error taxonomy shared by handlers and the engine.

pub mod content;
pub mod error;
pub mod invocation;

pub use content::Content;
pub use error::{ToolError, ToolResult};
pub use invocation::{
    ExecutionRecord, InvocationResult, InvocationStatus, ToolNotification, ToolRequest,
};
