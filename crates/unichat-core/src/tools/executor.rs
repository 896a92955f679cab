//! Tool executor capability

use async_trait::async_trait;
use serde_json::Value;

use super::registry::ToolInfo;
use crate::providers::CompletionResult;

/// Output of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Text payload handed back to the model
    pub content: String,
    /// The tool ran but reported a failure
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Something that can list and run tools (an MCP server, local functions)
///
/// An `Err` means the call could not be made at all; a tool that ran and
/// failed returns `Ok` with `is_error` set.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Label recorded as `ToolInfo::source`
    fn source(&self) -> &str;

    /// Discover available tools
    async fn list_tools(&self) -> CompletionResult<Vec<ToolInfo>>;

    /// Invoke a tool by its declared name
    async fn call_tool(&self, name: &str, arguments: Value) -> CompletionResult<ToolOutput>;
}
