//! In-process tool executor backed by closures

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::executor::{ToolExecutor, ToolOutput};
use super::registry::ToolInfo;
use crate::providers::{CompletionError, CompletionResult};
use crate::types::Tool;

type Handler = Arc<dyn Fn(Value) -> Result<String, String> + Send + Sync>;

/// Executor for tools implemented in the host process
///
/// A handler returning `Err(message)` produces an error result for the
/// model, not a failed call.
#[derive(Default, Clone)]
pub struct LocalToolExecutor {
    tools: Vec<(Tool, Handler)>,
}

impl LocalToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool<F>(mut self, tool: Tool, handler: F) -> Self
    where
        F: Fn(Value) -> Result<String, String> + Send + Sync + 'static,
    {
        self.tools.push((tool, Arc::new(handler)));
        self
    }
}

#[async_trait]
impl ToolExecutor for LocalToolExecutor {
    fn source(&self) -> &str {
        "local"
    }

    async fn list_tools(&self) -> CompletionResult<Vec<ToolInfo>> {
        Ok(self
            .tools
            .iter()
            .map(|(tool, _)| ToolInfo::new(tool.name.clone(), tool.description.clone(), tool.parameters()))
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CompletionResult<ToolOutput> {
        let (_, handler) = self
            .tools
            .iter()
            .find(|(tool, _)| tool.name == name)
            .ok_or_else(|| CompletionError::ToolExecution {
                tool: name.to_string(),
                message: "not registered".into(),
            })?;
        Ok(match handler(arguments) {
            Ok(content) => ToolOutput::text(content),
            Err(message) => ToolOutput::error(message),
        })
    }
}
