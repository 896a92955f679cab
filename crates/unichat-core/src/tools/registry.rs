//! Tool registry for managing LLM tool calling
//!
//! The ToolRegistry is the central component for:
//! - Discovering available tools from executors
//! - Filtering tools based on user preferences
//! - Handing declarations to adapters
//! - Executing tool calls and shaping their results

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::executor::ToolExecutor;
use crate::logging::Logger;
use crate::providers::{CompletionError, CompletionResult};
use crate::types::{Tool, ToolCall, ToolResult};

/// Prefix of tools reserved for the host (never offered to models)
pub const INTERNAL_TOOL_PREFIX: &str = "unichat_";

/// Check if a tool name is internal (hidden from LLM)
pub fn is_internal_tool(name: &str) -> bool {
    name.starts_with(INTERNAL_TOOL_PREFIX)
}

/// Information about a tool with its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    /// JSON Schema for tool parameters
    pub input_schema: Value,
    pub enabled: bool,
    /// Executor that provides the tool (e.g. "mcp", "local")
    pub source: String,
    /// Hidden from models
    pub internal: bool,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        let name = name.into();
        Self {
            internal: is_internal_tool(&name),
            name,
            description: description.into(),
            input_schema,
            enabled: true,
            source: String::new(),
        }
    }
}

impl From<&ToolInfo> for Tool {
    fn from(info: &ToolInfo) -> Self {
        Tool::new(info.name.clone(), info.description.clone()).with_schema(info.input_schema.clone())
    }
}

/// Filter for tool discovery
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// If set, only include tools with these names
    pub include: Option<HashSet<String>>,
    /// Exclude tools with these names
    pub exclude: HashSet<String>,
    /// Include internal tools (default: false)
    pub include_internal: bool,
    /// Only include enabled tools (default: true)
    pub only_enabled: bool,
}

impl ToolFilter {
    pub fn new() -> Self {
        Self {
            only_enabled: true,
            ..Default::default()
        }
    }

    /// Include all tools
    pub fn all() -> Self {
        Self {
            include_internal: true,
            only_enabled: false,
            ..Default::default()
        }
    }

    /// Include only specific tools
    pub fn with_include(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.include = Some(names.into_iter().collect());
        self
    }

    /// Exclude specific tools
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude = names.into_iter().collect();
        self
    }

    /// Include internal tools
    pub fn with_internal(mut self) -> Self {
        self.include_internal = true;
        self
    }

    /// Check if a tool matches this filter
    pub fn matches(&self, tool: &ToolInfo) -> bool {
        if !self.include_internal && tool.internal {
            return false;
        }
        if self.only_enabled && !tool.enabled {
            return false;
        }
        if self.exclude.contains(&tool.name) {
            return false;
        }
        match &self.include {
            Some(include) => include.contains(&tool.name),
            None => true,
        }
    }
}

/// Tool registry over one or more executors
pub struct ToolRegistry {
    executors: RwLock<Vec<Arc<dyn ToolExecutor>>>,
    /// Cached tools from last refresh, with the index of their executor
    tools: RwLock<Vec<(ToolInfo, usize)>>,
    /// User-configured enabled/disabled state
    tool_states: RwLock<HashMap<String, bool>>,
    filter: RwLock<ToolFilter>,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            executors: RwLock::new(Vec::new()),
            tools: RwLock::new(Vec::new()),
            tool_states: RwLock::new(HashMap::new()),
            filter: RwLock::new(ToolFilter::new()),
            logger,
        }
    }

    /// Create a registry with one executor
    pub fn with_executor(executor: Arc<dyn ToolExecutor>, logger: Arc<dyn Logger>) -> Self {
        let registry = Self::new(logger);
        registry.add_executor(executor);
        registry
    }

    /// Register another executor; takes effect on the next refresh
    pub fn add_executor(&self, executor: Arc<dyn ToolExecutor>) {
        self.executors.write().push(executor);
    }

    /// Filter applied to the tools offered to models
    pub fn set_filter(&self, filter: ToolFilter) {
        *self.filter.write() = filter;
    }

    /// Refresh the tool list from all executors, returning the tool count
    ///
    /// A failing executor is logged and skipped. On duplicate names the
    /// first executor wins.
    pub async fn refresh(&self) -> CompletionResult<usize> {
        let executors = self.executors.read().clone();
        if executors.is_empty() {
            self.logger
                .warn("[ToolRegistry] No tool executor configured, skipping tool refresh");
        }

        let mut discovered: Vec<(ToolInfo, usize)> = Vec::new();
        for (index, executor) in executors.iter().enumerate() {
            let tools = match executor.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    self.logger.error(&format!(
                        "[ToolRegistry] Failed to fetch tools from {}: {}",
                        executor.source(),
                        e
                    ));
                    continue;
                }
            };
            self.logger.info(&format!(
                "[ToolRegistry] Discovered {} tools from {}",
                tools.len(),
                executor.source()
            ));

            let states = self.tool_states.read();
            for mut info in tools {
                if discovered.iter().any(|(t, _)| t.name == info.name) {
                    self.logger.warn(&format!(
                        "[ToolRegistry] Duplicate tool '{}' from {} ignored",
                        info.name,
                        executor.source()
                    ));
                    continue;
                }
                info.source = executor.source().to_string();
                info.internal = info.internal || is_internal_tool(&info.name);
                if let Some(&enabled) = states.get(&info.name) {
                    info.enabled = enabled;
                }
                discovered.push((info, index));
            }
        }

        let count = discovered.len();
        *self.tools.write() = discovered;
        Ok(count)
    }

    /// Get tools matching a filter
    pub fn get_tools(&self, filter: &ToolFilter) -> Vec<ToolInfo> {
        self.tools
            .read()
            .iter()
            .map(|(info, _)| info)
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    /// Declarations offered to models (configured filter applied)
    pub fn get_llm_tools(&self) -> Vec<Tool> {
        let filter = self.filter.read().clone();
        self.get_tools(&filter).iter().map(Tool::from).collect()
    }

    /// Enable or disable a tool
    pub fn set_tool_enabled(&self, name: &str, enabled: bool) {
        self.tool_states.write().insert(name.to_string(), enabled);
        let mut tools = self.tools.write();
        if let Some((tool, _)) = tools.iter_mut().find(|(t, _)| t.name == name) {
            tool.enabled = enabled;
        }
    }

    /// Execute a tool call from an LLM response
    ///
    /// Never fails: unknown tools, disabled tools and executor errors become
    /// error results (`Error: ...`) handed back to the model.
    pub async fn execute_tool_call(&self, tool_call: &ToolCall) -> ToolResult {
        let target = self
            .tools
            .read()
            .iter()
            .find(|(t, _)| t.name == tool_call.name)
            .map(|(t, index)| (t.enabled, *index));

        let executor = match target {
            None => {
                return ToolResult::error(&tool_call.id, format!("unknown tool '{}'", tool_call.name))
            }
            Some((false, _)) => {
                return ToolResult::error(&tool_call.id, format!("tool '{}' is disabled", tool_call.name))
            }
            Some((true, index)) => self.executors.read().get(index).cloned(),
        };
        let Some(executor) = executor else {
            return ToolResult::error(&tool_call.id, "no tool executor configured");
        };

        self.logger
            .info(&format!("[ToolRegistry] Calling tool: {}", tool_call.name));
        match executor.call_tool(&tool_call.name, tool_call.input.clone()).await {
            Ok(output) if output.is_error => ToolResult::error(&tool_call.id, output.content),
            Ok(output) => ToolResult::success(&tool_call.id, output.content),
            Err(e) => {
                let err = CompletionError::ToolExecution {
                    tool: tool_call.name.clone(),
                    message: e.to_string(),
                };
                self.logger.warn(&format!("[ToolRegistry] {}", err));
                ToolResult::error(&tool_call.id, err)
            }
        }
    }

    /// Execute tool calls in order
    pub async fn execute_tool_calls(&self, tool_calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            results.push(self.execute_tool_call(call).await);
        }
        results
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().len()
    }

    /// Count of tools offered to models
    pub fn enabled_tool_count(&self) -> usize {
        self.get_llm_tools().len()
    }
}
