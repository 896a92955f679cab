//! MCP Client using the official rmcp SDK
//!
//! Connects to MCP servers over Unix socket or HTTP and exposes their tools
//! through the [`ToolExecutor`] capability.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        RawContent, Tool,
    },
    service::RunningService,
    RoleClient,
};
use serde_json::Value;
use thiserror::Error;

#[cfg(unix)]
use tokio::net::UnixStream;

use crate::logging::Logger;
use crate::providers::{CompletionError, CompletionResult};
use crate::tools::{ToolExecutor, ToolInfo, ToolOutput};

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type McpResult<T> = Result<T, McpError>;

/// MCP client for tool servers
pub struct McpClient {
    client: RunningService<RoleClient, ClientInfo>,
    logger: Arc<dyn Logger>,
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "unichat-core".to_string(),
            title: Some("unichat".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

impl McpClient {
    /// Connect to an MCP server over a Unix socket
    #[cfg(unix)]
    pub async fn connect_unix<P: AsRef<Path>>(
        socket_path: P,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        let path = socket_path.as_ref();
        logger.info(&format!("[McpClient] Connecting to Unix socket: {:?}", path));

        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let client = client_info()
            .serve(stream)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");
        Ok(Self { client, logger })
    }

    /// Connect to an MCP server over HTTP (Streamable HTTP transport)
    pub async fn connect_http(url: &str, logger: Arc<dyn Logger>) -> McpResult<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        logger.info(&format!("[McpClient] Connecting to HTTP: {}", url));

        let transport = StreamableHttpClientTransport::from_uri(url);
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");
        Ok(Self { client, logger })
    }

    /// List the server's tools as rmcp declarations
    pub async fn list_mcp_tools(&self) -> McpResult<Vec<Tool>> {
        let result = self
            .client
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger
            .info(&format!("[McpClient] Listed {} tools", result.tools.len()));
        Ok(result.tools)
    }

    /// Call a tool by name, returning the raw rmcp result
    pub async fn call_mcp_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        self.logger.info(&format!("[McpClient] Calling tool: {}", name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        self.client
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }

    /// Get server info
    pub fn server_info(&self) -> Option<&Implementation> {
        self.client.peer_info().map(|info| &info.server_info)
    }

    /// Close the connection
    pub async fn close(self) -> McpResult<()> {
        self.logger.info("[McpClient] Closing connection");
        self.client
            .cancel()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(())
    }
}

/// Convert an rmcp declaration
pub fn tool_info_from_mcp(tool: &Tool) -> ToolInfo {
    // input_schema is Arc<JsonObject>
    let schema = Value::Object(tool.input_schema.as_ref().clone());
    ToolInfo::new(
        tool.name.to_string(),
        tool.description.as_deref().unwrap_or_default(),
        schema,
    )
}

/// Join the text parts of a tool result
pub fn tool_output_from_mcp(result: &CallToolResult) -> ToolOutput {
    let text = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    ToolOutput {
        content: text,
        is_error: result.is_error.unwrap_or(false),
    }
}

#[async_trait]
impl ToolExecutor for McpClient {
    fn source(&self) -> &str {
        "mcp"
    }

    async fn list_tools(&self) -> CompletionResult<Vec<ToolInfo>> {
        let tools = self
            .list_mcp_tools()
            .await
            .map_err(|e| CompletionError::Other(e.to_string()))?;
        Ok(tools.iter().map(tool_info_from_mcp).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CompletionResult<ToolOutput> {
        let result = self
            .call_mcp_tool(name, arguments)
            .await
            .map_err(|e| CompletionError::ToolExecution {
                tool: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(tool_output_from_mcp(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_info_from_mcp() {
        let schema = json!({"type": "object", "properties": {"path": {"type": "string"}}});
        let Value::Object(map) = schema.clone() else {
            unreachable!()
        };
        let tool = Tool::new("unichat_config_get", "Read config", Arc::new(map));

        let info = tool_info_from_mcp(&tool);
        assert_eq!(info.name, "unichat_config_get");
        assert_eq!(info.description, "Read config");
        assert_eq!(info.input_schema, schema);
        assert!(info.internal);
    }

    #[test]
    fn test_tool_output_joins_text() {
        let result = CallToolResult::error(vec![
            rmcp::model::Content::text("line one"),
            rmcp::model::Content::text("line two"),
        ]);
        let output = tool_output_from_mcp(&result);
        assert_eq!(output.content, "line one\nline two");
        assert!(output.is_error);
    }
}
