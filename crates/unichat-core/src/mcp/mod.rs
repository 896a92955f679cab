//! MCP (Model Context Protocol) client module
//!
//! Uses the official rmcp SDK to connect to tool servers over a Unix socket
//! or streamable HTTP. [`McpClient`] implements
//! [`ToolExecutor`](crate::tools::ToolExecutor), so it plugs straight into a
//! [`ToolRegistry`](crate::tools::ToolRegistry).
//!
//! # Example
//!
//! ```rust,ignore
//! use unichat_core::mcp::McpClient;
//! use unichat_core::tools::ToolRegistry;
//! use std::sync::Arc;
//!
//! let client = McpClient::connect_http("http://127.0.0.1:8931/mcp", logger.clone()).await?;
//! let registry = ToolRegistry::with_executor(Arc::new(client), logger);
//! registry.refresh().await?;
//! ```

mod client;

pub use client::{tool_info_from_mcp, tool_output_from_mcp, McpClient, McpError, McpResult};

// Re-export rmcp types that consumers might need
pub use rmcp::model::{Tool as McpTool, CallToolResult as McpToolResult};
