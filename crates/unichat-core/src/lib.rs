//! unichat Core
//!
//! One streaming, cancelable chat-completion interface over heterogeneous
//! LLM backends (OpenAI-compatible, Anthropic, Gemini, Ollama).
//!
//! A turn flows through:
//! - `content`: normalizes the conversation (history window, images, files,
//!   prior tool calls)
//! - `providers`: one adapter per backend family decoding its wire format
//!   into canonical [`ChunkEvent`]s through a shared sequencer
//! - `orchestrator`: resolves the model, retries the connection phase, owns
//!   the abort handle and forwards events to the caller
//! - `tools`: tool declarations, execution and the round-trip loop
//!
//! ```rust,ignore
//! use unichat_core::{Orchestrator, StaticModelRegistry, TurnInput, TurnMessage, TurnOptions};
//!
//! let registry = Arc::new(StaticModelRegistry::from_config(&[config]).await);
//! let orchestrator = Orchestrator::new(registry, logger);
//!
//! let mut handle = orchestrator.run(
//!     TurnInput::new(vec![TurnMessage::user("Hello")]),
//!     "gpt-4o",
//!     TurnOptions::new().on_update(|text, _| print!("\r{}", text)),
//! );
//! let outcome = handle.wait().await?;
//! ```

pub mod config;
pub mod content;
pub mod credentials;
pub mod logging;
pub mod mcp;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use types::{
    AbortHandle, AbortReason, Attachment, ChunkEvent, ErrorKind, FileRef, MessageRole,
    ModelCapabilities, ModelDescriptor, ProviderFamily, Tool, ToolCall, ToolChoice, ToolResult,
    TurnInput, TurnMessage, TurnOutcome, Usage,
};

pub use providers::{
    create_adapter, AdapterContext, CompletionError, CompletionRequest, CompletionResult,
    EventSequencer, MockAdapter, MockStep, ProviderAdapter,
};

pub use orchestrator::{Orchestrator, RetryPolicy, StreamHandle, TurnOptions};

pub use content::{ContentResolver, DirContentResolver, MemoryContentResolver, MessageNormalizer};

pub use registry::{ModelRegistry, StaticModelRegistry};

pub use credentials::{
    ChainCredentialStore, CredentialStore, EnvCredentialStore, MemoryCredentialStore,
};

pub use config::{
    CompletionSettings, ConfigProvider, FileConfigProvider, MemoryConfigProvider,
};

pub use logging::{ConsoleLogger, Logger, MemoryLogger, NoOpLogger};

pub use tools::{LocalToolExecutor, ToolCoordinator, ToolExecutor, ToolFilter, ToolInfo, ToolRegistry};

// MCP client using official rmcp SDK
pub use mcp::{McpClient, McpError, McpResult, McpTool, McpToolResult};
