//! Provider adapter trait definition

use async_trait::async_trait;
use std::sync::Arc;

use super::error::{CompletionError, CompletionResult};
use super::files::FileService;
use super::sequencer::EventSequencer;
use crate::content::{ContentResolver, NormalizedTurn};
use crate::logging::Logger;
use crate::types::{AbortHandle, ModelDescriptor, ProviderFamily, Tool, ToolChoice};

/// Everything an adapter needs for one backend call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Resolved model, credential included
    pub model: ModelDescriptor,
    /// Normalized conversation
    pub turn: NormalizedTurn,
    /// Tools offered to the model
    pub tools: Vec<Tool>,
    pub tool_choice: ToolChoice,
    /// Temperature for response generation (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stream the response (false = one blocking response)
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a streaming request without tools
    pub fn new(model: ModelDescriptor, turn: NormalizedTurn) -> Self {
        Self {
            model,
            turn,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: None,
            max_tokens: None,
            stream: true,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Credential, required unless the family runs without one
    pub fn api_key(&self) -> CompletionResult<Option<&str>> {
        match self.model.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Ok(Some(key)),
            None if self.model.provider.requires_api_key() => {
                Err(CompletionError::missing_api_key(self.model.provider.as_str()))
            }
            None => Ok(None),
        }
    }

    /// Whether tools should be declared on the wire
    pub fn offers_tools(&self) -> bool {
        !self.tools.is_empty() && self.tool_choice != ToolChoice::None
    }
}

/// Shared collaborators handed to every adapter
#[derive(Clone)]
pub struct AdapterContext {
    pub http: reqwest::Client,
    pub logger: Arc<dyn Logger>,
    /// Reads files that must be uploaded or inlined late
    pub content: Arc<dyn ContentResolver>,
    /// Out-of-band upload service; adapters fall back to inlining without it
    pub files: Option<Arc<dyn FileService>>,
}

impl AdapterContext {
    pub fn new(http: reqwest::Client, logger: Arc<dyn Logger>, content: Arc<dyn ContentResolver>) -> Self {
        Self {
            http,
            logger,
            content,
            files: None,
        }
    }

    pub fn with_file_service(mut self, files: Arc<dyn FileService>) -> Self {
        self.files = Some(files);
        self
    }
}

/// Adapter for one backend family
///
/// Each family (OpenAI-compatible, Anthropic, Gemini, ...) implements this
/// trait. `complete` maps the request to the wire format, performs the call
/// and reports decoded events through the sequencer. It returns `Ok` once the
/// sequencer reached `BlockComplete`; on error the caller emits the terminal
/// `Error` event.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Backend family served by this adapter
    fn family(&self) -> ProviderFamily;

    /// Perform one completion call
    async fn complete(
        &self,
        request: &CompletionRequest,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()>;
}
