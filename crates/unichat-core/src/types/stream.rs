//! Canonical streaming event vocabulary
//!
//! Every adapter, whatever its wire format, reports progress as a sequence of
//! [`ChunkEvent`]s. Exactly one terminal event (`BlockComplete` or `Error`)
//! closes a turn.

use serde::{Deserialize, Serialize};

use super::message::ReasoningBlock;
use super::tool::ToolCall;

/// Token accounting for one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Fold a later native report into this one
    ///
    /// Backends report cumulative counts, sometimes split across chunks
    /// (prompt first, completion last), so non-zero values win.
    pub fn merge(&mut self, other: Usage) {
        if other.prompt_tokens > 0 {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens > 0 {
            self.completion_tokens = other.completion_tokens;
        }
        self.total_tokens = if other.total_tokens > 0 {
            other.total_tokens.max(self.prompt_tokens + self.completion_tokens)
        } else {
            self.prompt_tokens + self.completion_tokens
        };
    }

    /// Sum of two blocks (tool round-trips)
    pub fn add(&self, other: &Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}

/// Latency figures for one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Time from request start to the first content token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_token_ms: Option<u64>,
    /// Time from request start to block completion
    pub completion_ms: u64,
}

/// Generated image, base64 without a data-URI prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub mime: String,
    pub data: String,
}

impl GeneratedImage {
    /// Build from base64 that may or may not carry a `data:` prefix
    pub fn from_base64(data: &str, fallback_mime: &str) -> Self {
        match split_data_uri(data) {
            Some((mime, payload)) => Self {
                mime: mime.to_string(),
                data: payload.to_string(),
            },
            None => Self {
                mime: fallback_mime.to_string(),
                data: data.trim().to_string(),
            },
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }
}

/// Split `data:<mime>;base64,<payload>` into its parts
pub fn split_data_uri(value: &str) -> Option<(&str, &str)> {
    let rest = value.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64").unwrap_or(header);
    Some((mime, payload))
}

/// One web search hit reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Classification carried by terminal `Error` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Api,
    Protocol,
    Aborted,
    ToolExecution,
    LoopGuardExceeded,
    Configuration,
}

/// Canonical streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkEvent {
    /// Backend accepted the request
    ResponseCreated,
    TextDelta { text: String },
    /// Full text of the block, emitted once before `BlockComplete`
    TextComplete { text: String },
    ThinkingDelta { text: String },
    /// Closes a thinking span
    ThinkingComplete {
        text: String,
        #[serde(rename = "elapsedMs")]
        elapsed_ms: u64,
    },
    ToolCallRequested {
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
    ToolCallResult {
        #[serde(rename = "callId")]
        call_id: String,
        payload: String,
        #[serde(rename = "isError", default)]
        is_error: bool,
    },
    ImageCreated,
    ImageComplete { images: Vec<GeneratedImage> },
    WebSearchComplete { results: Vec<WebSearchResult> },
    UsageReported { usage: Usage },
    /// Terminal success
    BlockComplete {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        metrics: Metrics,
    },
    /// Terminal failure, carrying whatever was already streamed
    Error {
        kind: ErrorKind,
        message: String,
        #[serde(rename = "partialText", default)]
        partial_text: String,
        #[serde(rename = "partialReasoning", default)]
        partial_reasoning: String,
    },
}

impl ChunkEvent {
    pub fn text_delta(text: impl Into<String>) -> Self {
        ChunkEvent::TextDelta { text: text.into() }
    }

    pub fn thinking_delta(text: impl Into<String>) -> Self {
        ChunkEvent::ThinkingDelta { text: text.into() }
    }

    /// `BlockComplete` or `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChunkEvent::BlockComplete { .. } | ChunkEvent::Error { .. })
    }

    /// Text or thinking delta
    pub fn is_delta(&self) -> bool {
        matches!(self, ChunkEvent::TextDelta { .. } | ChunkEvent::ThinkingDelta { .. })
    }

    /// Get the text if this is a text delta
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            ChunkEvent::TextDelta { text } => Some(text),
            _ => None,
        }
    }

    /// Get the tool call if this is a tool-call request
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            ChunkEvent::ToolCallRequested { tool_call } => Some(tool_call),
            _ => None,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ChunkEvent::ResponseCreated => "response_created",
            ChunkEvent::TextDelta { .. } => "text_delta",
            ChunkEvent::TextComplete { .. } => "text_complete",
            ChunkEvent::ThinkingDelta { .. } => "thinking_delta",
            ChunkEvent::ThinkingComplete { .. } => "thinking_complete",
            ChunkEvent::ToolCallRequested { .. } => "tool_call_requested",
            ChunkEvent::ToolCallResult { .. } => "tool_call_result",
            ChunkEvent::ImageCreated => "image_created",
            ChunkEvent::ImageComplete { .. } => "image_complete",
            ChunkEvent::WebSearchComplete { .. } => "web_search_complete",
            ChunkEvent::UsageReported { .. } => "usage_reported",
            ChunkEvent::BlockComplete { .. } => "block_complete",
            ChunkEvent::Error { .. } => "error",
        }
    }
}

/// Aggregated result of one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Id of the model that served the turn
    pub model: String,
    pub text: String,
    pub reasoning: String,
    /// Completed thinking spans of the final round, with signatures
    #[serde(default, rename = "reasoningBlocks", skip_serializing_if = "Vec::is_empty")]
    pub reasoning_blocks: Vec<ReasoningBlock>,
    #[serde(default, rename = "toolCalls")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub images: Vec<GeneratedImage>,
    #[serde(default, rename = "webResults")]
    pub web_results: Vec<WebSearchResult>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub metrics: Metrics,
}
