//! Conversation turn input types

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolResult};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Result of a tool call, fed back to the model
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// One message of the conversation as the caller stores it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    /// Caller-side identifier
    #[serde(default)]
    pub id: String,
    pub role: MessageRole,
    /// Text stored either flat or block-indexed
    pub content: MessageContent,
    /// Image and file attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Tool calls this (assistant) message issued, with their results
    #[serde(default, rename = "toolCalls", skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// For `Tool` messages: the call being answered
    #[serde(default, rename = "toolCallId", skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `Tool` messages: the payload reports a failure
    #[serde(default, rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Signed reasoning an assistant message produced alongside its tool calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning: Vec<ReasoningBlock>,
}

impl TurnMessage {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role,
            content: MessageContent::Text(text.into()),
            attachments: vec![],
            tool_calls: vec![],
            tool_call_id: None,
            is_error: false,
            reasoning: vec![],
        }
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Create a message with block-indexed content
    pub fn with_blocks(role: MessageRole, blocks: Vec<ContentBlock>) -> Self {
        Self {
            content: MessageContent::Blocks(blocks),
            ..Self::new(role, String::new())
        }
    }

    /// Create a tool-result message answering `call_id`
    pub fn tool_result(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(MessageRole::Tool, payload)
        }
    }

    /// Create a tool message from an executed call's result
    pub fn from_tool_result(result: &ToolResult) -> Self {
        Self {
            is_error: result.is_error,
            ..Self::tool_result(result.call_id.clone(), result.content.clone())
        }
    }

    /// Set the caller-side id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add an attachment
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Record tool calls issued by this message
    pub fn with_tool_calls(mut self, calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Attach the reasoning blocks that preceded this message's tool calls
    pub fn with_reasoning(mut self, reasoning: Vec<ReasoningBlock>) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Main text of the message, regardless of storage shape
    ///
    /// Thinking blocks are not part of the main text.
    pub fn main_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.kind == BlockKind::MainText)
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Message content - flat text or indexed blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

/// Kind of a stored content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    MainText,
    Thinking,
    Citation,
    Error,
}

/// One indexed block of message content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
}

impl ContentBlock {
    pub fn main_text(text: impl Into<String>) -> Self {
        Self { kind: BlockKind::MainText, text: text.into() }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self { kind: BlockKind::Thinking, text: text.into() }
    }
}

/// Image or file attached to a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    /// Image payload
    Image { source: ImageSource },
    /// Document or other file
    File { file: FileRef },
}

impl Attachment {
    /// Inline base64 image (a `data:` URI prefix is accepted)
    pub fn inline_image(data: impl Into<String>, mime: impl Into<String>) -> Self {
        Attachment::Image {
            source: ImageSource::Inline { data: data.into(), mime: mime.into() },
        }
    }

    /// Symbolic `[image:<id>]` reference resolved through the blob store
    pub fn image_ref(reference: impl Into<String>) -> Self {
        Attachment::Image {
            source: ImageSource::Reference { reference: reference.into() },
        }
    }

    /// File stored in the file store
    pub fn file(file: FileRef) -> Self {
        Attachment::File { file }
    }
}

/// Where an image comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Inline { data: String, mime: String },
    Reference { reference: String },
}

/// Reference to a file held by the file store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// File-store id
    pub id: String,
    /// Original file name
    pub name: String,
    /// Mime type
    pub mime: String,
    /// Size in bytes
    pub size: u64,
}

impl FileRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime: mime.into(),
            size,
        }
    }

    /// File extension, lowercased
    pub fn extension(&self) -> Option<String> {
        self.name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
    }
}

/// A completed thinking span with the backend's signature
///
/// Backends that verify their own reasoning (Anthropic extended thinking)
/// need it replayed verbatim in front of the tool calls it led to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ReasoningBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), signature: None }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

/// A prior tool call and (once known) its result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call: ToolCall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

impl ToolCallRecord {
    pub fn new(call: ToolCall) -> Self {
        Self { call, result: None }
    }

    pub fn with_result(mut self, result: ToolResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// Ordered conversation handed to one turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnInput {
    pub messages: Vec<TurnMessage>,
}

impl TurnInput {
    pub fn new(messages: Vec<TurnMessage>) -> Self {
        Self { messages }
    }

    /// Append a message
    pub fn push(&mut self, message: TurnMessage) {
        self.messages.push(message);
    }
}
