//! Core types for chat completion turns
//!
//! This module contains all the shared types used across the pipeline.

mod message;
mod model;
mod tool;
mod stream;
mod cancellation;

pub use message::{
    Attachment, BlockKind, ContentBlock, FileRef, ImageSource, MessageContent, MessageRole,
    ReasoningBlock, ToolCallRecord, TurnInput, TurnMessage,
};
pub use model::{vendor_api_base, ModelCapabilities, ModelDescriptor, ProviderFamily};
pub use tool::{Tool, ToolCall, ToolChoice, ToolResult};
pub use stream::{
    split_data_uri, ChunkEvent, ErrorKind, GeneratedImage, Metrics, TurnOutcome, Usage,
    WebSearchResult,
};
pub use cancellation::{AbortHandle, AbortReason};
