//! LLM provider adapters
//!
//! This module contains the adapter abstraction and one implementation per
//! backend family.
//!
//! ## Architecture
//!
//! Every adapter maps a `NormalizedTurn` to its vendor's wire format,
//! performs the call and decodes native stream frames into canonical
//! `ChunkEvent`s through the shared `EventSequencer`:
//!
//! - `openai`: chat completions (OpenAI and compatible vendors), image generation
//! - `anthropic`: Messages API
//! - `gemini`: generateContent, Files API uploads, grounding
//! - `ollama`: native `/api/chat` NDJSON
//! - `mock`: scripted responses for tests
//!
//! Framing (SSE / NDJSON), HTTP error mapping, tool-name sanitizing and
//! inline `<think>` extraction are shared helpers.

mod anthropic;
mod error;
mod files;
mod gemini;
mod http;
mod mock;
mod ollama;
mod openai;
mod sequencer;
mod sse;
mod think_tags;
mod tool_names;
mod traits;

// Core traits and types
pub use error::{CompletionError, CompletionResult};
pub use sequencer::{aborted_error, EventSequencer};
pub use traits::{AdapterContext, CompletionRequest, ProviderAdapter};

// Adapters
pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use mock::{MockAdapter, MockStep};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

// Shared helpers
pub use files::{FileService, GeminiFileService, UploadedFile};
pub use http::build_client;
pub use sse::{Frame, FrameReader, Framing};
pub use think_tags::{Segment, ThinkTagSplitter};
pub use tool_names::{sanitize_tool_name, ToolNameMap, MAX_TOOL_NAME_LEN};

use crate::types::ProviderFamily;
use std::sync::Arc;

/// Create the adapter for a provider family
pub fn create_adapter(family: ProviderFamily, ctx: AdapterContext) -> Arc<dyn ProviderAdapter> {
    match family {
        ProviderFamily::OpenAi => Arc::new(OpenAiAdapter::new(ctx)),
        ProviderFamily::Anthropic => Arc::new(AnthropicAdapter::new(ctx)),
        ProviderFamily::Gemini => Arc::new(GeminiAdapter::new(ctx)),
        ProviderFamily::Ollama => Arc::new(OllamaAdapter::new(ctx)),
        ProviderFamily::Mock => Arc::new(MockAdapter::echo(ctx.logger)),
    }
}

/// List all supported provider ids
///
/// Vendor names resolve to the OpenAI-compatible family.
pub fn supported_providers() -> Vec<&'static str> {
    vec![
        // Native families
        "openai",
        "anthropic",
        "gemini",
        "ollama",
        // OpenAI-compatible vendors
        "openrouter",
        "deepseek",
        "groq",
        "xai",
        "mistral",
        "together",
        "fireworks",
        "azure",
        // Testing
        "mock",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryContentResolver;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_create_adapter_matches_family() {
        let ctx = AdapterContext::new(
            reqwest::Client::new(),
            Arc::new(NoOpLogger::new()),
            Arc::new(MemoryContentResolver::new()),
        );
        for family in ProviderFamily::all() {
            assert_eq!(create_adapter(family, ctx.clone()).family(), family);
        }
    }

    #[test]
    fn test_supported_providers_parse() {
        for id in supported_providers() {
            assert!(ProviderFamily::from_vendor(id).is_some(), "{} should parse", id);
        }
    }
}
