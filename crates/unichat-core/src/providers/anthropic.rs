//! Anthropic Messages API adapter
//!
//! Native SSE events (`message_start`, `content_block_*`, `message_delta`,
//! `message_stop`) are decoded into canonical events. Extended thinking is
//! requested for models flagged with the reasoning capability.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::{CompletionError, CompletionResult};
use super::files::{resolve_media, WireMedia};
use super::http;
use super::sequencer::EventSequencer;
use super::sse::{FrameReader, Framing};
use super::tool_names::ToolNameMap;
use super::traits::{AdapterContext, CompletionRequest, ProviderAdapter};
use crate::content::NormalizedMessage;
use crate::types::{AbortHandle, MessageRole, ProviderFamily, ToolCall, ToolChoice, Usage};

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const MIN_THINKING_BUDGET: u32 = 1024;

/// Adapter for the Anthropic Messages API
pub struct AnthropicAdapter {
    ctx: AdapterContext,
}

impl AnthropicAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    async fn build_body(
        &self,
        request: &CompletionRequest,
        names: &ToolNameMap,
        abort: &AbortHandle,
    ) -> CompletionResult<Value> {
        let mut messages: Vec<(String, Vec<Value>)> = Vec::new();
        for message in request.turn.messages() {
            let (role, blocks) = self.wire_message(message, request, names, abort).await?;
            if blocks.is_empty() {
                continue;
            }
            // consecutive same-role messages merge (tool results, then user text)
            match messages.last_mut() {
                Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
                _ => messages.push((role, blocks)),
            }
        }
        let messages: Vec<Value> = messages
            .into_iter()
            .map(|(role, content)| json!({ "role": role, "content": content }))
            .collect();

        let mut max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let mut body = json!({
            "model": request.model.model_name(),
            "messages": messages,
            "stream": request.stream,
        });
        if let Some(system) = &request.turn.system_prompt {
            body["system"] = json!(system);
        }

        if request.model.capabilities.reasoning {
            let budget = (max_tokens / 2).max(MIN_THINKING_BUDGET);
            max_tokens = max_tokens.max(budget + MIN_THINKING_BUDGET);
            body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
        } else if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body["max_tokens"] = json!(max_tokens);

        if request.offers_tools() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": names.wire_name(&tool.name),
                        "description": tool.description,
                        "input_schema": tool.parameters(),
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = match request.tool_choice {
                ToolChoice::Required => json!({ "type": "any" }),
                _ => json!({ "type": "auto" }),
            };
        }
        Ok(body)
    }

    async fn wire_message(
        &self,
        message: &NormalizedMessage,
        request: &CompletionRequest,
        names: &ToolNameMap,
        abort: &AbortHandle,
    ) -> CompletionResult<(String, Vec<Value>)> {
        let mut blocks = Vec::new();
        match message.role {
            MessageRole::Tool => {
                blocks.push(json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.text,
                    "is_error": message.is_error,
                }));
                Ok(("user".to_string(), blocks))
            }
            MessageRole::Assistant => {
                // extended thinking must be replayed ahead of the tool use it led to
                if request.model.capabilities.reasoning && !message.tool_calls.is_empty() {
                    for block in &message.reasoning {
                        if let Some(signature) = &block.signature {
                            blocks.push(json!({
                                "type": "thinking",
                                "thinking": block.text,
                                "signature": signature,
                            }));
                        }
                    }
                }
                if !message.text.is_empty() {
                    blocks.push(json!({ "type": "text", "text": message.text }));
                }
                for record in &message.tool_calls {
                    let input = if record.call.input.is_object() {
                        record.call.input.clone()
                    } else {
                        json!({})
                    };
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": record.call.id,
                        "name": names.wire_name(&record.call.name),
                        "input": input,
                    }));
                }
                Ok(("assistant".to_string(), blocks))
            }
            MessageRole::User | MessageRole::System => {
                for image in &message.images {
                    match resolve_media(&self.ctx, image, &request.model, abort).await? {
                        Some(WireMedia::Inline { data, mime, .. }) => blocks.push(json!({
                            "type": "image",
                            "source": { "type": "base64", "media_type": mime, "data": data }
                        })),
                        Some(WireMedia::Uploaded(uploaded)) => blocks.push(json!({
                            "type": "image",
                            "source": { "type": "url", "url": uploaded.uri }
                        })),
                        None => {}
                    }
                }
                for file in &message.files {
                    if file.mime() != "application/pdf" {
                        self.ctx.logger.info(&format!(
                            "[Anthropic] Skipping unsupported attachment type {}",
                            file.mime()
                        ));
                        continue;
                    }
                    match resolve_media(&self.ctx, file, &request.model, abort).await? {
                        Some(WireMedia::Inline { data, mime, .. }) => blocks.push(json!({
                            "type": "document",
                            "source": { "type": "base64", "media_type": mime, "data": data }
                        })),
                        Some(WireMedia::Uploaded(uploaded)) => blocks.push(json!({
                            "type": "document",
                            "source": { "type": "url", "url": uploaded.uri }
                        })),
                        None => {}
                    }
                }
                if !message.text.is_empty() || blocks.is_empty() {
                    blocks.push(json!({ "type": "text", "text": message.text }));
                }
                Ok(("user".to_string(), blocks))
            }
        }
    }

    async fn stream(
        &self,
        response: reqwest::Response,
        names: &ToolNameMap,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let mut reader = FrameReader::from_response(response, Framing::Sse);
        let mut block: Option<OpenBlock> = None;

        while let Some(frame) = reader.next_frame(abort).await? {
            let event: StreamEvent = serde_json::from_str(&frame.data)?;
            match event {
                StreamEvent::MessageStart { message } => {
                    if let Some(usage) = message.usage {
                        events.usage(usage.into());
                    }
                }
                StreamEvent::ContentBlockStart { content_block, .. } => {
                    block = match content_block {
                        BlockStart::ToolUse { id, name } => Some(OpenBlock::Tool {
                            id,
                            name,
                            input: String::new(),
                        }),
                        BlockStart::Thinking => Some(OpenBlock::Thinking),
                        BlockStart::Text { text } => {
                            events.text_delta(&text)?;
                            Some(OpenBlock::Text)
                        }
                        BlockStart::Other => None,
                    };
                }
                StreamEvent::ContentBlockDelta { delta, .. } => match delta {
                    BlockDelta::TextDelta { text } => events.text_delta(&text)?,
                    BlockDelta::ThinkingDelta { thinking } => events.thinking_delta(&thinking)?,
                    BlockDelta::SignatureDelta { signature } => events.thinking_signature(&signature),
                    BlockDelta::InputJsonDelta { partial_json } => {
                        if let Some(OpenBlock::Tool { input, .. }) = block.as_mut() {
                            input.push_str(&partial_json);
                        }
                    }
                    BlockDelta::Other => {}
                },
                StreamEvent::ContentBlockStop { .. } => match block.take() {
                    Some(OpenBlock::Tool { id, name, input }) => {
                        let input = if input.trim().is_empty() {
                            json!({})
                        } else {
                            serde_json::from_str(&input)?
                        };
                        events.tool_call(ToolCall::new(id, names.declared_name(&name), input))?;
                    }
                    Some(OpenBlock::Thinking) => events.thinking_complete()?,
                    _ => {}
                },
                StreamEvent::MessageDelta { usage } => {
                    if let Some(usage) = usage {
                        events.usage(usage.into());
                    }
                }
                StreamEvent::MessageStop => break,
                StreamEvent::Error { error } => return Err(error.into_completion_error()),
                StreamEvent::Ping | StreamEvent::Unknown => {}
            }
        }

        events.finish()
    }

    async fn blocking(
        &self,
        response: reqwest::Response,
        names: &ToolNameMap,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let body = http::read_json(response, abort).await?;
        let parsed: MessageResponse = serde_json::from_value(body)?;
        events.response_created()?;
        if let Some(usage) = parsed.usage {
            events.usage(usage.into());
        }
        for block in parsed.content {
            match block {
                ResponseBlock::Text { text } => events.text_delta(&text)?,
                ResponseBlock::Thinking { thinking, signature } => {
                    events.thinking_delta(&thinking)?;
                    if let Some(signature) = signature {
                        events.thinking_signature(&signature);
                    }
                    events.thinking_complete()?;
                }
                ResponseBlock::ToolUse { id, name, input } => {
                    events.tool_call(ToolCall::new(id, names.declared_name(&name), input))?
                }
                ResponseBlock::Other => {}
            }
        }
        events.finish()
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Anthropic
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let key = request
            .api_key()?
            .ok_or_else(|| CompletionError::missing_api_key(PROVIDER))?;
        let names = ToolNameMap::new(&request.tools);
        let body = self.build_body(request, &names, abort).await?;
        let url = format!("{}/messages", request.model.api_base());
        self.ctx.logger.debug(&format!(
            "[Anthropic] POST {} model={} stream={}",
            url,
            request.model.model_name(),
            request.stream
        ));

        let builder = self
            .ctx
            .http
            .post(url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response = http::send(builder, PROVIDER, abort).await?;

        if request.stream {
            events.response_created()?;
            self.stream(response, &names, events, abort).await
        } else {
            self.blocking(response, &names, events, abort).await
        }
    }
}

enum OpenBlock {
    Text,
    Thinking,
    Tool { id: String, name: String, input: String },
}

// Wire types

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        #[allow(dead_code)]
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        #[allow(dead_code)]
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        #[allow(dead_code)]
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking,
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    error_type: String,
    message: String,
}

impl ApiError {
    fn into_completion_error(self) -> CompletionError {
        let status = match self.error_type.as_str() {
            "overloaded_error" => 529,
            "rate_limit_error" => 429,
            "invalid_request_error" => 400,
            "authentication_error" => 401,
            _ => 500,
        };
        CompletionError::api(PROVIDER, status, self.message)
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MemoryContentResolver, MediaPart, NormalizedTurn};
    use crate::logging::NoOpLogger;
    use crate::types::{
        ChunkEvent, ModelCapabilities, ModelDescriptor, ReasoningBlock, Tool, ToolCallRecord,
    };
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(AdapterContext::new(
            reqwest::Client::new(),
            Arc::new(NoOpLogger::new()),
            Arc::new(MemoryContentResolver::new()),
        ))
    }

    fn request(server: &MockServer) -> CompletionRequest {
        let model = ModelDescriptor::new("claude-sonnet-4", ProviderFamily::Anthropic)
            .with_api_base(format!("{}/v1", server.uri()))
            .with_api_key("ak-test")
            .with_capabilities(ModelCapabilities::chat());
        let turn = NormalizedTurn {
            system_prompt: Some("You are terse".into()),
            history: vec![],
            latest: NormalizedMessage::new(MessageRole::User, "hi"),
        };
        CompletionRequest::new(model, turn)
    }

    fn sse(events: &[Value]) -> String {
        events
            .iter()
            .map(|e| format!("event: {}\ndata: {}\n\n", e["type"].as_str().unwrap_or(""), e))
            .collect()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChunkEvent>) -> Vec<ChunkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_streaming_thinking_text_and_tool() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"type":"message_start","message":{"usage":{"input_tokens":12,"output_tokens":1}}}),
            json!({"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}),
            json!({"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"a"}}),
            json!({"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"b"}}),
            json!({"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"sig"}}),
            json!({"type":"content_block_stop","index":0}),
            json!({"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}),
            json!({"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"hello"}}),
            json!({"type":"content_block_stop","index":1}),
            json!({"type":"content_block_start","index":2,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather","input":{}}}),
            json!({"type":"content_block_delta","index":2,"delta":{"type":"input_json_delta","partial_json":"{\"city\":"}}),
            json!({"type":"content_block_delta","index":2,"delta":{"type":"input_json_delta","partial_json":"\"Oslo\"}"}}),
            json!({"type":"content_block_stop","index":2}),
            json!({"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":30}}),
            json!({"type":"message_stop"}),
        ]);
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({"system": "You are terse", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let req = request(&server).with_tools(vec![Tool::new("get_weather", "weather")]);
        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();

        let events = drain(&mut rx);
        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "response_created",
                "thinking_delta",
                "thinking_delta",
                "thinking_complete",
                "text_delta",
                "tool_call_requested",
                "text_complete",
                "usage_reported",
                "block_complete"
            ]
        );
        let call = events.iter().find_map(|e| e.as_tool_call()).unwrap();
        assert_eq!(call.input, json!({"city": "Oslo"}));
        assert_eq!(
            seq.outcome().reasoning_blocks,
            vec![ReasoningBlock::new("ab").with_signature("sig")]
        );
        assert_eq!(seq.outcome().usage, Some(Usage::new(12, 30)));
    }

    #[tokio::test]
    async fn test_stream_error_event() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"type":"message_start","message":{}}),
            json!({"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}),
        ]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        let err = adapter().complete(&request(&server), &mut seq, &abort).await.unwrap_err();
        assert_eq!(err, CompletionError::api("anthropic", 529, "Overloaded"));
        assert!(seq.delivered());
    }

    #[tokio::test]
    async fn test_tool_history_and_image_mapping() {
        let server = MockServer::start().await;
        let mut assistant = NormalizedMessage::new(MessageRole::Assistant, "Checking.");
        assistant.tool_calls = vec![ToolCallRecord::new(ToolCall::new("t1", "get_weather", json!({"city": "Oslo"})))];
        let mut result = NormalizedMessage::new(MessageRole::Tool, "Error: offline");
        result.tool_call_id = Some("t1".into());
        result.is_error = true;
        let mut latest = NormalizedMessage::new(MessageRole::User, "What now?");
        latest.images.push(MediaPart::inline("QUJD", "image/jpeg"));

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"messages": [
                {"role": "user", "content": [{"type": "text", "text": "weather?"}]},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "t1", "name": "get_weather", "input": {"city": "Oslo"}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": "Error: offline", "is_error": true},
                    {"type": "image", "source": {"type": "base64", "media_type": "image/jpeg", "data": "QUJD"}},
                    {"type": "text", "text": "What now?"}
                ]}
            ]})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&[json!({"type":"message_stop"})]), "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(&server);
        req.turn.history = vec![NormalizedMessage::new(MessageRole::User, "weather?"), assistant, result];
        req.turn.latest = latest;
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();
    }

    #[tokio::test]
    async fn test_reasoning_models_request_thinking() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "thinking": {"type": "enabled", "budget_tokens": 4096},
                "max_tokens": 8192
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "thinking", "thinking": "hmm", "signature": "s"},
                    {"type": "text", "text": "Done."}
                ],
                "usage": {"input_tokens": 3, "output_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(&server).with_stream(false);
        req.model.capabilities.reasoning = true;
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();

        let outcome = seq.outcome();
        assert_eq!(outcome.reasoning, "hmm");
        assert_eq!(outcome.text, "Done.");
        assert_eq!(outcome.usage, Some(Usage::new(3, 4)));
    }

    #[tokio::test]
    async fn test_signed_thinking_replayed_on_tool_continuation() {
        let server = MockServer::start().await;
        let mut assistant = NormalizedMessage::new(MessageRole::Assistant, "");
        assistant.reasoning = vec![
            ReasoningBlock::new("need the weather").with_signature("sig-1"),
            ReasoningBlock::new("unsigned"),
        ];
        assistant.tool_calls = vec![ToolCallRecord::new(ToolCall::new("t1", "get_weather", json!({})))];
        let mut latest = NormalizedMessage::new(MessageRole::Tool, "Error: no data for that city");
        latest.tool_call_id = Some("t1".into());

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"messages": [
                {"role": "user", "content": [{"type": "text", "text": "weather?"}]},
                {"role": "assistant", "content": [
                    {"type": "thinking", "thinking": "need the weather", "signature": "sig-1"},
                    {"type": "tool_use", "id": "t1", "name": "get_weather", "input": {}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "t1", "content": "Error: no data for that city", "is_error": false}
                ]}
            ]})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&[json!({"type":"message_stop"})]), "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(&server).with_tools(vec![Tool::new("get_weather", "weather")]);
        req.model.capabilities.reasoning = true;
        req.turn.history = vec![NormalizedMessage::new(MessageRole::User, "weather?"), assistant];
        req.turn.latest = latest;
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();
    }
}
