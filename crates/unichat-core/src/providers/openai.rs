//! OpenAI-compatible chat completions adapter
//!
//! Serves OpenAI and the vendors that speak its protocol (OpenRouter,
//! DeepSeek, Groq, xAI, Mistral, ...). Reasoning arrives as
//! `reasoning_content` / `reasoning` deltas or inline `<think>` tags.
//! Image-generation models go to `images/generations` instead.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::error::{CompletionError, CompletionResult};
use super::files::{resolve_media, WireMedia};
use super::http;
use super::sequencer::EventSequencer;
use super::sse::{FrameReader, Framing};
use super::think_tags::{emit_segments, ThinkTagSplitter};
use super::tool_names::ToolNameMap;
use super::traits::{AdapterContext, CompletionRequest, ProviderAdapter};
use crate::content::NormalizedMessage;
use crate::types::{AbortHandle, GeneratedImage, MessageRole, ProviderFamily, ToolCall, Usage};

const PROVIDER: &str = "openai";

/// Adapter for OpenAI-compatible backends
pub struct OpenAiAdapter {
    ctx: AdapterContext,
}

impl OpenAiAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    async fn build_body(
        &self,
        request: &CompletionRequest,
        names: &ToolNameMap,
        abort: &AbortHandle,
    ) -> CompletionResult<Value> {
        let mut messages = Vec::new();
        if let Some(system) = &request.turn.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for message in request.turn.messages() {
            messages.push(self.wire_message(message, request, names, abort).await?);
        }

        let mut body = json!({
            "model": request.model.model_name(),
            "messages": messages,
            "stream": request.stream,
        });
        if request.stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.offers_tools() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": names.wire_name(&tool.name),
                            "description": tool.description,
                            "parameters": tool.parameters(),
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!(request.tool_choice.as_str());
        }
        Ok(body)
    }

    async fn wire_message(
        &self,
        message: &NormalizedMessage,
        request: &CompletionRequest,
        names: &ToolNameMap,
        abort: &AbortHandle,
    ) -> CompletionResult<Value> {
        match message.role {
            MessageRole::Tool => Ok(json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.text,
            })),
            MessageRole::Assistant => {
                let mut wire = json!({ "role": "assistant", "content": message.text });
                if !message.tool_calls.is_empty() {
                    let calls: Vec<Value> = message
                        .tool_calls
                        .iter()
                        .map(|record| {
                            json!({
                                "id": record.call.id,
                                "type": "function",
                                "function": {
                                    "name": names.wire_name(&record.call.name),
                                    "arguments": record.call.input.to_string(),
                                }
                            })
                        })
                        .collect();
                    wire["tool_calls"] = json!(calls);
                    if message.text.is_empty() {
                        wire["content"] = Value::Null;
                    }
                }
                Ok(wire)
            }
            MessageRole::User | MessageRole::System => {
                if !message.has_media() {
                    return Ok(json!({ "role": message.role.to_string(), "content": message.text }));
                }
                let mut parts = vec![json!({ "type": "text", "text": message.text })];
                for image in &message.images {
                    if let Some(media) = resolve_media(&self.ctx, image, &request.model, abort).await? {
                        parts.push(json!({ "type": "image_url", "image_url": { "url": media_url(&media) } }));
                    }
                }
                for file in &message.files {
                    match resolve_media(&self.ctx, file, &request.model, abort).await? {
                        Some(WireMedia::Inline { data, mime, name }) => {
                            parts.push(json!({
                                "type": "file",
                                "file": {
                                    "filename": name.unwrap_or_else(|| "file".into()),
                                    "file_data": format!("data:{};base64,{}", mime, data),
                                }
                            }));
                        }
                        Some(WireMedia::Uploaded(uploaded)) => {
                            parts.push(json!({ "type": "file", "file": { "file_id": uploaded.uri } }));
                        }
                        None => {}
                    }
                }
                Ok(json!({ "role": message.role.to_string(), "content": parts }))
            }
        }
    }

    fn post(&self, request: &CompletionRequest, path: &str) -> CompletionResult<reqwest::RequestBuilder> {
        let url = format!("{}/{}", request.model.api_base(), path);
        let mut builder = self.ctx.http.post(url);
        if let Some(key) = request.api_key()? {
            builder = builder.bearer_auth(key);
        }
        Ok(builder)
    }

    async fn stream(
        &self,
        response: reqwest::Response,
        names: &ToolNameMap,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let mut reader = FrameReader::from_response(response, Framing::Sse);
        let mut think = ThinkTagSplitter::new();
        let mut tools = ToolCallAccumulator::default();

        while let Some(frame) = reader.next_frame(abort).await? {
            let chunk: ChatChunk = serde_json::from_str(&frame.data)?;
            if let Some(error) = chunk.error {
                return Err(stream_error(&error));
            }
            if let Some(usage) = chunk.usage {
                events.usage(usage.into());
            }
            for choice in chunk.choices {
                if let Some(delta) = choice.delta {
                    if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
                        events.thinking_delta(&reasoning)?;
                    }
                    if let Some(content) = delta.content {
                        emit_segments(events, think.push(&content))?;
                    }
                    for call in delta.tool_calls.unwrap_or_default() {
                        tools.push(call);
                    }
                }
                if choice.finish_reason.is_some() {
                    emit_segments(events, think.flush())?;
                    tools.flush(names, events, &self.ctx)?;
                }
            }
        }

        emit_segments(events, think.flush())?;
        tools.flush(names, events, &self.ctx)?;
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
        let parsed: ChatResponse = serde_json::from_value(body)?;
        events.response_created()?;

        if let Some(usage) = parsed.usage {
            events.usage(usage.into());
        }
        let message = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .ok_or_else(|| CompletionError::protocol("response has no choices"))?;

        if let Some(reasoning) = message.reasoning_content.or(message.reasoning) {
            events.thinking_delta(&reasoning)?;
        }
        if let Some(content) = message.content {
            let mut think = ThinkTagSplitter::new();
            emit_segments(events, think.push(&content))?;
            emit_segments(events, think.flush())?;
        }
        for call in message.tool_calls.unwrap_or_default() {
            let input = parse_arguments(&call.function.arguments, &self.ctx);
            events.tool_call(ToolCall::new(call.id, names.declared_name(&call.function.name), input))?;
        }
        events.finish()
    }

    async fn generate_images(
        &self,
        request: &CompletionRequest,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let model = request.model.model_name();
        let mut body = json!({
            "model": model,
            "prompt": request.turn.latest.text,
            "n": 1,
        });
        if model.starts_with("dall-e") {
            body["response_format"] = json!("b64_json");
        }
        self.ctx
            .logger
            .debug(&format!("[OpenAI] Image generation with {}", model));

        let builder = self.post(request, "images/generations")?.json(&body);
        let response = http::send(builder, PROVIDER, abort).await?;
        events.image_created()?;
        let body = http::read_json(response, abort).await?;
        let parsed: ImagesResponse = serde_json::from_value(body)?;

        let images: Vec<GeneratedImage> = parsed
            .data
            .iter()
            .filter_map(|item| item.b64_json.as_deref())
            .map(|b64| GeneratedImage::from_base64(b64, "image/png"))
            .collect();
        if images.is_empty() {
            return Err(CompletionError::protocol("image response carried no base64 data"));
        }
        if let Some(usage) = parsed.usage {
            events.usage(usage.into());
        }
        events.images_complete(images)?;
        events.finish()
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        if request.model.capabilities.image_generation {
            return self.generate_images(request, events, abort).await;
        }

        let names = ToolNameMap::new(&request.tools);
        let body = self.build_body(request, &names, abort).await?;
        self.ctx.logger.debug(&format!(
            "[OpenAI] POST {}/chat/completions model={} stream={}",
            request.model.api_base(),
            request.model.model_name(),
            request.stream
        ));

        let builder = self.post(request, "chat/completions")?.json(&body);
        let response = http::send(builder, PROVIDER, abort).await?;

        if request.stream {
            events.response_created()?;
            self.stream(response, &names, events, abort).await
        } else {
            self.blocking(response, &names, events, abort).await
        }
    }
}

fn media_url(media: &WireMedia) -> String {
    match media {
        WireMedia::Inline { data, mime, .. } => format!("data:{};base64,{}", mime, data),
        WireMedia::Uploaded(uploaded) => uploaded.uri.clone(),
    }
}

fn stream_error(error: &Value) -> CompletionError {
    let status = error.get("code").and_then(Value::as_u64).unwrap_or(500) as u16;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    CompletionError::api(PROVIDER, status, message)
}

/// Parse tool arguments; malformed JSON is passed through as a string
fn parse_arguments(raw: &str, ctx: &AdapterContext) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        ctx.logger
            .warn(&format!("[OpenAI] Tool arguments are not valid JSON: {}", e));
        Value::String(raw.to_string())
    })
}

/// Accumulates streamed tool-call fragments by index
#[derive(Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialToolCall>,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn push(&mut self, delta: ToolCallDelta) {
        let index = delta.index.unwrap_or(self.calls.len());
        let entry = self.calls.entry(index).or_default();
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            entry.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }

    fn flush(
        &mut self,
        names: &ToolNameMap,
        events: &mut EventSequencer,
        ctx: &AdapterContext,
    ) -> CompletionResult<()> {
        for (index, call) in std::mem::take(&mut self.calls) {
            let id = if call.id.is_empty() {
                format!("call_{}", index)
            } else {
                call.id
            };
            let input = parse_arguments(&call.arguments, ctx);
            events.tool_call(ToolCall::new(id, names.declared_name(&call.name), input))?;
        }
        Ok(())
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default, alias = "input_tokens")]
    prompt_tokens: u32,
    #[serde(default, alias = "output_tokens")]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: if u.total_tokens > 0 {
                u.total_tokens
            } else {
                u.prompt_tokens + u.completion_tokens
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageItem>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    #[serde(default)]
    b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MemoryContentResolver, MediaPart, NormalizedTurn};
    use crate::logging::NoOpLogger;
    use crate::types::{ChunkEvent, ModelCapabilities, ModelDescriptor, Tool, ToolCallRecord};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(AdapterContext::new(
            reqwest::Client::new(),
            Arc::new(NoOpLogger::new()),
            Arc::new(MemoryContentResolver::new()),
        ))
    }

    fn request(server: &MockServer, text: &str) -> CompletionRequest {
        let model = ModelDescriptor::new("gpt-4o", ProviderFamily::OpenAi)
            .with_api_base(format!("{}/v1", server.uri()))
            .with_api_key("sk-test")
            .with_capabilities(ModelCapabilities::chat());
        let turn = NormalizedTurn {
            system_prompt: Some("Be brief".into()),
            history: vec![],
            latest: NormalizedMessage::new(MessageRole::User, text),
        };
        CompletionRequest::new(model, turn)
    }

    fn sse(frames: &[Value]) -> String {
        let mut body: String = frames.iter().map(|f| format!("data: {}\n\n", f)).collect();
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChunkEvent>) -> Vec<ChunkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_streaming_text_reasoning_and_usage() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"choices":[{"delta":{"reasoning_content":"a"}}]}),
            json!({"choices":[{"delta":{"reasoning_content":"b"}}]}),
            json!({"choices":[{"delta":{"content":"hel"}}]}),
            json!({"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}),
            json!({"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":2,"total_tokens":7}}),
        ]);
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&request(&server, "hi"), &mut seq, &abort).await.unwrap();

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
                "text_delta",
                "text_complete",
                "usage_reported",
                "block_complete"
            ]
        );
        match events.last().unwrap() {
            ChunkEvent::BlockComplete { text, usage, .. } => {
                assert_eq!(text, "hello");
                assert_eq!(*usage, Some(Usage::new(5, 2)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_streaming_tool_call_fragments() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"tool_1bad_name_","arguments":"{\"q\":"}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"rust\"}"}}]}}]}),
            json!({"choices":[{"delta":{},"finish_reason":"tool_calls"}]}),
        ]);
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"tools":[{"type":"function","function":{"name":"tool_1bad_name_"}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let req = request(&server, "search").with_tools(vec![Tool::new("1bad-name!", "search")]);
        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();

        let call = drain(&mut rx)
            .into_iter()
            .find_map(|e| e.as_tool_call().cloned())
            .unwrap();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, "1bad-name!");
        assert_eq!(call.input, json!({"q": "rust"}));
    }

    #[tokio::test]
    async fn test_inline_think_tags() {
        let server = MockServer::start().await;
        let body = sse(&[
            json!({"choices":[{"delta":{"content":"<think>pon"}}]}),
            json!({"choices":[{"delta":{"content":"der</think>answer"}}]}),
        ]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&request(&server, "q"), &mut seq, &abort).await.unwrap();

        let outcome = seq.outcome();
        assert_eq!(outcome.reasoning, "ponder");
        assert_eq!(outcome.text, "answer");
    }

    #[tokio::test]
    async fn test_blocking_mode_synthesizes_sequence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "full answer", "reasoning_content": "why"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
            })))
            .mount(&server)
            .await;

        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        let req = request(&server, "q").with_stream(false);
        adapter().complete(&req, &mut seq, &abort).await.unwrap();

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "response_created",
                "thinking_delta",
                "thinking_complete",
                "text_delta",
                "text_complete",
                "usage_reported",
                "block_complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
            .mount(&server)
            .await;

        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        let err = adapter().complete(&request(&server, "q"), &mut seq, &abort).await.unwrap_err();
        assert_eq!(err, CompletionError::api("openai", 401, "bad key"));
        assert!(!seq.delivered());
    }

    #[tokio::test]
    async fn test_message_mapping_with_tool_history_and_image() {
        let server = MockServer::start().await;
        let call = ToolCall::new("c9", "lookup", json!({"id": 1}));
        let mut assistant = NormalizedMessage::new(MessageRole::Assistant, "");
        assistant.tool_calls = vec![ToolCallRecord::new(call)];
        let mut tool = NormalizedMessage::new(MessageRole::Tool, "found");
        tool.tool_call_id = Some("c9".into());
        let mut latest = NormalizedMessage::new(MessageRole::User, "and this?");
        latest.images.push(MediaPart::inline("QUJD", "image/png"));

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": null, "tool_calls": [{"id": "c9", "function": {"name": "lookup"}}]},
                {"role": "tool", "tool_call_id": "c9", "content": "found"},
                {"role": "user", "content": [
                    {"type": "text", "text": "and this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,QUJD"}}
                ]}
            ]})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&[]), "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(&server, "");
        req.turn = NormalizedTurn {
            system_prompt: Some("Be brief".into()),
            history: vec![NormalizedMessage::new(MessageRole::User, "first"), assistant, tool],
            latest,
        };
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();
        assert!(seq.is_terminated());
    }

    #[tokio::test]
    async fn test_image_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_partial_json(json!({"model": "dall-e-3", "prompt": "a cat", "response_format": "b64_json"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"b64_json": "QUJD"}]})))
            .mount(&server)
            .await;

        let mut req = request(&server, "a cat");
        req.model = req
            .model
            .with_model("dall-e-3")
            .with_capabilities(ModelCapabilities { image_generation: true, ..Default::default() });

        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["image_created", "image_complete", "block_complete"]);
        assert_eq!(seq.outcome().images[0].data, "QUJD");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start().await;
        let mut req = request(&server, "q");
        req.model.api_key = None;
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        let err = adapter().complete(&req, &mut seq, &abort).await.unwrap_err();
        assert_eq!(err, CompletionError::missing_api_key("openai"));
    }
}
