//! Ollama native chat adapter (`/api/chat`, NDJSON stream)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::{CompletionError, CompletionResult};
use super::files::{resolve_media, WireMedia};
use super::http;
use super::sequencer::EventSequencer;
use super::sse::{FrameReader, Framing};
use super::think_tags::{emit_segments, ThinkTagSplitter};
use super::tool_names::ToolNameMap;
use super::traits::{AdapterContext, CompletionRequest, ProviderAdapter};
use crate::content::NormalizedMessage;
use crate::types::{AbortHandle, MessageRole, ProviderFamily, ToolCall, Usage};

const PROVIDER: &str = "ollama";

/// Adapter for a local Ollama server
pub struct OllamaAdapter {
    ctx: AdapterContext,
}

impl OllamaAdapter {
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
        if request.model.capabilities.reasoning {
            body["think"] = json!(true);
        }

        let mut options = json!({});
        if let Some(temperature) = request.temperature {
            options["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }
        if options.as_object().is_some_and(|o| !o.is_empty()) {
            body["options"] = options;
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
        let mut wire = json!({ "role": message.role.to_string(), "content": message.text });
        match message.role {
            MessageRole::Assistant if !message.tool_calls.is_empty() => {
                let calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|record| {
                        json!({
                            "function": {
                                "name": names.wire_name(&record.call.name),
                                "arguments": record.call.input,
                            }
                        })
                    })
                    .collect();
                wire["tool_calls"] = json!(calls);
            }
            MessageRole::User => {
                let mut images = Vec::new();
                for image in &message.images {
                    match resolve_media(&self.ctx, image, &request.model, abort).await? {
                        Some(WireMedia::Inline { data, .. }) => images.push(data),
                        Some(WireMedia::Uploaded(_)) | None => {}
                    }
                }
                if !message.files.is_empty() {
                    self.ctx.logger.info(&format!(
                        "[Ollama] Skipping {} binary attachment(s)",
                        message.files.len()
                    ));
                }
                if !images.is_empty() {
                    wire["images"] = json!(images);
                }
            }
            _ => {}
        }
        Ok(wire)
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Ollama
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let names = ToolNameMap::new(&request.tools);
        let body = self.build_body(request, &names, abort).await?;
        let url = format!("{}/api/chat", request.model.api_base());
        self.ctx.logger.debug(&format!(
            "[Ollama] POST {} model={} stream={}",
            url,
            request.model.model_name(),
            request.stream
        ));

        let mut builder = self.ctx.http.post(url).json(&body);
        if let Some(key) = request.api_key()? {
            builder = builder.bearer_auth(key);
        }
        let response = http::send(builder, PROVIDER, abort).await?;

        let mut think = ThinkTagSplitter::new();
        let mut calls = 0usize;
        if request.stream {
            events.response_created()?;
            let mut reader = FrameReader::from_response(response, Framing::Ndjson);
            while let Some(frame) = reader.next_frame(abort).await? {
                let chunk: ChatChunk = serde_json::from_str(&frame.data)?;
                let done = chunk.done;
                apply_chunk(chunk, &names, &mut think, &mut calls, events)?;
                if done {
                    break;
                }
            }
        } else {
            let body = http::read_json(response, abort).await?;
            let chunk: ChatChunk = serde_json::from_value(body)?;
            events.response_created()?;
            apply_chunk(chunk, &names, &mut think, &mut calls, events)?;
        }

        emit_segments(events, think.flush())?;
        events.finish()
    }
}

fn apply_chunk(
    chunk: ChatChunk,
    names: &ToolNameMap,
    think: &mut ThinkTagSplitter,
    calls: &mut usize,
    events: &mut EventSequencer,
) -> CompletionResult<()> {
    if let Some(error) = chunk.error {
        return Err(CompletionError::api(PROVIDER, 500, error));
    }
    if let Some(message) = chunk.message {
        if let Some(thinking) = message.thinking {
            events.thinking_delta(&thinking)?;
        }
        if let Some(content) = message.content {
            emit_segments(events, think.push(&content))?;
        }
        for call in message.tool_calls.unwrap_or_default() {
            *calls += 1;
            let id = format!("call_{}", calls);
            let input = match call.function.arguments {
                Value::Null => json!({}),
                other => other,
            };
            events.tool_call(ToolCall::new(id, names.declared_name(&call.function.name), input))?;
        }
    }
    if chunk.done {
        events.usage(Usage::new(chunk.prompt_eval_count, chunk.eval_count));
    }
    Ok(())
}

// Wire types

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MediaPart, MemoryContentResolver, NormalizedTurn};
    use crate::logging::NoOpLogger;
    use crate::types::{ModelCapabilities, ModelDescriptor, Tool};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter() -> OllamaAdapter {
        OllamaAdapter::new(AdapterContext::new(
            reqwest::Client::new(),
            Arc::new(NoOpLogger::new()),
            Arc::new(MemoryContentResolver::new()),
        ))
    }

    fn request(server: &MockServer) -> CompletionRequest {
        let model = ModelDescriptor::new("qwen3", ProviderFamily::Ollama)
            .with_api_base(server.uri())
            .with_capabilities(ModelCapabilities::chat());
        let mut latest = NormalizedMessage::new(MessageRole::User, "look");
        latest.images.push(MediaPart::inline("iVBO", "image/png"));
        let turn = NormalizedTurn {
            system_prompt: None,
            history: vec![],
            latest,
        };
        CompletionRequest::new(model, turn)
    }

    fn ndjson(lines: &[Value]) -> String {
        lines.iter().map(|l| format!("{}\n", l)).collect()
    }

    #[tokio::test]
    async fn test_ndjson_stream_with_think_tags_and_tools() {
        let server = MockServer::start().await;
        let body = ndjson(&[
            json!({"message":{"role":"assistant","content":"<think>plan"},"done":false}),
            json!({"message":{"role":"assistant","content":"</think>Sure"},"done":false}),
            json!({"message":{"role":"assistant","content":"","tool_calls":[
                {"function":{"name":"get_weather","arguments":{"city":"Oslo"}}}
            ]},"done":false}),
            json!({"message":{"role":"assistant","content":""},"done":true,"prompt_eval_count":7,"eval_count":9}),
        ]);
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "qwen3",
                "messages": [{"role": "user", "content": "look", "images": ["iVBO"]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let req = request(&server).with_tools(vec![Tool::new("get_weather", "weather")]);
        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(
            names,
            vec![
                "response_created",
                "thinking_delta",
                "thinking_complete",
                "text_delta",
                "tool_call_requested",
                "text_complete",
                "usage_reported",
                "block_complete"
            ]
        );
        let outcome = seq.outcome();
        assert_eq!(outcome.reasoning, "plan");
        assert_eq!(outcome.text, "Sure");
        assert_eq!(outcome.tool_calls[0].input, json!({"city": "Oslo"}));
        assert_eq!(outcome.usage, Some(Usage::new(7, 9)));
    }

    #[tokio::test]
    async fn test_native_thinking_field() {
        let server = MockServer::start().await;
        let body = ndjson(&[
            json!({"message":{"role":"assistant","content":"","thinking":"hmm"},"done":false}),
            json!({"message":{"role":"assistant","content":"ok"},"done":true}),
        ]);
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"think": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let mut req = request(&server);
        req.model.capabilities.reasoning = true;
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        adapter().complete(&req, &mut seq, &abort).await.unwrap();
        assert_eq!(seq.outcome().reasoning, "hmm");
        assert_eq!(seq.outcome().text, "ok");
    }

    #[tokio::test]
    async fn test_error_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                ndjson(&[json!({"error": "model 'qwen3' not found"})]),
                "application/x-ndjson",
            ))
            .mount(&server)
            .await;

        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        let err = adapter().complete(&request(&server), &mut seq, &abort).await.unwrap_err();
        assert!(matches!(err, CompletionError::Api { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_chunk_without_message_is_accepted() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"done":true,"eval_count":3}"#).unwrap();
        assert!(chunk.done);
        assert!(chunk.message.is_none());
    }
}
