//! Google Gemini adapter (generateContent API)
//!
//! Streams `streamGenerateContent?alt=sse`. Parts flagged `thought` carry
//! reasoning, `inlineData` parts carry generated images and grounding
//! metadata carries web search results. Large attachments go through the
//! Files API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{CompletionError, CompletionResult};
use super::files::{resolve_media, GeminiFileService, WireMedia};
use super::http;
use super::sequencer::EventSequencer;
use super::sse::{FrameReader, Framing};
use super::tool_names::ToolNameMap;
use super::traits::{AdapterContext, CompletionRequest, ProviderAdapter};
use crate::content::{MediaPart, NormalizedMessage};
use crate::types::{
    AbortHandle, GeneratedImage, MessageRole, ProviderFamily, ToolCall, ToolChoice, Usage,
    WebSearchResult,
};

const PROVIDER: &str = "gemini";

/// Adapter for the Gemini API
pub struct GeminiAdapter {
    ctx: AdapterContext,
}

impl GeminiAdapter {
    /// Uses the Gemini Files API unless the context already names a service
    pub fn new(ctx: AdapterContext) -> Self {
        let ctx = if ctx.files.is_none() {
            let service = GeminiFileService::new(ctx.http.clone(), ctx.logger.clone());
            ctx.with_file_service(Arc::new(service))
        } else {
            ctx
        };
        Self { ctx }
    }

    async fn build_body(
        &self,
        request: &CompletionRequest,
        names: &ToolNameMap,
        abort: &AbortHandle,
    ) -> CompletionResult<Value> {
        // functionResponse parts are keyed by name, not call id
        let mut call_names: HashMap<String, String> = HashMap::new();
        let mut contents: Vec<(&'static str, Vec<Value>)> = Vec::new();

        for message in request.turn.messages() {
            let (role, parts) = match message.role {
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !message.text.is_empty() {
                        parts.push(json!({ "text": message.text }));
                    }
                    for record in &message.tool_calls {
                        let wire = names.wire_name(&record.call.name);
                        call_names.insert(record.call.id.clone(), wire.clone());
                        parts.push(json!({
                            "functionCall": { "name": wire, "args": record.call.input }
                        }));
                    }
                    ("model", parts)
                }
                MessageRole::Tool => {
                    let id = message.tool_call_id.clone().unwrap_or_default();
                    let name = call_names.get(&id).cloned().unwrap_or(id);
                    (
                        "user",
                        vec![json!({
                            "functionResponse": {
                                "name": name,
                                "response": { "content": message.text }
                            }
                        })],
                    )
                }
                MessageRole::User | MessageRole::System => {
                    ("user", self.user_parts(message, request, abort).await?)
                }
            };
            if parts.is_empty() {
                continue;
            }
            match contents.last_mut() {
                Some((last, existing)) if *last == role => existing.extend(parts),
                _ => contents.push((role, parts)),
            }
        }

        let contents: Vec<Value> = contents
            .into_iter()
            .map(|(role, parts)| json!({ "role": role, "parts": parts }))
            .collect();
        let mut body = json!({ "contents": contents });

        if let Some(system) = &request.turn.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let capabilities = &request.model.capabilities;
        if request.offers_tools() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": names.wire_name(&tool.name),
                        "description": tool.description,
                        "parameters": tool.parameters(),
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
            let mode = match request.tool_choice {
                ToolChoice::Required => "ANY",
                _ => "AUTO",
            };
            body["toolConfig"] = json!({ "functionCallingConfig": { "mode": mode } });
        } else if capabilities.web_search {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }

        let mut config = json!({});
        if let Some(temperature) = request.temperature {
            config["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            config["maxOutputTokens"] = json!(max_tokens);
        }
        if capabilities.reasoning {
            config["thinkingConfig"] = json!({ "includeThoughts": true });
        }
        if capabilities.image_generation {
            config["responseModalities"] = json!(["TEXT", "IMAGE"]);
        }
        if config.as_object().is_some_and(|c| !c.is_empty()) {
            body["generationConfig"] = config;
        }
        Ok(body)
    }

    async fn user_parts(
        &self,
        message: &NormalizedMessage,
        request: &CompletionRequest,
        abort: &AbortHandle,
    ) -> CompletionResult<Vec<Value>> {
        let mut parts = Vec::new();
        let media: Vec<&MediaPart> = message.images.iter().chain(message.files.iter()).collect();
        for part in media {
            match resolve_media(&self.ctx, part, &request.model, abort).await? {
                Some(WireMedia::Inline { data, mime, .. }) => {
                    parts.push(json!({ "inlineData": { "mimeType": mime, "data": data } }))
                }
                Some(WireMedia::Uploaded(uploaded)) => parts.push(json!({
                    "fileData": { "mimeType": uploaded.mime, "fileUri": uploaded.uri }
                })),
                None => {}
            }
        }
        if !message.text.is_empty() || parts.is_empty() {
            parts.push(json!({ "text": message.text }));
        }
        Ok(parts)
    }

    fn endpoint(request: &CompletionRequest) -> String {
        let base = request.model.api_base();
        let model = request.model.model_name();
        if request.stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", base, model)
        } else {
            format!("{}/models/{}:generateContent", base, model)
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
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
        let url = Self::endpoint(request);
        self.ctx.logger.debug(&format!(
            "[Gemini] POST model={} stream={}",
            request.model.model_name(),
            request.stream
        ));

        let builder = self
            .ctx
            .http
            .post(url)
            .header("x-goog-api-key", key)
            .json(&body);
        let response = http::send(builder, PROVIDER, abort).await?;

        let mut state = DecodeState::default();
        if request.stream {
            events.response_created()?;
            let mut reader = FrameReader::from_response(response, Framing::Sse);
            while let Some(frame) = reader.next_frame(abort).await? {
                let chunk: GenerateResponse = serde_json::from_str(&frame.data)?;
                state.apply(chunk, &names, events)?;
            }
        } else {
            let body = http::read_json(response, abort).await?;
            let parsed: GenerateResponse = serde_json::from_value(body)?;
            events.response_created()?;
            state.apply(parsed, &names, events)?;
        }
        state.finish(events)
    }
}

/// Cross-chunk decoding state
#[derive(Default)]
struct DecodeState {
    calls: usize,
    images: Vec<GeneratedImage>,
    web: Vec<WebSearchResult>,
}

impl DecodeState {
    fn apply(
        &mut self,
        response: GenerateResponse,
        names: &ToolNameMap,
        events: &mut EventSequencer,
    ) -> CompletionResult<()> {
        if let Some(error) = response.error {
            return Err(CompletionError::api(
                PROVIDER,
                error.code.unwrap_or(500),
                error.message,
            ));
        }
        if let Some(usage) = response.usage_metadata {
            events.usage(usage.into());
        }

        for candidate in response.candidates {
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for part in parts {
                if let Some(text) = part.text {
                    if part.thought {
                        events.thinking_delta(&text)?;
                    } else {
                        events.text_delta(&text)?;
                    }
                }
                if let Some(inline) = part.inline_data {
                    if self.images.is_empty() {
                        events.image_created()?;
                    }
                    let mime = inline.mime_type.unwrap_or_else(|| "image/png".into());
                    self.images.push(GeneratedImage::from_base64(&inline.data, &mime));
                }
                if let Some(call) = part.function_call {
                    self.calls += 1;
                    let id = call
                        .id
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| format!("call_{}", self.calls));
                    let input = call.args.unwrap_or_else(|| json!({}));
                    events.tool_call(ToolCall::new(id, names.declared_name(&call.name), input))?;
                }
            }

            let chunks = candidate
                .grounding_metadata
                .map(|g| g.grounding_chunks)
                .unwrap_or_default();
            for chunk in chunks {
                if let Some(web) = chunk.web {
                    if !self.web.iter().any(|r| r.url == web.uri) {
                        self.web.push(WebSearchResult {
                            title: web.title.unwrap_or_else(|| web.uri.clone()),
                            url: web.uri,
                            snippet: None,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(self, events: &mut EventSequencer) -> CompletionResult<()> {
        events.images_complete(self.images)?;
        events.web_search(self.web)?;
        events.finish()
    }
}

// Wire types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    thoughts_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(u: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count + u.thoughts_token_count,
            total_tokens: u.total_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}
