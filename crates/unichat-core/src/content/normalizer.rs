//! Message content normalizer
//!
//! Turns the caller's conversation into backend-agnostic messages:
//! text always resolved to a string, images and files resolved to inline
//! base64 or upload references, system messages lifted out, and the history
//! window trimmed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use super::mime::{is_text_file, sniff_image_mime};
use super::resolver::ContentResolver;
use crate::logging::Logger;
use crate::providers::{aborted_error, CompletionError, CompletionResult};
use crate::types::{
    split_data_uri, AbortHandle, Attachment, FileRef, ImageSource, MessageRole, ModelDescriptor,
    ReasoningBlock, ToolCallRecord, TurnInput, TurnMessage,
};

/// Files above this size are uploaded out-of-band instead of inlined
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Image or file payload after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPart {
    /// Base64 payload without data-URI prefix
    Inline {
        data: String,
        mime: String,
        name: Option<String>,
    },
    /// Too large to inline; the adapter uploads it
    NeedsUpload { file: FileRef },
}

impl MediaPart {
    pub fn inline(data: impl Into<String>, mime: impl Into<String>) -> Self {
        MediaPart::Inline {
            data: data.into(),
            mime: mime.into(),
            name: None,
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            MediaPart::Inline { mime, .. } => mime,
            MediaPart::NeedsUpload { file } => &file.mime,
        }
    }
}

/// One message in backend-agnostic form
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub role: MessageRole,
    /// Main text; never null, possibly empty
    pub text: String,
    pub images: Vec<MediaPart>,
    pub files: Vec<MediaPart>,
    /// Tool calls issued by an assistant message
    pub tool_calls: Vec<ToolCallRecord>,
    /// Call answered by a tool message
    pub tool_call_id: Option<String>,
    /// The tool message reports a failure
    pub is_error: bool,
    /// Signed reasoning to replay before the tool calls
    pub reasoning: Vec<ReasoningBlock>,
}

impl NormalizedMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            images: Vec::new(),
            files: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
            reasoning: Vec::new(),
        }
    }

    pub fn has_media(&self) -> bool {
        !self.images.is_empty() || !self.files.is_empty()
    }
}

/// Normalized conversation for one request
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTurn {
    /// System messages joined, if any
    pub system_prompt: Option<String>,
    /// Prior messages, oldest first
    pub history: Vec<NormalizedMessage>,
    /// Message being answered
    pub latest: NormalizedMessage,
}

impl NormalizedTurn {
    /// History followed by the latest message
    pub fn messages(&self) -> impl Iterator<Item = &NormalizedMessage> {
        self.history.iter().chain(std::iter::once(&self.latest))
    }
}

/// Normalizer settings
#[derive(Debug, Clone, Copy)]
pub struct NormalizerOptions {
    /// Number of prior messages kept, plus two
    pub context_count: usize,
    /// Inline/upload cutoff for binary files
    pub large_file_threshold: u64,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            context_count: 10,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

/// Converts a conversation turn into normalized messages
pub struct MessageNormalizer {
    resolver: Arc<dyn ContentResolver>,
    logger: Arc<dyn Logger>,
    options: NormalizerOptions,
}

impl MessageNormalizer {
    pub fn new(resolver: Arc<dyn ContentResolver>, logger: Arc<dyn Logger>) -> Self {
        Self {
            resolver,
            logger,
            options: NormalizerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: NormalizerOptions) -> Self {
        self.options = options;
        self
    }

    /// Normalize a turn for `model`
    ///
    /// The latest non-system message is taken before history filtering, so
    /// it is always sent. Fails only when there is nothing to answer or the
    /// turn is aborted.
    pub async fn normalize(
        &self,
        input: &TurnInput,
        model: &ModelDescriptor,
        abort: &AbortHandle,
    ) -> CompletionResult<NormalizedTurn> {
        let system: Vec<String> = input
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(TurnMessage::main_text)
            .filter(|t| !t.trim().is_empty())
            .collect();
        let system_prompt = (!system.is_empty()).then(|| system.join("\n\n"));

        let mut conversation: Vec<&TurnMessage> = input
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .collect();
        let latest = conversation
            .pop()
            .ok_or_else(|| CompletionError::InvalidRequest("turn has no messages".into()))?;

        let expanded = expand_tool_results(&conversation, latest);
        let prior: Vec<&TurnMessage> = expanded.iter().map(|m| &**m).collect();
        let window = select_history(&prior, latest, self.options.context_count);
        self.logger.debug(&format!(
            "[Normalizer] {} prior messages, {} kept for {}",
            prior.len(),
            window.len(),
            model.id
        ));

        let mut history = Vec::with_capacity(window.len());
        for message in window {
            history.push(self.normalize_message(message, model, abort).await?);
        }
        let latest = self.normalize_message(latest, model, abort).await?;

        Ok(NormalizedTurn {
            system_prompt,
            history,
            latest,
        })
    }

    async fn normalize_message(
        &self,
        message: &TurnMessage,
        model: &ModelDescriptor,
        abort: &AbortHandle,
    ) -> CompletionResult<NormalizedMessage> {
        let mut normalized = NormalizedMessage::new(message.role, message.main_text());
        normalized.tool_calls = message.tool_calls.clone();
        normalized.tool_call_id = message.tool_call_id.clone();
        normalized.is_error = message.is_error;
        normalized.reasoning = message.reasoning.clone();

        for attachment in &message.attachments {
            if abort.is_aborted() {
                return Err(aborted_error(abort));
            }
            match attachment {
                Attachment::Image { source } => {
                    if !model.capabilities.image_input {
                        self.logger.info(&format!(
                            "[Normalizer] Dropping image: model '{}' has no image input",
                            model.id
                        ));
                        continue;
                    }
                    if let Some(part) = self.resolve_image(source).await {
                        normalized.images.push(part);
                    }
                }
                Attachment::File { file } => {
                    self.resolve_file(file, model, &mut normalized).await;
                }
            }
        }

        Ok(normalized)
    }

    async fn resolve_image(&self, source: &ImageSource) -> Option<MediaPart> {
        match source {
            ImageSource::Inline { data, mime } => Some(match split_data_uri(data) {
                Some((uri_mime, payload)) => MediaPart::inline(payload, uri_mime),
                None => MediaPart::inline(data.trim(), mime.as_str()),
            }),
            ImageSource::Reference { reference } => {
                let id = image_reference_id(reference);
                match self.resolver.get_blob(id).await {
                    Some(bytes) => Some(MediaPart::inline(
                        STANDARD.encode(&bytes),
                        sniff_image_mime(&bytes),
                    )),
                    None => {
                        self.logger.warn(&format!(
                            "[Normalizer] Image '{}' not found, sending text only",
                            id
                        ));
                        None
                    }
                }
            }
        }
    }

    async fn resolve_file(
        &self,
        file: &FileRef,
        model: &ModelDescriptor,
        normalized: &mut NormalizedMessage,
    ) {
        if is_text_file(file) {
            match self.resolver.read_text(&file.id).await {
                Ok(content) => {
                    if !normalized.text.is_empty() {
                        normalized.text.push_str("\n\n");
                    }
                    normalized.text.push_str(&format!("{}\n{}", file.name, content));
                }
                Err(e) => self.logger.warn(&format!(
                    "[Normalizer] Could not read file '{}': {}",
                    file.name, e
                )),
            }
            return;
        }

        if file.mime.starts_with("image/") && !model.capabilities.image_input {
            self.logger.info(&format!(
                "[Normalizer] Dropping image file '{}': model '{}' has no image input",
                file.name, model.id
            ));
            return;
        }

        if file.size > self.options.large_file_threshold {
            self.logger.debug(&format!(
                "[Normalizer] File '{}' ({} bytes) needs upload",
                file.name, file.size
            ));
            normalized.files.push(MediaPart::NeedsUpload { file: file.clone() });
            return;
        }

        match self.resolver.read_file(&file.id).await {
            Ok(bytes) => normalized.files.push(MediaPart::Inline {
                data: STANDARD.encode(&bytes),
                mime: file.mime.clone(),
                name: Some(file.name.clone()),
            }),
            Err(e) => self.logger.warn(&format!(
                "[Normalizer] Could not read file '{}': {}",
                file.name, e
            )),
        }
    }
}

/// Strip the `[image:<id>]` wrapper, if present
fn image_reference_id(reference: &str) -> &str {
    let trimmed = reference.trim();
    trimmed
        .strip_prefix("[image:")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim()
}

/// Insert tool-result messages for recorded results nobody answered
///
/// Backends require each assistant tool call to be followed by its result.
/// Callers may store results only on the call record; those are expanded
/// into `Tool` messages right after the assistant message, before the
/// history window is applied.
fn expand_tool_results<'a>(
    prior: &[&'a TurnMessage],
    latest: &'a TurnMessage,
) -> Vec<Cow<'a, TurnMessage>> {
    let answered: HashSet<&str> = prior
        .iter()
        .copied()
        .chain(std::iter::once(latest))
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    let mut expanded = Vec::with_capacity(prior.len());
    for &message in prior {
        expanded.push(Cow::Borrowed(message));
        for result in message.tool_calls.iter().filter_map(|record| record.result.as_ref()) {
            if !answered.contains(result.call_id.as_str()) {
                expanded.push(Cow::Owned(TurnMessage::from_tool_result(result)));
            }
        }
    }
    expanded
}

fn is_empty_message(message: &TurnMessage) -> bool {
    message.main_text().trim().is_empty()
        && message.attachments.is_empty()
        && message.tool_calls.is_empty()
        && message.tool_call_id.is_none()
}

/// Pick the prior messages sent with a turn
///
/// Empty messages are dropped. When `latest` continues a tool exchange, every
/// message from the exchange's user message on is kept whole. The remaining
/// budget of `context_count + 2` messages (counting the latest one) goes to
/// the most recent earlier messages, and that earlier part never starts on
/// anything but a user message.
pub fn select_history<'a>(
    prior: &[&'a TurnMessage],
    latest: &TurnMessage,
    context_count: usize,
) -> Vec<&'a TurnMessage> {
    let kept: Vec<&TurnMessage> = prior.iter().copied().filter(|m| !is_empty_message(m)).collect();

    let split = match latest.role {
        MessageRole::User => kept.len(),
        _ => kept
            .iter()
            .rposition(|m| m.role == MessageRole::User)
            .unwrap_or(kept.len()),
    };
    let (earlier, exchange) = kept.split_at(split);

    let budget = (context_count + 2)
        .saturating_sub(1)
        .saturating_sub(exchange.len());
    let mut start = earlier.len().saturating_sub(budget);
    while start < earlier.len() && earlier[start].role != MessageRole::User {
        start += 1;
    }

    let mut window = earlier[start..].to_vec();
    window.extend_from_slice(exchange);
    window
}
