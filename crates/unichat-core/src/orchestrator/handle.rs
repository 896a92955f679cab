//! Per-turn options and the handle returned to callers

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::sink::{ChunkCallback, UpdateCallback};
use crate::providers::{CompletionError, CompletionResult};
use crate::types::{AbortHandle, ChunkEvent, ToolChoice, TurnOutcome};

/// Options for one turn; unset fields fall back to the orchestrator settings
#[derive(Clone, Default)]
pub struct TurnOptions {
    /// Adopt an existing abort handle instead of creating one
    pub abort: Option<AbortHandle>,
    /// Abort the turn with reason `Timeout` after this long
    pub timeout: Option<Duration>,
    pub on_chunk: Option<ChunkCallback>,
    pub on_update: Option<UpdateCallback>,
    pub tool_choice: Option<ToolChoice>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: Option<bool>,
    /// Do not offer tools even when the model supports them
    pub disable_tools: bool,
}

impl TurnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_chunk<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChunkEvent) + Send + Sync + 'static,
    {
        self.on_chunk = Some(Arc::new(callback));
        self
    }

    pub fn on_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.disable_tools = true;
        self
    }
}

impl std::fmt::Debug for TurnOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOptions")
            .field("abort", &self.abort)
            .field("timeout", &self.timeout)
            .field("on_chunk", &self.on_chunk.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("tool_choice", &self.tool_choice)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .field("disable_tools", &self.disable_tools)
            .finish()
    }
}

/// Handle to one in-flight turn
pub struct StreamHandle {
    model_id: String,
    abort: AbortHandle,
    events: Option<mpsc::UnboundedReceiver<ChunkEvent>>,
    task: JoinHandle<CompletionResult<TurnOutcome>>,
}

impl StreamHandle {
    pub(crate) fn new(
        model_id: String,
        abort: AbortHandle,
        events: mpsc::UnboundedReceiver<ChunkEvent>,
        task: JoinHandle<CompletionResult<TurnOutcome>>,
    ) -> Self {
        Self {
            model_id,
            abort,
            events: Some(events),
            task,
        }
    }

    /// Model id the turn was started for
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Stop the turn; `true` only for the call that took effect
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Raw canonical event stream (available once)
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChunkEvent>> {
        self.events.take()
    }

    /// Wait for the turn to end
    pub async fn wait(self) -> CompletionResult<TurnOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(CompletionError::Other(format!("turn task failed: {}", e))),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("model_id", &self.model_id)
            .field("abort", &self.abort)
            .finish()
    }
}
