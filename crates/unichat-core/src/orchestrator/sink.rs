//! Caller-facing side of a turn's event stream

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::providers::CompletionError;
use crate::types::{AbortHandle, ChunkEvent};

/// Invoked for every event the caller sees
pub type ChunkCallback = Arc<dyn Fn(&ChunkEvent) + Send + Sync>;

/// Invoked with the accumulated `(text, reasoning)` after each delta
pub type UpdateCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Forwards sequenced events to the caller across all rounds of a turn
///
/// Keeps the turn-wide text and reasoning, withholds the `BlockComplete` of
/// rounds that end in tool calls, and guarantees a single terminal event.
/// Once the abort handle fires only the terminal `Error` gets through.
pub(crate) struct TurnSink {
    tx: mpsc::UnboundedSender<ChunkEvent>,
    abort: AbortHandle,
    on_chunk: Option<ChunkCallback>,
    on_update: Option<UpdateCallback>,
    text: String,
    reasoning: String,
    tools_active: bool,
    round_requested_tools: bool,
    delivered: bool,
    terminated: bool,
}

impl TurnSink {
    pub fn new(
        tx: mpsc::UnboundedSender<ChunkEvent>,
        abort: AbortHandle,
        on_chunk: Option<ChunkCallback>,
        on_update: Option<UpdateCallback>,
    ) -> Self {
        Self {
            tx,
            abort,
            on_chunk,
            on_update,
            text: String::new(),
            reasoning: String::new(),
            tools_active: false,
            round_requested_tools: false,
            delivered: false,
            terminated: false,
        }
    }

    /// Whether tool round-trips may follow this round
    pub fn set_tools_active(&mut self, active: bool) {
        self.tools_active = active;
    }

    pub fn begin_round(&mut self) {
        self.round_requested_tools = false;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Whether any event reached the caller
    pub fn delivered(&self) -> bool {
        self.delivered
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn forward(&mut self, event: ChunkEvent) {
        if self.terminated {
            return;
        }
        if self.abort.is_aborted() && !matches!(event, ChunkEvent::Error { .. }) {
            return;
        }

        let mut updated = false;
        match &event {
            ChunkEvent::TextDelta { text } => {
                self.text.push_str(text);
                updated = true;
            }
            ChunkEvent::ThinkingDelta { text } => {
                self.reasoning.push_str(text);
                updated = true;
            }
            ChunkEvent::ToolCallRequested { .. } => self.round_requested_tools = true,
            ChunkEvent::BlockComplete { .. } if self.tools_active && self.round_requested_tools => {
                return;
            }
            _ => {}
        }

        if event.is_terminal() {
            self.terminated = true;
        }
        self.delivered = true;
        if let Some(on_chunk) = &self.on_chunk {
            on_chunk(&event);
        }
        if updated {
            if let Some(on_update) = &self.on_update {
                on_update(&self.text, &self.reasoning);
            }
        }
        let _ = self.tx.send(event);
    }

    /// Terminate the turn with an error carrying everything streamed so far
    pub fn fail(&mut self, err: &CompletionError) {
        let event = ChunkEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
            partial_text: self.text.clone(),
            partial_reasoning: self.reasoning.clone(),
        };
        self.forward(event);
    }
}
