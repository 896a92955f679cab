//! Event sequencer shared by every adapter
//!
//! Adapters never write to the event channel directly. They report what they
//! decoded and the sequencer enforces ordering:
//!
//! - an open thinking span is closed (`ThinkingComplete`) before the next
//!   text delta, tool call or block end
//! - nothing is emitted after a terminal event
//! - no data event is emitted once the turn's abort handle fired
//!
//! It also accumulates the partial state (text, reasoning, tool calls,
//! images, usage) that terminal events and the final outcome carry.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::error::{CompletionError, CompletionResult};
use crate::types::{
    AbortHandle, AbortReason, ChunkEvent, GeneratedImage, Metrics, ReasoningBlock, ToolCall,
    TurnOutcome, Usage, WebSearchResult,
};

struct ThinkingSpan {
    text: String,
    signature: Option<String>,
    started: Instant,
}

/// `Aborted` error carrying the handle's recorded reason
pub fn aborted_error(abort: &AbortHandle) -> CompletionError {
    CompletionError::aborted(abort.reason().unwrap_or(AbortReason::UserStop))
}

/// Per-turn canonical event writer
pub struct EventSequencer {
    tx: mpsc::UnboundedSender<ChunkEvent>,
    abort: AbortHandle,
    started: Instant,
    first_token: Option<Duration>,
    text: String,
    reasoning: String,
    thinking: Option<ThinkingSpan>,
    reasoning_blocks: Vec<ReasoningBlock>,
    tool_calls: Vec<ToolCall>,
    images: Vec<GeneratedImage>,
    web_results: Vec<WebSearchResult>,
    usage: Option<Usage>,
    metrics: Metrics,
    delivered: bool,
    terminated: bool,
}

impl EventSequencer {
    /// Create a sequencer writing to `tx`, bound to the turn's abort handle
    pub fn new(tx: mpsc::UnboundedSender<ChunkEvent>, abort: AbortHandle) -> Self {
        Self {
            tx,
            abort,
            started: Instant::now(),
            first_token: None,
            text: String::new(),
            reasoning: String::new(),
            thinking: None,
            reasoning_blocks: Vec::new(),
            tool_calls: Vec::new(),
            images: Vec::new(),
            web_results: Vec::new(),
            usage: None,
            metrics: Metrics::default(),
            delivered: false,
            terminated: false,
        }
    }

    /// Create a sequencer together with the receiving end of its channel
    pub fn channel(abort: AbortHandle) -> (Self, mpsc::UnboundedReceiver<ChunkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, abort), rx)
    }

    /// Whether any event has been emitted
    pub fn delivered(&self) -> bool {
        self.delivered
    }

    /// Whether a terminal event has been emitted
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Reasoning accumulated so far
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Tool calls requested so far
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Snapshot of the accumulated state
    pub fn outcome(&self) -> TurnOutcome {
        TurnOutcome {
            model: String::new(),
            text: self.text.clone(),
            reasoning: self.reasoning.clone(),
            reasoning_blocks: self.reasoning_blocks.clone(),
            tool_calls: self.tool_calls.clone(),
            images: self.images.clone(),
            web_results: self.web_results.clone(),
            usage: self.usage,
            metrics: self.metrics,
        }
    }

    fn check_abort(&self) -> CompletionResult<()> {
        if self.abort.is_aborted() {
            return Err(aborted_error(&self.abort));
        }
        Ok(())
    }

    fn emit(&mut self, event: ChunkEvent) {
        if self.terminated {
            return;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        self.delivered = true;
        // A dropped receiver only means nobody listens anymore
        let _ = self.tx.send(event);
    }

    fn mark_first_token(&mut self) {
        if self.first_token.is_none() {
            self.first_token = Some(self.started.elapsed());
        }
    }

    fn close_thinking(&mut self) {
        if let Some(span) = self.thinking.take() {
            let elapsed_ms = (span.started.elapsed().as_millis() as u64).max(1);
            self.reasoning_blocks.push(ReasoningBlock {
                text: span.text.clone(),
                signature: span.signature,
            });
            self.emit(ChunkEvent::ThinkingComplete {
                text: span.text,
                elapsed_ms,
            });
        }
    }

    /// Backend accepted the request
    pub fn response_created(&mut self) -> CompletionResult<()> {
        self.check_abort()?;
        self.emit(ChunkEvent::ResponseCreated);
        Ok(())
    }

    /// Append answer text
    pub fn text_delta(&mut self, text: &str) -> CompletionResult<()> {
        self.check_abort()?;
        if text.is_empty() || self.terminated {
            return Ok(());
        }
        self.close_thinking();
        self.mark_first_token();
        self.text.push_str(text);
        self.emit(ChunkEvent::text_delta(text));
        Ok(())
    }

    /// Append reasoning text, opening a thinking span when none is open
    pub fn thinking_delta(&mut self, text: &str) -> CompletionResult<()> {
        self.check_abort()?;
        if text.is_empty() || self.terminated {
            return Ok(());
        }
        self.mark_first_token();
        let span = self.thinking.get_or_insert_with(|| ThinkingSpan {
            text: String::new(),
            signature: None,
            started: Instant::now(),
        });
        span.text.push_str(text);
        self.reasoning.push_str(text);
        self.emit(ChunkEvent::thinking_delta(text));
        Ok(())
    }

    /// Attach the backend's signature to the open thinking span
    ///
    /// Signatures arrive in pieces on some backends and are concatenated.
    /// Ignored when no span is open.
    pub fn thinking_signature(&mut self, signature: &str) {
        if let Some(span) = self.thinking.as_mut() {
            span.signature
                .get_or_insert_with(String::new)
                .push_str(signature);
        }
    }

    /// Close the open thinking span, if any
    pub fn thinking_complete(&mut self) -> CompletionResult<()> {
        self.check_abort()?;
        self.close_thinking();
        Ok(())
    }

    /// Report a decoded tool call
    pub fn tool_call(&mut self, call: ToolCall) -> CompletionResult<()> {
        self.check_abort()?;
        if self.terminated {
            return Ok(());
        }
        self.close_thinking();
        self.tool_calls.push(call.clone());
        self.emit(ChunkEvent::ToolCallRequested { tool_call: call });
        Ok(())
    }

    /// Image generation started
    pub fn image_created(&mut self) -> CompletionResult<()> {
        self.check_abort()?;
        self.emit(ChunkEvent::ImageCreated);
        Ok(())
    }

    /// Generated images are ready
    pub fn images_complete(&mut self, images: Vec<GeneratedImage>) -> CompletionResult<()> {
        self.check_abort()?;
        if images.is_empty() || self.terminated {
            return Ok(());
        }
        self.close_thinking();
        self.images.extend(images.iter().cloned());
        self.emit(ChunkEvent::ImageComplete { images });
        Ok(())
    }

    /// Web search results reported by the backend
    pub fn web_search(&mut self, results: Vec<WebSearchResult>) -> CompletionResult<()> {
        self.check_abort()?;
        if results.is_empty() || self.terminated {
            return Ok(());
        }
        self.web_results.extend(results.iter().cloned());
        self.emit(ChunkEvent::WebSearchComplete { results });
        Ok(())
    }

    /// Record native token counts; reported once at the end of the block
    pub fn usage(&mut self, usage: Usage) {
        match self.usage.as_mut() {
            Some(current) => current.merge(usage),
            None => {
                let mut fresh = Usage::default();
                fresh.merge(usage);
                self.usage = Some(fresh);
            }
        }
    }

    /// Close the block successfully
    ///
    /// Emits `ThinkingComplete` (if a span is open), `TextComplete`,
    /// `UsageReported` and finally `BlockComplete`. A no-op once terminated.
    pub fn finish(&mut self) -> CompletionResult<()> {
        if self.terminated {
            return Ok(());
        }
        self.check_abort()?;
        self.close_thinking();

        if !self.text.is_empty() {
            self.emit(ChunkEvent::TextComplete {
                text: self.text.clone(),
            });
        }
        if let Some(usage) = self.usage.filter(|u| !u.is_empty()) {
            self.emit(ChunkEvent::UsageReported { usage });
        }

        self.metrics = Metrics {
            first_token_ms: self.first_token.map(|d| d.as_millis() as u64),
            completion_ms: self.started.elapsed().as_millis() as u64,
        };
        self.emit(ChunkEvent::BlockComplete {
            text: self.text.clone(),
            usage: self.usage,
            metrics: self.metrics,
        });
        Ok(())
    }

    /// Close the block with an error carrying the partial state
    pub fn fail(&mut self, err: &CompletionError) {
        if self.terminated {
            return;
        }
        // An open thinking span is dropped, not completed
        self.thinking = None;
        self.metrics = Metrics {
            first_token_ms: self.first_token.map(|d| d.as_millis() as u64),
            completion_ms: self.started.elapsed().as_millis() as u64,
        };
        self.emit(ChunkEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
            partial_text: self.text.clone(),
            partial_reasoning: self.reasoning.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use serde_json::json;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChunkEvent>) -> Vec<ChunkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_thinking_closes_before_text() {
        let (mut seq, mut rx) = EventSequencer::channel(AbortHandle::new());
        seq.response_created().unwrap();
        seq.thinking_delta("a").unwrap();
        seq.thinking_delta("b").unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        seq.text_delta("hello").unwrap();
        seq.finish().unwrap();

        let events = drain(&mut rx);
        let pos = events
            .iter()
            .position(|e| matches!(e, ChunkEvent::ThinkingComplete { .. }))
            .unwrap();
        match &events[pos] {
            ChunkEvent::ThinkingComplete { text, elapsed_ms } => {
                assert_eq!(text, "ab");
                assert!(*elapsed_ms > 0);
            }
            _ => unreachable!(),
        }
        assert_eq!(events[pos + 1], ChunkEvent::text_delta("hello"));
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_finish_sequence() {
        let (mut seq, mut rx) = EventSequencer::channel(AbortHandle::new());
        seq.text_delta("Hel").unwrap();
        seq.text_delta("lo").unwrap();
        seq.usage(Usage::new(3, 2));
        seq.finish().unwrap();

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["text_delta", "text_delta", "text_complete", "usage_reported", "block_complete"]
        );
        assert_eq!(seq.outcome().text, "Hello");
        assert_eq!(seq.outcome().usage, Some(Usage::new(3, 2)));
    }

    #[tokio::test]
    async fn test_nothing_after_terminal() {
        let (mut seq, mut rx) = EventSequencer::channel(AbortHandle::new());
        seq.text_delta("done").unwrap();
        seq.finish().unwrap();
        seq.text_delta("late").unwrap();
        seq.fail(&CompletionError::Connection("reset".into()));
        seq.finish().unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_abort_blocks_data_events() {
        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        seq.text_delta("one").unwrap();
        abort.abort();

        let err = seq.text_delta("two").unwrap_err();
        assert_eq!(err, CompletionError::aborted(AbortReason::UserStop));
        assert!(seq.finish().is_err());
        seq.fail(&err);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[1] {
            ChunkEvent::Error { kind, partial_text, .. } => {
                assert_eq!(*kind, ErrorKind::Aborted);
                assert_eq!(partial_text, "one");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_call_closes_thinking() {
        let (mut seq, mut rx) = EventSequencer::channel(AbortHandle::new());
        seq.thinking_delta("plan").unwrap();
        seq.tool_call(ToolCall::new("c1", "search", json!({"q": "rust"}))).unwrap();

        let names: Vec<_> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["thinking_delta", "thinking_complete", "tool_call_requested"]);
        assert_eq!(seq.tool_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_signed_thinking_spans_recorded() {
        let (mut seq, _rx) = EventSequencer::channel(AbortHandle::new());
        seq.thinking_signature("ignored");
        seq.thinking_delta("first").unwrap();
        seq.thinking_signature("si");
        seq.thinking_signature("g1");
        seq.thinking_complete().unwrap();
        seq.thinking_delta("second").unwrap();
        seq.tool_call(ToolCall::new("c1", "search", json!({}))).unwrap();
        seq.finish().unwrap();

        assert_eq!(
            seq.outcome().reasoning_blocks,
            vec![
                ReasoningBlock::new("first").with_signature("sig1"),
                ReasoningBlock::new("second"),
            ]
        );
    }

    #[test]
    fn test_delivered_tracking() {
        let (mut seq, _rx) = EventSequencer::channel(AbortHandle::new());
        assert!(!seq.delivered());
        seq.usage(Usage::new(1, 1));
        assert!(!seq.delivered());
        seq.response_created().unwrap();
        assert!(seq.delivered());
    }
}
