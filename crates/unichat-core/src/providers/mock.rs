//! Mock adapter for testing
//!
//! Provides deterministic, scripted responses without network dependencies.
//! Used by the orchestrator and tool coordinator tests and by demos.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::{CompletionError, CompletionResult};
use super::sequencer::{aborted_error, EventSequencer};
use super::traits::{CompletionRequest, ProviderAdapter};
use crate::logging::Logger;
use crate::types::{AbortHandle, GeneratedImage, ProviderFamily, ToolCall, Usage};

/// One scripted step of a mock response
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Echo back the latest user message text
    Echo,
    /// Answer text delta
    Text(String),
    /// Reasoning delta
    Thinking(String),
    /// Request a tool call
    ToolCall { name: String, input: Value },
    /// Generated image (base64 payload)
    Image(String),
    /// Native usage report
    Usage(Usage),
    /// Pause before the next step (abortable)
    Delay(u64),
    /// Fail mid-stream with the given error
    Fail(CompletionError),
}

impl MockStep {
    pub fn text(text: impl Into<String>) -> Self {
        MockStep::Text(text.into())
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        MockStep::Thinking(text.into())
    }

    pub fn tool_call(name: impl Into<String>, input: Value) -> Self {
        MockStep::ToolCall {
            name: name.into(),
            input,
        }
    }
}

/// Scripted mock backend
///
/// Scripts pushed with [`MockAdapter::push_script`] are consumed one per
/// call; once the queue is empty every call plays the default script.
pub struct MockAdapter {
    default_script: Vec<MockStep>,
    scripts: Mutex<VecDeque<Vec<MockStep>>>,
    connect_failures: AtomicUsize,
    step_delay_ms: u64,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
    logger: Arc<dyn Logger>,
}

impl MockAdapter {
    /// Create a mock that echoes the latest user message
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::scripted(vec![MockStep::Echo], logger)
    }

    /// Create a mock that answers with a fixed text
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::scripted(vec![MockStep::Text(response.into())], logger)
    }

    /// Create a mock playing `steps` on every call
    pub fn scripted(steps: Vec<MockStep>, logger: Arc<dyn Logger>) -> Self {
        Self {
            default_script: steps,
            scripts: Mutex::new(VecDeque::new()),
            connect_failures: AtomicUsize::new(0),
            step_delay_ms: 0,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Fail the first `count` calls with a connection error
    pub fn with_connect_failures(self, count: usize) -> Self {
        self.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Pause between steps
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.step_delay_ms = delay_ms;
        self
    }

    /// Queue a script for the next unscripted call
    pub fn push_script(&self, steps: Vec<MockStep>) {
        self.scripts.lock().push_back(steps);
    }

    /// Number of `complete` calls so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn next_script(&self) -> Vec<MockStep> {
        self.scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone())
    }

    async fn pause(&self, ms: u64, abort: &AbortHandle) -> CompletionResult<()> {
        if ms == 0 {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = abort.aborted() => Err(aborted_error(abort)),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Mock
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        events: &mut EventSequencer,
        abort: &AbortHandle,
    ) -> CompletionResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());
        self.logger.debug(&format!(
            "[MockAdapter] Call {} for model {}",
            call,
            request.model.model_name()
        ));

        let failing = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CompletionError::Connection("mock connection refused".into()));
        }
        if abort.is_aborted() {
            return Err(aborted_error(abort));
        }

        events.response_created()?;
        let mut tool_calls = 0usize;
        for step in self.next_script() {
            self.pause(self.step_delay_ms, abort).await?;
            match step {
                MockStep::Echo => events.text_delta(&request.turn.latest.text)?,
                MockStep::Text(text) => events.text_delta(&text)?,
                MockStep::Thinking(text) => events.thinking_delta(&text)?,
                MockStep::ToolCall { name, input } => {
                    tool_calls += 1;
                    let id = format!("mock_call_{}_{}", call, tool_calls);
                    events.tool_call(ToolCall::new(id, name, input))?;
                }
                MockStep::Image(data) => {
                    events.image_created()?;
                    events.images_complete(vec![GeneratedImage::from_base64(&data, "image/png")])?;
                }
                MockStep::Usage(usage) => events.usage(usage),
                MockStep::Delay(ms) => self.pause(ms, abort).await?,
                MockStep::Fail(err) => return Err(err),
            }
        }
        events.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{NormalizedMessage, NormalizedTurn};
    use crate::logging::NoOpLogger;
    use crate::types::{ChunkEvent, MessageRole, ModelDescriptor};

    fn request(text: &str) -> CompletionRequest {
        let turn = NormalizedTurn {
            system_prompt: None,
            history: vec![],
            latest: NormalizedMessage::new(MessageRole::User, text),
        };
        CompletionRequest::new(ModelDescriptor::new("mock", ProviderFamily::Mock), turn)
    }

    fn logger() -> Arc<dyn Logger> {
        Arc::new(NoOpLogger::new())
    }

    #[tokio::test]
    async fn test_echo() {
        let mock = MockAdapter::echo(logger());
        let abort = AbortHandle::new();
        let (mut seq, mut rx) = EventSequencer::channel(abort.clone());
        mock.complete(&request("Hello"), &mut seq, &abort).await.unwrap();

        assert_eq!(seq.outcome().text, "Hello");
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(ChunkEvent::BlockComplete { .. })));
    }

    #[tokio::test]
    async fn test_connect_failures_then_success() {
        let mock = MockAdapter::fixed("ok", logger()).with_connect_failures(2);
        let abort = AbortHandle::new();
        for _ in 0..2 {
            let (mut seq, _rx) = EventSequencer::channel(abort.clone());
            let err = mock.complete(&request("x"), &mut seq, &abort).await.unwrap_err();
            assert!(err.is_retryable());
            assert!(!seq.delivered());
        }
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        mock.complete(&request("x"), &mut seq, &abort).await.unwrap();
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_queued_scripts_then_default() {
        let mock = MockAdapter::fixed("default", logger());
        mock.push_script(vec![MockStep::tool_call("search", serde_json::json!({"q": "rust"}))]);
        let abort = AbortHandle::new();

        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        mock.complete(&request("x"), &mut seq, &abort).await.unwrap();
        assert_eq!(seq.tool_calls()[0].name, "search");
        assert_eq!(seq.tool_calls()[0].id, "mock_call_1_1");

        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        mock.complete(&request("x"), &mut seq, &abort).await.unwrap();
        assert_eq!(seq.text(), "default");
        assert!(seq.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_delay_honors_abort() {
        let mock = MockAdapter::scripted(
            vec![MockStep::text("a"), MockStep::Delay(10_000), MockStep::text("b")],
            logger(),
        );
        let abort = AbortHandle::new();
        let (mut seq, _rx) = EventSequencer::channel(abort.clone());
        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.abort();
        });

        let err = mock.complete(&request("x"), &mut seq, &abort).await.unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(seq.text(), "a");
    }
}
