//! Completion orchestrator
//!
//! Drives one turn end to end: resolves the model, normalizes the
//! conversation, calls the adapter under the retry policy, forwards the
//! canonical stream to the caller and loops through tool round-trips.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::handle::{StreamHandle, TurnOptions};
use super::sink::TurnSink;
use crate::config::CompletionSettings;
use crate::content::{ContentResolver, MemoryContentResolver, MessageNormalizer, NormalizedTurn};
use crate::credentials::{CredentialStore, EnvCredentialStore};
use crate::logging::Logger;
use crate::providers::{
    aborted_error, build_client, create_adapter, AdapterContext, CompletionRequest,
    CompletionResult, EventSequencer, ProviderAdapter,
};
use crate::registry::{attach_credential, ModelRegistry};
use crate::tools::{ToolCoordinator, ToolRegistry};
use crate::types::{
    AbortHandle, AbortReason, ChunkEvent, ModelDescriptor, ProviderFamily, Tool, ToolChoice,
    TurnInput, TurnOutcome,
};

/// Entry point for running chat turns
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<dyn ModelRegistry>,
    credentials: Arc<dyn CredentialStore>,
    content: Arc<dyn ContentResolver>,
    tools: Option<Arc<ToolRegistry>>,
    adapters: HashMap<ProviderFamily, Arc<dyn ProviderAdapter>>,
    settings: CompletionSettings,
    http: reqwest::Client,
    logger: Arc<dyn Logger>,
}

impl Orchestrator {
    /// Create an orchestrator with default settings, environment credentials
    /// and an empty content store
    pub fn new(registry: Arc<dyn ModelRegistry>, logger: Arc<dyn Logger>) -> Self {
        let settings = CompletionSettings::default();
        Self {
            registry,
            credentials: Arc::new(EnvCredentialStore::new()),
            content: Arc::new(MemoryContentResolver::new()),
            tools: None,
            adapters: HashMap::new(),
            http: build_client(settings.connect_timeout_ms.map(Duration::from_millis)),
            settings,
            logger,
        }
    }

    pub fn with_settings(mut self, settings: CompletionSettings) -> Self {
        self.http = build_client(settings.connect_timeout_ms.map(Duration::from_millis));
        self.settings = settings;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_content_resolver(mut self, content: Arc<dyn ContentResolver>) -> Self {
        self.content = content;
        self
    }

    /// Offer the registry's tools to models that support tool calling
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Use `adapter` for its own family instead of the built-in one
    pub fn with_adapter(self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let family = adapter.family();
        self.with_adapter_for(family, adapter)
    }

    /// Use `adapter` for every model of `family`
    pub fn with_adapter_for(mut self, family: ProviderFamily, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(family, adapter);
        self
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Start a turn on `model_id`
    ///
    /// Must be called within a tokio runtime. The turn runs on its own task;
    /// the returned handle streams its events and yields the outcome.
    pub fn run(&self, input: TurnInput, model_id: &str, options: TurnOptions) -> StreamHandle {
        let abort = options.abort.clone().unwrap_or_default();
        let (tx, rx) = mpsc::unbounded_channel();

        let this = self.clone();
        let model = model_id.to_string();
        let turn_abort = abort.clone();
        let task = tokio::spawn(async move { this.drive(input, model, options, turn_abort, tx).await });

        StreamHandle::new(model_id.to_string(), abort, rx, task)
    }

    /// Run the same turn on several models in parallel
    ///
    /// Every target gets its own task and abort handle; an abort handle in
    /// `options` is ignored.
    pub fn fan_out<I, S>(&self, input: TurnInput, model_ids: I, options: TurnOptions) -> Vec<StreamHandle>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        model_ids
            .into_iter()
            .map(|id| {
                let mut options = options.clone();
                options.abort = None;
                self.run(input.clone(), id.as_ref(), options)
            })
            .collect()
    }

    async fn drive(
        self,
        input: TurnInput,
        model_id: String,
        options: TurnOptions,
        abort: AbortHandle,
        tx: mpsc::UnboundedSender<ChunkEvent>,
    ) -> CompletionResult<TurnOutcome> {
        let timeout = options
            .timeout
            .or_else(|| self.settings.request_timeout_ms.map(Duration::from_millis));
        let timer = timeout.map(|limit| {
            let abort = abort.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                abort.abort_with(AbortReason::Timeout);
            })
        });

        let mut sink = TurnSink::new(tx, abort.clone(), options.on_chunk.clone(), options.on_update.clone());
        let result = self.run_rounds(input, &model_id, &options, &abort, &mut sink).await;
        if let Some(timer) = timer {
            timer.abort();
        }

        match result {
            Ok(outcome) => {
                self.logger.info(&format!(
                    "[Orchestrator] Turn on {} complete ({} chars)",
                    model_id,
                    outcome.text.len()
                ));
                Ok(outcome)
            }
            Err(e) => {
                if e.is_aborted() {
                    self.logger
                        .info(&format!("[Orchestrator] Turn on {} aborted: {}", model_id, e));
                } else {
                    self.logger
                        .error(&format!("[Orchestrator] Turn on {} failed: {}", model_id, e));
                }
                sink.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_rounds(
        &self,
        mut input: TurnInput,
        model_id: &str,
        options: &TurnOptions,
        abort: &AbortHandle,
        sink: &mut TurnSink,
    ) -> CompletionResult<TurnOutcome> {
        let model = self.resolve_model(model_id).await;
        let adapter = self.adapter_for(model.provider);

        let tools = self.offered_tools(&model, options);
        let mut coordinator = match &self.tools {
            Some(registry) if !tools.is_empty() => Some(
                ToolCoordinator::new(registry.clone(), self.logger.clone())
                    .with_max_rounds(self.settings.max_tool_rounds),
            ),
            _ => None,
        };
        sink.set_tools_active(coordinator.is_some());

        let normalizer = MessageNormalizer::new(self.content.clone(), self.logger.clone())
            .with_options(self.settings.normalizer_options());

        let mut outcome = TurnOutcome {
            model: model.id.clone(),
            ..Default::default()
        };
        let mut round = 0usize;
        loop {
            sink.begin_round();
            let turn = normalizer.normalize(&input, &model, abort).await?;
            let request = self.build_request(&model, turn, &tools, options, round);
            let result = self.complete_round(adapter.as_ref(), &request, sink, abort).await?;
            merge_round(&mut outcome, &result);
            round += 1;

            let Some(coordinator) = coordinator.as_mut() else {
                break;
            };
            if !coordinator.begin_round(&result.tool_calls)? {
                break;
            }
            let results = coordinator.execute(&result.tool_calls, abort).await?;
            for tool_result in &results {
                sink.forward(ChunkEvent::ToolCallResult {
                    call_id: tool_result.call_id.clone(),
                    payload: tool_result.content.clone(),
                    is_error: tool_result.is_error,
                });
            }
            coordinator.continuation(&mut input, &result, &results);
        }

        outcome.text = sink.text().to_string();
        outcome.reasoning = sink.reasoning().to_string();
        Ok(outcome)
    }

    /// One adapter call, retried while nothing has reached the caller
    async fn complete_round(
        &self,
        adapter: &dyn ProviderAdapter,
        request: &CompletionRequest,
        sink: &mut TurnSink,
        abort: &AbortHandle,
    ) -> CompletionResult<TurnOutcome> {
        let policy = &self.settings.retry;
        let mut attempt = 1u32;
        loop {
            let (mut events, mut rx) = EventSequencer::channel(abort.clone());
            let result = {
                let call = adapter.complete(request, &mut events, abort);
                tokio::pin!(call);
                loop {
                    tokio::select! {
                        biased;
                        Some(event) = rx.recv() => sink.forward(event),
                        result = &mut call => break result,
                    }
                }
            };
            while let Ok(event) = rx.try_recv() {
                sink.forward(event);
            }

            match result {
                Ok(()) => {
                    if abort.is_aborted() && !sink.is_terminated() {
                        return Err(aborted_error(abort));
                    }
                    return Ok(events.outcome());
                }
                Err(e)
                    if e.is_retryable()
                        && !events.delivered()
                        && !sink.delivered()
                        && !abort.is_aborted()
                        && policy.allows_retry(attempt) =>
                {
                    self.logger.warn(&format!(
                        "[Orchestrator] Attempt {}/{} on {} failed: {}, retrying",
                        attempt,
                        policy.max_attempts,
                        request.model.id,
                        e
                    ));
                    policy.wait(attempt, abort).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn resolve_model(&self, model_id: &str) -> ModelDescriptor {
        let model = match self.registry.find_model(model_id).await {
            Some(model) => model,
            None => {
                let model = ModelDescriptor::synthesize(model_id);
                self.logger.warn(&format!(
                    "[Orchestrator] RegistryMiss: '{}' not in registry, using synthesized {} descriptor",
                    model_id,
                    model.provider.as_str()
                ));
                model
            }
        };
        attach_credential(model, self.credentials.as_ref())
    }

    fn adapter_for(&self, family: ProviderFamily) -> Arc<dyn ProviderAdapter> {
        match self.adapters.get(&family) {
            Some(adapter) => adapter.clone(),
            None => create_adapter(
                family,
                AdapterContext::new(self.http.clone(), self.logger.clone(), self.content.clone()),
            ),
        }
    }

    fn offered_tools(&self, model: &ModelDescriptor, options: &TurnOptions) -> Vec<Tool> {
        if options.disable_tools || options.tool_choice == Some(ToolChoice::None) {
            return Vec::new();
        }
        match &self.tools {
            Some(registry) if model.capabilities.tool_calling => registry.get_llm_tools(),
            _ => Vec::new(),
        }
    }

    fn build_request(
        &self,
        model: &ModelDescriptor,
        turn: NormalizedTurn,
        tools: &[Tool],
        options: &TurnOptions,
        round: usize,
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new(model.clone(), turn)
            .with_stream(options.stream.unwrap_or(self.settings.stream));
        if let Some(temperature) = options.temperature.or(self.settings.temperature) {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens.or(self.settings.max_tokens) {
            request = request.with_max_tokens(max_tokens);
        }
        if !tools.is_empty() {
            // A forced tool call applies to the first round only
            let choice = match options.tool_choice.unwrap_or_default() {
                ToolChoice::Required if round > 0 => ToolChoice::Auto,
                choice => choice,
            };
            request = request.with_tools(tools.to_vec()).with_tool_choice(choice);
        }
        request
    }
}

fn merge_round(outcome: &mut TurnOutcome, round: &TurnOutcome) {
    outcome.reasoning_blocks = round.reasoning_blocks.clone();
    outcome.tool_calls.extend(round.tool_calls.iter().cloned());
    outcome.images.extend(round.images.iter().cloned());
    outcome.web_results.extend(round.web_results.iter().cloned());
    outcome.usage = match (outcome.usage, round.usage) {
        (Some(total), Some(usage)) => Some(total.add(&usage)),
        (total, usage) => total.or(usage),
    };
    if outcome.metrics.first_token_ms.is_none() {
        outcome.metrics.first_token_ms = round.metrics.first_token_ms;
    }
    outcome.metrics.completion_ms += round.metrics.completion_ms;
}
