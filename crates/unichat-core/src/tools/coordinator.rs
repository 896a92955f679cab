//! Tool-call round-trip coordination
//!
//! A turn that requests tools is paused, the calls are run through the
//! [`ToolRegistry`], the results are appended to the conversation and the
//! turn is resubmitted. The coordinator tracks that cycle per turn and
//! enforces the round-trip bound.

use std::sync::Arc;

use super::registry::ToolRegistry;
use crate::config::DEFAULT_MAX_TOOL_ROUNDS;
use crate::logging::Logger;
use crate::providers::{aborted_error, CompletionError, CompletionResult};
use crate::types::{
    AbortHandle, ToolCall, ToolCallRecord, ToolResult, TurnInput, TurnMessage, TurnOutcome,
};

/// Where a turn is in its tool round-trip
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorState {
    /// No tool work pending
    Idle,
    /// The model asked for these calls
    Requesting(Vec<ToolCall>),
    Executing,
    /// Results are in, continuation pending
    Resubmitting,
    /// The loop guard tripped
    Terminal,
}

/// Per-turn tool round-trip state machine
pub struct ToolCoordinator {
    registry: Arc<ToolRegistry>,
    max_rounds: usize,
    rounds: usize,
    state: CoordinatorState,
    logger: Arc<dyn Logger>,
}

impl ToolCoordinator {
    pub fn new(registry: Arc<ToolRegistry>, logger: Arc<dyn Logger>) -> Self {
        Self {
            registry,
            max_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            rounds: 0,
            state: CoordinatorState::Idle,
            logger,
        }
    }

    /// Maximum number of round-trips per turn
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    /// Round-trips started so far
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Declarations to offer the model
    pub fn tools(&self) -> Vec<crate::types::Tool> {
        self.registry.get_llm_tools()
    }

    /// Record the calls a finished round requested
    ///
    /// Returns `false` when there is nothing to run and the turn is done.
    /// Starting a round past the bound is a `LoopGuardExceeded` error.
    pub fn begin_round(&mut self, calls: &[ToolCall]) -> CompletionResult<bool> {
        if calls.is_empty() {
            self.state = CoordinatorState::Idle;
            return Ok(false);
        }
        if self.rounds >= self.max_rounds {
            self.state = CoordinatorState::Terminal;
            self.logger.error(&format!(
                "[ToolCoordinator] Tool loop exceeded {} round-trips, stopping",
                self.max_rounds
            ));
            return Err(CompletionError::LoopGuardExceeded {
                limit: self.max_rounds,
            });
        }
        self.rounds += 1;
        self.logger.info(&format!(
            "[ToolCoordinator] Round {}: {} tool call(s) requested",
            self.rounds,
            calls.len()
        ));
        self.state = CoordinatorState::Requesting(calls.to_vec());
        Ok(true)
    }

    /// Run the requested calls in order
    ///
    /// Failing tools produce error results; only an abort fails the batch.
    pub async fn execute(
        &mut self,
        calls: &[ToolCall],
        abort: &AbortHandle,
    ) -> CompletionResult<Vec<ToolResult>> {
        self.state = CoordinatorState::Executing;
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if abort.is_aborted() {
                return Err(aborted_error(abort));
            }
            let result = tokio::select! {
                biased;
                _ = abort.aborted() => return Err(aborted_error(abort)),
                result = self.registry.execute_tool_call(call) => result,
            };
            if result.is_error {
                self.logger.warn(&format!(
                    "[ToolCoordinator] Tool {} returned an error: {}",
                    call.name, result.content
                ));
            }
            results.push(result);
        }
        self.state = CoordinatorState::Resubmitting;
        Ok(results)
    }

    /// Append the assistant round and its tool results to the conversation
    ///
    /// The round's signed reasoning travels with the assistant message so
    /// backends that verify it can replay it ahead of the tool calls.
    pub fn continuation(&self, input: &mut TurnInput, round: &TurnOutcome, results: &[ToolResult]) {
        let records = round
            .tool_calls
            .iter()
            .map(|call| {
                let record = ToolCallRecord::new(call.clone());
                match results.iter().find(|r| r.call_id == call.id) {
                    Some(result) => record.with_result(result.clone()),
                    None => record,
                }
            })
            .collect();
        input.push(
            TurnMessage::assistant(round.text.as_str())
                .with_tool_calls(records)
                .with_reasoning(round.reasoning_blocks.clone()),
        );
        for result in results {
            input.push(TurnMessage::from_tool_result(result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::tools::LocalToolExecutor;
    use crate::types::{MessageRole, ReasoningBlock, Tool};
    use serde_json::json;

    async fn coordinator(max_rounds: usize) -> ToolCoordinator {
        let local = LocalToolExecutor::new()
            .with_tool(Tool::new("add", "Add two numbers"), |args| {
                let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
                Ok(sum.to_string())
            })
            .with_tool(Tool::new("broken", "Always fails"), |_| Err("boom".to_string()));
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger::new());
        let registry = Arc::new(ToolRegistry::with_executor(Arc::new(local), logger.clone()));
        registry.refresh().await.unwrap();
        ToolCoordinator::new(registry, logger).with_max_rounds(max_rounds)
    }

    #[tokio::test]
    async fn test_round_trip_states() {
        let mut coordinator = coordinator(10).await;
        let calls = vec![
            ToolCall::new("c1", "add", json!({"a": 2, "b": 3})),
            ToolCall::new("c2", "broken", json!({})),
        ];

        assert!(coordinator.begin_round(&calls).unwrap());
        assert_eq!(coordinator.state(), &CoordinatorState::Requesting(calls.clone()));

        let abort = AbortHandle::new();
        let results = coordinator.execute(&calls, &abort).await.unwrap();
        assert_eq!(coordinator.state(), &CoordinatorState::Resubmitting);
        assert_eq!(results[0], ToolResult::success("c1", "5"));
        assert_eq!(results[1].content, "Error: boom");

        let round = TurnOutcome {
            text: "let me check".into(),
            reasoning_blocks: vec![ReasoningBlock::new("need both").with_signature("sig")],
            tool_calls: calls.clone(),
            ..Default::default()
        };
        let mut input = TurnInput::new(vec![TurnMessage::user("add 2 and 3")]);
        coordinator.continuation(&mut input, &round, &results);
        assert_eq!(input.messages.len(), 4);
        assert_eq!(input.messages[1].tool_calls.len(), 2);
        assert_eq!(input.messages[1].reasoning, round.reasoning_blocks);
        assert_eq!(input.messages[2].role, MessageRole::Tool);
        assert!(!input.messages[2].is_error);
        assert_eq!(input.messages[3].main_text(), "Error: boom");
        assert!(input.messages[3].is_error);

        assert!(!coordinator.begin_round(&[]).unwrap());
        assert_eq!(coordinator.state(), &CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_loop_guard() {
        let mut coordinator = coordinator(2).await;
        let calls = vec![ToolCall::new("c", "add", json!({}))];
        assert!(coordinator.begin_round(&calls).unwrap());
        assert!(coordinator.begin_round(&calls).unwrap());

        let err = coordinator.begin_round(&calls).unwrap_err();
        assert!(matches!(err, CompletionError::LoopGuardExceeded { limit: 2 }));
        assert_eq!(coordinator.state(), &CoordinatorState::Terminal);
        assert_eq!(coordinator.rounds(), 2);
    }

    #[tokio::test]
    async fn test_execute_honors_abort() {
        let mut coordinator = coordinator(10).await;
        let abort = AbortHandle::new();
        abort.abort();
        let err = coordinator
            .execute(&[ToolCall::new("c", "add", json!({}))], &abort)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
    }
}
