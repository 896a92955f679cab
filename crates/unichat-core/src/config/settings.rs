//! Completion settings

use serde::{Deserialize, Serialize};

use crate::content::{NormalizerOptions, DEFAULT_LARGE_FILE_THRESHOLD};
use crate::orchestrator::RetryPolicy;

/// Default tool round-trip bound
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Knobs for every turn; each field falls back to its default when absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Prior messages kept in the context window (window is this plus two)
    pub context_count: usize,
    pub retry: RetryPolicy,
    /// Tool round trips before a turn fails with a loop guard error
    pub max_tool_rounds: usize,
    /// Stream responses (false = one blocking response per call)
    pub stream: bool,
    /// Binary attachments above this size are uploaded instead of inlined
    pub large_file_threshold: u64,
    /// Whole-turn timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Connection establishment timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            context_count: 10,
            retry: RetryPolicy::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            stream: true,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            request_timeout_ms: None,
            connect_timeout_ms: Some(30_000),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl CompletionSettings {
    /// Normalizer options derived from these settings
    pub fn normalizer_options(&self) -> NormalizerOptions {
        NormalizerOptions {
            context_count: self.context_count,
            large_file_threshold: self.large_file_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings: CompletionSettings =
            serde_yaml::from_str("context_count: 4\nretry:\n  max_attempts: 1\n").unwrap();
        assert_eq!(settings.context_count, 4);
        assert_eq!(settings.retry.max_attempts, 1);
        assert_eq!(settings.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert!(settings.stream);
        assert_eq!(settings.normalizer_options().context_count, 4);
    }
}
