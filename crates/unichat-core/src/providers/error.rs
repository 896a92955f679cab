//! Completion error types

use thiserror::Error;

use crate::types::{AbortReason, ErrorKind};

/// Errors that can occur while completing a turn
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// Transport failure before any data arrived (connect, DNS, timeout)
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend answered with a non-success status
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Malformed backend payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Turn was aborted
    #[error("request aborted: {reason}")]
    Aborted { reason: AbortReason },

    /// Tool executor failure
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Model id not found in the registry
    #[error("model '{0}' not found in registry")]
    RegistryMiss(String),

    /// Tool round-trips exceeded the configured bound
    #[error("tool call loop exceeded {limit} round trips")]
    LoopGuardExceeded { limit: usize },

    /// Missing API key
    #[error("API key is required for {provider}")]
    MissingApiKey { provider: String },

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl CompletionError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a missing API key error
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn aborted(reason: AbortReason) -> Self {
        Self::Aborted { reason }
    }

    /// Whether the retry policy may try again
    ///
    /// Only connection failures and 429/5xx answers qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Connection(_) => true,
            CompletionError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CompletionError::Aborted { .. })
    }

    /// Kind carried by the terminal `Error` event
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompletionError::Connection(_) => ErrorKind::Connection,
            CompletionError::Api { .. } => ErrorKind::Api,
            CompletionError::Protocol(_) => ErrorKind::Protocol,
            CompletionError::Aborted { .. } => ErrorKind::Aborted,
            CompletionError::ToolExecution { .. } => ErrorKind::ToolExecution,
            CompletionError::LoopGuardExceeded { .. } => ErrorKind::LoopGuardExceeded,
            CompletionError::RegistryMiss(_)
            | CompletionError::MissingApiKey { .. }
            | CompletionError::InvalidRequest(_)
            | CompletionError::Other(_) => ErrorKind::Configuration,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CompletionError::Protocol(err.to_string())
        } else if let Some(status) = err.status() {
            CompletionError::api("http", status.as_u16(), err.to_string())
        } else {
            // connect, timeout, body and request errors are all transport level
            CompletionError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(err: serde_json::Error) -> Self {
        CompletionError::Protocol(err.to_string())
    }
}

pub type CompletionResult<T> = Result<T, CompletionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CompletionError::Connection("refused".into()).is_retryable());
        assert!(CompletionError::api("openai", 429, "slow down").is_retryable());
        assert!(CompletionError::api("openai", 503, "unavailable").is_retryable());
        assert!(!CompletionError::api("openai", 401, "bad key").is_retryable());
        assert!(!CompletionError::protocol("bad json").is_retryable());
        assert!(!CompletionError::aborted(AbortReason::UserStop).is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CompletionError::aborted(AbortReason::Timeout).kind(), ErrorKind::Aborted);
        assert_eq!(
            CompletionError::LoopGuardExceeded { limit: 10 }.kind(),
            ErrorKind::LoopGuardExceeded
        );
        assert_eq!(CompletionError::missing_api_key("anthropic").kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_json_error_is_protocol() {
        let err: CompletionError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, CompletionError::Protocol(_)));
    }

    #[test]
    fn test_display() {
        let err = CompletionError::api("anthropic", 400, "bad request");
        assert_eq!(err.to_string(), "anthropic API error (400): bad request");
    }
}
