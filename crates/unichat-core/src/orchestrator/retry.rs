//! Connection-phase retry policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::{aborted_error, CompletionResult};
use crate::types::AbortHandle;

/// Exponential backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub initial_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_ms: 300,
            multiplier: 2.0,
            max_ms: 5_000,
        }
    }
}

/// How often a turn may re-establish its connection
///
/// Only failures before any event reached the caller are retried, and only
/// retryable ones (connection errors, HTTP 429 and 5xx).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        self.backoff = Backoff {
            initial_ms,
            multiplier,
            max_ms,
        };
        self
    }

    /// Whether another attempt may follow failed attempt number `attempt` (1-based)
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as i32;
        let ms = self.backoff.initial_ms as f64 * self.backoff.multiplier.max(1.0).powi(exp);
        Duration::from_millis((ms as u64).min(self.backoff.max_ms))
    }

    /// Sleep before the next attempt; returns `Aborted` if the handle fires
    pub async fn wait(&self, attempt: u32, abort: &AbortHandle) -> CompletionResult<()> {
        let delay = self.delay_for(attempt);
        tokio::select! {
            biased;
            _ = abort.aborted() => Err(aborted_error(abort)),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth_is_capped() {
        let policy = RetryPolicy::default().with_backoff(100, 2.0, 350);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::default().with_max_attempts(2);
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
        assert!(!RetryPolicy::none().allows_retry(1));
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_wait_is_abortable() {
        let policy = RetryPolicy::default().with_backoff(60_000, 1.0, 60_000);
        let abort = AbortHandle::new();
        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.abort();
        });
        let err = policy.wait(1, &abort).await.unwrap_err();
        assert!(err.is_aborted());
    }

    #[test]
    fn test_deserialize_partial() {
        let policy: RetryPolicy = serde_yaml::from_str("max_attempts: 5").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Backoff::default());
    }
}
