//! HTTP plumbing shared by the adapters

use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use super::error::{CompletionError, CompletionResult};
use super::sequencer::aborted_error;
use crate::types::AbortHandle;

const USER_AGENT: &str = concat!("unichat-core/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client
///
/// `connect_timeout` bounds connection establishment only; streamed bodies
/// are bounded by the turn timeout instead.
pub fn build_client(connect_timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a request, racing the abort handle, and map non-2xx answers to errors
pub async fn send(
    request: RequestBuilder,
    provider: &str,
    abort: &AbortHandle,
) -> CompletionResult<Response> {
    if abort.is_aborted() {
        return Err(aborted_error(abort));
    }
    let response = tokio::select! {
        biased;
        _ = abort.aborted() => return Err(aborted_error(abort)),
        result = request.send() => result.map_err(|e| CompletionError::Connection(e.to_string()))?,
    };
    check_status(response, provider).await
}

/// Turn a non-success response into an `Api` error
pub async fn check_status(response: Response, provider: &str) -> CompletionResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CompletionError::api(provider, status.as_u16(), error_message(&body)))
}

/// Best-effort human message from an error body
///
/// Handles `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": ...}`; anything else is returned truncated.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error").filter(|v| v.is_string()),
            value.get("message"),
            value.pointer("/0/error/message"),
        ];
        if let Some(message) = candidates.into_iter().flatten().find_map(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > 500 {
        format!("{}...", trimmed.chars().take(500).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

/// Read a whole JSON body, racing the abort handle
pub async fn read_json(response: Response, abort: &AbortHandle) -> CompletionResult<Value> {
    let bytes = tokio::select! {
        biased;
        _ = abort.aborted() => return Err(aborted_error(abort)),
        body = response.bytes() => body.map_err(|e| CompletionError::Connection(e.to_string()))?,
    };
    Ok(serde_json::from_slice(&bytes)?)
}
