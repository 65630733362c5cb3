//! Blocking HTTP plumbing shared by the provider and helpdesk clients.
//!
//! Clients are built once with a request timeout and reused. Calls are
//! never retried. Non-success responses become [`ProviderError::Api`] with
//! the body text (secrets redacted) as the message.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::error::ProviderError;
use crate::observability::{preview, redact_secrets};

const USER_AGENT: &str = concat!("ticketrank/", env!("CARGO_PKG_VERSION"));

// Upstream error bodies can be whole HTML pages.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Build a blocking client with the given request timeout.
///
/// Must be called outside any async runtime.
pub fn build_client(timeout_ms: u64) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Parse a JSON body, or turn a non-success status into an API error.
pub fn read_json(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    response
        .json::<Value>()
        .map_err(|e| ProviderError::InvalidResponse(format!("body is not JSON: {e}")))
}

/// Human-readable message from an error body.
///
/// Understands `{"error": {"message": ..}}` (OpenAI, Anthropic),
/// `{"description": ..}` (Freshdesk) and falls back to the raw text.
pub fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("description"))
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    redact_secrets(&preview(&message, MAX_ERROR_BODY_CHARS))
}
