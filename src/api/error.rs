//! API error type
//!
//! Every failure the client can surface is an [`ApiError`]: HTTP error
//! responses keep their status code, transport failures use status 0.

use serde_json::Value;

use crate::core::FormError;

/// Status used for failures where no HTTP response was received
pub const NETWORK_ERROR_STATUS: u16 = 0;

/// Error returned by every API call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (HTTP {status})")]
pub struct ApiError {
    /// HTTP status, or 0 when the request never got a response
    pub status: u16,
    /// Human-readable message extracted from the response body
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build an error from a non-2xx response
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| fallback_message(status));
        Self { status, message }
    }

    /// Wrap a transport failure (connection refused, timeout, TLS, ...)
    pub fn network(detail: impl std::fmt::Display) -> Self {
        Self {
            status: NETWORK_ERROR_STATUS,
            message: format!("Network error: {}", detail),
        }
    }

    /// A 2xx response whose body did not match the expected shape
    pub fn decode(status: u16, detail: impl std::fmt::Display) -> Self {
        Self {
            status,
            message: format!("Invalid response body: {}", detail),
        }
    }

    pub fn is_network(&self) -> bool {
        self.status == NETWORK_ERROR_STATUS
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_validation(&self) -> bool {
        self.status == 400 || self.status == 422
    }
}

/// Failure of a call that submits a form: rejected locally or by the server
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] FormError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Pull a message out of an error body.
///
/// Checked in order: `detail.message`, `message`, `detail` as a string,
/// then the raw body text. Returns `None` for an empty body.
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        let nested = json
            .get("detail")
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str);
        let top_level = json.get("message").and_then(Value::as_str);
        let detail = json.get("detail").and_then(Value::as_str);

        if let Some(msg) = nested.or(top_level).or(detail) {
            return Some(msg.to_string());
        }
    }

    Some(trimmed.to_string())
}

fn fallback_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|reason| format!("HTTP {} {}", status, reason))
        .unwrap_or_else(|| format!("HTTP {}", status))
}
