//! Error types for the pinner SDK.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

/// Error types that can occur when talking to GitHub or a container registry.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Authentication failed or was refused.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Rate limited.
    #[error("rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Malformed image reference or digest.
    #[error(transparent)]
    InvalidReference(#[from] pinner_core::CoreError),

    /// Manifest content does not hash to the advertised digest.
    #[error("manifest digest {actual} does not match expected {expected}")]
    DigestMismatch { expected: String, actual: String },

    /// Docker credential file could not be read.
    #[error("keychain error: {0}")]
    Keychain(String),

    /// Upstream answered with something we cannot interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SdkError {
    /// Create an error from a non-success response.
    ///
    /// Understands both the GitHub error body (`{"message": ...}`) and the
    /// distribution API error body (`{"errors": [{"code", "message"}]}`).
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let message = ErrorResponse::message_from(body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                body.trim().to_string()
            }
        });

        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::UNAUTHORIZED => Self::Authentication(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited {
                retry_after_secs: retry_after(headers),
            },
            StatusCode::FORBIDDEN if rate_limit_exhausted(headers) => Self::RateLimited {
                retry_after_secs: retry_after(headers),
            },
            _ => Self::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(secs);
    }

    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())?;
    let now = chrono::Utc::now().timestamp();
    Some(reset.saturating_sub(now).max(0) as u64)
}

/// Error body returned by GitHub or a registry.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RegistryErrorEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryErrorEntry {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorResponse {
    fn message_from(body: &str) -> Option<String> {
        let response: ErrorResponse = serde_json::from_str(body).ok()?;
        if let Some(message) = response.message.filter(|m| !m.is_empty()) {
            return Some(message);
        }

        let joined = response
            .errors
            .iter()
            .map(|e| {
                if e.code.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.code, e.message)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        (!joined.is_empty()).then_some(joined)
    }
}
