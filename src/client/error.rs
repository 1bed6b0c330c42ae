//! Metrics API error classification.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the Metrics API endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials rejected (401/403). Retrying cannot succeed.
    #[error("unauthorized ({status}): check the API key and secret: {body}")]
    Unauthorized { status: u16, body: String },

    /// Request quota exhausted (429).
    #[error("rate limited by the Metrics API: lower the scrape frequency or the number of rules: {body}")]
    RateLimited { body: String },

    /// Any other non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Response body is not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Endpoint path cannot be joined onto the base URL.
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Classify a non-success response.
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized {
                status: status.as_u16(),
                body,
            },
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { body },
            _ => Self::Status {
                status: status.as_u16(),
                body,
            },
        }
    }

    /// Whether the error must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}
