//! HTTP clients for the services the milestone pipeline talks to.
//!
//! - [`SummaryClient`]: the upstream all-time summary API
//! - [`ChatClient`]: outbound chat messages
//!
//! Both implement the corresponding capability traits from `hb-core`, so the
//! pipeline only ever sees [`hb_core::SummaryFetcher`] and [`hb_core::Notifier`].

mod chat;
mod summary;

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use chat::ChatClient;
pub use summary::SummaryClient;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The provided token was invalid.
    #[error("invalid token: {reason}")]
    InvalidToken { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

fn build_http() -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(ApiError::ClientBuild)
}

fn validate_token(token: &str) -> Result<(), ApiError> {
    if token.is_empty() {
        return Err(ApiError::InvalidToken {
            reason: "token cannot be empty",
        });
    }
    if token.trim().is_empty() {
        return Err(ApiError::InvalidToken {
            reason: "token cannot be whitespace-only",
        });
    }
    Ok(())
}

/// Joins a configured base URL and an endpoint path.
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Extracts the error message from a JSON error body.
///
/// Accepts both `{"error": "..."}` and `{"error": {"message": "..."}}`.
fn parse_api_error(body: &str) -> Option<ApiError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetails {
        Message(String),
        Object { message: String },
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| match payload.error {
            ErrorDetails::Message(message) | ErrorDetails::Object { message } => {
                ApiError::Api { message }
            }
        })
}

/// Turns a non-success response into an [`ApiError`].
fn status_error(status: reqwest::StatusCode, body: &str) -> ApiError {
    parse_api_error(body).unwrap_or_else(|| ApiError::Api {
        message: format!("status {status}: {body}"),
    })
}
