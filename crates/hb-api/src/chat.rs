//! Chat notification client.

use std::fmt;

use serde::{Deserialize, Serialize};

use hb_core::{CapabilityError, Notifier, async_trait};

use crate::{ApiError, build_http, endpoint, status_error, validate_token};

/// Client for a Slack-compatible `chat.postMessage` endpoint.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl ChatClient {
    /// Creates a client posting to the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or whitespace-only, or if
    /// the HTTP client fails to build.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        let token = token.into();
        validate_token(&token)?;
        Ok(Self {
            http: build_http()?,
            url: endpoint(base_url, "chat.postMessage"),
            token,
        })
    }

    /// Posts `text` to `channel`.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&PostMessage { channel, text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_post_response(&body)
    }
}

#[async_trait]
impl Notifier for ChatClient {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), CapabilityError> {
        self.post_message(channel_id, text).await.map_err(|err| {
            tracing::debug!(channel = channel_id, error = %err, "chat post failed");
            CapabilityError::new("chat notification", err)
        })
    }
}

/// A 200 response still fails when the body reports `ok: false`.
fn parse_post_response(body: &str) -> Result<(), ApiError> {
    let payload: PostMessageResponse =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    if payload.ok {
        Ok(())
    } else {
        Err(ApiError::Api {
            message: payload.error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}
