//! All-time summary API client.

use hb_core::{CapabilityError, Summary, SummaryFetcher, async_trait};

use crate::{ApiError, build_http, endpoint, status_error, validate_token};

/// Client for a WakaTime-compatible `/api/summary` endpoint.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    http: reqwest::Client,
    url: String,
}

impl SummaryClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http()?,
            url: endpoint(base_url, "api/summary"),
        })
    }

    /// Fetches the all-time totals for the user owning `api_key`.
    pub async fn fetch(&self, api_key: &str) -> Result<Summary, ApiError> {
        validate_token(api_key)?;

        let response = self
            .http
            .get(&self.url)
            .query(&[("interval", "all_time"), ("api_key", api_key)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_summary(&body)
    }
}

#[async_trait]
impl SummaryFetcher for SummaryClient {
    async fn fetch_summary(&self, api_key: &str) -> Result<Summary, CapabilityError> {
        self.fetch(api_key)
            .await
            .map_err(|err| CapabilityError::new("summary fetch", err))
    }
}

/// Parses a summary body; absent `projects` or `languages` read as empty.
fn parse_summary(body: &str) -> Result<Summary, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}
