//! Shared HTTP plumbing for provider adapters
//!
//! Every adapter owns a [`ClientWithMiddleware`] built here: a reqwest client with
//! the per-provider timeout and user agent, wrapped in a transient-retry layer.
//! Requests race against the request's [`CancellationToken`].

use super::{ProviderError, ProviderResult};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default user agent sent by all provider clients
pub const DEFAULT_USER_AGENT: &str = concat!("TripPlan/", env!("CARGO_PKG_VERSION"));

/// Longest upstream error body kept in a [`ProviderError::Status`]
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Transport settings for one provider client
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

impl HttpSettings {
    #[must_use]
    pub fn new(timeout_seconds: u32, max_retries: u32) -> Self {
        Self {
            timeout: Duration::from_secs(u64::from(timeout_seconds)),
            max_retries,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::new(10, 0)
    }
}

/// Build a retrying client from the given settings
pub fn build_client(settings: &HttpSettings) -> ProviderResult<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str())
        .build()
        .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {e}")))?;

    let mut builder = ClientBuilder::new(client);
    if settings.max_retries > 0 {
        let policy = ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
    }
    Ok(builder.build())
}

/// Send a request and return the body of a successful response as text
///
/// Non-success statuses become [`ProviderError::Status`] carrying a truncated body.
pub async fn fetch_text(
    request: RequestBuilder,
    cancel: &CancellationToken,
    what: &str,
) -> ProviderResult<String> {
    let call = async {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: format!("{what}: {}", truncate(&body)),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("{what} body read failed: {e}")))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("{what} abandoned after cancellation");
            Err(ProviderError::Cancelled)
        }
        result = call => result,
    }
}

/// Send a request and decode a successful JSON response
pub async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    cancel: &CancellationToken,
    what: &str,
) -> ProviderResult<T> {
    let body = fetch_text(request, cancel, what).await?;
    decode_json(&body, what)
}

/// Decode a JSON body into a typed schema
pub fn decode_json<T: DeserializeOwned>(body: &str, what: &str) -> ProviderResult<T> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("Failed to parse {what} response: {e}")))
}

/// Attach a JSON payload to a request
pub fn with_json_body<B: serde::Serialize>(
    request: RequestBuilder,
    body: &B,
) -> ProviderResult<RequestBuilder> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| ProviderError::Malformed(format!("Failed to encode request body: {e}")))?;
    Ok(request
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(bytes))
}

/// Build a URL with percent-encoded query parameters
#[must_use]
pub fn url_with_query(base: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        cut.push('…');
        cut
    }
}
