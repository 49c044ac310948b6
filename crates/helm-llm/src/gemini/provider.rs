//! Gemini gateway implementing [`ChatGateway`].
//!
//! Streams via `streamGenerateContent?alt=sse` and completes via
//! `generateContent`, both with API-key auth carried in the URL.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, error, instrument, warn};

use crate::gateway::{
    ChatGateway, ChatRequest, GatewayError, GatewayEventStream, GatewayResult,
};
use crate::sse::parse_sse_lines;

use super::types::{
    WireChunk, WireGenerationConfig, chunk_events, chunk_text, to_wire_request,
};

/// Default REST base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini gateway configuration.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// Model ID (e.g. `gemini-3-pro-preview`).
    pub model: String,
    /// API key.
    pub api_key: String,
    /// Base URL override (tests, proxies).
    pub base_url: Option<String>,
    /// Maximum output tokens.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl GeminiConfig {
    /// Config with defaults for everything but model and key.
    #[must_use]
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            max_output_tokens: None,
            temperature: None,
        }
    }
}

/// Gemini REST gateway.
pub struct GeminiGateway {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiGateway {
    /// Create a gateway with its own HTTP client.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a gateway sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// The API URL for a given action.
    fn request_url(&self, action: &str, sse: bool) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let suffix = if sse { "&alt=sse" } else { "" };
        format!(
            "{base}/models/{}:{action}?key={}{suffix}",
            self.config.model, self.config.api_key
        )
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn generation_config(&self) -> WireGenerationConfig {
        WireGenerationConfig {
            max_output_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Issue a POST and classify a non-success status into a typed error.
    async fn post(
        &self,
        url: &str,
        body: &super::types::WireRequest,
    ) -> GatewayResult<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .headers(Self::headers())
            .json(body)
            .send()
            .await
            .map_err(GatewayError::Http)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body_text = response.text().await.unwrap_or_default();
        let (message, code, retryable) = parse_api_error(&body_text, status.as_u16());
        error!(
            status = status.as_u16(),
            code = code.as_deref().unwrap_or("unknown"),
            retryable,
            "Gemini API error"
        );
        if status.as_u16() == 429 {
            return Err(GatewayError::RateLimited {
                retry_after_ms: retry_after.unwrap_or(0),
                message,
            });
        }
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
            code,
            retryable,
        })
    }
}

/// Parse a `retry-after` header value (delay seconds) into milliseconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|s| s * 1000)
}

/// Parse an API error response body.
fn parse_api_error(body: &str, status: u16) -> (String, Option<String>, bool) {
    let retryable = status == 429 || status >= 500;
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        let message = error["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_owned();
        let code = error["status"].as_str().map(String::from);
        (message, code, retryable)
    } else {
        (format!("HTTP {status}: {body}"), None, retryable)
    }
}

#[async_trait]
impl ChatGateway for GeminiGateway {
    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream(&self, request: &ChatRequest) -> GatewayResult<GatewayEventStream> {
        debug!(
            history_len = request.history.len(),
            tools = ?request.tools,
            "starting stream"
        );
        let body = to_wire_request(request, self.generation_config());
        let url = self.request_url("streamGenerateContent", true);
        let response = self.post(&url, &body).await?;

        let sse_lines = parse_sse_lines(response.bytes_stream());
        let event_stream = sse_lines
            .map(|line| match serde_json::from_str::<WireChunk>(&line) {
                Ok(chunk) => chunk_events(&chunk),
                Err(e) => {
                    warn!(error = %e, "failed to parse stream chunk");
                    Vec::new()
                }
            })
            .flat_map(stream::iter)
            .map(Ok);

        Ok(Box::pin(event_stream))
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(&self, request: &ChatRequest) -> GatewayResult<String> {
        let body = to_wire_request(request, self.generation_config());
        let url = self.request_url("generateContent", false);
        let response = self.post(&url, &body).await?;
        let chunk: WireChunk = response.json().await.map_err(GatewayError::Http)?;
        Ok(chunk_text(&chunk))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
