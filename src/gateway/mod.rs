//! Client for the Gemini `generateContent` endpoint.
//!
//! One call is one POST of `{contents:[{parts:[{text}]}]}` with the API key as the
//! `key` query parameter. The response must be JSON carrying
//! `candidates[0].content.parts[0].text`; anything else is an [`GatewayError::InvalidResponse`].

pub mod retry;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub use retry::RetryPolicy;

pub const DEFAULT_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
// total attempts, including the first
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY_SECS: u64 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("System configuration error: {0}")]
    Configuration(String),

    #[error("API request timeout, please try again later")]
    Timeout,

    #[error("API request failed: {0}")]
    Connection(String),

    #[error("API returned HTTP {status}")]
    Status { status: u16 },

    #[error("{0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Timeouts, connection failures, rate limiting and provider-side 5xx are worth
    /// another attempt. Malformed bodies and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Connection(_) => true,
            GatewayError::Status { status } => *status == 429 || (500..=599).contains(status),
            GatewayError::Configuration(_) | GatewayError::InvalidResponse(_) => false,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            http_proxy: None,
            https_proxy: None,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::new(MAX_RETRIES, Duration::from_secs(RETRY_DELAY_SECS)),
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(2)
            // ignore ambient proxy env, only the configured proxies apply
            .no_proxy();

        if let Some(url) = config.http_proxy.as_deref() {
            let proxy = reqwest::Proxy::http(url)
                .map_err(|e| GatewayError::Configuration(format!("invalid HTTP proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        if let Some(url) = config.https_proxy.as_deref() {
            let proxy = reqwest::Proxy::https(url)
                .map_err(|e| GatewayError::Configuration(format!("invalid HTTPS proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            api_url: config.api_url,
            retry: config.retry,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, api_key: &str, body: &GenerateContentRequest<'_>) -> Result<String, GatewayError> {
        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", api_key)])
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            return Err(GatewayError::InvalidResponse(format!(
                "API returned non-JSON response: {content_type}"
            )));
        }

        let bytes = response.bytes().await.map_err(classify_transport_error)?;
        let json: Value = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResponse(format!("Invalid API response body: {e}")))?;
        extract_text(&json)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GatewayError::Configuration(
                "Missing API key, please contact administrator".to_string(),
            ));
        };

        let body = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        let body = &body;

        let result = self
            .retry
            .run(
                move |_| self.attempt(api_key, body),
                GatewayError::is_transient,
            )
            .await;

        if let Err(err) = &result {
            log::error!("Gemini request failed: {err}");
        }
        result
    }
}

fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        // strip the URL so the API key never ends up in messages or logs
        GatewayError::Connection(err.without_url().to_string())
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a provider response.
pub fn extract_text(response: &Value) -> Result<String, GatewayError> {
    let Some(body) = response.as_object() else {
        return Err(GatewayError::InvalidResponse(
            "Invalid API response format".to_string(),
        ));
    };

    let first_candidate = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| {
            GatewayError::InvalidResponse("API response missing required data fields".to_string())
        })?;

    first_candidate
        .pointer("/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidResponse("API response missing text content".to_string()))
}
