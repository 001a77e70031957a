//! # Provider HTTP
//!
//! Thin wrapper around `reqwest` shared by the HTTP-based providers.
//! Every call returns the decoded JSON body or an [`ApiError`] that keeps
//! the provider's own error message and code for the payment log.

use checkout_core::ProviderResponse;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Request timeout for provider APIs
pub const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Transport(String),

    /// The provider answered with an error status
    #[error("HTTP {status}: {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
        body: serde_json::Value,
    },

    /// The body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Error body as returned by the provider, if any
    pub fn body(&self) -> serde_json::Value {
        match self {
            ApiError::Api { body, .. } => body.clone(),
            _ => serde_json::Value::Object(Default::default()),
        }
    }
}

impl From<&ApiError> for ProviderResponse {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Api {
                status,
                message,
                code,
                ..
            } => ProviderResponse::new(message.clone())
                .with_code(code.clone().unwrap_or_else(|| status.to_string())),
            other => ProviderResponse::new(other.to_string()),
        }
    }
}

/// Pulls `(message, code)` out of a provider error body
pub type ErrorExtractor = fn(&serde_json::Value) -> Option<(String, Option<String>)>;

/// HTTP client with the provider timeout applied; cheap to clone
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self { client }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// POST `application/x-www-form-urlencoded` with a bearer token
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: &str,
        bearer: &str,
        headers: &[(&'static str, String)],
        form: &T,
        extract: ErrorExtractor,
    ) -> Result<serde_json::Value, ApiError> {
        let request = with_headers(self.client.post(url).bearer_auth(bearer), headers).form(form);
        send(request, url, extract).await
    }

    /// GET with a bearer token
    pub async fn get(
        &self,
        url: &str,
        bearer: &str,
        headers: &[(&'static str, String)],
        extract: ErrorExtractor,
    ) -> Result<serde_json::Value, ApiError> {
        let request = with_headers(self.client.get(url).bearer_auth(bearer), headers);
        send(request, url, extract).await
    }

    /// POST a JSON body with basic auth
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        username: &str,
        password: &str,
        body: &T,
        extract: ErrorExtractor,
    ) -> Result<serde_json::Value, ApiError> {
        let request = self
            .client
            .post(url)
            .basic_auth(username, Some(password))
            .json(body);
        send(request, url, extract).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&'static str, String)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, value);
    }
    request
}

async fn send(
    request: RequestBuilder,
    url: &str,
    extract: ErrorExtractor,
) -> Result<serde_json::Value, ApiError> {
    debug!(url, "Provider request");

    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    if !status.is_success() {
        error!(url, status = status.as_u16(), "Provider API error");
        let body: serde_json::Value =
            serde_json::from_str(&text).unwrap_or_else(|_| serde_json::Value::String(text.clone()));
        let (message, code) = extract(&body).unwrap_or_else(|| (fallback_message(status, &text), None));
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
            code,
            body,
        });
    }

    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        status.to_string()
    } else {
        body.to_string()
    }
}
