use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// Request body sent to the collaborator.
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(reqwest::multipart::Form),
}

impl Body {
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|err| ApiError::transport(format!("encode request body: {err}")))
    }
}

/// Thin JSON-over-HTTP layer. Knows nothing about sessions: callers pass the
/// bearer token they want attached.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;
        Ok(Self::with_client(client, &config.api_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Body,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let endpoint = self.endpoint(path);
        tracing::debug!(%method, path, authenticated = token.is_some(), "api call");

        let mut request = self.client.request(method.clone(), &endpoint);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request = match body {
            Body::Empty => request,
            Body::Json(value) => request.json(&value),
            Body::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await.map_err(|err| {
            tracing::debug!(%method, path, error = %err, "api call failed");
            ApiError::from(err)
        })?;

        let status = response.status();
        let raw = response.text().await?;
        let value = classify_response(status, &raw)?;
        serde_json::from_value(value).map_err(|err| {
            ApiError::transport(format!("unexpected response from {method} {path}: {err}"))
        })
    }
}

/// Maps an HTTP status plus raw body onto the error taxonomy.
///
/// A body that is not JSON is always a transport failure, whatever the
/// status, so proxy error pages never reach domain decoding.
pub fn classify_response(status: StatusCode, raw: &str) -> Result<serde_json::Value, ApiError> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            return Err(ApiError::transport(format!("non-JSON response ({status})")));
        }
    };

    if status.is_success() {
        return Ok(value);
    }

    let message = parse_error_message(&value).unwrap_or_else(|| "Request failed".to_owned());
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized { message });
    }
    Err(ApiError::domain(status, message))
}

fn parse_error_message(value: &serde_json::Value) -> Option<String> {
    let message = value.get("error")?.as_str()?.trim();
    if message.is_empty() {
        return None;
    }
    Some(message.to_owned())
}
