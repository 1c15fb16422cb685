//! POSTs generation payloads to the webhook and returns raw responses.

use async_trait::async_trait;
use imagegen_core::{GenerationRequest, ImageGenerator, RawResponse, TransportError, WebhookPayload};
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::config::WebhookConfig;

/// Value of the `Accept` header: the endpoint may answer JSON or text.
const ACCEPT_ANY: &str = "application/json, text/plain, */*";

/// Errors from the webhook client.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// HTTP client for the generation webhook.
pub struct WebhookClient {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookClient {
    /// Create a client with its own connection pool, honouring the
    /// configured timeout and user agent.
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    ///
    /// The per-call timeout from `config` is still applied to each request.
    pub fn with_client(client: reqwest::Client, config: WebhookConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Send one payload and read the whole response body as text.
    ///
    /// Non-2xx statuses are returned as ordinary responses.
    pub async fn post_payload(&self, payload: &WebhookPayload) -> Result<RawResponse, WebhookError> {
        tracing::debug!(
            url = %self.config.url,
            image_type = payload.image_type,
            detail_len = payload.image_detail.len(),
            "Sending generation request",
        );

        let response = self
            .client
            .post(&self.config.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_ANY)
            .timeout(self.config.timeout)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let reason = status.canonical_reason().map(str::to_string);
        let status = status.as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        tracing::debug!(status, body_len = body.len(), "Generation response received");

        Ok(RawResponse {
            status,
            reason,
            headers,
            body,
        })
    }

    fn transport_error(&self, err: WebhookError) -> TransportError {
        match err {
            WebhookError::Request(e) if e.is_timeout() => TransportError::Timeout(self.config.timeout),
            WebhookError::Request(e) => TransportError::Network(e.to_string()),
        }
    }
}

#[async_trait]
impl ImageGenerator for WebhookClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, TransportError> {
        self.post_payload(&request.payload())
            .await
            .map_err(|e| self.transport_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_does_not_panic() {
        let _client = WebhookClient::new(WebhookConfig::new("http://localhost:9/hook")).unwrap();
    }

    #[test]
    fn request_error_display() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }
}
