//! Webhook delivery.

use crate::error::ProviderError;
use async_trait::async_trait;
use darkroom_engine::node::HttpMethod;

/// Delivers webhook requests.
///
/// Split out from the dispatcher so tests can capture requests without
/// an HTTP server.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Sends one request. `body`, when present, is a JSON string.
    async fn deliver(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<String>,
    ) -> Result<(), ProviderError>;
}

/// reqwest-backed webhook transport.
pub struct HttpWebhookTransport {
    client: reqwest::Client,
}

impl HttpWebhookTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpWebhookTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<String>,
    ) -> Result<(), ProviderError> {
        let method = match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::DeliveryFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::WebhookStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
