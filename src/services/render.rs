//! Client for a headless rendering service.
//!
//! JS-heavy pages inject their comment widgets after load, so the static
//! HTML carries no form at all. When rendering is enabled, page fetches go
//! through an external render service that returns the settled DOM.

use std::time::Duration;

use reqwest::Client;

use crate::error::Result;
use crate::models::RenderConfig;

/// Client for the configured render service.
#[derive(Clone)]
pub struct RenderClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RenderClient {
    /// Build a client when an endpoint is configured.
    pub fn from_config(config: &RenderConfig, client: Client) -> Option<Self> {
        config.endpoint.as_ref().map(|endpoint| Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Fetch the rendered HTML of a page, holding `settle_ms` after load so
    /// late-mounting comment widgets are present in the returned DOM.
    pub async fn content(&self, url: &str, settle_ms: u64) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/content", self.endpoint))
            .timeout(Duration::from_secs(60))
            .json(&render_payload(url, settle_ms));

        if let Some(token) = &self.token {
            request = request.query(&[("token", token.as_str())]);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Request body for the render service. The settle wait runs in the browser,
/// before the DOM is captured.
fn render_payload(url: &str, settle_ms: u64) -> serde_json::Value {
    serde_json::json!({
        "url": url,
        "gotoOptions": { "waitUntil": "networkidle2" },
        "waitForTimeout": settle_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_endpoint() {
        let client = Client::new();
        assert!(RenderClient::from_config(&RenderConfig::default(), client.clone()).is_none());

        let config = RenderConfig {
            endpoint: Some("https://render.local/".into()),
            token: Some("secret".into()),
        };
        let render = RenderClient::from_config(&config, client).unwrap();
        assert_eq!(render.endpoint, "https://render.local");
    }

    #[test]
    fn test_render_payload_carries_settle_wait() {
        let payload = render_payload("https://example.com/post", 2500);
        assert_eq!(payload["url"], "https://example.com/post");
        assert_eq!(payload["waitForTimeout"], 2500);
        assert_eq!(payload["gotoOptions"]["waitUntil"], "networkidle2");
    }
}
