//! Headless rendering fallback for pages whose content only appears after
//! client-side JavaScript has run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{RenderConfig, Viewport};
use crate::error::ConfigError;
use crate::extractor::looks_like_challenge;

/// Capability to turn a URL into post-JavaScript HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Rendered HTML, or `None` when navigation failed, timed out or hit a
    /// challenge page.
    async fn render(&self, url: &str, timeout: Duration) -> Option<String>;
}

/// Used when no headless browser is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRenderer;

#[async_trait]
impl PageRenderer for UnavailableRenderer {
    fn is_available(&self) -> bool {
        false
    }

    async fn render(&self, _url: &str, _timeout: Duration) -> Option<String> {
        None
    }
}

/// Headless Chrome behind a Browserless-compatible `/content` endpoint.
pub struct BrowserlessRenderer {
    client: reqwest::Client,
    endpoint: String,
    user_agent: String,
    viewport: Viewport,
    network_idle_timeout: Duration,
}

impl BrowserlessRenderer {
    pub fn new(base_url: &str, token: Option<&str>, config: &RenderConfig) -> Result<Self, ConfigError> {
        let mut endpoint = format!("{}/content", base_url.trim_end_matches('/'));
        if let Some(token) = token {
            endpoint.push_str(&format!("?token={token}"));
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint,
            user_agent: config.user_agent.clone(),
            viewport: config.viewport,
            network_idle_timeout: config.network_idle_timeout,
        })
    }

    fn request_body(&self, url: &str, timeout: Duration) -> serde_json::Value {
        // networkidle2 is best effort; bestAttempt returns the DOM once the
        // sub-timeout expires instead of failing the navigation.
        let idle = self.network_idle_timeout.min(timeout);
        json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": ["domcontentloaded", "networkidle2"],
                "timeout": idle.as_millis() as u64,
            },
            "bestAttempt": true,
            "userAgent": self.user_agent,
            "viewport": {
                "width": self.viewport.width,
                "height": self.viewport.height,
            },
        })
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    fn is_available(&self) -> bool {
        true
    }

    async fn render(&self, url: &str, timeout: Duration) -> Option<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&self.request_body(url, timeout))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url, error = %err, "render request failed");
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "renderer returned an error status");
            return None;
        }
        let html = match response.text().await {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(url, error = %err, "failed to read rendered html");
                return None;
            }
        };
        if looks_like_challenge(&html) {
            tracing::warn!(url, failure = "waf_bot_protection", "rendered page is a challenge");
            return None;
        }
        Some(html)
    }
}

/// Picks the renderer once, from configuration. A configured endpoint is always
/// wired up so a per-call override can render even when `enabled` is off;
/// `enabled` only sets the default for calls without an override.
pub fn renderer_from_config(config: &RenderConfig) -> Result<Arc<dyn PageRenderer>, ConfigError> {
    match &config.browserless_url {
        Some(base_url) => {
            let renderer =
                BrowserlessRenderer::new(base_url, config.browserless_token.as_deref(), config)?;
            tracing::info!(base_url = %base_url, default_on = config.enabled, "js rendering through browserless");
            Ok(Arc::new(renderer))
        }
        None => {
            if config.enabled {
                tracing::warn!("js rendering enabled but CRAWLER_BROWSERLESS_URL is not set");
            }
            Ok(Arc::new(UnavailableRenderer))
        }
    }
}
