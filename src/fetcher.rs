use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use url::Url;

use crate::config::{DEFAULT_USER_AGENTS, FetchConfig};
use crate::data_models::FetchOutcome;
use crate::error::{ConfigError, FailureKind, FetchError};
use crate::extractor::looks_like_challenge;
use crate::text::truncate_text;

/// Response headers worth keeping for technical evidence.
const KEPT_HEADERS: [&str; 9] = [
    "content-type",
    "cache-control",
    "content-security-policy",
    "x-robots-tag",
    "strict-transport-security",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
];

const MAX_HEADER_VALUE_CHARS: usize = 400;
/// How far into a body the `<html` marker is searched for when the content type is missing or wrong.
const HTML_SNIFF_CHARS: usize = 4096;

pub fn random_user_agent() -> &'static str {
    DEFAULT_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENTS[0])
}

fn browser_headers(user_agent: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

pub fn safe_header_subset(headers: &HeaderMap) -> BTreeMap<String, String> {
    KEPT_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            Some((name.to_string(), truncate_text(value, MAX_HEADER_VALUE_CHARS)))
        })
        .collect()
}

fn is_html(outcome: &FetchOutcome) -> bool {
    let content_type = outcome.content_type().to_ascii_lowercase();
    if content_type.contains("text/html") || content_type.contains("application/xhtml") {
        return true;
    }
    let head: String = outcome.raw_text.chars().take(HTML_SNIFF_CHARS).collect();
    head.to_ascii_lowercase().contains("<html")
}

/// Plain HTTP page fetcher with user-agent rotation, bounded retries and
/// challenge/non-HTML screening.
pub struct Fetcher {
    config: FetchConfig,
    proxy: Option<reqwest::Proxy>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Fetcher, ConfigError> {
        let proxy = match &config.proxy {
            Some(proxy) => Some(reqwest::Proxy::all(proxy.as_str()).map_err(|source| {
                ConfigError::InvalidProxy {
                    proxy: proxy.clone(),
                    source,
                }
            })?),
            None => None,
        };
        Ok(Fetcher { config, proxy })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    // One client per fetch: its cookie jar lives only as long as this fetch.
    fn build_client(&self) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout.min(self.config.timeout))
            .redirect(Policy::limited(self.config.max_redirects));
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.clone());
        }
        builder
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))
    }

    /// Returns the page HTML, or `None` for any expected failure.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        match self.fetch_html(url).await {
            Ok(html) => Some(html),
            Err(err) => {
                tracing::warn!(url, failure = %err.kind(), error = %err, "fetch failed");
                None
            }
        }
    }

    pub async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl(format!("{url}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        let client = self.build_client()?;

        self.config
            .retry
            .run(|attempt| {
                let client = &client;
                async move {
                    let outcome = send(client, url, random_user_agent()).await?;
                    tracing::debug!(url, attempt, status = ?outcome.status, "fetched");
                    into_html(outcome)
                }
            })
            .await
    }

    /// Single GET without retries or content screening; errors end up in the outcome.
    pub async fn probe(&self, url: &str) -> FetchOutcome {
        let client = match self.build_client() {
            Ok(client) => client,
            Err(err) => return FetchOutcome::failed(url, err.to_string()),
        };
        match send(&client, url, DEFAULT_USER_AGENTS[0]).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(url, error = %err, "probe failed");
                FetchOutcome::failed(url, err.to_string())
            }
        }
    }
}

async fn send(client: &Client, url: &str, user_agent: &'static str) -> Result<FetchOutcome, FetchError> {
    let response = client
        .get(url)
        .headers(browser_headers(user_agent))
        .send()
        .await
        .map_err(FetchError::from_transport)?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let headers = safe_header_subset(response.headers());
    let raw_text = response.text().await.map_err(FetchError::from_transport)?;

    Ok(FetchOutcome {
        url: url.to_string(),
        status: Some(status),
        final_url,
        headers,
        raw_text,
        error: None,
    })
}

fn into_html(outcome: FetchOutcome) -> Result<String, FetchError> {
    let status = outcome.status.unwrap_or_default();
    if !(200..300).contains(&status) {
        // challenge pages often come back as 403/503; retrying them is pointless
        if looks_like_challenge(&outcome.raw_text) {
            return Err(FetchError::Challenge(outcome.final_url));
        }
        return Err(FetchError::Status {
            status,
            kind: FailureKind::from_status(status),
        });
    }
    if !is_html(&outcome) {
        return Err(FetchError::NotHtml(outcome.content_type().to_string()));
    }
    if looks_like_challenge(&outcome.raw_text) {
        return Err(FetchError::Challenge(outcome.final_url));
    }
    Ok(outcome.raw_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: u16, content_type: &str, body: &str) -> FetchOutcome {
        let mut headers = BTreeMap::new();
        if !content_type.is_empty() {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        FetchOutcome {
            url: "https://example.com".to_string(),
            status: Some(status),
            final_url: "https://example.com/".to_string(),
            headers,
            raw_text: body.to_string(),
            error: None,
        }
    }

    #[test]
    fn test_html_passes() {
        let html = "<html><body><p>hello</p></body></html>";
        assert_eq!(into_html(outcome(200, "text/html; charset=utf-8", html)).unwrap(), html);
    }

    #[test]
    fn test_missing_content_type_sniffs_marker() {
        let html = "<!doctype html><html><body>hi</body></html>";
        assert!(into_html(outcome(200, "", html)).is_ok());
    }

    #[test]
    fn test_json_rejected() {
        let err = into_html(outcome(200, "application/json", r#"{"ok":true}"#)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotHtml);
    }

    #[test]
    fn test_challenge_on_error_status() {
        let body = "<html><head><title>Just a moment...</title></head><body>Checking your browser before accessing</body></html>";
        let err = into_html(outcome(503, "text/html", body)).unwrap_err();
        assert!(matches!(err, FetchError::Challenge(_)));
    }

    #[test]
    fn test_status_error_classified() {
        let err = into_html(outcome(429, "text/html", "slow down")).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status {
                status: 429,
                kind: FailureKind::RateLimited
            }
        ));
    }

    #[test]
    fn test_random_user_agent_from_pool() {
        for _ in 0..10 {
            assert!(DEFAULT_USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn test_safe_header_subset() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        headers.insert("set-cookie", HeaderValue::from_static("session=secret"));
        let subset = safe_header_subset(&headers);
        assert_eq!(subset.get("content-type").map(String::as_str), Some("text/html"));
        assert!(!subset.contains_key("set-cookie"));
    }
}
