use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

// .env is read once; the variables themselves are re-read on every from_env() call.
static DOTENV_LOADED: Lazy<bool> = Lazy::new(|| dotenv().is_ok());

pub const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

pub const RENDER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Plain HTTP fetch settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Total budget for one attempt, connect + body.
    pub timeout: Duration,
    /// Never larger than `timeout`.
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub max_redirects: usize,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            proxy: None,
            max_redirects: 10,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Headless rendering fallback settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub enabled: bool,
    pub timeout: Duration,
    /// Cap on the best-effort wait for network idle after DOM content loaded.
    pub network_idle_timeout: Duration,
    /// Base url of a Browserless-compatible `/content` endpoint.
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub user_agent: String,
    pub viewport: Viewport,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: Duration::from_secs(20),
            network_idle_timeout: Duration::from_secs(5),
            browserless_url: None,
            browserless_token: None,
            user_agent: RENDER_USER_AGENT.to_string(),
            viewport: Viewport {
                width: 1366,
                height: 768,
            },
        }
    }
}

/// Public search scraping settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub search_url: String,
    pub autocomplete_url: String,
    pub timeout: Duration,
    pub autocomplete_timeout: Duration,
    /// Depth of the result window scanned for a ranking match.
    pub max_results: usize,
    pub concurrency: usize,
    pub suggestion_concurrency: usize,
    /// Keywords looked up for autocomplete per competitor analysis.
    pub max_suggestion_lookups: usize,
    pub batch_deadline: Duration,
    pub retry: RetryPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_url: "https://html.duckduckgo.com/html/".to_string(),
            autocomplete_url: "https://www.google.com/complete/search".to_string(),
            timeout: Duration::from_secs(15),
            autocomplete_timeout: Duration::from_secs(10),
            max_results: 20,
            concurrency: 3,
            suggestion_concurrency: 5,
            max_suggestion_lookups: 30,
            batch_deadline: Duration::from_secs(45),
            retry: RetryPolicy::default().with_max_retries(1),
        }
    }
}

/// Everything the crawl/analyze pipeline needs, passed by value into each component.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerConfig {
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub search: SearchConfig,
    /// Visible text below this many characters counts as thin content.
    pub thin_content_chars: usize,
    pub competitor_concurrency: usize,
    pub batch_deadline: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            render: RenderConfig::default(),
            search: SearchConfig::default(),
            thin_content_chars: 350,
            competitor_concurrency: 3,
            batch_deadline: Duration::from_secs(30),
        }
    }
}

impl CrawlerConfig {
    /// Reads the current process environment (and `.env`, once).
    pub fn from_env() -> CrawlerConfig {
        let _ = *DOTENV_LOADED;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from any key/value source, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> CrawlerConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CrawlerConfig::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(secs) = parse_or_warn::<u64>("CRAWLER_TIMEOUT_SECONDS", get("CRAWLER_TIMEOUT_SECONDS")) {
            config.fetch.timeout = Duration::from_secs(secs.max(1));
            config.fetch.connect_timeout = config.fetch.connect_timeout.min(config.fetch.timeout);
            config.render.timeout = config.fetch.timeout * 2;
        }
        if let Some(retries) = parse_or_warn::<u32>("CRAWLER_MAX_RETRIES", get("CRAWLER_MAX_RETRIES")) {
            config.fetch.retry.max_retries = retries;
        }
        config.fetch.proxy = get("CRAWLER_HTTP_PROXY");

        if let Some(flag) = get("CRAWLER_ENABLE_JS_RENDER") {
            config.render.enabled = parse_flag(&flag);
        }
        if let Some(ms) = parse_or_warn::<u64>("CRAWLER_JS_TIMEOUT_MS", get("CRAWLER_JS_TIMEOUT_MS")) {
            config.render.timeout = Duration::from_millis(ms.max(1));
        }
        config.render.browserless_url = get("CRAWLER_BROWSERLESS_URL");
        config.render.browserless_token = get("CRAWLER_BROWSERLESS_TOKEN");

        if let Some(search_url) = get("CRAWLER_SEARCH_URL") {
            config.search.search_url = search_url;
        }
        if let Some(autocomplete_url) = get("CRAWLER_AUTOCOMPLETE_URL") {
            config.search.autocomplete_url = autocomplete_url;
        }
        if let Some(limit) =
            parse_or_warn::<usize>("CRAWLER_SEARCH_CONCURRENCY", get("CRAWLER_SEARCH_CONCURRENCY"))
        {
            config.search.concurrency = limit.clamp(1, 5);
        }

        config
    }
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn parse_or_warn<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparsable setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = CrawlerConfig::from_lookup(|_| None);
        assert_eq!(config, CrawlerConfig::default());
        assert_eq!(config.fetch.retry.max_retries, 2);
        assert!(!config.render.enabled);
        assert_eq!(config.thin_content_chars, 350);
    }

    #[test]
    fn test_reads_crawler_variables() {
        let config = CrawlerConfig::from_lookup(lookup(&[
            ("CRAWLER_TIMEOUT_SECONDS", "4"),
            ("CRAWLER_MAX_RETRIES", "0"),
            ("CRAWLER_HTTP_PROXY", "http://proxy.local:3128"),
            ("CRAWLER_ENABLE_JS_RENDER", "Yes"),
            ("CRAWLER_JS_TIMEOUT_MS", "15000"),
            ("CRAWLER_SEARCH_CONCURRENCY", "9"),
        ]));
        assert_eq!(config.fetch.timeout, Duration::from_secs(4));
        assert!(config.fetch.connect_timeout <= config.fetch.timeout);
        assert_eq!(config.fetch.retry.max_retries, 0);
        assert_eq!(config.fetch.proxy.as_deref(), Some("http://proxy.local:3128"));
        assert!(config.render.enabled);
        assert_eq!(config.render.timeout, Duration::from_millis(15000));
        assert_eq!(config.search.concurrency, 5);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = CrawlerConfig::from_lookup(lookup(&[
            ("CRAWLER_TIMEOUT_SECONDS", "soon"),
            ("CRAWLER_MAX_RETRIES", "-1"),
            ("CRAWLER_HTTP_PROXY", "   "),
        ]));
        assert_eq!(config.fetch.timeout, Duration::from_secs(10));
        assert_eq!(config.fetch.retry.max_retries, 2);
        assert_eq!(config.fetch.proxy, None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("nope"));
    }
}
