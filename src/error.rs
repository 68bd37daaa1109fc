use std::fmt;

use thiserror::Error;

/// Raised only for contract violations: configuration the crawler cannot run with.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid proxy url {proxy}: {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {name} url: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Coarse classification of a failed fetch, used for logging and for
/// deciding whether another attempt makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthRequired,
    Forbidden,
    ProxyAuthRequired,
    Timeout,
    RateLimited,
    UnavailableLegal,
    UpstreamError,
    WafBotProtection,
    NotHtml,
    TlsError,
    NetworkError,
    HttpError,
}

impl FailureKind {
    pub fn from_status(status: u16) -> FailureKind {
        match status {
            401 | 402 => FailureKind::AuthRequired,
            403 | 406 => FailureKind::Forbidden,
            407 => FailureKind::ProxyAuthRequired,
            408 | 504 => FailureKind::Timeout,
            429 => FailureKind::RateLimited,
            451 => FailureKind::UnavailableLegal,
            500 | 502 | 503 | 520..=524 => FailureKind::UpstreamError,
            _ => FailureKind::HttpError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AuthRequired => "auth_required",
            FailureKind::Forbidden => "forbidden",
            FailureKind::ProxyAuthRequired => "proxy_auth_required",
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::UnavailableLegal => "unavailable_legal",
            FailureKind::UpstreamError => "upstream_error",
            FailureKind::WafBotProtection => "waf_bot_protection",
            FailureKind::NotHtml => "not_html",
            FailureKind::TlsError => "tls_error",
            FailureKind::NetworkError => "network_error",
            FailureKind::HttpError => "http_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("http status {status} ({kind})")]
    Status { status: u16, kind: FailureKind },

    #[error("bot challenge page served for {0}")]
    Challenge(String),

    #[error("non-html response (content-type: {0})")]
    NotHtml(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("client error: {0}")]
    Client(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout => FailureKind::Timeout,
            FetchError::Network(_) | FetchError::InvalidUrl(_) | FetchError::Client(_) => {
                FailureKind::NetworkError
            }
            FetchError::Tls(_) => FailureKind::TlsError,
            FetchError::Status { kind, .. } => *kind,
            FetchError::Challenge(_) => FailureKind::WafBotProtection,
            FetchError::NotHtml(_) => FailureKind::NotHtml,
        }
    }

    /// Maps a transport error onto the taxonomy. TLS problems are reported by
    /// reqwest as connect errors, so the source chain is inspected for them.
    pub fn from_transport(err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        let chain = error_chain(&err);
        let lowered = chain.to_lowercase();
        if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl") {
            return FetchError::Tls(chain);
        }
        if err.is_builder() {
            return FetchError::Client(chain);
        }
        FetchError::Network(chain)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search endpoint returned status {0}")]
    Status(u16),

    #[error("unexpected search payload: {0}")]
    Payload(String),
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
