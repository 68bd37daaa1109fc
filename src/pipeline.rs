//! End-to-end evidence collection for one website.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::analyzer::{COMPETITOR_KEYWORDS, extract_keywords_from_content};
use crate::config::CrawlerConfig;
use crate::crawler::Crawler;
use crate::data_models::{CompetitorKeywordReport, CompetitorRecord};
use crate::error::ConfigError;
use crate::evidence::{BrandVisibilityItem, EvidenceInputs, EvidenceSummary, KeywordClusters};
use crate::search::SearchClient;
use crate::technical::collect_technical_evidence;
use crate::urls::normalize_url;

pub const TECH_DEADLINE: Duration = Duration::from_secs(25);

fn default_max_competitors() -> usize {
    5
}

fn default_max_keywords() -> usize {
    10
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvidenceRequest {
    pub url: String,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    /// Competitors to analyze; discovered through search when empty.
    #[serde(default)]
    pub competitor_urls: Vec<String>,
    #[serde(default)]
    pub use_js_render: Option<bool>,
    #[serde(default)]
    pub include_technical: bool,
    #[serde(default = "default_max_competitors")]
    pub max_competitors: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default)]
    pub keyword_clusters: Option<KeywordClusters>,
    #[serde(default)]
    pub brand_visibility: Option<Vec<BrandVisibilityItem>>,
}

impl EvidenceRequest {
    pub fn new(url: impl Into<String>) -> EvidenceRequest {
        EvidenceRequest {
            url: url.into(),
            target_keywords: Vec::new(),
            competitor_urls: Vec::new(),
            use_js_render: None,
            include_technical: false,
            max_competitors: default_max_competitors(),
            max_keywords: default_max_keywords(),
            keyword_clusters: None,
            brand_visibility: None,
        }
    }
}

/// Splits a comma separated keyword list, dropping blanks.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_site_url(raw: &str) -> String {
    normalize_url(raw).trim_end_matches('/').to_string()
}

async fn within<T, F>(stage: &'static str, deadline: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match timeout(deadline, fut).await {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(stage, ?deadline, "stage deadline expired");
            None
        }
    }
}

pub struct EvidencePipeline {
    crawler: Crawler,
    search: SearchClient,
}

impl EvidencePipeline {
    pub fn new(config: CrawlerConfig) -> Result<EvidencePipeline, ConfigError> {
        let search = SearchClient::new(config.search.clone())?;
        let crawler = Crawler::from_config(config)?;
        Ok(EvidencePipeline::from_parts(crawler, search))
    }

    pub fn from_parts(crawler: Crawler, search: SearchClient) -> EvidencePipeline {
        EvidencePipeline { crawler, search }
    }

    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    /// Crawls the site and its competitors, checks rankings and builds the
    /// bounded summary. Missing stages end up in `unavailable_sources`.
    pub async fn collect(&self, request: EvidenceRequest) -> EvidenceSummary {
        let url = normalize_site_url(&request.url);
        let config = self.crawler.config();
        tracing::info!(url = %url, "collecting evidence");

        let site = within(
            "site_crawl",
            config.batch_deadline,
            self.crawler.crawl_and_extract(&url, request.use_js_render),
        )
        .await
        .flatten();

        let search_deadline = self.search.config().batch_deadline;
        let competitor_urls = self.competitor_urls(&url, &request);
        let (rankings, competitor_urls) = tokio::join!(
            within(
                "keyword_rankings",
                search_deadline,
                self.search.analyze_keyword_rankings(
                    site.as_ref(),
                    &url,
                    &request.target_keywords,
                    request.max_keywords,
                ),
            ),
            within("competitor_discovery", search_deadline, competitor_urls),
        );
        let competitor_urls = competitor_urls.unwrap_or_default();

        let competitors: Vec<CompetitorRecord> = self
            .crawler
            .crawl_many(&competitor_urls)
            .await
            .into_iter()
            .flatten()
            .filter(|page| page.has_content())
            .map(CompetitorRecord::from_crawl)
            .collect();

        let competitor_keywords = if competitors.is_empty() {
            None
        } else {
            let site_keywords = site
                .as_ref()
                .map(|page| extract_keywords_from_content(page, COMPETITOR_KEYWORDS))
                .unwrap_or_default();
            within(
                "competitor_keywords",
                search_deadline,
                self.search
                    .analyze_competitor_keywords(&competitors, &site_keywords, request.max_keywords),
            )
            .await
            .map(|report| CompetitorKeywordReport {
                competitors_found: competitor_urls.len(),
                ..report
            })
        };

        let tech = if request.include_technical {
            let signals = within(
                "technical",
                TECH_DEADLINE,
                collect_technical_evidence(self.crawler.fetcher(), &url),
            )
            .await;
            Some(signals.ok_or_else(|| "timeout".to_string()))
        } else {
            None
        };

        let summary = EvidenceSummary::summarize(&EvidenceInputs {
            url: url.clone(),
            site,
            competitors,
            rankings,
            competitor_keywords,
            keyword_clusters: request.keyword_clusters,
            brand_visibility: request.brand_visibility,
            tech,
        });
        tracing::info!(
            url = %url,
            unavailable = ?summary.unavailable_sources(),
            "evidence collected"
        );
        summary
    }

    /// Caller-supplied competitors (normalized, deduplicated, capped), else
    /// search discovery.
    async fn competitor_urls(&self, url: &str, request: &EvidenceRequest) -> Vec<String> {
        if request.competitor_urls.is_empty() {
            return self.search.discover_competitors(url, request.max_competitors).await;
        }
        let mut urls: Vec<String> = Vec::new();
        for raw in &request.competitor_urls {
            if raw.trim().is_empty() {
                continue;
            }
            let normalized = normalize_site_url(raw);
            if !urls.contains(&normalized) {
                urls.push(normalized);
            }
        }
        urls.truncate(request.max_competitors);
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keywords() {
        assert_eq!(
            split_keywords(" kayak rental, ,canoe ,"),
            vec!["kayak rental", "canoe"]
        );
        assert!(split_keywords("").is_empty());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: EvidenceRequest = serde_json::from_str(r#"{"url":"example.com"}"#).unwrap();
        assert_eq!(request, EvidenceRequest::new("example.com"));
    }

    #[test]
    fn test_normalize_site_url() {
        assert_eq!(normalize_site_url("example.com/"), "https://example.com");
    }
}
