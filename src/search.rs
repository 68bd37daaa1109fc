//! Public search scraping: keyword positions, competitor discovery and
//! autocomplete suggestions.
//!
//! The search endpoints have no API contract. Every call degrades to "no
//! data" on failure and callers must treat the output as a directional signal.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::analyzer::{compute_keyword_gaps, extract_keywords_from_content};
use crate::batch::fan_out;
use crate::config::SearchConfig;
use crate::data_models::{
    CompetitorKeywordReport, CompetitorRecord, CrawlResult, HighVolumeKeyword, KeywordRanking,
    RankingReport,
};
use crate::error::{ConfigError, SearchError};
use crate::fetcher::random_user_agent;
use crate::urls::{domain_of, is_same_site, normalize_url};

pub const MAX_AUTOCOMPLETE_SUGGESTIONS: usize = 10;
pub const MAX_RELATED_SUGGESTIONS: usize = 5;
pub const MAX_KEYWORD_GAPS: usize = 25;

/// Domains that show up for "alternatives" queries but are never competitors.
const NON_COMPETITOR_DOMAINS: [&str; 15] = [
    "wikipedia.org",
    "reddit.com",
    "quora.com",
    "youtube.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "linkedin.com",
    "pinterest.com",
    "instagram.com",
    "tiktok.com",
    "duckduckgo.com",
    "google.com",
    "bing.com",
    "yahoo.com",
];

static RESULT_TITLE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a[href]").expect("static selector must parse"));
static RESULT_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result-link[href]").expect("static selector must parse"));
static CLASSED_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[class][href]").expect("static selector must parse"));

/// Resolves a result anchor to the destination URL, unwrapping the
/// DuckDuckGo `uddg=` redirect.
pub fn decode_result_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.contains("uddg=") {
        // redirects are usually protocol-relative: //duckduckgo.com/l/?uddg=...
        let base = Url::parse("https://duckduckgo.com/").ok()?;
        let redirect = base.join(href).ok()?;
        return redirect
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
            .filter(|target| target.starts_with("http"));
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    None
}

/// Destination URLs of the organic results on a search results page, in page
/// order and without repeats.
pub fn parse_result_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let mut anchors: Vec<ElementRef<'_>> = document.select(&RESULT_TITLE_LINKS).collect();
    if anchors.is_empty() {
        anchors = document.select(&RESULT_LINKS).collect();
    }
    if anchors.is_empty() {
        anchors = document
            .select(&CLASSED_LINKS)
            .filter(|a| {
                a.value()
                    .attr("class")
                    .is_some_and(|class| class.to_ascii_lowercase().contains("result"))
            })
            .collect();
    }

    let mut seen = HashSet::new();
    anchors
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(decode_result_href)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn is_non_competitor(domain: &str) -> bool {
    NON_COMPETITOR_DOMAINS
        .iter()
        .any(|blocked| is_same_site(domain, blocked))
}

/// Caller-supplied targets first, then extracted keywords; repeats dropped
/// case-insensitively.
fn ranking_keywords(extracted: &[String], targets: &[String], max_keywords: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .chain(extracted)
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .take(max_keywords)
        .cloned()
        .collect()
}

fn parse_suggestions(payload: &Value) -> Result<Vec<String>, SearchError> {
    let suggestions = payload
        .get(1)
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Payload("missing suggestion list".to_string()))?;
    Ok(suggestions
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Array(parts) => parts.first().and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .take(MAX_AUTOCOMPLETE_SUGGESTIONS)
        .collect())
}

pub struct SearchClient {
    config: SearchConfig,
    client: Client,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Result<SearchClient, ConfigError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(SearchClient { config, client })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    async fn search_page(&self, query: &str) -> Result<String, SearchError> {
        self.config
            .retry
            .run(|attempt| async move {
                tracing::debug!(query, attempt, "querying search endpoint");
                let response = self
                    .client
                    .get(&self.config.search_url)
                    .query(&[("q", query)])
                    .header(USER_AGENT, random_user_agent())
                    .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
                    .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SearchError::Status(status.as_u16()));
                }
                Ok(response.text().await?)
            })
            .await
    }

    /// Result URLs for `query`, in ranking order.
    pub async fn search(&self, query: &str) -> Result<Vec<String>, SearchError> {
        let html = self.search_page(query).await?;
        Ok(parse_result_links(&html))
    }

    /// Position of `website_url` among the first `max_results` results.
    /// `None` only when the search itself failed.
    pub async fn check_keyword_ranking(&self, keyword: &str, website_url: &str) -> Option<KeywordRanking> {
        let website_url = normalize_url(website_url);
        let Some(target) = domain_of(&website_url) else {
            tracing::warn!(url = %website_url, "cannot check ranking for url without a host");
            return None;
        };

        let results = match self.search(keyword).await {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!(keyword, error = %err, "ranking check failed");
                return None;
            }
        };

        let hit = results
            .iter()
            .take(self.config.max_results)
            .enumerate()
            .find(|(_, url)| domain_of(url).is_some_and(|domain| is_same_site(&domain, &target)));

        Some(KeywordRanking {
            keyword: keyword.to_string(),
            found: hit.is_some(),
            position: hit.map(|(index, _)| index + 1),
            url: website_url.clone(),
            matched_url: hit.map(|(_, url)| url.clone()),
        })
    }

    /// Up to `max_results` competitor homepages, one per domain.
    pub async fn discover_competitors(&self, website_url: &str, max_results: usize) -> Vec<String> {
        let Some(target) = domain_of(&normalize_url(website_url)) else {
            return Vec::new();
        };
        let query = format!("{target} alternatives");
        let results = match self.search(&query).await {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!(%query, error = %err, "competitor discovery failed");
                return Vec::new();
            }
        };

        let mut domains = HashSet::new();
        let mut competitors = Vec::new();
        for url in results.into_iter().take(max_results * 3) {
            let Some(domain) = domain_of(&url) else {
                continue;
            };
            if is_same_site(&domain, &target) || is_same_site(&target, &domain) {
                continue;
            }
            if is_non_competitor(&domain) || !domains.insert(domain) {
                continue;
            }
            competitors.push(url);
            if competitors.len() >= max_results {
                break;
            }
        }
        tracing::info!(target = %target, found = competitors.len(), "competitors discovered");
        competitors
    }

    async fn fetch_suggestions(&self, keyword: &str) -> Result<Vec<String>, SearchError> {
        self.config
            .retry
            .run(|_| async move {
                let response = self
                    .client
                    .get(&self.config.autocomplete_url)
                    .query(&[("client", "firefox"), ("q", keyword)])
                    .timeout(self.config.autocomplete_timeout)
                    .header(USER_AGENT, random_user_agent())
                    .header(ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SearchError::Status(status.as_u16()));
                }
                // served as text/javascript, sometimes in a legacy charset
                let body = response.text().await?;
                let payload: Value = serde_json::from_str(&body)
                    .map_err(|err| SearchError::Payload(err.to_string()))?;
                parse_suggestions(&payload)
            })
            .await
    }

    /// Top autocomplete suggestions for `keyword`; empty on any failure.
    pub async fn autocomplete(&self, keyword: &str) -> Vec<String> {
        match self.fetch_suggestions(keyword).await {
            Ok(suggestions) => suggestions,
            Err(err) => {
                tracing::debug!(keyword, error = %err, "autocomplete lookup failed");
                Vec::new()
            }
        }
    }

    /// Checks positions for the page's own keywords plus `target_keywords`.
    pub async fn analyze_keyword_rankings(
        &self,
        page: Option<&CrawlResult>,
        website_url: &str,
        target_keywords: &[String],
        max_keywords: usize,
    ) -> RankingReport {
        let extracted = page
            .map(|page| extract_keywords_from_content(page, max_keywords))
            .unwrap_or_default();
        let targets: Vec<String> = target_keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let keywords = ranking_keywords(&extracted, &targets, max_keywords);
        if keywords.is_empty() {
            return RankingReport::from_rankings(extracted, targets, Vec::new());
        }

        tracing::info!(url = website_url, keywords = keywords.len(), "checking keyword rankings");
        let rankings = fan_out(
            keywords,
            self.config.concurrency,
            self.config.batch_deadline,
            |keyword| async move { self.check_keyword_ranking(&keyword, website_url).await },
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        RankingReport::from_rankings(extracted, targets, rankings)
    }

    /// Competitor keywords ranked by autocomplete interest, plus the gaps
    /// against `site_keywords`.
    pub async fn analyze_competitor_keywords(
        &self,
        competitors: &[CompetitorRecord],
        site_keywords: &[String],
        max_keywords: usize,
    ) -> CompetitorKeywordReport {
        let competitor_keywords: BTreeMap<String, Vec<String>> = competitors
            .iter()
            .map(|record| (record.page.url.clone(), record.keywords.clone()))
            .collect();

        let mut seen = HashSet::new();
        let lookups: Vec<String> = competitors
            .iter()
            .flat_map(|record| record.keywords.iter().map(String::as_str))
            .filter(|keyword| seen.insert(*keyword))
            .take(self.config.max_suggestion_lookups)
            .map(str::to_string)
            .collect();

        tracing::info!(keywords = lookups.len(), "looking up autocomplete suggestions");
        let mut volumes: Vec<(String, Vec<String>)> = fan_out(
            lookups,
            self.config.suggestion_concurrency,
            self.config.batch_deadline,
            |keyword| async move {
                let suggestions = self.autocomplete(&keyword).await;
                Some((keyword, suggestions))
            },
        )
        .await
        .into_iter()
        .flatten()
        .collect();
        volumes.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let high_volume_keywords = volumes
            .into_iter()
            .take(max_keywords)
            .map(|(keyword, suggestions)| HighVolumeKeyword {
                competitors_using: competitor_keywords
                    .iter()
                    .filter(|(_, keywords)| keywords.contains(&keyword))
                    .map(|(url, _)| url.clone())
                    .collect(),
                search_volume_indicator: suggestions.len(),
                related_suggestions: suggestions.into_iter().take(MAX_RELATED_SUGGESTIONS).collect(),
                keyword,
            })
            .collect();

        CompetitorKeywordReport {
            competitors_found: competitors.len(),
            competitors_crawled: competitors.len(),
            keyword_gaps: compute_keyword_gaps(site_keywords, &competitor_keywords, MAX_KEYWORD_GAPS),
            competitor_keywords,
            high_volume_keywords,
        }
    }
}
