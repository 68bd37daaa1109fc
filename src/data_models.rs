use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Normalized view of one crawled page.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub h1: String,
    /// Visible body text, whitespace-collapsed and capped.
    pub content: String,
    pub headings: Vec<String>,
    pub features: Vec<String>,
    /// Number of distinct same-site links, not capped.
    pub internal_link_count: usize,
    pub internal_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_note: Option<String>,
}

impl CrawlResult {
    pub fn empty(url: impl Into<String>) -> CrawlResult {
        CrawlResult {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn visible_text_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty() || !self.title.is_empty() || !self.headings.is_empty()
    }
}

/// Raw result of a single HTTP exchange.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub url: String,
    pub status: Option<u16>,
    pub final_url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn failed(url: &str, error: impl Into<String>) -> FetchOutcome {
        FetchOutcome {
            url: url.to_string(),
            final_url: url.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeywordRanking {
    pub keyword: String,
    pub found: bool,
    /// 1-based position within the scanned result window.
    pub position: Option<usize>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompetitorRecord {
    #[serde(flatten)]
    pub page: CrawlResult,
    pub keywords: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeywordGap {
    pub keyword: String,
    pub count: usize,
    pub competitors_using: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HighVolumeKeyword {
    pub keyword: String,
    /// Number of autocomplete suggestions, a proxy for search interest.
    pub search_volume_indicator: usize,
    pub related_suggestions: Vec<String>,
    pub competitors_using: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingReport {
    pub extracted_keywords: Vec<String>,
    pub target_keywords: Vec<String>,
    pub rankings: Vec<KeywordRanking>,
    pub summary: String,
    pub found_count: usize,
    pub top_10_count: usize,
    pub top_3_count: usize,
    pub total_checked: usize,
}

impl RankingReport {
    pub fn from_rankings(
        extracted_keywords: Vec<String>,
        target_keywords: Vec<String>,
        rankings: Vec<KeywordRanking>,
    ) -> RankingReport {
        let found = |max: usize| {
            rankings
                .iter()
                .filter(|r| r.found && r.position.is_some_and(|p| p <= max))
                .count()
        };
        let found_count = rankings.iter().filter(|r| r.found).count();
        let top_10_count = found(10);
        let top_3_count = found(3);
        let total_checked = rankings.len();
        let summary = if total_checked == 0 {
            "No keywords found to analyze.".to_string()
        } else {
            format!(
                "Ranking Analysis: {found_count}/{total_checked} keywords found in search results. {top_10_count} in top 10, {top_3_count} in top 3."
            )
        };
        RankingReport {
            extracted_keywords,
            target_keywords,
            rankings,
            summary,
            found_count,
            top_10_count,
            top_3_count,
            total_checked,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompetitorKeywordReport {
    pub competitors_found: usize,
    pub competitors_crawled: usize,
    /// Competitor url -> its extracted keywords.
    pub competitor_keywords: BTreeMap<String, Vec<String>>,
    pub high_volume_keywords: Vec<HighVolumeKeyword>,
    pub keyword_gaps: Vec<KeywordGap>,
}
