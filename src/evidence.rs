//! Bounded evidence objects handed to the report/prompt layer.
//!
//! Every evidence kind owns its caps: strings from crawled pages, search
//! results or external collaborators go through [`truncate_text`] and every
//! list is capped before it lands in an [`EvidenceSummary`]. A source that
//! could not be collected is marked `available: false` and listed in
//! `unavailable_sources`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyzer::brand_name;
use crate::data_models::{
    CompetitorKeywordReport, CompetitorRecord, CrawlResult, HighVolumeKeyword, KeywordGap,
    RankingReport,
};
use crate::technical::TechnicalSignals;
use crate::text::{cap_list, title_case, truncate_text};

pub const MAX_TITLE_CHARS: usize = 160;
pub const MAX_DESCRIPTION_CHARS: usize = 400;
pub const MAX_H1_CHARS: usize = 200;
pub const MAX_HEADING_CHARS: usize = 200;
pub const MAX_SITE_HEADINGS: usize = 10;
pub const MAX_SITE_FEATURES: usize = 12;
pub const MAX_FEATURE_CHARS: usize = 200;
pub const MAX_SITE_INTERNAL_LINKS: usize = 8;
pub const MAX_URL_CHARS: usize = 400;
pub const MAX_EXCERPT_CHARS: usize = 1200;
pub const MAX_QUOTES: usize = 3;
pub const MIN_QUOTE_CHARS: usize = 40;
pub const MAX_QUOTE_CHARS: usize = 220;

pub const MAX_COMPETITORS: usize = 6;
pub const MAX_COMPETITOR_HEADINGS: usize = 8;
pub const MAX_COMPETITOR_KEYWORDS: usize = 15;

pub const MAX_KEYWORD_CHARS: usize = 100;
pub const MAX_RANKINGS: usize = 15;
pub const MAX_KEYWORD_LIST: usize = 15;
pub const MAX_SUMMARY_CHARS: usize = 300;

pub const MAX_KEYWORD_GAPS: usize = 25;
pub const MAX_HIGH_VOLUME: usize = 15;
pub const MAX_SUGGESTIONS: usize = 5;
pub const MAX_COMPETITORS_USING: usize = 5;

pub const MAX_CLUSTER_BUCKETS: usize = 12;
pub const MAX_CLUSTER_KEYWORDS: usize = 10;

pub const MAX_BRAND_ITEMS: usize = 20;
const MAX_BRAND_TITLE_CHARS: usize = 180;
const MAX_BRAND_DATE_CHARS: usize = 50;
const MAX_BRAND_EXCERPT_CHARS: usize = 320;
const MAX_CLAIM_TYPE_CHARS: usize = 40;
const MAX_ID_CHARS: usize = 64;
const MAX_META_JSON_CHARS: usize = 400;

const MAX_ERROR_CHARS: usize = 200;

const BRAND_SOURCES: [&str; 12] = [
    "google_news",
    "google_news_rss",
    "github",
    "reddit",
    "hackernews",
    "wikipedia",
    "trustpilot",
    "g2",
    "capterra",
    "producthunt",
    "pagespeed_insights",
    "builtwith",
];
const BRAND_SIGNAL_TYPES: [&str; 6] = [
    "press",
    "community",
    "dev",
    "reputation",
    "performance",
    "tech_stack",
];
const BRAND_CONFIDENCE: [&str; 4] = ["api", "rss", "best_effort", ""];

/// Evidence sources that may be missing from a summary.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Site,
    Competitors,
    KeywordRankings,
    CompetitorKeywords,
    KeywordClusters,
    BrandVisibility,
    Tech,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub quote: String,
    pub source: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteEvidence {
    pub available: bool,
    pub url: String,
    pub title: String,
    pub description: String,
    pub h1: String,
    pub headings: Vec<String>,
    pub features: Vec<String>,
    pub internal_link_count: usize,
    pub internal_links: Vec<String>,
    pub content_excerpt: String,
    pub quotes: Vec<Quote>,
}

/// Splits after `.`, `!` or `?` when followed by whitespace.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut after_terminator = false;
    for c in text.trim().chars() {
        if after_terminator && c.is_whitespace() {
            let sentence = current.trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            current.clear();
            after_terminator = false;
            continue;
        }
        after_terminator = matches!(c, '.' | '!' | '?');
        current.push(c);
    }
    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

fn extract_quotes(sources: &[&str], source_url: &str) -> Vec<Quote> {
    let combined = sources
        .iter()
        .filter(|text| !text.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    sentences(&combined)
        .into_iter()
        .take(MAX_QUOTES * 2)
        .filter(|sentence| sentence.chars().count() >= MIN_QUOTE_CHARS)
        .take(MAX_QUOTES)
        .map(|sentence| Quote {
            quote: truncate_text(&sentence, MAX_QUOTE_CHARS),
            source: truncate_text(source_url, MAX_URL_CHARS),
        })
        .collect()
}

impl SiteEvidence {
    pub fn unavailable(url: &str) -> SiteEvidence {
        SiteEvidence {
            available: false,
            url: truncate_text(url, MAX_URL_CHARS),
            ..Default::default()
        }
    }

    pub fn from_crawl(page: &CrawlResult, fallback_url: &str) -> SiteEvidence {
        let url = if page.url.is_empty() {
            fallback_url
        } else {
            page.url.as_str()
        };
        let headings = page
            .headings
            .iter()
            .take(MAX_SITE_HEADINGS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let quote_sources = [
            page.title.as_str(),
            page.description.as_str(),
            page.h1.as_str(),
            headings.as_str(),
            page.content.as_str(),
        ];

        SiteEvidence {
            available: true,
            url: truncate_text(url, MAX_URL_CHARS),
            title: truncate_text(&page.title, MAX_TITLE_CHARS),
            description: truncate_text(&page.description, MAX_DESCRIPTION_CHARS),
            h1: truncate_text(&page.h1, MAX_H1_CHARS),
            headings: cap_list(&page.headings, MAX_SITE_HEADINGS, MAX_HEADING_CHARS),
            features: cap_list(&page.features, MAX_SITE_FEATURES, MAX_FEATURE_CHARS),
            internal_link_count: page.internal_link_count,
            internal_links: cap_list(&page.internal_links, MAX_SITE_INTERNAL_LINKS, MAX_URL_CHARS),
            content_excerpt: truncate_text(&page.content, MAX_EXCERPT_CHARS),
            quotes: extract_quotes(&quote_sources, url),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompetitorEvidence {
    pub url: String,
    pub title: String,
    pub h1: String,
    pub description: String,
    pub headings: Vec<String>,
    pub keywords: Vec<String>,
}

impl CompetitorEvidence {
    pub fn from_record(record: &CompetitorRecord) -> CompetitorEvidence {
        let page = &record.page;
        CompetitorEvidence {
            url: truncate_text(&page.url, MAX_URL_CHARS),
            title: truncate_text(&page.title, MAX_TITLE_CHARS),
            h1: truncate_text(&page.h1, MAX_H1_CHARS),
            description: truncate_text(&page.description, MAX_DESCRIPTION_CHARS),
            headings: cap_list(&page.headings, MAX_COMPETITOR_HEADINGS, MAX_HEADING_CHARS),
            keywords: cap_list(&record.keywords, MAX_COMPETITOR_KEYWORDS, MAX_KEYWORD_CHARS),
        }
    }

    pub fn from_records(records: &[CompetitorRecord]) -> Vec<CompetitorEvidence> {
        records
            .iter()
            .take(MAX_COMPETITORS)
            .map(CompetitorEvidence::from_record)
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RankingEvidence {
    pub keyword: String,
    pub found: bool,
    pub position: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordEvidence {
    pub available: bool,
    pub summary: String,
    pub extracted_keywords: Vec<String>,
    pub target_keywords: Vec<String>,
    pub rankings: Vec<RankingEvidence>,
    pub found_count: usize,
    pub top_10_count: usize,
    pub top_3_count: usize,
    pub total_checked: usize,
}

impl KeywordEvidence {
    pub fn from_report(report: &RankingReport) -> KeywordEvidence {
        KeywordEvidence {
            available: true,
            summary: truncate_text(&report.summary, MAX_SUMMARY_CHARS),
            extracted_keywords: cap_list(&report.extracted_keywords, MAX_KEYWORD_LIST, MAX_KEYWORD_CHARS),
            target_keywords: cap_list(&report.target_keywords, MAX_KEYWORD_LIST, MAX_KEYWORD_CHARS),
            rankings: report
                .rankings
                .iter()
                .take(MAX_RANKINGS)
                .map(|ranking| RankingEvidence {
                    keyword: truncate_text(&ranking.keyword, MAX_KEYWORD_CHARS),
                    found: ranking.found,
                    position: ranking.position,
                })
                .collect(),
            found_count: report.found_count,
            top_10_count: report.top_10_count,
            top_3_count: report.top_3_count,
            total_checked: report.total_checked,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompetitorKeywordEvidence {
    pub available: bool,
    pub competitors_analyzed: usize,
    pub competitor_urls: Vec<String>,
    pub keyword_gaps: Vec<KeywordGap>,
    pub high_volume_keywords: Vec<HighVolumeKeyword>,
}

impl CompetitorKeywordEvidence {
    pub fn from_report(report: &CompetitorKeywordReport) -> CompetitorKeywordEvidence {
        let competitor_urls: Vec<String> = report.competitor_keywords.keys().cloned().collect();
        let competitors_analyzed = if report.competitors_crawled > 0 {
            report.competitors_crawled
        } else {
            report.competitors_found
        };

        CompetitorKeywordEvidence {
            available: true,
            competitors_analyzed,
            competitor_urls: cap_list(&competitor_urls, MAX_COMPETITORS, MAX_URL_CHARS),
            keyword_gaps: report
                .keyword_gaps
                .iter()
                .take(MAX_KEYWORD_GAPS)
                .map(|gap| KeywordGap {
                    keyword: truncate_text(&gap.keyword, MAX_KEYWORD_CHARS),
                    count: gap.count,
                    competitors_using: cap_list(&gap.competitors_using, MAX_COMPETITORS_USING, MAX_URL_CHARS),
                })
                .collect(),
            high_volume_keywords: report
                .high_volume_keywords
                .iter()
                .take(MAX_HIGH_VOLUME)
                .map(|keyword| HighVolumeKeyword {
                    keyword: truncate_text(&keyword.keyword, MAX_KEYWORD_CHARS),
                    search_volume_indicator: keyword.search_volume_indicator,
                    related_suggestions: cap_list(&keyword.related_suggestions, MAX_SUGGESTIONS, MAX_KEYWORD_CHARS),
                    competitors_using: cap_list(&keyword.competitors_using, MAX_COMPETITORS_USING, MAX_URL_CHARS),
                })
                .collect(),
        }
    }
}

/// Keyword clusters produced by an external collaborator, keyed by bucket
/// name (e.g. `commercial`, `low_difficulty`, `high_opportunity`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordClusters {
    #[serde(default)]
    pub intent: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub difficulty: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub opportunity: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordClusterEvidence {
    pub available: bool,
    pub intent: BTreeMap<String, Vec<String>>,
    pub difficulty: BTreeMap<String, Vec<String>>,
    pub opportunity: BTreeMap<String, Vec<String>>,
}

fn cap_buckets(buckets: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    buckets
        .iter()
        .take(MAX_CLUSTER_BUCKETS)
        .map(|(name, keywords)| {
            (
                truncate_text(name, MAX_CLAIM_TYPE_CHARS),
                cap_list(keywords, MAX_CLUSTER_KEYWORDS, MAX_KEYWORD_CHARS),
            )
        })
        .collect()
}

impl KeywordClusterEvidence {
    pub fn from_clusters(clusters: &KeywordClusters) -> KeywordClusterEvidence {
        KeywordClusterEvidence {
            available: true,
            intent: cap_buckets(&clusters.intent),
            difficulty: cap_buckets(&clusters.difficulty),
            opportunity: cap_buckets(&clusters.opportunity),
        }
    }

    fn intent_bucket(&self, name: &str) -> Vec<String> {
        self.intent.get(name).cloned().unwrap_or_default()
    }
}

/// One brand mention as delivered by the brand-visibility collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BrandVisibilityItem {
    pub evidence_id: String,
    pub source: String,
    pub url: String,
    pub title: String,
    pub date: String,
    pub excerpt: String,
    pub snippet: String,
    pub claim_type: String,
    pub signal_type: String,
    pub confidence: String,
    pub meta: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BrandVisibilityEvidence {
    pub evidence_id: String,
    pub source: String,
    pub url: String,
    pub title: String,
    pub date: String,
    pub excerpt: String,
    pub claim_type: String,
    pub signal_type: String,
    pub confidence: String,
    pub meta: Value,
}

impl BrandVisibilityEvidence {
    /// Bounded copy of an allow-listed item; `None` when the item has no url
    /// or comes from an unknown source, signal type or confidence level.
    pub fn from_item(item: &BrandVisibilityItem) -> Option<BrandVisibilityEvidence> {
        let source = item.source.trim();
        let url = item.url.trim();
        let signal_type = item.signal_type.trim();
        let confidence = item.confidence.trim();

        if url.is_empty() {
            return None;
        }
        if !source.is_empty() && !BRAND_SOURCES.contains(&source) {
            return None;
        }
        if !signal_type.is_empty() && !BRAND_SIGNAL_TYPES.contains(&signal_type) {
            return None;
        }
        if !BRAND_CONFIDENCE.contains(&confidence) {
            return None;
        }

        let excerpt = if item.excerpt.is_empty() {
            &item.snippet
        } else {
            &item.excerpt
        };
        let claim_type = if item.claim_type.is_empty() {
            signal_type
        } else {
            item.claim_type.as_str()
        };
        // meta is free-form; keep it only while it stays small
        let meta = match &item.meta {
            Value::Object(_) if item.meta.to_string().chars().count() <= MAX_META_JSON_CHARS => {
                item.meta.clone()
            }
            _ => Value::Object(Default::default()),
        };

        Some(BrandVisibilityEvidence {
            evidence_id: truncate_text(&item.evidence_id, MAX_ID_CHARS),
            source: source.to_string(),
            url: truncate_text(url, MAX_URL_CHARS),
            title: truncate_text(&item.title, MAX_BRAND_TITLE_CHARS),
            date: truncate_text(&item.date, MAX_BRAND_DATE_CHARS),
            excerpt: truncate_text(excerpt, MAX_BRAND_EXCERPT_CHARS),
            claim_type: truncate_text(claim_type, MAX_CLAIM_TYPE_CHARS),
            signal_type: signal_type.to_string(),
            confidence: confidence.to_string(),
            meta,
        })
    }

    pub fn filter(items: &[BrandVisibilityItem]) -> Vec<BrandVisibilityEvidence> {
        items
            .iter()
            .filter_map(BrandVisibilityEvidence::from_item)
            .take(MAX_BRAND_ITEMS)
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TechEvidence {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub signals: Option<TechnicalSignals>,
}

impl TechEvidence {
    pub fn collected(signals: TechnicalSignals) -> TechEvidence {
        TechEvidence {
            available: true,
            error: None,
            signals: Some(signals),
        }
    }

    pub fn failed(error: &str) -> TechEvidence {
        TechEvidence {
            available: false,
            error: Some(truncate_text(error, MAX_ERROR_CHARS)),
            signals: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LandingPageIdea {
    pub keyword: String,
    pub suggested_slug: String,
    pub title_example: String,
}

/// Content strategy hints derived from the other evidence kinds.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyEvidence {
    pub brand_name: String,
    pub priority_keywords: Vec<String>,
    pub content_gaps: Vec<String>,
    pub positioning_candidates: Vec<String>,
    pub landing_page_ideas: Vec<LandingPageIdea>,
    pub faq_questions: Vec<String>,
    pub commercial_intent_keywords: Vec<String>,
    pub transactional_intent_keywords: Vec<String>,
    pub competitor_title_patterns: Vec<String>,
    pub competitor_heading_patterns: Vec<String>,
    pub site_internal_links_sample: Vec<String>,
    pub site_internal_link_count: usize,
}

const MAX_PRIORITY_KEYWORDS: usize = 15;
const PRIORITY_CANDIDATES: usize = 20;
const MAX_CONTENT_GAPS: usize = 10;
const MAX_POSITIONING: usize = 6;
const MAX_LANDING_PAGES: usize = 8;
const MAX_FAQ: usize = 8;
const FAQ_CANDIDATES: usize = 12;
const MAX_INTENT_KEYWORDS: usize = 10;
const MAX_TITLE_PATTERNS: usize = 6;
const MAX_HEADING_PATTERNS: usize = 8;
const MAX_LINK_SAMPLE: usize = 6;
const MAX_SLUG_CHARS: usize = 60;
const MAX_FAQ_CHARS: usize = 120;

/// Trims items, drops empties and case-insensitive repeats.
fn dedupe_case<I, S>(items: I, max_items: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.as_ref().trim();
        if item.is_empty() || !seen.insert(item.to_lowercase()) {
            continue;
        }
        out.push(item.to_string());
        if out.len() >= max_items {
            break;
        }
    }
    out
}

/// Lowercase ASCII slug, runs of anything else collapsed into `-`.
pub fn slugify_keyword(keyword: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in keyword.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.len() > MAX_SLUG_CHARS {
        slug.truncate(MAX_SLUG_CHARS);
        slug.truncate(slug.trim_end_matches('-').len());
    }
    slug
}

impl StrategyEvidence {
    pub fn derive(
        brand_name: &str,
        site: &SiteEvidence,
        competitors: &[CompetitorEvidence],
        rankings: &KeywordEvidence,
        competitor_keywords: &CompetitorKeywordEvidence,
        clusters: &KeywordClusterEvidence,
    ) -> StrategyEvidence {
        let high_volume: Vec<&str> = competitor_keywords
            .high_volume_keywords
            .iter()
            .map(|k| k.keyword.as_str())
            .filter(|k| !k.is_empty())
            .collect();
        let suggestions: Vec<&str> = competitor_keywords
            .high_volume_keywords
            .iter()
            .flat_map(|k| k.related_suggestions.iter().map(String::as_str))
            .collect();

        let priority_keywords = dedupe_case(
            rankings
                .extracted_keywords
                .iter()
                .map(String::as_str)
                .chain(rankings.target_keywords.iter().map(String::as_str))
                .chain(high_volume.iter().copied())
                .chain(suggestions.iter().copied()),
            PRIORITY_CANDIDATES,
        );
        let phrase_keywords: Vec<String> = priority_keywords
            .iter()
            .filter(|k| k.contains(' '))
            .take(MAX_CONTENT_GAPS)
            .cloned()
            .collect();

        let extracted: HashSet<String> = rankings
            .extracted_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let content_gaps = dedupe_case(
            high_volume
                .iter()
                .filter(|k| !extracted.contains(&k.to_lowercase())),
            MAX_CONTENT_GAPS,
        );

        let landing_seeds: Vec<String> = if !content_gaps.is_empty() {
            content_gaps.clone()
        } else if !phrase_keywords.is_empty() {
            phrase_keywords.clone()
        } else {
            priority_keywords.iter().take(MAX_LANDING_PAGES).cloned().collect()
        };
        let landing_page_ideas = landing_seeds
            .iter()
            .take(MAX_LANDING_PAGES)
            .filter_map(|keyword| {
                let slug = slugify_keyword(keyword);
                if slug.is_empty() {
                    return None;
                }
                let title_example = if brand_name.is_empty() {
                    title_case(keyword)
                } else {
                    format!("{} | {brand_name}", title_case(keyword))
                };
                Some(LandingPageIdea {
                    keyword: keyword.clone(),
                    suggested_slug: format!("/{slug}"),
                    title_example: truncate_text(&title_example, MAX_TITLE_CHARS),
                })
            })
            .collect();

        let faq_questions = dedupe_case(
            suggestions.iter().take(FAQ_CANDIDATES).map(|s| {
                if s.contains('?') {
                    s.to_string()
                } else {
                    format!("What is {s}?")
                }
            }),
            MAX_FAQ,
        );

        let competitor_title_patterns = dedupe_exact(
            competitors
                .iter()
                .take(MAX_COMPETITORS)
                .map(|c| truncate_text(&c.title, MAX_TITLE_CHARS)),
            MAX_TITLE_PATTERNS,
        );
        let competitor_heading_patterns = dedupe_exact(
            competitors
                .iter()
                .take(MAX_COMPETITORS)
                .map(|c| truncate_text(&c.h1, MAX_TITLE_CHARS)),
            MAX_HEADING_PATTERNS,
        );

        let mut commercial = clusters.intent_bucket("commercial");
        commercial.truncate(MAX_INTENT_KEYWORDS);
        let mut transactional = clusters.intent_bucket("transactional");
        transactional.truncate(MAX_INTENT_KEYWORDS);

        StrategyEvidence {
            brand_name: truncate_text(brand_name, MAX_TITLE_CHARS),
            priority_keywords: priority_keywords
                .into_iter()
                .take(MAX_PRIORITY_KEYWORDS)
                .map(|k| truncate_text(&k, MAX_KEYWORD_CHARS))
                .collect(),
            content_gaps,
            positioning_candidates: phrase_keywords.into_iter().take(MAX_POSITIONING).collect(),
            landing_page_ideas,
            faq_questions: faq_questions
                .into_iter()
                .map(|q| truncate_text(&q, MAX_FAQ_CHARS))
                .collect(),
            commercial_intent_keywords: commercial,
            transactional_intent_keywords: transactional,
            competitor_title_patterns,
            competitor_heading_patterns,
            site_internal_links_sample: site
                .internal_links
                .iter()
                .take(MAX_LINK_SAMPLE)
                .cloned()
                .collect(),
            site_internal_link_count: site.internal_link_count,
        }
    }
}

fn dedupe_exact<I: IntoIterator<Item = String>>(items: I, max_items: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
        if out.len() >= max_items {
            break;
        }
    }
    out
}

/// Everything gathered for one report; `None` means the source was not
/// collected or failed.
#[derive(Debug, Clone, Default)]
pub struct EvidenceInputs {
    pub url: String,
    pub site: Option<CrawlResult>,
    pub competitors: Vec<CompetitorRecord>,
    pub rankings: Option<RankingReport>,
    pub competitor_keywords: Option<CompetitorKeywordReport>,
    pub keyword_clusters: Option<KeywordClusters>,
    pub brand_visibility: Option<Vec<BrandVisibilityItem>>,
    /// `None` when technical signals were not requested.
    pub tech: Option<Result<TechnicalSignals, String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EvidenceSummary {
    pub url: String,
    pub brand_name: String,
    pub site: SiteEvidence,
    pub competitors: Vec<CompetitorEvidence>,
    pub keyword_rankings: KeywordEvidence,
    pub competitor_keywords: CompetitorKeywordEvidence,
    pub keyword_clusters: KeywordClusterEvidence,
    pub brand_visibility_evidence: Vec<BrandVisibilityEvidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<TechEvidence>,
    pub strategy: StrategyEvidence,
    pub unavailable_sources: Vec<EvidenceSource>,
}

impl EvidenceSummary {
    /// Pure: bounds every input and records which sources are missing.
    pub fn summarize(inputs: &EvidenceInputs) -> EvidenceSummary {
        let url = truncate_text(&inputs.url, MAX_URL_CHARS);
        let mut unavailable = Vec::new();

        let site = match &inputs.site {
            Some(page) => SiteEvidence::from_crawl(page, &inputs.url),
            None => {
                unavailable.push(EvidenceSource::Site);
                SiteEvidence::unavailable(&inputs.url)
            }
        };

        if inputs.competitors.is_empty() {
            unavailable.push(EvidenceSource::Competitors);
        }
        let competitors = CompetitorEvidence::from_records(&inputs.competitors);

        let keyword_rankings = match &inputs.rankings {
            Some(report) => KeywordEvidence::from_report(report),
            None => {
                unavailable.push(EvidenceSource::KeywordRankings);
                KeywordEvidence::default()
            }
        };

        let competitor_keywords = match &inputs.competitor_keywords {
            Some(report) => CompetitorKeywordEvidence::from_report(report),
            None => {
                unavailable.push(EvidenceSource::CompetitorKeywords);
                CompetitorKeywordEvidence::default()
            }
        };

        let keyword_clusters = match &inputs.keyword_clusters {
            Some(clusters) => KeywordClusterEvidence::from_clusters(clusters),
            None => {
                unavailable.push(EvidenceSource::KeywordClusters);
                KeywordClusterEvidence::default()
            }
        };

        let brand_visibility_evidence = match &inputs.brand_visibility {
            Some(items) => BrandVisibilityEvidence::filter(items),
            None => {
                unavailable.push(EvidenceSource::BrandVisibility);
                Vec::new()
            }
        };

        let tech = inputs.tech.as_ref().map(|tech| match tech {
            Ok(signals) => TechEvidence::collected(signals.clone()),
            Err(error) => {
                unavailable.push(EvidenceSource::Tech);
                TechEvidence::failed(error)
            }
        });

        let brand = brand_name(&inputs.url, inputs.site.as_ref());
        let strategy = StrategyEvidence::derive(
            &brand,
            &site,
            &competitors,
            &keyword_rankings,
            &competitor_keywords,
            &keyword_clusters,
        );

        EvidenceSummary {
            url,
            brand_name: truncate_text(&brand, MAX_TITLE_CHARS),
            site,
            competitors,
            keyword_rankings,
            competitor_keywords,
            keyword_clusters,
            brand_visibility_evidence,
            tech,
            strategy,
            unavailable_sources: unavailable,
        }
    }

    pub fn unavailable_sources(&self) -> &[EvidenceSource] {
        &self.unavailable_sources
    }

    pub fn is_available(&self, source: EvidenceSource) -> bool {
        !self.unavailable_sources.contains(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentences_split_on_terminators() {
        assert_eq!(
            sentences("One. Two! Three? Four"),
            vec!["One.", "Two!", "Three?", "Four"]
        );
        assert_eq!(sentences("v1.2 is out."), vec!["v1.2 is out."]);
    }

    #[test]
    fn test_slugify_keyword() {
        assert_eq!(slugify_keyword("AI Video  Generator!"), "ai-video-generator");
        assert_eq!(slugify_keyword("  --  "), "");
        let long = "word ".repeat(20);
        let slug = slugify_keyword(&long);
        assert!(slug.len() <= MAX_SLUG_CHARS);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_dedupe_case() {
        let items = ["Kayak", " kayak ", "", "Canoe"];
        assert_eq!(dedupe_case(items, 10), vec!["Kayak", "Canoe"]);
        assert_eq!(dedupe_case(items, 1), vec!["Kayak"]);
    }
}
