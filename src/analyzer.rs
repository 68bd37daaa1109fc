//! Bag-of-words keyword heuristics over crawled pages.
//!
//! Text goes through a small analysis pipeline (tokenizer followed by token
//! filters). Ranking is plain frequency with first-seen tie breaking, so
//! output is a deterministic seed list rather than a relevance score.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use crate::data_models::{CompetitorRecord, CrawlResult, KeywordGap};
use crate::text::{title_case, truncate_text};
use crate::urls::domain_of;

pub const DEFAULT_MAX_KEYWORDS: usize = 15;
pub const COMPETITOR_KEYWORDS: usize = 20;
/// Only the head of the body text feeds keyword extraction.
pub const CONTENT_SAMPLE_CHARS: usize = 2000;
pub const MIN_KEYWORD_CHARS: usize = 4;
const MAX_BRAND_CHARS: usize = 50;

static STOP_WORDS: OnceLock<HashSet<String>> = OnceLock::new();
static WEB_WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn get_stop_words() -> &'static HashSet<String> {
    STOP_WORDS.get_or_init(|| {
        stop_words::get(stop_words::LANGUAGE::English)
            .into_iter()
            .map(|x| x.to_string())
            .collect()
    })
}

/// Site chrome vocabulary that says nothing about what a page offers.
fn get_web_words() -> &'static HashSet<&'static str> {
    WEB_WORDS.get_or_init(|| {
        HashSet::from([
            "http", "https", "html", "javascript", "cookie", "cookies", "login", "sign",
            "menu", "click", "here", "home", "page", "website", "copyright", "rights",
            "reserved", "privacy", "policy", "terms", "skip", "content", "navigation",
        ])
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextToken {
    pub term: String,
    pub pos: usize,
}

impl std::ops::Deref for TextToken {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.term
    }
}

/// A tokenizer breaks text into individual terms.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Splits on every character that is not alphanumeric, so "AI-powered" becomes
/// `["AI", "powered"]`.
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect()
    }
}

/// A token filter receives the token stream and may remove or change tokens.
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken>;
}

pub struct LowerCaseTokenFilter;

impl TokenFilter for LowerCaseTokenFilter {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens
            .into_iter()
            .map(|mut t| {
                t.term = t.term.to_lowercase();
                t
            })
            .collect()
    }
}

/// Drops stop words and web boilerplate vocabulary. Expects lowercase input.
pub struct StopWordTokenFilter;

impl TokenFilter for StopWordTokenFilter {
    fn filter(&self, mut tokens: Vec<TextToken>) -> Vec<TextToken> {
        let stop_words = get_stop_words();
        let web_words = get_web_words();
        tokens.retain(|w| !stop_words.contains(&w.term) && !web_words.contains(w.term.as_str()));
        tokens
    }
}

/// Filters out tokens without a single alphabetic character ("2024", "404").
pub struct NumericTokenFilter;

impl TokenFilter for NumericTokenFilter {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens
            .into_iter()
            .filter(|token| token.term.chars().any(|c| c.is_alphabetic()))
            .collect()
    }
}

pub struct MinLengthTokenFilter {
    min_chars: usize,
}

impl MinLengthTokenFilter {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

impl TokenFilter for MinLengthTokenFilter {
    fn filter(&self, mut tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens.retain(|t| t.term.chars().count() >= self.min_chars);
        tokens
    }
}

/// Pure text analysis pipeline: a tokenizer followed by token filters.
pub struct TextAnalyzer {
    tokenizer: Box<dyn Tokenizer>,
    token_filters: Vec<Box<dyn TokenFilter>>,
}

impl TextAnalyzer {
    pub fn new(tokenizer: Box<dyn Tokenizer>, token_filters: Vec<Box<dyn TokenFilter>>) -> Self {
        Self {
            tokenizer,
            token_filters,
        }
    }

    /// Lowercase words of at least four characters, numbers and stop words removed.
    pub fn keywords() -> Self {
        Self::new(
            Box::new(WordTokenizer),
            vec![
                Box::new(LowerCaseTokenFilter),
                Box::new(NumericTokenFilter),
                Box::new(MinLengthTokenFilter::new(MIN_KEYWORD_CHARS)),
                Box::new(StopWordTokenFilter),
            ],
        )
    }

    pub fn tokenize(&self, content: &str) -> Vec<TextToken> {
        self.tokenizer
            .tokenize(content)
            .into_iter()
            .enumerate()
            .map(|(pos, term)| TextToken { term, pos })
            .collect()
    }

    pub fn token_filter(&self, mut tokens: Vec<TextToken>) -> Vec<TextToken> {
        for filter in self.token_filters.iter() {
            tokens = filter.filter(tokens);
        }
        tokens
    }

    pub fn analyze(&self, content: &str) -> Vec<TextToken> {
        let tokens = self.tokenize(content);
        self.token_filter(tokens)
    }
}

/// Title, description, headings and the head of the body text, in that order.
fn keyword_source(result: &CrawlResult) -> String {
    let content: String = result.content.chars().take(CONTENT_SAMPLE_CHARS).collect();
    let mut parts = vec![result.title.as_str(), result.description.as_str()];
    parts.extend(result.headings.iter().map(String::as_str));
    parts.push(&content);
    parts.join(" ")
}

/// Top `max_keywords` terms of a page by frequency, ties broken by first
/// occurrence.
pub fn extract_keywords_from_content(result: &CrawlResult, max_keywords: usize) -> Vec<String> {
    let tokens = TextAnalyzer::keywords().analyze(&keyword_source(result));

    // term -> (count, first position)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for token in tokens {
        counts
            .entry(token.term)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, token.pos));
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(term, _, _)| term)
        .collect()
}

impl CompetitorRecord {
    pub fn from_crawl(page: CrawlResult) -> CompetitorRecord {
        let keywords = extract_keywords_from_content(&page, COMPETITOR_KEYWORDS);
        CompetitorRecord { page, keywords }
    }
}

/// Keywords competitors use that the site does not, by how many competitors
/// use each one, ties in first-seen order.
pub fn compute_keyword_gaps(
    site_keywords: &[String],
    competitor_keywords: &BTreeMap<String, Vec<String>>,
    max_gaps: usize,
) -> Vec<KeywordGap> {
    let own: HashSet<String> = site_keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut gaps: Vec<KeywordGap> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (competitor, keywords) in competitor_keywords {
        let mut counted = HashSet::new();
        for keyword in keywords {
            let keyword = keyword.to_lowercase();
            if keyword.is_empty() || own.contains(&keyword) || !counted.insert(keyword.clone()) {
                continue;
            }
            match index.get(&keyword) {
                Some(&i) => {
                    gaps[i].count += 1;
                    gaps[i].competitors_using.push(competitor.clone());
                }
                None => {
                    index.insert(keyword.clone(), gaps.len());
                    gaps.push(KeywordGap {
                        keyword,
                        count: 1,
                        competitors_using: vec![competitor.clone()],
                    });
                }
            }
        }
    }

    // stable sort keeps first-seen order among equal counts
    gaps.sort_by(|a, b| b.count.cmp(&a.count));
    gaps.truncate(max_gaps);
    gaps
}

/// Human brand name for a site: the leading title segment, else the first
/// domain label.
pub fn brand_name(url: &str, result: Option<&CrawlResult>) -> String {
    let from_title = result
        .map(|page| page.title.as_str())
        .and_then(|title| title.split('|').next())
        .and_then(|segment| segment.split('-').next())
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if let Some(name) = from_title {
        return truncate_text(name, MAX_BRAND_CHARS);
    }

    domain_of(url)
        .and_then(|domain| domain.split('.').next().map(title_case))
        .unwrap_or_default()
}
