//! HTML to [`CrawlResult`] extraction.
//!
//! Extraction is a pure function of `(html, url)`. Malformed markup is handled
//! by the html5ever parser itself; anything that still goes wrong is turned
//! into an empty result instead of reaching the caller.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use url::Url;

use crate::data_models::CrawlResult;
use crate::text::{append_words, collapse_whitespace, truncate_text};
use crate::urls::site_host;

pub const MAX_CONTENT_CHARS: usize = 8000;
pub const MAX_HEADING_CHARS: usize = 200;
pub const MAX_HEADINGS: usize = 12;
pub const MAX_FEATURE_LISTS: usize = 12;
pub const MAX_ITEMS_PER_LIST: usize = 12;
pub const MAX_FEATURE_CHARS: usize = 200;
pub const MAX_FEATURES: usize = 18;
pub const MAX_INTERNAL_LINKS: usize = 10;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="description"]"#));
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static HEADINGS: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3"));
static MAIN: Lazy<Selector> = Lazy::new(|| selector("main"));
static ARTICLE: Lazy<Selector> = Lazy::new(|| selector("article"));
static DIV: Lazy<Selector> = Lazy::new(|| selector("div"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
static LISTS: Lazy<Selector> = Lazy::new(|| selector("ul, ol"));
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static ANCHORS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

/// Subtrees that never contribute visible body text.
const EXCLUDED_TAGS: [&str; 8] = [
    "nav", "footer", "aside", "script", "style", "noscript", "template", "svg",
];

const SPA_MARKERS: [&str; 12] = [
    r#"id="root""#,
    "id='root'",
    r#"id="__next""#,
    r#"id="app""#,
    "data-reactroot",
    "__next_data__",
    "/_next/static/",
    "window.__nuxt__",
    "ng-version",
    "data-v-app",
    "webpackjsonp",
    "/static/js/main.",
];

/// Parses `html` into a [`CrawlResult`]. Never panics: a failure inside the
/// parser yields an empty result carrying `url` and a debug note.
pub fn extract(html: &str, url: &str) -> CrawlResult {
    match panic::catch_unwind(AssertUnwindSafe(|| extract_document(html, url))) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(url, "html extraction failed, returning empty result");
            CrawlResult {
                debug_note: Some("html extraction failed".to_string()),
                ..CrawlResult::empty(url)
            }
        }
    }
}

fn extract_document(html: &str, url: &str) -> CrawlResult {
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE)
        .or_else(|| meta_content(&document, &OG_TITLE))
        .unwrap_or_default();
    let description = meta_content(&document, &META_DESCRIPTION)
        .or_else(|| meta_content(&document, &OG_DESCRIPTION))
        .unwrap_or_default();
    let h1 = first_text(&document, &H1)
        .map(|text| truncate_text(&text, MAX_HEADING_CHARS))
        .unwrap_or_default();
    let content = truncate_text(&visible_text(content_root(&document)), MAX_CONTENT_CHARS);
    let (internal_link_count, internal_links) = internal_links(&document, url);

    CrawlResult {
        url: url.to_string(),
        title,
        description,
        h1,
        content,
        headings: headings(&document),
        features: features(&document),
        internal_link_count,
        internal_links,
        debug_note: None,
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for chunk in element.text() {
        append_words(&mut out, chunk);
    }
    out
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .find(|content| !content.is_empty())
}

fn is_content_container(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    let class = value.attr("class").unwrap_or_default().to_ascii_lowercase();
    let id = value.attr("id").unwrap_or_default().to_ascii_lowercase();
    ["content", "main", "body"]
        .iter()
        .any(|hint| class.contains(hint) || id.contains(hint))
}

/// `<main>`, then `<article>`, then a content-ish `<div>`, then `<body>`.
fn content_root(document: &Html) -> ElementRef<'_> {
    document
        .select(&MAIN)
        .next()
        .or_else(|| document.select(&ARTICLE).next())
        .or_else(|| document.select(&DIV).find(is_content_container))
        .or_else(|| document.select(&BODY).next())
        .unwrap_or_else(|| document.root_element())
}

/// Collects text under `root`, skipping excluded subtrees. Iterative so
/// pathological nesting cannot exhaust the stack.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => append_words(&mut out, text),
            Node::Element(element) => {
                if node.id() != root.id() && EXCLUDED_TAGS.contains(&element.name()) {
                    continue;
                }
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }
    out
}

fn headings(document: &Html) -> Vec<String> {
    document
        .select(&HEADINGS)
        .map(element_text)
        .filter(|text| !text.is_empty() && text.chars().count() < MAX_HEADING_CHARS)
        .take(MAX_HEADINGS)
        .collect()
}

fn inside_site_chrome(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| matches!(ancestor.value().name(), "nav" | "footer"))
}

struct FeatureSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl FeatureSet {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, raw: &str) {
        if self.items.len() >= MAX_FEATURES {
            return;
        }
        let text = collapse_whitespace(raw);
        if text.is_empty() || text.chars().count() >= MAX_FEATURE_CHARS {
            return;
        }
        if self.seen.insert(text.to_lowercase()) {
            self.items.push(text);
        }
    }
}

fn features(document: &Html) -> Vec<String> {
    let mut features = FeatureSet::new();

    let lists = document
        .select(&LISTS)
        .filter(|list| !inside_site_chrome(list))
        .take(MAX_FEATURE_LISTS);
    for list in lists {
        let items = list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li")
            .take(MAX_ITEMS_PER_LIST);
        for item in items {
            features.push(&element_text(item));
        }
    }

    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
            collect_json_ld_features(&value, &mut features, 0);
        }
    }

    features.items
}

fn collect_json_ld_features(value: &Value, out: &mut FeatureSet, depth: usize) {
    if depth > 8 {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if key == "features" || key == "featureList" {
                    push_feature_values(inner, out);
                } else {
                    collect_json_ld_features(inner, out, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_ld_features(item, out, depth + 1);
            }
        }
        _ => {}
    }
}

fn push_feature_values(value: &Value, out: &mut FeatureSet) {
    match value {
        // schema.org allows featureList as a comma or newline separated string
        Value::String(list) => {
            for item in list.split([',', '\n']) {
                out.push(item);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(text) => out.push(text),
                    Value::Object(map) => {
                        if let Some(Value::String(name)) = map.get("name") {
                            out.push(name);
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn internal_links(document: &Html, page_url: &str) -> (usize, Vec<String>) {
    let Ok(base) = Url::parse(page_url) else {
        return (0, Vec::new());
    };
    let Some(page_host) = base.host_str().map(site_host) else {
        return (0, Vec::new());
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&ANCHORS) {
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if resolved.host_str().map(site_host).as_deref() != Some(page_host.as_str()) {
            continue;
        }
        resolved.set_fragment(None);
        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    let count = links.len();
    links.truncate(MAX_INTERNAL_LINKS);
    (count, links)
}

/// Markup typical of a client-rendered app before its JavaScript has run.
pub fn looks_like_spa_shell(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    SPA_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Markers that only appear on bot-mitigation interstitials.
const CHALLENGE_MARKERS: [&str; 7] = [
    "cf-browser-verification",
    "cf-challenge",
    "/cdn-cgi/challenge-platform/",
    "attention required! | cloudflare",
    "ddos protection by",
    "captcha-delivery.com",
    "px-captcha",
];

/// Phrases that also show up in ordinary pages (CDN urls, login widgets,
/// security vendors); they only count when they are part of a short visible text.
const WEAK_CHALLENGE_MARKERS: [&str; 7] = [
    "cloudflare",
    "captcha",
    "just a moment",
    "checking your browser",
    "verify you are human",
    "verify you are a human",
    "bot detection",
];
const CHALLENGE_TEXT_CHARS: usize = 1500;

/// Heuristic detection of WAF / bot challenge pages.
pub fn looks_like_challenge(html: &str) -> bool {
    let lowered = html.to_lowercase();
    if CHALLENGE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return true;
    }
    if !WEAK_CHALLENGE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return false;
    }

    let document = Html::parse_document(html);
    let mut text = first_text(&document, &TITLE).unwrap_or_default();
    append_words(&mut text, &visible_text(content_root(&document)));
    if text.chars().count() > CHALLENGE_TEXT_CHARS {
        return false;
    }
    let text = text.to_lowercase();
    WEAK_CHALLENGE_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}
