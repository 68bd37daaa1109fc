//! Technical SEO signals: homepage response, `<head>` markup, robots.txt and
//! sitemaps. Collection never fails; unreachable resources are reported with
//! their error instead.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::fetcher::Fetcher;
use crate::text::{collapse_whitespace, truncate_text};

const MAX_HEAD_TITLE_CHARS: usize = 200;
const MAX_URL_CHARS: usize = 400;
const MAX_ERROR_CHARS: usize = 200;
const MAX_META_ROBOTS_CHARS: usize = 200;
const MAX_HREFLANG_CHARS: usize = 30;
const MAX_HREFLANGS: usize = 25;
const MAX_SCHEMA_TYPES: usize = 25;
const MAX_SNIPPET_CHARS: usize = 1200;
const MAX_SITEMAPS: usize = 3;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static HEAD_TITLE: Lazy<Selector> = Lazy::new(|| selector("head title"));
static CANONICAL: Lazy<Selector> = Lazy::new(|| selector(r#"link[rel~="canonical"][href]"#));
static META_ROBOTS: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="robots"][content]"#));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:image"]"#));
static TWITTER_CARD: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="twitter:card"]"#));
static HREFLANG: Lazy<Selector> =
    Lazy::new(|| selector(r#"link[rel~="alternate"][hreflang][href]"#));
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HomepageFetch {
    pub url: String,
    pub final_url: String,
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenGraphFlags {
    pub has_og_title: bool,
    pub has_og_description: bool,
    pub has_og_image: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HreflangLink {
    pub hreflang: String,
    pub href: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadSignals {
    pub head_title: String,
    pub canonical: String,
    pub meta_robots: String,
    pub open_graph: OpenGraphFlags,
    pub has_twitter_card: bool,
    pub hreflang: Vec<HreflangLink>,
    pub schema_types: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsSummary {
    pub url: String,
    pub status: Option<u16>,
    pub has_sitemap_directive: bool,
    pub snippet: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapSummary {
    pub url: String,
    pub status: Option<u16>,
    pub snippet: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TechnicalSignals {
    pub homepage: HomepageFetch,
    pub head: HeadSignals,
    pub robots: RobotsSummary,
    pub sitemaps: Vec<SitemapSummary>,
}

fn attr_of(document: &Html, selector: &Selector, attr: &str) -> String {
    document
        .select(selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn schema_types(document: &Html) -> Vec<String> {
    let mut types = SchemaTypes::default();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(parsed) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        collect_schema_types(&parsed, &mut types, 0);
    }
    types.names
}

#[derive(Default)]
struct SchemaTypes {
    seen: HashSet<String>,
    names: Vec<String>,
}

impl SchemaTypes {
    fn push(&mut self, name: &str) {
        if self.names.len() < MAX_SCHEMA_TYPES && self.seen.insert(name.to_string()) {
            self.names.push(name.to_string());
        }
    }
}

/// Walks nested nodes (`@graph`, `mainEntity`, `offers`, ...) for `@type` values.
fn collect_schema_types(value: &Value, out: &mut SchemaTypes, depth: usize) {
    if depth > 8 {
        return;
    }
    match value {
        Value::Object(map) => {
            match map.get("@type") {
                Some(Value::String(name)) => out.push(name),
                Some(Value::Array(names)) => {
                    for name in names.iter().filter_map(Value::as_str) {
                        out.push(name);
                    }
                }
                _ => {}
            }
            for (key, inner) in map {
                if key != "@type" {
                    collect_schema_types(inner, out, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_schema_types(item, out, depth + 1);
            }
        }
        _ => {}
    }
}

/// Reads SEO-relevant `<head>` markup. Pure.
pub fn extract_head_signals(html: &str) -> HeadSignals {
    if html.trim().is_empty() {
        return HeadSignals::default();
    }
    let document = Html::parse_document(html);

    let head_title = document
        .select(&HEAD_TITLE)
        .next()
        .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        .unwrap_or_default();

    let hreflang = document
        .select(&HREFLANG)
        .filter_map(|link| {
            let value = link.value();
            Some(HreflangLink {
                hreflang: truncate_text(value.attr("hreflang")?, MAX_HREFLANG_CHARS),
                href: truncate_text(value.attr("href")?, MAX_URL_CHARS),
            })
        })
        .take(MAX_HREFLANGS)
        .collect();

    HeadSignals {
        head_title: truncate_text(&head_title, MAX_HEAD_TITLE_CHARS),
        canonical: truncate_text(&attr_of(&document, &CANONICAL, "href"), MAX_URL_CHARS),
        meta_robots: truncate_text(
            &attr_of(&document, &META_ROBOTS, "content"),
            MAX_META_ROBOTS_CHARS,
        ),
        open_graph: OpenGraphFlags {
            has_og_title: document.select(&OG_TITLE).next().is_some(),
            has_og_description: document.select(&OG_DESCRIPTION).next().is_some(),
            has_og_image: document.select(&OG_IMAGE).next().is_some(),
        },
        has_twitter_card: document.select(&TWITTER_CARD).next().is_some(),
        hreflang,
        schema_types: schema_types(&document),
    }
}

/// `Sitemap:` directives of a robots.txt body, in file order.
pub fn sitemap_directives(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            Some(value.trim().to_string()).filter(|url| !url.is_empty())
        })
        .collect()
}

fn site_resource(url: &str, path: &str) -> Option<String> {
    Url::parse(url).ok()?.join(path).ok().map(String::from)
}

/// Probes the homepage, robots.txt and up to three sitemaps of `url`.
pub async fn collect_technical_evidence(fetcher: &Fetcher, url: &str) -> TechnicalSignals {
    let home = fetcher.probe(url).await;
    let head = extract_head_signals(&home.raw_text);

    let robots_url = site_resource(url, "/robots.txt").unwrap_or_else(|| format!("{url}/robots.txt"));
    let robots = fetcher.probe(&robots_url).await;
    let mut sitemap_urls = sitemap_directives(&robots.raw_text);
    let has_sitemap_directive = !sitemap_urls.is_empty();
    if sitemap_urls.is_empty() {
        sitemap_urls.extend(site_resource(url, "/sitemap.xml"));
    }

    let mut sitemaps = Vec::new();
    for sitemap_url in sitemap_urls.iter().take(MAX_SITEMAPS) {
        let sitemap = fetcher.probe(sitemap_url).await;
        sitemaps.push(SitemapSummary {
            url: truncate_text(&sitemap.final_url, MAX_URL_CHARS),
            status: sitemap.status,
            snippet: truncate_text(&sitemap.raw_text, MAX_SNIPPET_CHARS),
        });
    }

    tracing::info!(
        url,
        status = ?home.status,
        robots_status = ?robots.status,
        sitemaps = sitemaps.len(),
        "technical signals collected"
    );

    TechnicalSignals {
        homepage: HomepageFetch {
            url: truncate_text(&home.url, MAX_URL_CHARS),
            final_url: truncate_text(&home.final_url, MAX_URL_CHARS),
            status: home.status,
            headers: home.headers,
            error: home.error.map(|error| truncate_text(&error, MAX_ERROR_CHARS)),
        },
        head,
        robots: RobotsSummary {
            url: truncate_text(&robots.final_url, MAX_URL_CHARS),
            status: robots.status,
            has_sitemap_directive,
            snippet: truncate_text(&robots.raw_text, MAX_SNIPPET_CHARS),
        },
        sitemaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_signals() {
        let html = r#"<html><head>
            <title> Kayak Rentals </title>
            <link rel="canonical" href="https://example.com/">
            <meta name="robots" content="index, follow">
            <meta property="og:title" content="Kayaks">
            <meta name="twitter:card" content="summary">
            <link rel="alternate" hreflang="de" href="https://example.com/de/">
            <script type="application/ld+json">[{"@type":"Organization"},{"@type":["WebSite","Organization"]}]</script>
            </head><body></body></html>"#;
        let signals = extract_head_signals(html);
        assert_eq!(signals.head_title, "Kayak Rentals");
        assert_eq!(signals.canonical, "https://example.com/");
        assert_eq!(signals.meta_robots, "index, follow");
        assert!(signals.open_graph.has_og_title);
        assert!(!signals.open_graph.has_og_image);
        assert!(signals.has_twitter_card);
        assert_eq!(signals.hreflang.len(), 1);
        assert_eq!(signals.hreflang[0].hreflang, "de");
        assert_eq!(signals.schema_types, vec!["Organization", "WebSite"]);
    }

    #[test]
    fn test_schema_types_inside_graph() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[
                {"@type":"Organization","name":"Kayak Club"},
                {"@type":"WebSite","publisher":{"@type":"Organization"}},
                {"@type":"WebPage","breadcrumb":{"@type":"BreadcrumbList"}}
            ]}
            </script></head><body></body></html>"#;
        assert_eq!(
            extract_head_signals(html).schema_types,
            vec!["Organization", "WebSite", "WebPage", "BreadcrumbList"]
        );
    }

    #[test]
    fn test_empty_html_has_no_signals() {
        assert_eq!(extract_head_signals(""), HeadSignals::default());
    }

    #[test]
    fn test_sitemap_directives() {
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sitemap.xml\nsitemap:https://example.com/news.xml\n";
        assert_eq!(
            sitemap_directives(robots),
            vec!["https://example.com/sitemap.xml", "https://example.com/news.xml"]
        );
    }

    #[test]
    fn test_site_resource_uses_origin() {
        assert_eq!(
            site_resource("https://example.com/blog/post", "/robots.txt").as_deref(),
            Some("https://example.com/robots.txt")
        );
    }
}
