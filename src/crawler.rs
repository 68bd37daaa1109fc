use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::fan_out;
use crate::config::CrawlerConfig;
use crate::data_models::CrawlResult;
use crate::error::ConfigError;
use crate::extractor::{extract, looks_like_spa_shell};
use crate::fetcher::Fetcher;
use crate::renderer::{PageRenderer, renderer_from_config};
use crate::urls::normalize_url;

/// Where a single crawl request ended up.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Pending,
    Fetched,
    FetchFailed,
    Rendered,
    RenderFailed,
    Extracted,
    ExtractEmpty,
}

impl CrawlState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CrawlState::FetchFailed
                | CrawlState::RenderFailed
                | CrawlState::Extracted
                | CrawlState::ExtractEmpty
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CrawlReport {
    pub url: String,
    pub state: CrawlState,
    pub rendered: bool,
    pub result: Option<CrawlResult>,
}

pub struct Crawler {
    config: CrawlerConfig,
    fetcher: Fetcher,
    renderer: Arc<dyn PageRenderer>,
}

impl Crawler {
    pub fn new(config: CrawlerConfig, renderer: Arc<dyn PageRenderer>) -> Result<Crawler, ConfigError> {
        let fetcher = Fetcher::new(config.fetch.clone())?;
        Ok(Crawler {
            config,
            fetcher,
            renderer,
        })
    }

    /// Crawler with the renderer chosen by `config.render`.
    pub fn from_config(config: CrawlerConfig) -> Result<Crawler, ConfigError> {
        let renderer = renderer_from_config(&config.render)?;
        Crawler::new(config, renderer)
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn render_enabled(&self, use_js_render: Option<bool>) -> bool {
        use_js_render.unwrap_or(self.config.render.enabled) && self.renderer.is_available()
    }

    async fn render(&self, url: &str) -> Option<CrawlResult> {
        let html = self.renderer.render(url, self.config.render.timeout).await?;
        Some(extract(&html, url))
    }

    /// Full fetch, render and extract walk for one URL. Never fails: every
    /// expected failure is a terminal state without a result.
    pub async fn crawl(&self, url: &str, use_js_render: Option<bool>) -> CrawlReport {
        let url = normalize_url(url);
        let render_enabled = self.render_enabled(use_js_render);
        let mut report = CrawlReport {
            url: url.clone(),
            state: CrawlState::Pending,
            rendered: false,
            result: None,
        };
        tracing::info!(url = %url, render_enabled, "crawling");

        let result = match self.fetcher.fetch(&url).await {
            Some(html) => {
                report.state = CrawlState::Fetched;
                let plain = extract(&html, &url);
                let thin = plain.visible_text_len() < self.config.thin_content_chars;
                let spa_shell = looks_like_spa_shell(&html);

                if render_enabled && (thin || spa_shell) {
                    tracing::debug!(url = %url, thin, spa_shell, "trying js render fallback");
                    match self.render(&url).await {
                        Some(rendered) if rendered.visible_text_len() > plain.visible_text_len() => {
                            report.state = CrawlState::Rendered;
                            report.rendered = true;
                            rendered
                        }
                        Some(_) => {
                            report.state = CrawlState::Rendered;
                            plain
                        }
                        None => plain,
                    }
                } else {
                    plain
                }
            }
            None => {
                report.state = CrawlState::FetchFailed;
                if !render_enabled {
                    return report;
                }
                match self.render(&url).await {
                    Some(rendered) => {
                        report.state = CrawlState::Rendered;
                        report.rendered = true;
                        rendered
                    }
                    None => {
                        tracing::warn!(url = %url, "render fallback failed");
                        report.state = CrawlState::RenderFailed;
                        return report;
                    }
                }
            }
        };

        report.state = if result.has_content() {
            CrawlState::Extracted
        } else {
            CrawlState::ExtractEmpty
        };
        tracing::info!(
            url = %url,
            state = ?report.state,
            chars = result.visible_text_len(),
            rendered = report.rendered,
            "crawl finished"
        );
        report.result = Some(result);
        report
    }

    /// `None` when neither the plain fetch nor the render produced a page.
    pub async fn crawl_and_extract(&self, url: &str, use_js_render: Option<bool>) -> Option<CrawlResult> {
        self.crawl(url, use_js_render).await.result
    }

    /// Crawls `urls` with bounded concurrency under the batch deadline.
    /// Output `i` belongs to `urls[i]`.
    pub async fn crawl_many(&self, urls: &[String]) -> Vec<Option<CrawlResult>> {
        fan_out(
            urls.to_vec(),
            self.config.competitor_concurrency,
            self.config.batch_deadline,
            |url| async move { self.crawl_and_extract(&url, None).await },
        )
        .await
    }
}
