use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sitescout::config::{CrawlerConfig, FetchConfig, RenderConfig};
use sitescout::crawler::{CrawlState, Crawler};
use sitescout::renderer::{BrowserlessRenderer, PageRenderer, UnavailableRenderer};
use sitescout::retry::RetryPolicy;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SPA_SHELL: &str = r#"<html><head><title>Lakeside App</title></head><body><div id="root"></div><script src="/static/js/main.js"></script></body></html>"#;

struct StubRenderer {
    html: Option<String>,
    calls: AtomicUsize,
}

impl StubRenderer {
    fn returning(html: Option<&str>) -> Arc<StubRenderer> {
        Arc::new(StubRenderer {
            html: html.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for StubRenderer {
    fn is_available(&self) -> bool {
        true
    }

    async fn render(&self, _url: &str, _timeout: Duration) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.html.clone()
    }
}

fn test_config(render_enabled: bool) -> CrawlerConfig {
    CrawlerConfig {
        fetch: FetchConfig {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryPolicy::immediate(0),
            ..Default::default()
        },
        render: RenderConfig {
            enabled: render_enabled,
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
        batch_deadline: Duration::from_secs(10),
        ..Default::default()
    }
}

fn rendered_page(text: &str) -> String {
    format!("<html><head><title>Lakeside App</title></head><body><main><p>{text}</p></main></body></html>")
}

async fn serve(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;
    server
}

#[cfg(test)]
mod render_fallback_tests {
    use super::*;

    mod successful_fetch {
        use super::*;

        #[tokio::test]
        async fn test_spa_shell_uses_richer_render() {
            let server = serve(200, SPA_SHELL).await;
            let long_text = "Book guided kayak tours on the lake every weekend.";
            let stub = StubRenderer::returning(Some(&rendered_page(long_text)));
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(stub.calls(), 1);
            assert!(report.rendered);
            assert_eq!(report.state, CrawlState::Extracted);
            assert_eq!(report.result.unwrap().content, long_text);
        }

        #[tokio::test]
        async fn test_shorter_render_keeps_plain_result() {
            let plain = r#"<html><body><div id="root"><p>Kayak tours, canoe rentals and paddle lessons.</p></div></body></html>"#;
            let server = serve(200, plain).await;
            let stub = StubRenderer::returning(Some(&rendered_page("Kayaks")));
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(stub.calls(), 1);
            assert!(!report.rendered);
            assert_eq!(
                report.result.unwrap().content,
                "Kayak tours, canoe rentals and paddle lessons."
            );
        }

        #[tokio::test]
        async fn test_failed_render_keeps_plain_result() {
            let server = serve(200, SPA_SHELL).await;
            let stub = StubRenderer::returning(None);
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(stub.calls(), 1);
            assert!(!report.rendered);
            let result = report.result.unwrap();
            assert_eq!(result.title, "Lakeside App");
            assert_eq!(report.state, CrawlState::Extracted);
        }

        #[tokio::test]
        async fn test_substantial_page_not_rendered() {
            let text = "Guided kayak tours on the lake. ".repeat(20);
            let server = serve(200, &rendered_page(&text)).await;
            let stub = StubRenderer::returning(Some(&rendered_page("unused")));
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(stub.calls(), 0);
            assert_eq!(report.state, CrawlState::Extracted);
        }

        #[tokio::test]
        async fn test_request_override_disables_render() {
            let server = serve(200, SPA_SHELL).await;
            let stub = StubRenderer::returning(Some(&rendered_page("unused")));
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            crawler.crawl(&server.uri(), Some(false)).await;
            assert_eq!(stub.calls(), 0);
        }

        #[tokio::test]
        async fn test_request_override_enables_render() {
            let server = serve(200, SPA_SHELL).await;
            let stub = StubRenderer::returning(Some(&rendered_page("Rendered kayak catalogue")));
            let crawler = Crawler::new(test_config(false), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), Some(true)).await;
            assert_eq!(stub.calls(), 1);
            assert!(report.rendered);
        }

        #[tokio::test]
        async fn test_blank_page_is_extract_empty() {
            let server = serve(200, "<html><body></body></html>").await;
            let crawler = Crawler::new(test_config(false), Arc::new(UnavailableRenderer)).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(report.state, CrawlState::ExtractEmpty);
            assert!(report.result.is_some());
        }
    }

    mod failed_fetch {
        use super::*;

        #[tokio::test]
        async fn test_403_without_render() {
            let server = serve(403, "denied").await;
            let crawler = Crawler::new(test_config(false), Arc::new(UnavailableRenderer)).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(report.state, CrawlState::FetchFailed);
            assert!(report.state.is_terminal());
            assert_eq!(report.result, None);
            assert_eq!(crawler.crawl_and_extract(&server.uri(), None).await, None);
        }

        #[tokio::test]
        async fn test_render_rescues_blocked_fetch() {
            let server = serve(403, "denied").await;
            let stub = StubRenderer::returning(Some(&rendered_page("Canoe rentals")));
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert!(report.rendered);
            assert_eq!(report.state, CrawlState::Extracted);
            assert_eq!(report.result.unwrap().content, "Canoe rentals");
        }

        #[tokio::test]
        async fn test_render_failure_is_terminal() {
            let server = serve(403, "denied").await;
            let stub = StubRenderer::returning(None);
            let crawler = Crawler::new(test_config(true), stub.clone()).unwrap();

            let report = crawler.crawl(&server.uri(), None).await;
            assert_eq!(report.state, CrawlState::RenderFailed);
            assert_eq!(report.result, None);
        }

        #[tokio::test]
        async fn test_unavailable_renderer_never_counts_as_enabled() {
            let server = serve(403, "denied").await;
            let crawler = Crawler::new(test_config(true), Arc::new(UnavailableRenderer)).unwrap();

            let report = crawler.crawl(&server.uri(), Some(true)).await;
            assert_eq!(report.state, CrawlState::FetchFailed);
        }
    }
}

#[cfg(test)]
mod crawl_many_tests {
    use super::*;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kayak"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(rendered_page("Kayaks"), "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/canoe"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(rendered_page("Canoes"), "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config(false), Arc::new(UnavailableRenderer)).unwrap();
        let urls: Vec<String> = ["/canoe", "/gone", "/kayak"]
            .iter()
            .map(|p| format!("{}{p}", server.uri()))
            .collect();
        let results = crawler.crawl_many(&urls).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().content, "Canoes");
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().content, "Kayaks");
    }
}

#[cfg(test)]
mod browserless_tests {
    use super::*;

    fn renderer(server: &MockServer) -> BrowserlessRenderer {
        BrowserlessRenderer::new(&server.uri(), Some("secret"), &RenderConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_posts_url_and_returns_html() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .and(query_param("token", "secret"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://example.com",
                "bestAttempt": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(rendered_page("Rendered"), "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let html = renderer(&server)
            .render("https://example.com", Duration::from_secs(5))
            .await;
        assert_eq!(html, Some(rendered_page("Rendered")));
    }

    #[tokio::test]
    async fn test_error_status_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let html = renderer(&server)
            .render("https://example.com", Duration::from_secs(5))
            .await;
        assert_eq!(html, None);
    }

    #[tokio::test]
    async fn test_challenge_render_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><body>Checking your browser before accessing</body></html>",
                "text/html",
            ))
            .mount(&server)
            .await;

        let html = renderer(&server)
            .render("https://example.com", Duration::from_secs(5))
            .await;
        assert_eq!(html, None);
    }
}

#[cfg(test)]
mod configured_renderer_tests {
    use super::*;

    async fn browserless(expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                rendered_page("Guided kayak tours and canoe rentals on the lake, every day of the week."),
                "text/html",
            ))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn configured(render_server: &MockServer) -> CrawlerConfig {
        let mut config = test_config(false);
        config.render.browserless_url = Some(render_server.uri());
        config
    }

    #[tokio::test]
    async fn test_override_renders_when_disabled_by_default() {
        let site = serve(200, SPA_SHELL).await;
        let render_server = browserless(1).await;
        let crawler = Crawler::from_config(configured(&render_server)).unwrap();

        let report = crawler.crawl(&site.uri(), Some(true)).await;
        assert!(report.rendered);
        assert_eq!(report.state, CrawlState::Extracted);
        assert!(report.result.unwrap().content.contains("Guided kayak tours"));
    }

    #[tokio::test]
    async fn test_disabled_default_skips_configured_endpoint() {
        let site = serve(200, SPA_SHELL).await;
        let render_server = browserless(0).await;
        let crawler = Crawler::from_config(configured(&render_server)).unwrap();

        let report = crawler.crawl(&site.uri(), None).await;
        assert!(!report.rendered);
    }
}
