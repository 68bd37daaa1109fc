use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitescout::api::{ConfigSource, create_router};
use sitescout::config::CrawlerConfig;
use sitescout::crawler::Crawler;
use sitescout::pipeline::{EvidencePipeline, EvidenceRequest, split_keywords};

#[derive(Parser, Debug)]
#[command(name = "sitescout", about = "Crawl websites and collect bounded SEO evidence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one page and print the extracted result as JSON
    Crawl {
        url: String,
        /// Force the headless render fallback on or off
        #[arg(long)]
        js_render: Option<bool>,
    },
    /// Collect the full evidence summary for a website
    Evidence {
        url: String,
        /// Comma separated keywords to check rankings for
        #[arg(long, default_value = "")]
        keywords: String,
        /// Competitor url; repeat to pass several. Discovered through search when omitted
        #[arg(long = "competitor")]
        competitors: Vec<String>,
        /// Also probe headers, robots.txt and sitemaps
        #[arg(long)]
        technical: bool,
        #[arg(long)]
        js_render: Option<bool>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Crawl { url, js_render } => {
            let crawler = Crawler::from_config(CrawlerConfig::from_env())?;
            let report = crawler.crawl(&url, js_render).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Evidence {
            url,
            keywords,
            competitors,
            technical,
            js_render,
        } => {
            let pipeline = EvidencePipeline::new(CrawlerConfig::from_env())?;
            let request = EvidenceRequest {
                target_keywords: split_keywords(&keywords),
                competitor_urls: competitors,
                include_technical: technical,
                use_js_render: js_render,
                ..EvidenceRequest::new(url)
            };
            let summary = pipeline.collect(request).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Serve { addr } => {
            let router = create_router(Arc::new(ConfigSource::Env));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}
