use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;
use std::time::Instant;

use crate::crawler::Crawler;
use crate::pipeline::{EvidencePipeline, EvidenceRequest};

use super::ConfigSource;
use super::models::{CrawlRequest, CrawlResponse, EvidenceResponse};

fn config_error(err: impl std::fmt::Display) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Configuration error: {}", err),
    )
}

pub async fn crawl_handler(
    State(config): State<Arc<ConfigSource>>,
    Json(request): Json<CrawlRequest>,
) -> Result<Json<CrawlResponse>, (StatusCode, String)> {
    let start = Instant::now();

    if request.url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Url cannot be empty".to_string()));
    }

    let crawler = Crawler::from_config(config.load()).map_err(config_error)?;
    let report = crawler.crawl(&request.url, request.use_js_render).await;

    Ok(Json(CrawlResponse {
        url: report.url,
        state: report.state,
        rendered: report.rendered,
        result: report.result,
        processing_time_ms: start.elapsed().as_millis(),
    }))
}

pub async fn evidence_handler(
    State(config): State<Arc<ConfigSource>>,
    Json(request): Json<EvidenceRequest>,
) -> Result<Json<EvidenceResponse>, (StatusCode, String)> {
    let start = Instant::now();

    if request.url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Url cannot be empty".to_string()));
    }

    let pipeline = EvidencePipeline::new(config.load()).map_err(config_error)?;
    let evidence = pipeline.collect(request).await;

    Ok(Json(EvidenceResponse {
        evidence,
        processing_time_ms: start.elapsed().as_millis(),
    }))
}
