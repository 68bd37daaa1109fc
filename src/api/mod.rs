use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CrawlerConfig;

pub mod handlers;
pub mod models;

/// Where handlers get their configuration from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Re-read the environment on every request.
    Env,
    Fixed(CrawlerConfig),
}

impl ConfigSource {
    pub fn load(&self) -> CrawlerConfig {
        match self {
            ConfigSource::Env => CrawlerConfig::from_env(),
            ConfigSource::Fixed(config) => config.clone(),
        }
    }
}

pub fn create_router(config: Arc<ConfigSource>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/crawl", post(handlers::crawl_handler))
        .route("/api/evidence", post(handlers::evidence_handler))
        .with_state(config)
        .layer(cors)
}
