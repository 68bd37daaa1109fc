use serde::{Deserialize, Serialize};

use crate::crawler::CrawlState;
use crate::data_models::CrawlResult;
use crate::evidence::EvidenceSummary;

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default)]
    pub use_js_render: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlResponse {
    pub url: String,
    pub state: CrawlState,
    pub rendered: bool,
    /// `None` when the page could not be fetched or rendered.
    pub result: Option<CrawlResult>,
    pub processing_time_ms: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvidenceResponse {
    pub evidence: EvidenceSummary,
    pub processing_time_ms: u128,
}
