pub mod http;
pub mod mock;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chart::ChartSpec;

pub use http::HttpAnalyst;
pub use mock::MockAnalyst;

/// Payload sent to an analysis backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
}

impl AnalysisRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
        }
    }
}

/// What a backend answers with: a narrative and, usually, a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub narrative: String,
    pub chart: Option<ChartSpec>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("analysis timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("could not reach the analysis server: {0}")]
    Network(String),
    #[error("analysis server rejected the request ({code}): {msg}")]
    Rejected { code: i64, msg: String },
    #[error("unexpected response from the analysis server: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalysisError::Decode(err.to_string())
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}
