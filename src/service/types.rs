//! Service layer types

use serde::{Deserialize, Serialize};

use super::scoring::AttentionScores;

/// Frame analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResult {
    pub scores: AttentionScores,
    pub face_detected: bool,
    pub inference_time_ms: u64,
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub models_loaded: std::collections::HashMap<String, bool>,
}
