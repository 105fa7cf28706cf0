//! REST API response data transfer objects

use serde::Serialize;
use std::collections::HashMap;

/// Analyze response
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub face_conf: f32,
    pub gaze_conf: f32,
    pub head_conf: f32,
    pub inference_time_ms: u64,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub models_loaded: HashMap<String, bool>,
}

/// Metrics response
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub frames_analyzed: u64,
    pub faces_detected: u64,
    pub models_loaded: HashMap<String, bool>,
    pub uptime_seconds: u64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_response_serializes_flat() {
        let resp = AnalyzeResponse {
            face_conf: 0.5,
            gaze_conf: 1.0,
            head_conf: 0.0,
            inference_time_ms: 12,
        };

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["face_conf"], 0.5);
        assert_eq!(json["gaze_conf"], 1.0);
        assert_eq!(json["head_conf"], 0.0);
        assert_eq!(json["inference_time_ms"], 12);
    }

    #[test]
    fn test_error_response_carries_code() {
        let err = ErrorResponse::new("No frame provided", "MISSING_FRAME");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"MISSING_FRAME\""));
        assert!(json.contains("\"error\":\"No frame provided\""));
    }
}
