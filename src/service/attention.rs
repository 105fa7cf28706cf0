//! Attention service
//!
//! Orchestrates detection, mesh extraction and scoring for a single frame.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::config::Config;
use crate::engine::{FaceDetector, FaceLandmarker, ModelPool, preprocess::CropRegion};

use super::scoring::{self, AttentionScores, ScoringParams};
use super::types::*;

/// Margin added around a detection box before mesh extraction
const CROP_MARGIN: f32 = 0.25;

/// Attention analysis service
pub struct AttentionService {
    pool: Arc<ModelPool>,
    detection_threshold: f32,
    params: ScoringParams,
}

impl AttentionService {
    /// Create a new attention service
    pub fn new(pool: Arc<ModelPool>, config: &Config) -> Self {
        Self {
            pool,
            detection_threshold: config.attention.min_detection_confidence,
            params: ScoringParams {
                gaze_sensitivity: config.attention.gaze_sensitivity,
                head_sensitivity: config.attention.head_sensitivity,
            },
        }
    }

    /// Analyze a single decoded frame
    ///
    /// Detection and mesh extraction are synchronous OpenVINO calls, so the
    /// whole pipeline runs in a blocking task.
    pub async fn analyze(&self, image: DynamicImage) -> Result<AnalyzeResult> {
        let start = Instant::now();

        let pool = self.pool.clone();
        let threshold = self.detection_threshold;
        let params = self.params;

        let (scores, face_detected) =
            tokio::task::spawn_blocking(move || -> Result<(AttentionScores, bool)> {
                let detector = FaceDetector::new(pool.clone(), threshold);
                let faces = detector.detect(&image)?;

                // Strongest detection drives the scores
                let face = match faces.first() {
                    Some(face) => face,
                    None => {
                        debug!("No face detected in frame");
                        return Ok((AttentionScores::absent(), false));
                    }
                };

                let (frame_w, frame_h) = image.dimensions();
                let region = CropRegion::around_box(
                    face.x1, face.y1, face.x2, face.y2, frame_w, frame_h, CROP_MARGIN,
                );

                let landmarker = FaceLandmarker::new(pool);
                let scores = match landmarker.extract(&image, &region)? {
                    Some(mesh) => scoring::score_attention(face.confidence, &mesh, &params),
                    None => AttentionScores::face_only(face.confidence),
                };

                Ok((scores, true))
            })
            .await??;

        let inference_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Frame scored in {}ms: face {:.3}, gaze {:.3}, head {:.3}",
            inference_time_ms, scores.face_conf, scores.gaze_conf, scores.head_conf
        );

        Ok(AnalyzeResult {
            scores,
            face_detected,
            inference_time_ms,
        })
    }

    /// Get health status
    pub fn health(&self) -> HealthResult {
        let status = self.pool.get_status();
        let models_loaded: std::collections::HashMap<String, bool> = status
            .into_iter()
            .map(|(t, loaded)| (t.as_str().to_string(), loaded))
            .collect();

        HealthResult {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            models_loaded,
        }
    }
}
