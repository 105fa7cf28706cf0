//! Attention score heuristics
//!
//! Turns mesh geometry into the three confidence scores. Every reported
//! score is clamped to [0, 1] and rounded to three decimals.

use serde::{Deserialize, Serialize};

use crate::engine::landmarker::FaceMesh;

/// Outer corner of the left eye in the 468-point mesh
pub const LEFT_EYE_OUTER: usize = 33;
/// Outer corner of the right eye
pub const RIGHT_EYE_OUTER: usize = 263;
/// Nose tip
pub const NOSE_TIP: usize = 1;

/// Slope constants for the gaze and head heuristics
///
/// A sensitivity of 2.2 means the gaze score hits zero once the eye midpoint
/// drifts about 0.45 of the frame width off center.
#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    pub gaze_sensitivity: f32,
    pub head_sensitivity: f32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            gaze_sensitivity: 2.2,
            head_sensitivity: 4.5,
        }
    }
}

/// The three attention confidences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionScores {
    pub face_conf: f32,
    pub gaze_conf: f32,
    pub head_conf: f32,
}

impl AttentionScores {
    /// No face in the frame
    pub fn absent() -> Self {
        Self {
            face_conf: 0.0,
            gaze_conf: 0.0,
            head_conf: 0.0,
        }
    }

    /// Face detected but no usable mesh
    pub fn face_only(face_conf: f32) -> Self {
        Self {
            face_conf: round3(clamp01(face_conf)),
            gaze_conf: 0.0,
            head_conf: 0.0,
        }
    }
}

/// Score a detected face from its mesh
///
/// Gaze centering measures how close the eye midpoint sits to the horizontal
/// center of the frame. Head orientation measures how far the nose tip
/// drifts from the eye midpoint; a yawed head pushes the nose sideways.
pub fn score_attention(face_conf: f32, mesh: &FaceMesh, params: &ScoringParams) -> AttentionScores {
    if mesh.points.len() <= RIGHT_EYE_OUTER {
        return AttentionScores::face_only(face_conf);
    }

    let left_eye = mesh.points[LEFT_EYE_OUTER];
    let right_eye = mesh.points[RIGHT_EYE_OUTER];
    let nose = mesh.points[NOSE_TIP];

    let eye_center_x = (left_eye.x + right_eye.x) / 2.0;

    let gaze = 1.0 - (eye_center_x - 0.5).abs() * params.gaze_sensitivity;
    let head = 1.0 - (nose.x - eye_center_x).abs() * params.head_sensitivity;

    AttentionScores {
        face_conf: round3(clamp01(face_conf)),
        gaze_conf: round3(clamp01(gaze)),
        head_conf: round3(clamp01(head)),
    }
}

/// Clamp to [0, 1]
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Round to three decimal places
pub fn round3(x: f32) -> f32 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::landmarker::{FaceMesh, MeshPoint, MESH_POINTS};

    /// Full-size mesh with the three scored points placed explicitly
    fn mesh_with(left_eye_x: f32, right_eye_x: f32, nose_x: f32) -> FaceMesh {
        let mut points = vec![MeshPoint { x: 0.5, y: 0.5 }; MESH_POINTS];
        points[LEFT_EYE_OUTER] = MeshPoint { x: left_eye_x, y: 0.4 };
        points[RIGHT_EYE_OUTER] = MeshPoint { x: right_eye_x, y: 0.4 };
        points[NOSE_TIP] = MeshPoint { x: nose_x, y: 0.55 };
        FaceMesh {
            points,
            presence: 0.9,
        }
    }

    #[test]
    fn test_centered_frontal_face_scores_high() {
        let mesh = mesh_with(0.45, 0.55, 0.5);
        let scores = score_attention(0.97, &mesh, &ScoringParams::default());

        assert!((scores.face_conf - 0.97).abs() < 1e-6);
        assert_eq!(scores.gaze_conf, 1.0);
        assert_eq!(scores.head_conf, 1.0);
    }

    #[test]
    fn test_off_center_eyes_lower_gaze() {
        // Eye midpoint at 0.7: 1 - 0.2 * 2.2 = 0.56
        let mesh = mesh_with(0.65, 0.75, 0.7);
        let scores = score_attention(0.9, &mesh, &ScoringParams::default());

        assert!((scores.gaze_conf - 0.56).abs() < 1e-3);
        assert_eq!(scores.head_conf, 1.0);
    }

    #[test]
    fn test_turned_head_lowers_head_conf() {
        // Nose 0.1 off the eye midpoint: 1 - 0.1 * 4.5 = 0.55
        let mesh = mesh_with(0.45, 0.55, 0.6);
        let scores = score_attention(0.9, &mesh, &ScoringParams::default());

        assert!((scores.head_conf - 0.55).abs() < 1e-3);
        assert_eq!(scores.gaze_conf, 1.0);
    }

    #[test]
    fn test_extreme_offsets_clamp_to_zero() {
        // Eye midpoint at 0.975 and nose far off the midpoint: both raw
        // scores go negative and must clamp
        let mesh = mesh_with(0.95, 1.0, 0.2);
        let scores = score_attention(0.9, &mesh, &ScoringParams::default());

        assert_eq!(scores.gaze_conf, 0.0);
        assert_eq!(scores.head_conf, 0.0);
    }

    #[test]
    fn test_sensitivity_params_scale_the_slopes() {
        let mesh = mesh_with(0.65, 0.75, 0.7);
        let relaxed = ScoringParams {
            gaze_sensitivity: 1.0,
            head_sensitivity: 1.0,
        };
        let scores = score_attention(0.9, &mesh, &relaxed);

        // 1 - 0.2 * 1.0 = 0.8
        assert!((scores.gaze_conf - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_short_mesh_degrades_to_face_only() {
        let mesh = FaceMesh {
            points: vec![MeshPoint { x: 0.5, y: 0.5 }; 10],
            presence: 0.9,
        };
        let scores = score_attention(0.9, &mesh, &ScoringParams::default());

        assert!((scores.face_conf - 0.9).abs() < 1e-6);
        assert_eq!(scores.gaze_conf, 0.0);
        assert_eq!(scores.head_conf, 0.0);
    }

    #[test]
    fn test_absent_is_all_zero() {
        let scores = AttentionScores::absent();
        assert_eq!(scores.face_conf, 0.0);
        assert_eq!(scores.gaze_conf, 0.0);
        assert_eq!(scores.head_conf, 0.0);
    }

    #[test]
    fn test_face_only_rounds_and_zeroes_the_rest() {
        let scores = AttentionScores::face_only(0.8126);
        assert!((scores.face_conf - 0.813).abs() < 1e-6);
        assert_eq!(scores.gaze_conf, 0.0);
        assert_eq!(scores.head_conf, 0.0);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.3), 0.3);
        assert_eq!(clamp01(1.7), 1.0);
    }

    #[test]
    fn test_round3() {
        assert!((round3(0.12345) - 0.123).abs() < 1e-6);
        assert!((round3(0.9996) - 1.0).abs() < 1e-6);
        assert_eq!(round3(0.0), 0.0);
    }
}
