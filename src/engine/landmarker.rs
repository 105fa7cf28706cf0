//! Face mesh landmarker
//!
//! Runs a 468-point face mesh model on a face crop and maps the points back
//! to frame-normalized coordinates.

use std::sync::Arc;

use image::DynamicImage;
use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::pool::{ModelPool, ModelType};
use super::preprocess::{
    preprocess_for_landmarks, read_tensor_f32, to_openvino_tensor, CropRegion,
    LANDMARKER_INPUT_SIZE,
};

/// Number of points in the face mesh
pub const MESH_POINTS: usize = 468;

/// Presence scores below this mean the crop holds no usable face
const PRESENCE_THRESHOLD: f32 = 0.5;

/// A single mesh point, frame-normalized
#[derive(Debug, Clone, Copy)]
pub struct MeshPoint {
    pub x: f32,
    pub y: f32,
}

/// Face mesh result
#[derive(Debug, Clone)]
pub struct FaceMesh {
    pub points: Vec<MeshPoint>,
    pub presence: f32,
}

/// Face mesh landmarker
pub struct FaceLandmarker {
    pool: Arc<ModelPool>,
}

impl FaceLandmarker {
    /// Create a new landmarker
    pub fn new(pool: Arc<ModelPool>) -> Self {
        Self { pool }
    }

    /// Run the mesh model on a face crop
    ///
    /// Returns None when the model reports that the crop does not contain a
    /// usable face.
    pub fn extract(&self, image: &DynamicImage, region: &CropRegion) -> Result<Option<FaceMesh>> {
        let crop = region.extract(image);
        let input_tensor = preprocess_for_landmarks(&crop)?;

        let model = self.pool.get_model(ModelType::Landmarker)?;
        let mut request = model.create_infer_request()?;

        let input = to_openvino_tensor(&input_tensor)?;
        request.set_input_tensor(&input)?;
        request.infer()?;

        // Two outputs: 1404 packed xyz coordinates and a single presence
        // logit. Output order varies between model conversions, so match on
        // element count.
        let mut coords: Option<Vec<f32>> = None;
        let mut presence_logit: Option<f32> = None;

        for i in 0..2 {
            let tensor = match request.get_output_tensor_by_index(i) {
                Ok(t) => t,
                Err(_) => break,
            };

            let data = read_tensor_f32(&tensor)?;
            match data.len() {
                n if n == MESH_POINTS * 3 => coords = Some(data),
                1 => presence_logit = data.first().copied(),
                n => warn!("Unexpected mesh output with {} elements", n),
            }
        }

        let coords = coords.context("Mesh model produced no landmark output")?;

        // A model without a presence head passes through at exactly the
        // threshold
        let presence = sigmoid(presence_logit.unwrap_or(0.0));
        if presence < PRESENCE_THRESHOLD {
            debug!("Mesh presence {:.3} below threshold, discarding", presence);
            return Ok(None);
        }

        // Coordinates are in crop input pixels. Normalize within the crop,
        // then map through the region to frame-normalized space.
        let (input_w, input_h) = LANDMARKER_INPUT_SIZE;
        let mut points = Vec::with_capacity(MESH_POINTS);
        for i in 0..MESH_POINTS {
            let u = coords[i * 3] / input_w as f32;
            let v = coords[i * 3 + 1] / input_h as f32;
            let (x, y) = region.to_frame_normalized(u, v);
            points.push(MeshPoint { x, y });
        }

        Ok(Some(FaceMesh { points, presence }))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_centered_at_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
