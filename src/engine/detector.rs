//! SCRFD face detector
//!
//! Runs the keypoint-free SCRFD model (3 strides, 2 anchors per cell) and
//! returns bounding boxes in original-image pixels, strongest first.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use openvino::InferRequest;
use anyhow::Result;
use tracing::debug;

use super::pool::{ModelPool, ModelType};
use super::preprocess::{
    preprocess_for_detection, read_tensor_f32, to_openvino_tensor, ResizeInfo,
    DETECTOR_INPUT_SIZE,
};

/// Feature map strides of the SCRFD head
const STRIDES: [i32; 3] = [8, 16, 32];

/// Anchors per feature map cell
const NUM_ANCHORS: usize = 2;

/// Face detection result
#[derive(Debug, Clone)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

/// SCRFD face detector
pub struct FaceDetector {
    pool: Arc<ModelPool>,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl FaceDetector {
    /// Create a new face detector
    pub fn new(pool: Arc<ModelPool>, confidence_threshold: f32) -> Self {
        Self {
            pool,
            confidence_threshold,
            nms_threshold: 0.4,
        }
    }

    /// Detect faces in a decoded frame
    ///
    /// Results are sorted by confidence descending, so the first box is the
    /// strongest detection.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let (orig_w, orig_h) = image.dimensions();
        let resize_info = ResizeInfo::new((orig_w, orig_h), DETECTOR_INPUT_SIZE);

        let input_tensor = preprocess_for_detection(image)?;

        let model = self.pool.get_model(ModelType::Detector)?;
        let mut request = model.create_infer_request()?;

        let input = to_openvino_tensor(&input_tensor)?;
        request.set_input_tensor(&input)?;
        request.infer()?;

        let candidates = self.parse_outputs(&request, &resize_info)?;
        let faces = nms(candidates, self.nms_threshold);

        debug!("Detected {} faces after NMS", faces.len());

        Ok(faces)
    }

    /// Parse the SCRFD outputs
    ///
    /// The keypoint-free model has 6 outputs: scores for stride 8/16/32
    /// followed by distance-format boxes for the same strides.
    fn parse_outputs(&self, request: &InferRequest, resize_info: &ResizeInfo) -> Result<Vec<FaceBox>> {
        let mut candidates = Vec::new();

        let (input_h, input_w) = (DETECTOR_INPUT_SIZE.1 as i32, DETECTOR_INPUT_SIZE.0 as i32);

        for (idx, &stride) in STRIDES.iter().enumerate() {
            let scores = read_tensor_f32(&request.get_output_tensor_by_index(idx)?)?;
            let bboxes = read_tensor_f32(&request.get_output_tensor_by_index(idx + STRIDES.len())?)?;

            let feat_h = input_h / stride;
            let feat_w = input_w / stride;

            // Anchor centers walk the stride grid, NUM_ANCHORS per cell
            let mut anchor_centers: Vec<(f32, f32)> =
                Vec::with_capacity((feat_h * feat_w) as usize * NUM_ANCHORS);
            for y in 0..feat_h {
                for x in 0..feat_w {
                    let cx = (x * stride) as f32;
                    let cy = (y * stride) as f32;
                    for _ in 0..NUM_ANCHORS {
                        anchor_centers.push((cx, cy));
                    }
                }
            }

            for (i, &(cx, cy)) in anchor_centers.iter().enumerate() {
                let score = match scores.get(i) {
                    Some(&s) => s,
                    None => break,
                };

                if score < self.confidence_threshold {
                    continue;
                }

                // Box predictions are distances from the anchor center
                // (left, top, right, bottom), in stride units
                let bbox_idx = i * 4;
                if bbox_idx + 3 >= bboxes.len() {
                    break;
                }

                let left = bboxes[bbox_idx] * stride as f32;
                let top = bboxes[bbox_idx + 1] * stride as f32;
                let right = bboxes[bbox_idx + 2] * stride as f32;
                let bottom = bboxes[bbox_idx + 3] * stride as f32;

                let (x1, y1) = resize_info.to_original(cx - left, cy - top);
                let (x2, y2) = resize_info.to_original(cx + right, cy + bottom);

                candidates.push(FaceBox {
                    x1: x1.clamp(0.0, resize_info.original_width as f32),
                    y1: y1.clamp(0.0, resize_info.original_height as f32),
                    x2: x2.clamp(0.0, resize_info.original_width as f32),
                    y2: y2.clamp(0.0, resize_info.original_height as f32),
                    confidence: score,
                });
            }

            debug!("Stride {}: {} candidates so far", stride, candidates.len());
        }

        Ok(candidates)
    }
}

/// Greedy non-maximum suppression, strongest box first
pub fn nms(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    if boxes.is_empty() {
        return boxes;
    }

    // Sort by confidence (descending); total_cmp keeps a NaN score from
    // panicking the blocking task
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(boxes[i].clone());

        for j in (i + 1)..boxes.len() {
            if suppressed[j] {
                continue;
            }

            if iou(&boxes[i], &boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection over union of two boxes
pub fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);

    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);

    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> FaceBox {
        FaceBox { x1, y1, x2, y2, confidence }
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = face(5.0, 5.0, 15.0, 15.0, 0.8);

        // Intersection 25, union 175
        assert!((iou(&a, &b) - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = face(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = face(20.0, 20.0, 30.0, 30.0, 0.8);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_nms_keeps_strongest_of_overlapping_pair() {
        let boxes = vec![
            face(0.0, 0.0, 10.0, 10.0, 0.7),
            face(1.0, 1.0, 11.0, 11.0, 0.95),
            face(50.0, 50.0, 60.0, 60.0, 0.6),
        ];

        let kept = nms(boxes, 0.4);

        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.95).abs() < 1e-6);
        assert!((kept[1].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_nms_sorts_by_confidence() {
        let boxes = vec![
            face(0.0, 0.0, 10.0, 10.0, 0.6),
            face(50.0, 0.0, 60.0, 10.0, 0.9),
            face(0.0, 50.0, 10.0, 60.0, 0.75),
        ];

        let kept = nms(boxes, 0.4);

        assert_eq!(kept.len(), 3);
        assert!(kept[0].confidence >= kept[1].confidence);
        assert!(kept[1].confidence >= kept[2].confidence);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(Vec::new(), 0.4).is_empty());
    }

    #[test]
    fn test_nms_survives_nan_confidence() {
        let boxes = vec![
            face(0.0, 0.0, 10.0, 10.0, f32::NAN),
            face(50.0, 50.0, 60.0, 60.0, 0.8),
        ];

        let kept = nms(boxes, 0.4);
        assert_eq!(kept.len(), 2);
    }
}
