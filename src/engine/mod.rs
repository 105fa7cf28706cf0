//! Inference engine module
//!
//! Provides OpenVINO-based inference with:
//! - Model lazy loading and auto-unloading
//! - Face detection and face mesh extraction

pub mod pool;
pub mod detector;
pub mod landmarker;
pub mod preprocess;

pub use pool::ModelPool;
pub use detector::FaceDetector;
pub use landmarker::FaceLandmarker;
