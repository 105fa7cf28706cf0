//! Image preprocessing for detection and mesh inference

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use ndarray::Array4;
use openvino::{ElementType, Shape, Tensor};
use anyhow::{Context, Result};

/// Input size for face detection (SCRFD)
pub const DETECTOR_INPUT_SIZE: (u32, u32) = (640, 640);

/// Input size for the face mesh model
pub const LANDMARKER_INPUT_SIZE: (u32, u32) = (192, 192);

/// Preprocess a full frame for the detection model
///
/// Letterboxes to 640x640 and normalizes with the SCRFD convention.
pub fn preprocess_for_detection(image: &DynamicImage) -> Result<Array4<f32>> {
    let (target_w, target_h) = DETECTOR_INPUT_SIZE;

    // Resize with aspect ratio preservation and padding
    let resized = resize_with_padding(image, target_w, target_h);

    Ok(image_to_nchw_bgr(&resized))
}

/// Preprocess a face crop for the mesh model
///
/// The crop is taken from a square `CropRegion`, so a plain resize does not
/// distort the face.
pub fn preprocess_for_landmarks(face_crop: &DynamicImage) -> Result<Array4<f32>> {
    let (target_w, target_h) = LANDMARKER_INPUT_SIZE;

    let resized = face_crop.resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3);

    Ok(image_to_nchw_rgb(&resized))
}

/// Resize image with padding to maintain aspect ratio
fn resize_with_padding(image: &DynamicImage, target_w: u32, target_h: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    let scale = f32::min(
        target_w as f32 / orig_w as f32,
        target_h as f32 / orig_h as f32,
    );

    let new_w = (orig_w as f32 * scale) as u32;
    let new_h = (orig_h as f32 * scale) as u32;

    let resized = image.resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3);

    // Center the resized image on a black canvas
    let mut padded = ImageBuffer::from_pixel(target_w, target_h, Rgb([0u8, 0, 0]));

    let offset_x = (target_w - new_w) / 2;
    let offset_y = (target_h - new_h) / 2;

    let rgb_image = resized.to_rgb8();
    for y in 0..new_h {
        for x in 0..new_w {
            let pixel = rgb_image.get_pixel(x, y);
            padded.put_pixel(x + offset_x, y + offset_y, *pixel);
        }
    }

    DynamicImage::ImageRgb8(padded)
}

/// Convert image to NCHW with SCRFD normalization
/// BGR channel order, (v - 127.5) / 128.0
fn image_to_nchw_bgr(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x, y);
            let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);

            tensor[[0, 0, y as usize, x as usize]] = (b - 127.5) / 128.0;
            tensor[[0, 1, y as usize, x as usize]] = (g - 127.5) / 128.0;
            tensor[[0, 2, y as usize, x as usize]] = (r - 127.5) / 128.0;
        }
    }

    tensor
}

/// Convert image to NCHW for the mesh model
/// RGB channel order, normalized to [0, 1]
fn image_to_nchw_rgb(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for y in 0..height {
        for x in 0..width {
            let pixel = rgb.get_pixel(x, y);

            tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }
    }

    tensor
}

/// Copy an NCHW array into a fresh OpenVINO input tensor
pub fn to_openvino_tensor(data: &Array4<f32>) -> Result<Tensor> {
    let (n, c, h, w) = data.dim();
    let shape = Shape::new(&[n as i64, c as i64, h as i64, w as i64])?;
    let mut tensor = Tensor::new(ElementType::F32, &shape)?;

    let src = data.as_slice().context("input tensor is not contiguous")?;
    unsafe {
        let dst = tensor.get_raw_data_mut()?.as_mut_ptr() as *mut f32;
        std::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
    }

    Ok(tensor)
}

/// Read an OpenVINO output tensor into a Vec<f32>
pub fn read_tensor_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let shape = tensor.get_shape()?;
    let total_elements: i64 = shape.get_dimensions().iter().product();

    let data: Vec<f32> = unsafe {
        let ptr = tensor.get_raw_data()?.as_ptr() as *const f32;
        std::slice::from_raw_parts(ptr, total_elements as usize).to_vec()
    };

    Ok(data)
}

/// Decode image from bytes with EXIF orientation handling
///
/// Phone captures often store rotation as an EXIF tag instead of rotating
/// pixels, and the geometry heuristics assume an upright frame.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(data)?;

    Ok(apply_exif_orientation(data, image))
}

/// Apply EXIF orientation to correct image rotation
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    use std::io::Cursor;

    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1) as u8,
        Err(_) => 1, // No EXIF, assume normal orientation
    };

    match orientation {
        1 => image,
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Resize info for mapping detector coordinates back to the original image
pub struct ResizeInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl ResizeInfo {
    pub fn new(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;

        let scale = f32::min(
            target_w as f32 / orig_w as f32,
            target_h as f32 / orig_h as f32,
        );

        let new_w = (orig_w as f32 * scale) as u32;
        let new_h = (orig_h as f32 * scale) as u32;

        Self {
            scale,
            offset_x: (target_w - new_w) / 2,
            offset_y: (target_h - new_h) / 2,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Convert detection coordinates back to original image space
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x - self.offset_x as f32) / self.scale;
        let y = (y - self.offset_y as f32) / self.scale;
        (x, y)
    }
}

/// Square face crop with the mapping back to full-frame coordinates
///
/// The mesh model reports landmarks relative to its input crop; scoring
/// needs them relative to the whole frame.
#[derive(Debug, Clone, Copy)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl CropRegion {
    /// Build a square crop around a detection box, expanded by `margin` per
    /// side and clamped to the frame
    pub fn around_box(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        frame_width: u32,
        frame_height: u32,
        margin: f32,
    ) -> Self {
        let w = x2 - x1;
        let h = y2 - y1;
        let cx = (x1 + x2) / 2.0;
        let cy = (y1 + y2) / 2.0;

        // Square side so the mesh model sees an undistorted face
        let side = w.max(h) * (1.0 + 2.0 * margin);

        let left = (cx - side / 2.0).max(0.0);
        let top = (cy - side / 2.0).max(0.0);
        let right = (cx + side / 2.0).min(frame_width as f32);
        let bottom = (cy + side / 2.0).min(frame_height as f32);

        let x = left as u32;
        let y = top as u32;

        Self {
            x,
            y,
            width: (right as u32).saturating_sub(x).max(1),
            height: (bottom as u32).saturating_sub(y).max(1),
            frame_width,
            frame_height,
        }
    }

    /// Cut the region out of the frame
    pub fn extract(&self, image: &DynamicImage) -> DynamicImage {
        image.crop_imm(self.x, self.y, self.width, self.height)
    }

    /// Map crop-normalized coordinates to frame-normalized coordinates
    pub fn to_frame_normalized(&self, u: f32, v: f32) -> (f32, f32) {
        let px = self.x as f32 + u * self.width as f32;
        let py = self.y as f32 + v * self.height as f32;
        (px / self.frame_width as f32, py / self.frame_height as f32)
    }
}
