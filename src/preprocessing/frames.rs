//! Frame decoding into normalized tensors.
//!
//! | Frame | Channels | Source depths | Range |
//! |-------|----------|---------------|-------|
//! | RGB   | 3        | 8/16-bit, any colour type | [0, 1] |
//! | Depth | 1        | 8/16-bit gray or colour (→ luma) | [0, 1] |
//!
//! 8-bit samples are divided by 255 and 16-bit samples by 65535 (the float
//! conversions in `image` apply the scale matching the stored bit depth).

use super::resize::area_resize;
use crate::error::Result;
use image::DynamicImage;
use ndarray::Array3;
use std::path::Path;

/// Decode a frame and area-resize it to `size × size × 3` in [0, 1].
pub fn load_rgb(path: &Path, size: usize) -> Result<Array3<f32>> {
    let image = image::open(path)?;
    rgb_tensor(&image, size)
}

/// Decode a depth map and area-resize it to `size × size × 1` in [0, 1].
pub fn load_depth(path: &Path, size: usize) -> Result<Array3<f32>> {
    let image = image::open(path)?;
    depth_tensor(&image, size)
}

/// Convert an in-memory image to an RGB tensor.
pub fn rgb_tensor(image: &DynamicImage, size: usize) -> Result<Array3<f32>> {
    let rgb = image.to_rgb32f();
    let (w, h) = rgb.dimensions();
    let full = Array3::from_shape_vec((h as usize, w as usize, 3), rgb.into_raw())?;
    Ok(clamp_unit(area_resize(full.view(), size, size)))
}

/// Convert an in-memory image to a single-channel depth tensor.
pub fn depth_tensor(image: &DynamicImage, size: usize) -> Result<Array3<f32>> {
    let luma = image.to_luma32f();
    let (w, h) = luma.dimensions();
    let full = Array3::from_shape_vec((h as usize, w as usize, 1), luma.into_raw())?;
    Ok(clamp_unit(area_resize(full.view(), size, size)))
}

// Resampling weights can overshoot 1.0 by an ulp
fn clamp_unit(mut tensor: Array3<f32>) -> Array3<f32> {
    tensor.mapv_inplace(|v| v.clamp(0.0, 1.0));
    tensor
}
