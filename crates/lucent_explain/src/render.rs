//! Shared numeric pieces of saliency rendering.
//!
//! Normalization, the saliency colormap, bilinear resize of scalar maps, and
//! alpha blending. Everything here works on plain `f32` slices so the callers
//! can stay off the tensor backend once values leave the model.

use image::imageops::FilterType;
use image::{ImageBuffer, Luma, Rgb, RgbImage};

/// Dynamic ranges below this are treated as constant.
pub const NORM_EPSILON: f32 = 1e-6;

/// Min-max normalize `values` into [0, 1].
///
/// A constant input has no usable range: if the constant is near zero the
/// output is all zeros, otherwise all ones. This avoids division by zero
/// without silently corrupting output.
pub fn normalize_unit(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if !range.is_finite() || range < NORM_EPSILON {
        let fill = if max.abs() < NORM_EPSILON { 0.0 } else { 1.0 };
        return vec![fill; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Min-max normalize `values` into 0..=255 grayscale bytes, same constant
/// rule as [`normalize_unit`].
pub fn normalize_gray(values: &[f32]) -> Vec<u8> {
    normalize_unit(values)
        .into_iter()
        .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}

/// Map a saliency value in [0, 1] to RGB.
///
/// Monotonic heat ramp: red rises with saliency, blue falls, green peaks at
/// mid-saliency, so low values read blue, high values read red.
pub fn colormap(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0);
    let r = v * 255.0;
    let g = (1.0 - (v - 0.5).abs() * 2.0) * 255.0;
    let b = (1.0 - v) * 255.0;
    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

/// Bilinearly resize a scalar map from `(width, height)` to
/// `(out_width, out_height)`.
pub fn resize_map(
    values: &[f32],
    width: u32,
    height: u32,
    out_width: u32,
    out_height: u32,
) -> Vec<f32> {
    if width == out_width && height == out_height {
        return values.to_vec();
    }
    let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(width, height, values.to_vec())
            .unwrap_or_else(|| ImageBuffer::new(width, height));
    let resized = image::imageops::resize(&buffer, out_width, out_height, FilterType::Triangle);
    resized.into_raw()
}

/// Alpha-blend a colorized saliency map over `base`.
///
/// `saliency` must be unit-normalized and sized like `base` (row-major).
/// Output channels are clamped to 0..=255.
pub fn blend_overlay(base: &RgbImage, saliency: &[f32], alpha: f32) -> RgbImage {
    let (width, height) = base.dimensions();
    let alpha = alpha.clamp(0.0, 1.0);
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let idx = (y * width + x) as usize;
        let heat = colormap(saliency.get(idx).copied().unwrap_or(0.0));
        let src = base.get_pixel(x, y).0;
        let mut blended = [0u8; 3];
        for c in 0..3 {
            let v = (1.0 - alpha) * src[c] as f32 + alpha * heat[c] as f32;
            blended[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        *pixel = Rgb(blended);
    }
    out
}
