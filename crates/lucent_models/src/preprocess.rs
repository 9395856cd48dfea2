//! Image decoding and tensor preprocessing.
//!
//! The pipeline matches the usual classifier recipe: decode to RGB, resize so
//! the shorter edge hits the model's input size, center-crop, scale to [0, 1],
//! and normalize per channel.

use burn::prelude::*;
use burn::tensor::TensorData;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use lucent_core::{ExplainError, Result};

use crate::registry::ModelConfig;

/// Decode raw image bytes into an RGB image.
///
/// Any format the `image` crate recognizes is accepted; anything else is a
/// [`ExplainError::Decode`].
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExplainError::Decode(format!("unrecognized or corrupt image: {e}")))?;
    Ok(img.to_rgb8())
}

/// Resize so the shorter edge equals `target`, preserving aspect ratio,
/// then center-crop to `target` x `target`.
pub fn resize_and_crop(image: &RgbImage, target: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let (new_w, new_h) = if w <= h {
        (target, (h as f32 * target as f32 / w as f32).round() as u32)
    } else {
        ((w as f32 * target as f32 / h as f32).round() as u32, target)
    };
    let resized = image::imageops::resize(image, new_w.max(1), new_h.max(1), FilterType::Triangle);

    let left = (resized.width().saturating_sub(target)) / 2;
    let top = (resized.height().saturating_sub(target)) / 2;
    DynamicImage::ImageRgb8(resized)
        .crop_imm(left, top, target, target)
        .to_rgb8()
}

/// Turn an image into a normalized `[1, 3, H, W]` batch tensor for `config`.
pub fn to_input_tensor<B: Backend>(
    image: &RgbImage,
    config: &ModelConfig,
    device: &B::Device,
) -> Tensor<B, 4> {
    let [height, width] = config.input_size;
    let mean = config.normalization.mean;
    let std = config.normalization.std;

    // Channel-first layout, normalized in one pass.
    let mut data = vec![0.0f32; 3 * height * width];
    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= width || y >= height {
            continue;
        }
        for c in 0..3 {
            let v = pixel.0[c] as f32 / 255.0;
            data[c * height * width + y * width + x] = (v - mean[c]) / std[c];
        }
    }

    Tensor::from_data(TensorData::new(data, [1, 3, height, width]), device)
}

/// Full preprocessing: decode, resize, crop, and normalize for `config`.
///
/// Returns the tensor along with the cropped image, which downstream overlay
/// rendering uses as the blend base.
pub fn prepare_input<B: Backend>(
    bytes: &[u8],
    config: &ModelConfig,
    device: &B::Device,
) -> Result<(Tensor<B, 4>, RgbImage)> {
    let decoded = decode_rgb(bytes)?;
    let cropped = resize_and_crop(&decoded, config.input_size[1] as u32);
    let tensor = to_input_tensor::<B>(&cropped, config, device);
    Ok((tensor, cropped))
}
