//! Feature-map extraction: which channels fired most, rendered per channel.

use std::cmp::Ordering;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use burn::tensor::backend::AutodiffBackend;
use lucent_core::{ExplainError, Result, TappedTensor};

use crate::assets::{AssetRef, AssetStore};
use crate::render;

/// One top channel of a layer's activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReport {
    /// Channel index in the activation tensor.
    pub channel: usize,
    /// Mean of the channel's raw values.
    pub mean: f32,
    /// Max of the channel's raw values.
    pub max: f32,
    /// Rendered grayscale image of the channel.
    pub asset: AssetRef,
}

/// Feature-map report for one tapped layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerReport {
    /// Canonical layer path.
    pub layer: String,
    /// Pipeline stage tag, when the registry configures one.
    pub stage: Option<String>,
    /// Activation shape as (channels, height, width).
    pub shape: [usize; 3],
    /// Top channels by spatial mean, strongest first.
    pub top_channels: Vec<ChannelReport>,
}

/// Extract and render the top channels of one tapped activation.
///
/// Only rank-4 spatial taps get feature-map treatment; flat taps return
/// `None` with a log line. Channels are ranked by their mean over the spatial
/// dimensions, `limit` capped at the channel count. Each selected channel is
/// min-max normalized to grayscale (constant channels follow the all-zero /
/// all-255 rule) and written to `<job>/<layer>/ch_<index>.png`.
pub fn extract_layer<B: AutodiffBackend>(
    tap: &TappedTensor<B>,
    layer: &str,
    stage: Option<&str>,
    limit: usize,
    store: &AssetStore,
    job_id: &str,
) -> Result<Option<LayerReport>> {
    let TappedTensor::Spatial(tensor) = tap else {
        tracing::debug!(layer, "skipping non-spatial activation");
        return Ok(None);
    };

    let [_, channels, height, width] = tensor.dims();
    let values: Vec<f32> = tensor
        .clone()
        .inner()
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::Internal(format!("activation readback failed: {e:?}")))?;
    let plane = height * width;

    // Rank channels by spatial mean, strongest first; stable for ties.
    let mut ranked: Vec<(usize, f32)> = (0..channels)
        .map(|c| {
            let slice = &values[c * plane..(c + 1) * plane];
            (c, slice.iter().sum::<f32>() / plane as f32)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut top_channels = Vec::new();
    for &(channel, mean) in ranked.iter().take(limit.min(channels)) {
        let slice = &values[channel * plane..(channel + 1) * plane];
        let max = slice.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let pixels = render::normalize_gray(slice);
        let image = GrayImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
            ExplainError::Internal(format!("channel {channel} of '{layer}' has a bad shape"))
        })?;
        let asset = store.save_gray(&format!("{job_id}/{layer}/ch_{channel}.png"), &image)?;
        top_channels.push(ChannelReport {
            channel,
            mean,
            max,
            asset,
        });
    }

    tracing::debug!(
        layer,
        channels,
        rendered = top_channels.len(),
        "extracted feature maps"
    );
    Ok(Some(LayerReport {
        layer: layer.to_string(),
        stage: stage.map(String::from),
        shape: [channels, height, width],
        top_channels,
    }))
}
