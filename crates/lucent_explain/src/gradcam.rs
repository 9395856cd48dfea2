//! Gradient-weighted class activation maps.

use burn::prelude::*;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use lucent_core::{ExplainError, Result};

use crate::assets::{AssetRef, AssetStore};
use crate::capture::ClassCapture;
use crate::render;

/// Blend factor for saliency overlays.
pub const DEFAULT_ALPHA: f32 = 0.45;

/// One rendered (class, layer) overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradcamOverlay {
    /// Target class id.
    pub class_id: usize,
    /// Canonical layer path the saliency was computed from.
    pub layer: String,
    /// The persisted overlay image.
    pub asset: AssetRef,
}

/// All overlays for a job, plus warnings for pairs that failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradcamReport {
    /// Rendered overlays, one per surviving (class, layer) pair.
    pub overlays: Vec<GradcamOverlay>,
    /// Legacy single-layer overlays, one per class.
    pub legacy_cams: Vec<GradcamOverlay>,
    /// Per-pair failures, downgraded from errors.
    pub warnings: Vec<String>,
}

/// A normalized saliency map with its spatial dimensions.
pub struct SaliencyMap {
    /// Unit-normalized saliency, row-major.
    pub values: Vec<f32>,
    /// Map height in activation pixels.
    pub height: usize,
    /// Map width in activation pixels.
    pub width: usize,
}

/// Compute a unit-normalized Grad-CAM saliency map for one (class, layer).
///
/// Channel weight is the spatial mean of the gradient; the saliency is the
/// ReLU of the weighted activation sum, min-max normalized into [0, 1] with
/// the shared constant-input rule.
pub fn saliency<B: Backend>(
    activation: Tensor<B, 4>,
    gradient: Tensor<B, 4>,
) -> Result<SaliencyMap> {
    if activation.dims() != gradient.dims() {
        return Err(ExplainError::CaptureFailure(format!(
            "activation {:?} and gradient {:?} shapes differ",
            activation.dims(),
            gradient.dims()
        )));
    }
    let [_, _, height, width] = activation.dims();

    // (1, C, 1, 1) channel weights, broadcast over the activation.
    let weights = gradient.mean_dim(3).mean_dim(2);
    let cam = (activation * weights).sum_dim(1).clamp_min(0.0);

    let raw: Vec<f32> = cam
        .into_data()
        .to_vec()
        .map_err(|e| ExplainError::Internal(format!("saliency readback failed: {e:?}")))?;
    Ok(SaliencyMap {
        values: render::normalize_unit(&raw),
        height,
        width,
    })
}

/// Render a saliency map as a colorized overlay on `base`.
pub fn overlay_on(base: &RgbImage, map: &SaliencyMap, alpha: f32) -> RgbImage {
    let (width, height) = base.dimensions();
    let resized = render::resize_map(
        &map.values,
        map.width as u32,
        map.height as u32,
        width,
        height,
    );
    render::blend_overlay(base, &resized, alpha)
}

/// Render the multi-layer overlays for one class into the report.
///
/// Failures of individual (class, layer) pairs never fail the job; they are
/// recorded as warnings and the remaining pairs still render. The overlay for
/// `legacy_layer` (when it is among the captured layers) is additionally
/// written to the legacy `cams/class_<id>.png` location.
pub fn render_class<B: burn::tensor::backend::AutodiffBackend>(
    capture: &ClassCapture<B>,
    layer_order: &[String],
    class_id: usize,
    base: &RgbImage,
    legacy_layer: Option<&str>,
    store: &AssetStore,
    job_id: &str,
    report: &mut GradcamReport,
) {
    for layer in layer_order {
        let (Some(activation), Some(gradient)) = (
            capture.activations.get(layer),
            capture.gradients.get(layer),
        ) else {
            report.warnings.push(format!(
                "class {class_id}, layer '{layer}': no spatial capture available"
            ));
            continue;
        };

        let rendered = saliency(activation.clone(), gradient.clone()).and_then(|map| {
            let image = overlay_on(base, &map, DEFAULT_ALPHA);
            let asset =
                store.save_rgb(&format!("{job_id}/gradcam/{class_id}/{layer}.png"), &image)?;
            if legacy_layer == Some(layer.as_str()) {
                let legacy =
                    store.save_rgb(&format!("{job_id}/cams/class_{class_id}.png"), &image)?;
                report.legacy_cams.push(GradcamOverlay {
                    class_id,
                    layer: layer.clone(),
                    asset: legacy,
                });
            }
            Ok(asset)
        });

        match rendered {
            Ok(asset) => report.overlays.push(GradcamOverlay {
                class_id,
                layer: layer.clone(),
                asset,
            }),
            Err(err) => {
                tracing::warn!(class_id, layer = %layer, %err, "overlay failed");
                report
                    .warnings
                    .push(format!("class {class_id}, layer '{layer}': {err}"));
            }
        }
    }
}
