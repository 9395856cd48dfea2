//! Capture orchestration: layer resolution, tapped forward passes, and
//! per-class gradient extraction.

use std::collections::HashMap;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use lucent_core::{parse_unique, ExplainError, InspectableModel, Result, TapSession, TappedTensor};

/// The layers chosen for a capture run, plus warnings about what got dropped.
#[derive(Debug, Clone)]
pub struct ResolvedLayers {
    /// Canonical layer paths that exist on the model, request order preserved.
    pub layers: Vec<lucent_core::LayerPath>,
    /// One warning per requested path the model cannot tap.
    pub warnings: Vec<String>,
}

/// Result of one tapped forward pass.
pub struct CaptureOutcome<B: AutodiffBackend> {
    /// Class logits of shape (1, n_classes).
    pub logits: Tensor<B, 2>,
    /// Recorded taps, keyed by canonical layer path.
    pub taps: HashMap<String, TappedTensor<B>>,
}

/// Validate and resolve requested layer paths against a model's tap points.
///
/// Paths are de-duplicated preserving first occurrence. Paths the model does
/// not expose are skipped with a warning; if nothing survives, the request
/// cannot be served and a [`ExplainError::LayerResolution`] is returned.
pub fn resolve_layers<B: AutodiffBackend>(
    requested: &[String],
    model: &dyn InspectableModel<B>,
) -> Result<ResolvedLayers> {
    let parsed = parse_unique(requested)?;
    let mut layers = Vec::new();
    let mut warnings = Vec::new();
    for path in parsed {
        let canonical = path.canonical();
        if model.tap_points().contains(&canonical.as_str()) {
            layers.push(path);
        } else {
            tracing::warn!(layer = %canonical, arch = model.arch(), "layer not tappable, skipping");
            warnings.push(format!(
                "layer '{canonical}' is not tappable on {}",
                model.arch()
            ));
        }
    }
    if layers.is_empty() {
        return Err(ExplainError::LayerResolution(format!(
            "none of the requested layers resolve on {}: {requested:?}",
            model.arch()
        )));
    }
    Ok(ResolvedLayers { layers, warnings })
}

/// Run one tapped forward pass and verify every requested tap recorded.
pub fn run_capture<B: AutodiffBackend>(
    model: &dyn InspectableModel<B>,
    input: Tensor<B, 4>,
    layers: &[lucent_core::LayerPath],
) -> Result<CaptureOutcome<B>> {
    let mut session = TapSession::new(layers);
    let logits = model.forward_tapped(input, &mut session);

    for wanted in session.wanted() {
        if session.get(wanted).is_none() {
            return Err(ExplainError::CaptureFailure(format!(
                "layer '{wanted}' resolved but recorded no activation"
            )));
        }
    }
    Ok(CaptureOutcome {
        logits,
        taps: session.into_taps(),
    })
}

/// Per-layer gradients of one class score, on the inner (non-autodiff)
/// backend. Only spatial taps carry gradients out; flat taps are omitted.
pub type ClassGradients<B> = HashMap<String, Tensor<<B as AutodiffBackend>::InnerBackend, 4>>;

/// Activations and gradients captured for one target class.
#[derive(Debug)]
pub struct ClassCapture<B: AutodiffBackend> {
    /// Spatial activations per layer, detached from the graph.
    pub activations: HashMap<String, Tensor<B::InnerBackend, 4>>,
    /// Gradient of the class score with respect to each activation.
    pub gradients: ClassGradients<B>,
}

/// Capture activations and gradients of `class_id`'s score for every layer.
///
/// A backward pass consumes the autodiff graph, so each class gets its own
/// tapped forward; the single backward that follows yields the gradients of
/// all tapped layers at once. The forward is deterministic, so activations
/// are identical across classes.
pub fn class_capture<B: AutodiffBackend>(
    model: &dyn InspectableModel<B>,
    input: Tensor<B, 4>,
    layers: &[lucent_core::LayerPath],
    class_id: usize,
) -> Result<ClassCapture<B>> {
    let outcome = run_capture(model, input, layers)?;
    let [_, n_classes] = outcome.logits.dims();
    if class_id >= n_classes {
        return Err(ExplainError::CaptureFailure(format!(
            "class {class_id} out of range for {n_classes}-class model"
        )));
    }

    let score = outcome
        .logits
        .clone()
        .slice([0..1, class_id..class_id + 1])
        .reshape([1]);
    let grads = score.backward();

    let mut activations = HashMap::new();
    let mut gradients = HashMap::new();
    for (name, tap) in outcome.taps {
        let TappedTensor::Spatial(probe) = tap else {
            continue;
        };
        let Some(grad) = probe.grad(&grads) else {
            return Err(ExplainError::CaptureFailure(format!(
                "no gradient reached layer '{name}' for class {class_id}"
            )));
        };
        activations.insert(name.clone(), probe.inner());
        gradients.insert(name, grad);
    }
    Ok(ClassCapture {
        activations,
        gradients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucent_core::backend::Inspect;
    use lucent_models::zoo::ResNetMiniConfig;

    fn model() -> impl InspectableModel<Inspect> {
        ResNetMiniConfig::new()
            .with_n_classes(10)
            .with_width(4)
            .init::<Inspect>(&Default::default())
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_skips_unknown_with_warning() {
        let model = model();
        let resolved =
            resolve_layers(&strings(&["conv1", "bogus", "layer4"]), &model).unwrap();
        assert_eq!(resolved.layers.len(), 2);
        assert_eq!(resolved.warnings.len(), 1);
        assert!(resolved.warnings[0].contains("bogus"));
    }

    #[test]
    fn test_resolve_dedupes_preserving_order() {
        let model = model();
        let resolved =
            resolve_layers(&strings(&["layer2", "conv1", "layer2"]), &model).unwrap();
        let names: Vec<String> = resolved.layers.iter().map(|p| p.canonical()).collect();
        assert_eq!(names, vec!["layer2", "conv1"]);
    }

    #[test]
    fn test_resolve_errors_when_nothing_survives() {
        let model = model();
        let err = resolve_layers(&strings(&["nope", "also.nope"]), &model).unwrap_err();
        assert!(matches!(err, ExplainError::LayerResolution(_)));
    }

    #[test]
    fn test_run_capture_records_all_layers() {
        let device = Default::default();
        let model = model();
        let resolved = resolve_layers(&strings(&["conv1", "layer3"]), &model).unwrap();
        let input = Tensor::<Inspect, 4>::zeros([1, 3, 64, 64], &device);

        let outcome = run_capture(&model, input, &resolved.layers).unwrap();
        assert_eq!(outcome.logits.dims(), [1, 10]);
        assert!(outcome.taps.contains_key("conv1"));
        assert!(outcome.taps.contains_key("layer3"));
    }

    #[test]
    fn test_class_capture_yields_matching_shapes() {
        let device = Default::default();
        let model = model();
        let resolved = resolve_layers(&strings(&["layer1", "layer4"]), &model).unwrap();
        let input = Tensor::<Inspect, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Default,
            &device,
        );

        let capture = class_capture(&model, input, &resolved.layers, 3).unwrap();
        assert_eq!(capture.activations.len(), 2);
        for (name, activation) in &capture.activations {
            let grad = capture.gradients.get(name).unwrap();
            assert_eq!(activation.dims(), grad.dims());
        }
    }

    #[test]
    fn test_class_capture_rejects_out_of_range_class() {
        let device = Default::default();
        let model = model();
        let resolved = resolve_layers(&strings(&["conv1"]), &model).unwrap();
        let input = Tensor::<Inspect, 4>::zeros([1, 3, 64, 64], &device);

        let err = class_capture(&model, input, &resolved.layers, 99).unwrap_err();
        assert!(matches!(err, ExplainError::CaptureFailure(_)));
    }
}
