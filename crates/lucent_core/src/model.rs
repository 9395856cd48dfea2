//! The inspectable-model capability trait and the tap session.
//!
//! A model is "inspectable" when its forward pass can be tapped: for a chosen
//! set of named subcomponents, the tensor flowing through each one is recorded
//! so that activations (and, after a backward pass, gradients) are available
//! keyed by layer path. The capture itself is session-scoped — taps exist only
//! as state of a [`TapSession`] passed into one forward call, so nothing can
//! leak into later inference runs sharing the same loaded model.

use std::collections::HashMap;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::path::LayerPath;

/// A tensor recorded at a tap point.
///
/// Spatial taps carry the (batch, channel, height, width) activations used by
/// feature-map extraction and Grad-CAM. Pooled or flattened layers record a
/// flat tap, which downstream consumers skip.
#[derive(Debug, Clone)]
pub enum TappedTensor<B: AutodiffBackend> {
    /// Rank-4 activation (batch, channels, height, width).
    Spatial(Tensor<B, 4>),
    /// Rank-2 activation (batch, features).
    Flat(Tensor<B, 2>),
}

/// Per-forward-pass capture state.
///
/// The recorded tensors are gradient roots: the tapped value is re-emitted
/// into the forward graph through a zero-offset probe, so a single backward
/// pass from any scalar objective yields the gradient of that objective with
/// respect to *every* tapped tensor simultaneously, while gradient flow to
/// earlier layers is preserved.
pub struct TapSession<B: AutodiffBackend> {
    wanted: Vec<String>,
    taps: HashMap<String, TappedTensor<B>>,
}

impl<B: AutodiffBackend> TapSession<B> {
    /// Create a session requesting taps on the given layer paths.
    pub fn new(paths: &[LayerPath]) -> Self {
        Self {
            wanted: paths.iter().map(|p| p.canonical()).collect(),
            taps: HashMap::new(),
        }
    }

    /// Whether the session wants a tap at `name`.
    pub fn wants(&self, name: &str) -> bool {
        self.wanted.iter().any(|w| w == name)
    }

    /// The requested tap names, in request order.
    pub fn wanted(&self) -> &[String] {
        &self.wanted
    }

    /// Tap a rank-4 activation, returning the tensor to continue the forward
    /// pass with. If the session does not want `name`, this is the identity.
    pub fn tap4(&mut self, name: &str, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if !self.wants(name) {
            return x;
        }
        let probe = x.clone().detach().require_grad();
        // Zero-valued offset: value is unchanged, but the probe becomes a
        // gradient root receiving the same upstream gradient as `x`.
        let passthrough = x + probe.clone() - probe.clone().detach();
        tracing::debug!(layer = name, shape = ?probe.dims(), "captured activation");
        self.taps
            .insert(name.to_string(), TappedTensor::Spatial(probe));
        passthrough
    }

    /// Tap a rank-2 activation (pooled/flattened layers).
    pub fn tap2(&mut self, name: &str, x: Tensor<B, 2>) -> Tensor<B, 2> {
        if !self.wants(name) {
            return x;
        }
        let probe = x.clone().detach().require_grad();
        let passthrough = x + probe.clone() - probe.clone().detach();
        tracing::debug!(layer = name, shape = ?probe.dims(), "captured flat activation");
        self.taps.insert(name.to_string(), TappedTensor::Flat(probe));
        passthrough
    }

    /// Get a recorded tap by name.
    pub fn get(&self, name: &str) -> Option<&TappedTensor<B>> {
        self.taps.get(name)
    }

    /// Names of the taps actually recorded during the forward pass.
    pub fn recorded(&self) -> Vec<&str> {
        self.taps.keys().map(|s| s.as_str()).collect()
    }

    /// Consume the session, yielding the recorded taps.
    pub fn into_taps(self) -> HashMap<String, TappedTensor<B>> {
        self.taps
    }
}

/// Capability interface over an opaque layered model.
///
/// This is the narrow seam between the explainer and the differentiable-model
/// runtime: class count, architecture name, the static list of tappable
/// subcomponent paths, and a single tapped forward evaluation. Backward
/// evaluation happens through the autodiff backend on the returned logits.
pub trait InspectableModel<B: AutodiffBackend>: Send {
    /// Architecture name (e.g. `"resnet_mini"`).
    fn arch(&self) -> &str;

    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// The canonical paths of all tappable subcomponents, in forward order.
    fn tap_points(&self) -> &[&'static str];

    /// One forward evaluation, recording any taps the session requests.
    ///
    /// Input shape is (1, 3, H, W); output is class logits of shape
    /// (1, n_classes).
    fn forward_tapped(&self, input: Tensor<B, 4>, session: &mut TapSession<B>) -> Tensor<B, 2>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn paths(raw: &[&str]) -> Vec<LayerPath> {
        raw.iter().map(|r| LayerPath::parse(r).unwrap()).collect()
    }

    #[test]
    fn test_session_wants() {
        let session: TapSession<TestBackend> = TapSession::new(&paths(&["conv1", "layer1"]));
        assert!(session.wants("conv1"));
        assert!(session.wants("layer1"));
        assert!(!session.wants("layer2"));
    }

    #[test]
    fn test_tap_preserves_value() {
        let device = Default::default();
        let mut session: TapSession<TestBackend> = TapSession::new(&paths(&["conv1"]));
        let x = Tensor::<TestBackend, 4>::from_floats([[[[1.0, 2.0], [3.0, 4.0]]]], &device);
        let y = session.tap4("conv1", x.clone());

        let x_data: Vec<f32> = x.into_data().to_vec().unwrap();
        let y_data: Vec<f32> = y.into_data().to_vec().unwrap();
        assert_eq!(x_data, y_data);
        assert!(session.get("conv1").is_some());
    }

    #[test]
    fn test_untapped_layer_is_identity() {
        let device = Default::default();
        let mut session: TapSession<TestBackend> = TapSession::new(&paths(&["conv1"]));
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device);
        let _ = session.tap4("layer1", x);
        assert!(session.get("layer1").is_none());
        assert!(session.recorded().is_empty());
    }

    #[test]
    fn test_probe_receives_gradient() {
        let device = Default::default();
        let mut session: TapSession<TestBackend> = TapSession::new(&paths(&["conv1"]));
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device);
        let tapped = session.tap4("conv1", x);

        // A downstream scalar objective: sum of 3 * activation.
        let objective = (tapped * 3.0).sum();
        let grads = objective.backward();

        let TappedTensor::Spatial(probe) = session.get("conv1").unwrap() else {
            panic!("expected spatial tap");
        };
        let grad = probe.grad(&grads).expect("probe should have a gradient");
        let grad_data: Vec<f32> = grad.into_data().to_vec().unwrap();
        assert!(grad_data.iter().all(|&g| (g - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_gradient_flows_past_tap() {
        let device = Default::default();
        let mut session: TapSession<TestBackend> = TapSession::new(&paths(&["mid"]));
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device).require_grad();
        let mid = input.clone() * 2.0;
        let tapped = session.tap2("unused", Tensor::<TestBackend, 2>::ones([1, 2], &device));
        drop(tapped);
        let tapped_mid = session.tap4("mid", mid);
        let objective = tapped_mid.sum();
        let grads = objective.backward();

        // The tap must not cut the graph: the input still gets d(sum(2x))/dx = 2.
        let input_grad = input.grad(&grads).expect("input should have a gradient");
        let data: Vec<f32> = input_grad.into_data().to_vec().unwrap();
        assert!(data.iter().all(|&g| (g - 2.0).abs() < 1e-6));
    }
}
