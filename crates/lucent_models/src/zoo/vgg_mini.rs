//! VGG-Mini: a small sequential CNN with index-named feature stages.
//!
//! Tap paths use the `features.<index>` convention of sequential containers
//! (`features.0`, `features.3`, ...), exercising index-style path segments in
//! the inspection pipeline.

use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use lucent_core::{InspectableModel, TapSession};

use super::ConvBlock;

/// Configuration for [`VggMini`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VggMiniConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Channel count of the first stage; doubled at each later stage.
    pub width: usize,
}

impl Default for VggMiniConfig {
    fn default() -> Self {
        Self {
            n_classes: 1000,
            width: 16,
        }
    }
}

impl VggMiniConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of classes.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set the first-stage width.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VggMini<B> {
        VggMini::new(self.clone(), device)
    }
}

/// Small sequential CNN for 224x224 RGB inputs.
///
/// The feature extractor mirrors a flattened `Sequential`; the tap names
/// record the indices its conv blocks would carry in that container.
#[derive(Module, Debug)]
pub struct VggMini<B: Backend> {
    features_0: ConvBlock<B>,
    features_3: ConvBlock<B>,
    features_7: ConvBlock<B>,
    features_10: ConvBlock<B>,
    pool: MaxPool2d,
    avgpool: AdaptiveAvgPool2d,
    classifier: Linear<B>,
    n_classes: usize,
}

const TAP_POINTS: &[&str] = &["features.0", "features.3", "features.7", "features.10"];

impl<B: Backend> VggMini<B> {
    /// Create a new model from config.
    pub fn new(config: VggMiniConfig, device: &B::Device) -> Self {
        let w = config.width;
        Self {
            features_0: ConvBlock::new(3, w, 1, device),
            features_3: ConvBlock::new(w, w * 2, 1, device),
            features_7: ConvBlock::new(w * 2, w * 4, 1, device),
            features_10: ConvBlock::new(w * 4, w * 4, 1, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            classifier: LinearConfig::new(w * 4, config.n_classes).init(device),
            n_classes: config.n_classes,
        }
    }

    /// Plain forward pass without taps.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.features_0.forward(x));
        let x = self.pool.forward(self.features_3.forward(x));
        let x = self.pool.forward(self.features_7.forward(x));
        let x = self.pool.forward(self.features_10.forward(x));
        let x = self.avgpool.forward(x).flatten(1, 3);
        self.classifier.forward(x)
    }
}

impl<B: AutodiffBackend> InspectableModel<B> for VggMini<B> {
    fn arch(&self) -> &str {
        "vgg_mini"
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn tap_points(&self) -> &[&'static str] {
        TAP_POINTS
    }

    fn forward_tapped(&self, input: Tensor<B, 4>, session: &mut TapSession<B>) -> Tensor<B, 2> {
        let x = session.tap4("features.0", self.features_0.forward(input));
        let x = self.pool.forward(x);
        let x = session.tap4("features.3", self.features_3.forward(x));
        let x = self.pool.forward(x);
        let x = session.tap4("features.7", self.features_7.forward(x));
        let x = self.pool.forward(x);
        let x = session.tap4("features.10", self.features_10.forward(x));
        let x = self.pool.forward(x);
        let x = self.avgpool.forward(x).flatten(1, 3);
        self.classifier.forward(x)
    }
}
