//! ResNet-Mini: a small residual-style CNN with attribute-named stages.
//!
//! Stage names follow the torchvision ResNet convention (`conv1`,
//! `layer1`..`layer4`, `avgpool`) so layer paths look like the ones users of
//! the bigger models already know. Each `layerN` halves the spatial
//! resolution and carries a projection shortcut.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use lucent_core::{InspectableModel, TapSession};

use super::ConvBlock;

/// Configuration for [`ResNetMini`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResNetMiniConfig {
    /// Number of output classes.
    pub n_classes: usize,
    /// Channel count of the stem; each stage doubles it up to 8x.
    pub width: usize,
}

impl Default for ResNetMiniConfig {
    fn default() -> Self {
        Self {
            n_classes: 1000,
            width: 16,
        }
    }
}

impl ResNetMiniConfig {
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

    /// Set the stem width.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNetMini<B> {
        ResNetMini::new(self.clone(), device)
    }
}

/// One downsampling residual stage: ConvBlock with stride 2 plus a 1x1
/// projection shortcut.
#[derive(Module, Debug)]
pub struct ResStage<B: Backend> {
    block: ConvBlock<B>,
    shortcut: Conv2d<B>,
}

impl<B: Backend> ResStage<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let block = ConvBlock::new(in_channels, out_channels, 2, device);
        let shortcut = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([2, 2])
            .with_bias(false)
            .init(device);
        Self { block, shortcut }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let main = self.block.forward(x.clone());
        let skip = self.shortcut.forward(x);
        Relu::new().forward(main + skip)
    }
}

/// Small residual CNN for 224x224 RGB inputs.
#[derive(Module, Debug)]
pub struct ResNetMini<B: Backend> {
    conv1: ConvBlock<B>,
    maxpool: MaxPool2d,
    layer1: ResStage<B>,
    layer2: ResStage<B>,
    layer3: ResStage<B>,
    layer4: ResStage<B>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    n_classes: usize,
}

const TAP_POINTS: &[&str] = &["conv1", "layer1", "layer2", "layer3", "layer4", "avgpool"];

impl<B: Backend> ResNetMini<B> {
    /// Create a new model from config.
    pub fn new(config: ResNetMiniConfig, device: &B::Device) -> Self {
        let w = config.width;
        let conv1 = ConvBlock::new(3, w, 2, device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();
        let layer1 = ResStage::new(w, w * 2, device);
        let layer2 = ResStage::new(w * 2, w * 4, device);
        let layer3 = ResStage::new(w * 4, w * 8, device);
        let layer4 = ResStage::new(w * 8, w * 8, device);
        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(w * 8, config.n_classes).init(device);

        Self {
            conv1,
            maxpool,
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool,
            fc,
            n_classes: config.n_classes,
        }
    }

    /// Plain forward pass without taps.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.maxpool.forward(x);
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);
        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);
        self.fc.forward(x)
    }
}

impl<B: AutodiffBackend> InspectableModel<B> for ResNetMini<B> {
    fn arch(&self) -> &str {
        "resnet_mini"
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn tap_points(&self) -> &[&'static str] {
        TAP_POINTS
    }

    fn forward_tapped(&self, input: Tensor<B, 4>, session: &mut TapSession<B>) -> Tensor<B, 2> {
        let x = session.tap4("conv1", self.conv1.forward(input));
        let x = self.maxpool.forward(x);
        let x = session.tap4("layer1", self.layer1.forward(x));
        let x = session.tap4("layer2", self.layer2.forward(x));
        let x = session.tap4("layer3", self.layer3.forward(x));
        let x = session.tap4("layer4", self.layer4.forward(x));
        let x = self.avgpool.forward(x).flatten(1, 3);
        let x = session.tap2("avgpool", x);
        self.fc.forward(x)
    }
}
