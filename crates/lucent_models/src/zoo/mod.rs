//! Built-in model zoo.
//!
//! Two small image CNNs with deliberately different layer naming schemes, so
//! both attribute-style (`layer4`) and index-style (`features.3`) tap paths
//! get exercised by the inspection pipeline. Weights are randomly initialized;
//! the zoo exists to drive the explainability engine, not to win benchmarks.

mod resnet_mini;
mod vgg_mini;

pub use resnet_mini::{ResNetMini, ResNetMiniConfig};
pub use vgg_mini::{VggMini, VggMiniConfig};

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::prelude::*;

/// A single convolutional block: Conv2d -> BatchNorm -> ReLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a 3x3 block with the given stride.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);
        Self { conv, bn }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = self.bn.forward(out);
        Relu::new().forward(out)
    }
}
