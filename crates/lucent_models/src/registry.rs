//! Model registry: static per-model configuration plus constructors.
//!
//! The registry is the single source of truth for what a model id means:
//! display name, expected input size, normalization constants, the ordered
//! list of hookable layer paths, the stage tag per layer, and the default
//! layers used for Grad-CAM when the caller does not pick any.

use std::collections::HashMap;
use std::sync::Arc;

use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use lucent_core::{ExplainError, InspectableModel, Result};

use crate::zoo::{ResNetMiniConfig, VggMiniConfig};

/// Per-channel normalization constants applied after scaling pixels to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Per-channel mean (RGB order).
    pub mean: [f32; 3],
    /// Per-channel standard deviation (RGB order).
    pub std: [f32; 3],
}

impl Normalization {
    /// The ImageNet constants used by most pretrained vision models.
    pub fn imagenet() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Static configuration for one registered model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier, the registry key.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Input size as [height, width].
    pub input_size: [usize; 2],
    /// Normalization constants for preprocessing.
    pub normalization: Normalization,
    /// Ordered list of layer paths to hook for feature maps.
    pub layers_to_hook: Vec<String>,
    /// Pipeline stage tag per layer path (e.g. `"stem"`, `"stage1"`).
    pub layer_stages: HashMap<String, String>,
    /// Number of output classes.
    pub n_classes: usize,
}

impl ModelConfig {
    /// Stage tag for a layer, if one is configured.
    pub fn stage(&self, layer: &str) -> Option<&str> {
        self.layer_stages.get(layer).map(|s| s.as_str())
    }

    /// Default Grad-CAM layers: the last 2–3 hooked layers, since later
    /// layers carry the most class-discriminative signal.
    pub fn default_cam_layers(&self) -> Vec<String> {
        let n = self.layers_to_hook.len();
        let take = if n <= 2 {
            n
        } else if n <= 4 {
            2
        } else {
            3
        };
        self.layers_to_hook[n - take..].to_vec()
    }
}

/// Type alias for a model constructor.
pub type ModelConstructor<B> =
    Arc<dyn Fn(&<B as burn::prelude::Backend>::Device) -> Box<dyn InspectableModel<B>> + Send + Sync>;

struct ModelEntry<B: AutodiffBackend> {
    config: ModelConfig,
    constructor: ModelConstructor<B>,
}

/// Registry mapping model ids to configuration and constructors.
pub struct ModelRegistry<B: AutodiffBackend> {
    entries: HashMap<String, ModelEntry<B>>,
}

impl<B: AutodiffBackend> Default for ModelRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AutodiffBackend> ModelRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a model under its config's id.
    pub fn register<F>(&mut self, config: ModelConfig, constructor: F)
    where
        F: Fn(&B::Device) -> Box<dyn InspectableModel<B>> + Send + Sync + 'static,
    {
        self.entries.insert(
            config.id.clone(),
            ModelEntry {
                config,
                constructor: Arc::new(constructor),
            },
        );
    }

    /// Full configuration for a model id.
    pub fn get_config(&self, model_id: &str) -> Option<&ModelConfig> {
        self.entries.get(model_id).map(|e| &e.config)
    }

    /// Construct a fresh, inference-ready model handle.
    ///
    /// Construction failure (unknown id) propagates as
    /// [`ExplainError::ModelUnavailable`] and is never cached.
    pub fn create(&self, model_id: &str, device: &B::Device) -> Result<Box<dyn InspectableModel<B>>> {
        let entry = self
            .entries
            .get(model_id)
            .ok_or_else(|| ExplainError::ModelUnavailable(model_id.to_string()))?;
        tracing::info!(model_id, "loading model");
        Ok((entry.constructor)(device))
    }

    /// All registered configs, sorted by id for stable listings.
    pub fn list(&self) -> Vec<&ModelConfig> {
        let mut configs: Vec<&ModelConfig> = self.entries.values().map(|e| &e.config).collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        configs
    }

    /// Whether a model id is registered.
    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.contains_key(model_id)
    }
}

fn stages(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Create a registry with the built-in model zoo pre-registered.
///
/// # Available Models
///
/// - `resnet_mini` — residual-style CNN with attribute-named stages
///   (`conv1`, `layer1`..`layer4`)
/// - `vgg_mini` — sequential CNN with index-named stages
///   (`features.0`, `features.3`, `features.7`, `features.10`)
pub fn default_registry<B: AutodiffBackend>() -> ModelRegistry<B> {
    let mut registry = ModelRegistry::new();

    registry.register(
        ModelConfig {
            id: "resnet_mini".to_string(),
            display_name: "ResNet-Mini".to_string(),
            input_size: [224, 224],
            normalization: Normalization::imagenet(),
            layers_to_hook: vec![
                "conv1".to_string(),
                "layer1".to_string(),
                "layer2".to_string(),
                "layer3".to_string(),
                "layer4".to_string(),
            ],
            layer_stages: stages(&[
                ("conv1", "stem"),
                ("layer1", "stage1"),
                ("layer2", "stage2"),
                ("layer3", "stage3"),
                ("layer4", "stage4"),
            ]),
            n_classes: 1000,
        },
        |device| Box::new(ResNetMiniConfig::new().init::<B>(device)),
    );

    registry.register(
        ModelConfig {
            id: "vgg_mini".to_string(),
            display_name: "VGG-Mini".to_string(),
            input_size: [224, 224],
            normalization: Normalization::imagenet(),
            layers_to_hook: vec![
                "features.0".to_string(),
                "features.3".to_string(),
                "features.7".to_string(),
                "features.10".to_string(),
            ],
            layer_stages: stages(&[
                ("features.0", "stage1"),
                ("features.3", "stage2"),
                ("features.7", "stage3"),
                ("features.10", "stage4"),
            ]),
            n_classes: 1000,
        },
        |device| Box::new(VggMiniConfig::new().init::<B>(device)),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucent_core::backend::Inspect;

    #[test]
    fn test_default_registry_contents() {
        let registry: ModelRegistry<Inspect> = default_registry();
        assert!(registry.contains("resnet_mini"));
        assert!(registry.contains("vgg_mini"));
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_unknown_model_id() {
        let registry: ModelRegistry<Inspect> = default_registry();
        let device = Default::default();
        let result = registry.create("alexnet", &device);
        assert!(matches!(result, Err(ExplainError::ModelUnavailable(id)) if id == "alexnet"));
    }

    #[test]
    fn test_get_config() {
        let registry: ModelRegistry<Inspect> = default_registry();
        let config = registry.get_config("resnet_mini").unwrap();
        assert_eq!(config.input_size, [224, 224]);
        assert_eq!(config.layers_to_hook.len(), 5);
        assert_eq!(config.stage("conv1"), Some("stem"));
        assert_eq!(config.stage("fc"), None);
    }

    #[test]
    fn test_default_cam_layers_heuristic() {
        let registry: ModelRegistry<Inspect> = default_registry();

        // 5 hooked layers -> last 3.
        let resnet = registry.get_config("resnet_mini").unwrap();
        assert_eq!(
            resnet.default_cam_layers(),
            vec!["layer2", "layer3", "layer4"]
        );

        // 4 hooked layers -> last 2.
        let vgg = registry.get_config("vgg_mini").unwrap();
        assert_eq!(vgg.default_cam_layers(), vec!["features.7", "features.10"]);
    }

    #[test]
    fn test_list_is_sorted() {
        let registry: ModelRegistry<Inspect> = default_registry();
        let ids: Vec<&str> = registry.list().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["resnet_mini", "vgg_mini"]);
    }
}
