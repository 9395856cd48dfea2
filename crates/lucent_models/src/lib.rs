//! # lucent_models
//!
//! Model registry, built-in zoo, preprocessing, and the model cache.
//!
//! This crate owns everything between a model id and an inference-ready
//! handle:
//! - [`ModelRegistry`] maps ids to static [`ModelConfig`] plus constructors
//! - [`zoo`] holds the built-in CNNs (`resnet_mini`, `vgg_mini`)
//! - [`preprocess`] turns raw image bytes into normalized input tensors
//! - [`ModelCache`] keeps a bounded LRU of loaded handles
//! - [`ClassLabels`] resolves class ids to display names

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod labels;
pub mod preprocess;
mod registry;
pub mod zoo;

pub use cache::ModelCache;
pub use labels::ClassLabels;
pub use registry::{default_registry, ModelConfig, ModelConstructor, ModelRegistry, Normalization};
