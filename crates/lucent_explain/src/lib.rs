//! # lucent_explain
//!
//! The explainability engine: activation and gradient capture, feature-map
//! extraction, Grad-CAM, and the rendering/persistence pieces behind them.
//!
//! The pipeline a job runs through:
//! 1. [`capture::resolve_layers`] validates requested layer paths against the
//!    model's tap points
//! 2. [`capture::run_capture`] performs one tapped forward pass
//! 3. [`feature_maps::extract_layer`] renders the top channels per layer
//! 4. [`capture::class_capture`] + [`gradcam::render_class`] produce one
//!    saliency overlay per (class, layer) pair
//!
//! Per-layer and per-(class, layer) failures degrade to warnings; only
//! whole-pipeline failures (no resolvable layer, capture breakage) error.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assets;
pub mod capture;
pub mod feature_maps;
pub mod gradcam;
pub mod render;

pub use assets::{AssetRef, AssetStore};
pub use capture::{CaptureOutcome, ClassCapture, ResolvedLayers};
pub use feature_maps::{ChannelReport, LayerReport};
pub use gradcam::{GradcamOverlay, GradcamReport, SaliencyMap, DEFAULT_ALPHA};
