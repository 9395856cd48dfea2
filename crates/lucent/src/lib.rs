//! # lucent
//!
//! Image-model explainability in Rust: submit an image and a model id,
//! receive top-k predictions, per-layer feature maps, and Grad-CAM overlays,
//! computed asynchronously by a single background worker with bounded caches
//! for loaded models and completed results.
//!
//! - **Core**: errors, settings, layer paths, the inspectable-model trait
//! - **Models**: registry, built-in CNN zoo, preprocessing, model cache
//! - **Explain**: activation/gradient capture, feature maps, Grad-CAM
//! - **Jobs**: job table, fingerprinting, result cache, orchestrator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lucent::prelude::*;
//! use std::sync::Arc;
//!
//! let settings = Settings::from_env();
//! let registry = Arc::new(default_registry::<Inspect>());
//! let service = JobService::new(&settings, registry, Default::default())?;
//!
//! let job_id = service.submit("resnet_mini", image_bytes, ExplainParams::default())?;
//! let record = service.wait(&job_id, std::time::Duration::from_secs(60));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use lucent_core as core;
pub use lucent_explain as explain;
pub use lucent_jobs as jobs;
pub use lucent_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use lucent::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use lucent_core::backend::Inspect;
    pub use lucent_core::{ExplainError, InspectableModel, LayerPath, Result, Settings, TapSession};

    // Models
    pub use lucent_models::{default_registry, ClassLabels, ModelConfig, ModelRegistry};

    // Explain
    pub use lucent_explain::{AssetRef, AssetStore, GradcamReport, LayerReport};

    // Jobs
    pub use lucent_jobs::{ExplainParams, JobRecord, JobResult, JobService, JobStatus};
}
