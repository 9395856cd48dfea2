//! # lucent_core
//!
//! Core types and capability traits for lucent model inspection.
//!
//! This crate provides:
//! - [`ExplainError`] and the [`Result`] alias used across the workspace
//! - [`Settings`] for engine-wide configuration with an explicit init point
//! - [`LayerPath`] for typed, validated layer-path parsing
//! - [`InspectableModel`] and [`TapSession`] — the narrow capability interface
//!   between the explainer and the differentiable-model runtime
//! - [`LruCache`], the bounded LRU shared by the model and result caches
//!
//! ## Shape Convention
//!
//! Image activations follow `(B, C, H, W)`:
//! - `B`: Batch size (always 1 in the inspection pipeline)
//! - `C`: Channels
//! - `H`, `W`: Spatial dimensions

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod lru;
mod model;
mod path;
mod settings;

pub use error::{ExplainError, Result};
pub use lru::LruCache;
pub use model::{InspectableModel, TapSession, TappedTensor};
pub use path::{parse_unique, LayerPath, PathSegment};
pub use settings::Settings;

/// Backend type aliases for convenience.
pub mod backend {
    pub use burn::backend::ndarray::NdArray;
    pub use burn::backend::Autodiff;

    /// The default inspection backend: autodiff over the CPU ndarray backend.
    pub type Inspect = Autodiff<NdArray>;
}
