//! Error types for lucent_core.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors that can occur while processing an explanation job.
///
/// Per-layer and per-class failures inside the explainer are *not* expressed
/// through this type; they are downgraded to warning strings attached to the
/// result. Anything that surfaces here fails the whole job.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Bad caller-supplied parameters, rejected before queueing.
    #[error("Invalid parameters: {0}")]
    Validation(String),

    /// Unknown or unsupported model identifier.
    #[error("Model '{0}' is not available")]
    ModelUnavailable(String),

    /// No requested layer path resolved on the model.
    #[error("Layer resolution failed: {0}")]
    LayerResolution(String),

    /// An expected activation or gradient was absent after a forward/backward pass.
    #[error("Capture failure: {0}")]
    CaptureFailure(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Asset write or other filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation (tensor data extraction, serialization).
    #[error("{0}")]
    Internal(String),
}
