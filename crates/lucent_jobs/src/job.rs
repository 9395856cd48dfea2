//! Job data model: parameters, lifecycle states, records, and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lucent_core::{ExplainError, Result};
use lucent_explain::{AssetRef, GradcamReport, LayerReport};

/// Bounds for the explanation top-k parameter.
pub const TOP_K_MIN: usize = 1;
/// Upper bound for the explanation top-k parameter.
pub const TOP_K_MAX: usize = 5;

/// Caller-supplied parameters for one explanation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainParams {
    /// How many top classes to explain (1..=5).
    pub top_k: usize,
    /// Layers to compute Grad-CAM from; `None` uses the model's defaults.
    pub cam_layers: Option<Vec<String>>,
    /// Cap on rendered channels per layer.
    pub feature_map_limit: usize,
    /// Whether to compute Grad-CAM overlays at all.
    pub include_gradcam: bool,
}

impl Default for ExplainParams {
    fn default() -> Self {
        Self {
            top_k: 3,
            cam_layers: None,
            feature_map_limit: 32,
            include_gradcam: true,
        }
    }
}

impl ExplainParams {
    /// Validate bounds before submission.
    pub fn validate(&self) -> Result<()> {
        if !(TOP_K_MIN..=TOP_K_MAX).contains(&self.top_k) {
            return Err(ExplainError::Validation(format!(
                "top_k must be in {TOP_K_MIN}..={TOP_K_MAX}, got {}",
                self.top_k
            )));
        }
        if self.feature_map_limit == 0 {
            return Err(ExplainError::Validation(
                "feature_map_limit must be at least 1".to_string(),
            ));
        }
        if matches!(&self.cam_layers, Some(layers) if layers.is_empty()) {
            return Err(ExplainError::Validation(
                "cam_layers must be non-empty when given".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a job. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for the worker.
    Queued,
    /// Being processed by the worker.
    Running,
    /// Finished with a result.
    Succeeded,
    /// Finished with an error message.
    Failed,
}

impl JobStatus {
    /// Whether the state can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// One entry of the prediction top-k.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScore {
    /// Class index in the model's output.
    pub class_id: usize,
    /// Display name from the label table.
    pub label: String,
    /// Softmax probability.
    pub probability: f32,
}

/// Wall-clock breakdown of one job, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timings {
    /// Decode, resize, crop, normalize.
    pub preprocess_ms: u64,
    /// Tapped forward pass plus prediction.
    pub forward_ms: u64,
    /// Feature-map and overlay rendering plus asset writes.
    pub serialize_ms: u64,
    /// End to end.
    pub total_ms: u64,
}

/// The completed output of one explanation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Prediction top-k, highest probability first.
    pub topk: Vec<ClassScore>,
    /// Per-layer feature-map reports, hook order.
    pub layers: Vec<LayerReport>,
    /// Grad-CAM overlays and their warnings.
    pub gradcam: GradcamReport,
    /// The preprocessed input image as persisted.
    pub input_asset: AssetRef,
    /// Warnings that did not fail the job (layer resolution etc.).
    pub warnings: Vec<String>,
    /// Timing breakdown.
    pub timings: Timings,
}

/// Snapshot of one job as callers see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id (UUID v4).
    pub id: String,
    /// Target model id.
    pub model_id: String,
    /// Creation time, UTC.
    pub created_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Progress in percent, monotone 0..=100.
    pub progress: u8,
    /// Human-readable status or failure message.
    pub message: Option<String>,
    /// Result, present once `Succeeded`.
    pub result: Option<JobResult>,
}

impl JobRecord {
    /// Create a freshly queued record.
    pub fn queued(id: String, model_id: String) -> Self {
        Self {
            id,
            model_id,
            created_at: Utc::now(),
            status: JobStatus::Queued,
            progress: 0,
            message: None,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(ExplainParams::default().validate().is_ok());
    }

    #[test]
    fn test_top_k_bounds() {
        let mut params = ExplainParams::default();
        params.top_k = 0;
        assert!(params.validate().is_err());
        params.top_k = 6;
        assert!(params.validate().is_err());
        params.top_k = 5;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_empty_cam_layers_rejected() {
        let params = ExplainParams {
            cam_layers: Some(vec![]),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_feature_map_limit_rejected() {
        let params = ExplainParams {
            feature_map_limit: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }
}
