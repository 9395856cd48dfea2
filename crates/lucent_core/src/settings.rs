//! Process-level settings for the inspection engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine settings with an explicit initialization point.
///
/// Caches are sized here and passed by reference into the orchestrator, so
/// tests can substitute small-capacity or disabled instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory for rendered assets (input copies, feature maps, overlays).
    pub storage_dir: PathBuf,
    /// Maximum number of loaded models held in memory. Clamped to at least 1.
    pub model_cache_capacity: usize,
    /// Maximum number of cached results. 0 disables result caching entirely.
    pub result_cache_capacity: usize,
    /// Optional path to a class-label JSON file (ImageNet index format).
    pub labels_path: Option<PathBuf>,
    /// How long shutdown waits for the worker to drain before giving up.
    pub shutdown_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./storage"),
            model_cache_capacity: 3,
            result_cache_capacity: 100,
            labels_path: None,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl Settings {
    /// Build settings from `LUCENT_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(dir) = std::env::var("LUCENT_STORAGE_DIR") {
            if !dir.is_empty() {
                settings.storage_dir = PathBuf::from(dir);
            }
        }
        if let Some(n) = env_usize("LUCENT_MODEL_CACHE_CAPACITY") {
            settings.model_cache_capacity = n;
        }
        if let Some(n) = env_usize("LUCENT_RESULT_CACHE_CAPACITY") {
            settings.result_cache_capacity = n;
        }
        if let Ok(path) = std::env::var("LUCENT_LABELS_PATH") {
            if !path.is_empty() {
                settings.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Some(ms) = env_usize("LUCENT_SHUTDOWN_TIMEOUT_MS") {
            settings.shutdown_timeout_ms = ms as u64;
        }

        settings
    }

    /// Model cache capacity with the ≥1 bound applied.
    pub fn model_cache_capacity(&self) -> usize {
        self.model_cache_capacity.max(1)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
