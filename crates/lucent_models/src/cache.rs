//! Bounded LRU cache of loaded model handles.

use std::sync::Arc;

use burn::tensor::backend::AutodiffBackend;

use lucent_core::{ExplainError, InspectableModel, LruCache, Result};

use crate::registry::ModelRegistry;

/// In-memory cache of loaded models, keyed by model id.
///
/// Eviction drops the handle, releasing its memory. The cache is owned by the
/// single worker context, so a borrowed handle stays valid for the duration
/// of one job's synchronous processing step: eviction can only happen on the
/// next `get_or_load`, which the same worker issues.
pub struct ModelCache<B: AutodiffBackend> {
    entries: LruCache<String, Box<dyn InspectableModel<B>>>,
    registry: Arc<ModelRegistry<B>>,
    device: B::Device,
}

impl<B: AutodiffBackend> ModelCache<B> {
    /// Create a cache over `registry` holding at most `capacity` models
    /// (clamped to at least 1).
    pub fn new(registry: Arc<ModelRegistry<B>>, device: B::Device, capacity: usize) -> Self {
        Self {
            entries: LruCache::new(capacity.max(1)),
            registry,
            device,
        }
    }

    /// Number of currently loaded models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no models are loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a model is currently loaded (does not touch recency).
    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.contains(&model_id.to_string())
    }

    /// Get a loaded model, constructing it on a miss.
    ///
    /// A hit marks the entry most-recently-used. A miss constructs through
    /// the registry, inserts the handle, and evicts the least-recently-used
    /// model if capacity is exceeded. Construction failures propagate and are
    /// not cached.
    pub fn get_or_load(&mut self, model_id: &str) -> Result<&dyn InspectableModel<B>> {
        let key = model_id.to_string();
        if self.entries.get(&key).is_some() {
            tracing::debug!(model_id, "model cache hit");
        } else {
            let model = self.registry.create(model_id, &self.device)?;
            if let Some((evicted, _)) = self.entries.put(key.clone(), model) {
                tracing::info!(%evicted, "evicted least-recently-used model");
            }
        }
        self.entries
            .get(&key)
            .map(|m| m.as_ref())
            .ok_or_else(|| ExplainError::Internal("model cache lost entry after insert".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::prelude::*;
    use lucent_core::backend::Inspect;
    use lucent_core::TapSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::registry::{ModelConfig, Normalization};

    struct StubModel;

    impl InspectableModel<Inspect> for StubModel {
        fn arch(&self) -> &str {
            "stub"
        }
        fn n_classes(&self) -> usize {
            2
        }
        fn tap_points(&self) -> &[&'static str] {
            &["conv1"]
        }
        fn forward_tapped(
            &self,
            _input: Tensor<Inspect, 4>,
            _session: &mut TapSession<Inspect>,
        ) -> Tensor<Inspect, 2> {
            Tensor::zeros([1, 2], &Default::default())
        }
    }

    fn stub_config(id: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            input_size: [32, 32],
            normalization: Normalization {
                mean: [0.5; 3],
                std: [0.5; 3],
            },
            layers_to_hook: vec!["conv1".to_string()],
            layer_stages: Default::default(),
            n_classes: 2,
        }
    }

    fn counting_registry(
        ids: &[&str],
        loads: Arc<AtomicUsize>,
    ) -> Arc<ModelRegistry<Inspect>> {
        let mut registry = ModelRegistry::new();
        for id in ids {
            let loads = loads.clone();
            registry.register(stub_config(id), move |_device| {
                loads.fetch_add(1, Ordering::SeqCst);
                Box::new(StubModel)
            });
        }
        Arc::new(registry)
    }

    #[test]
    fn test_hit_does_not_reload() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&["a"], loads.clone());
        let mut cache = ModelCache::new(registry, Default::default(), 2);

        cache.get_or_load("a").unwrap();
        cache.get_or_load("a").unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capacity_and_eviction() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&["a", "b", "c"], loads.clone());
        let mut cache = ModelCache::new(registry, Default::default(), 2);

        cache.get_or_load("a").unwrap();
        cache.get_or_load("b").unwrap();
        cache.get_or_load("c").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));

        // Reloading the evicted model constructs again.
        cache.get_or_load("a").unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_recent_access_prevents_eviction() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&["a", "b", "c"], loads);
        let mut cache = ModelCache::new(registry, Default::default(), 2);

        cache.get_or_load("a").unwrap();
        cache.get_or_load("b").unwrap();
        // Touch "a" so "b" is evicted instead.
        cache.get_or_load("a").unwrap();
        cache.get_or_load("c").unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_unknown_model_not_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&["a"], loads);
        let mut cache = ModelCache::new(registry, Default::default(), 2);

        assert!(cache.get_or_load("missing").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_floor_of_one() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&["a"], loads);
        let mut cache = ModelCache::new(registry, Default::default(), 0);

        cache.get_or_load("a").unwrap();
        assert_eq!(cache.len(), 1);
    }
}
