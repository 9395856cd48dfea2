//! Class-name lookup with a synthetic fallback.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use lucent_core::{ExplainError, Result};

/// Class-id to display-name mapping.
///
/// Loaded from an ImageNet-index-style JSON file
/// (`{"0": ["n01440764", "tench"], ...}`); plain `{"0": "tench"}` entries are
/// accepted too. Missing ids fall back to a synthetic `class_<id>` label.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    names: HashMap<usize, String>,
}

impl ClassLabels {
    /// An empty table; every lookup falls back to `class_<id>`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load labels from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ExplainError::Internal(format!("invalid label file: {e}")))?;

        let Value::Object(map) = value else {
            return Err(ExplainError::Internal(
                "label file must be a JSON object keyed by class id".to_string(),
            ));
        };

        let mut names = HashMap::new();
        for (key, entry) in map {
            let Ok(class_id) = key.parse::<usize>() else {
                tracing::warn!(%key, "skipping non-numeric class id in label file");
                continue;
            };
            let name = match entry {
                // ImageNet index format: [wnid, name].
                Value::Array(items) => items.get(1).and_then(|v| v.as_str()).map(String::from),
                Value::String(name) => Some(name),
                _ => None,
            };
            match name {
                Some(name) => {
                    names.insert(class_id, name);
                }
                None => tracing::warn!(class_id, "skipping malformed label entry"),
            }
        }

        tracing::debug!(count = names.len(), "loaded class labels");
        Ok(Self { names })
    }

    /// Display name for a class, falling back to `class_<id>`.
    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }

    /// Number of known labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fallback_name() {
        let labels = ClassLabels::empty();
        assert_eq!(labels.name(42), "class_42");
    }

    #[test]
    fn test_load_imagenet_index_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"0": ["n01440764", "tench"], "1": ["n01443537", "goldfish"]}}"#
        )
        .unwrap();

        let labels = ClassLabels::from_json_file(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name(0), "tench");
        assert_eq!(labels.name(1), "goldfish");
        assert_eq!(labels.name(2), "class_2");
    }

    #[test]
    fn test_load_plain_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"7": "cock"}}"#).unwrap();

        let labels = ClassLabels::from_json_file(file.path()).unwrap();
        assert_eq!(labels.name(7), "cock");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"0": ["only_wnid"], "x": "bad", "1": "ok"}}"#).unwrap();

        let labels = ClassLabels::from_json_file(file.path()).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.name(1), "ok");
        assert_eq!(labels.name(0), "class_0");
    }

    #[test]
    fn test_missing_file() {
        assert!(ClassLabels::from_json_file("/nonexistent/labels.json").is_err());
    }
}
