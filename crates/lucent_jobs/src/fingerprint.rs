//! Result-cache fingerprinting.
//!
//! The key covers every parameter that can change output bytes: image
//! content, model, both top-k values, the explanation layer set, the Grad-CAM
//! on/off flag, and the channel limit. Layers are hashed sorted, so
//! permutations of the same set share a key.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Everything that goes into a result fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintInput<'a> {
    /// Raw image bytes as submitted.
    pub image: &'a [u8],
    /// Model id.
    pub model_id: &'a str,
    /// Size of the prediction top-k in the result.
    pub prediction_top_k: usize,
    /// Number of classes explained with Grad-CAM.
    pub explain_top_k: usize,
    /// Explanation layer set, any order.
    pub layers: &'a [String],
    /// Whether Grad-CAM overlays are rendered.
    pub include_gradcam: bool,
    /// Per-layer channel limit for feature maps.
    pub feature_map_limit: usize,
}

/// Compute the hex-encoded SHA-256 fingerprint for a parameter set.
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut hasher = Sha256::new();

    // Length-prefix every field so adjacent fields cannot alias.
    fn field(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    field(&mut hasher, input.image);
    field(&mut hasher, input.model_id.as_bytes());
    field(&mut hasher, &(input.prediction_top_k as u64).to_le_bytes());
    field(&mut hasher, &(input.explain_top_k as u64).to_le_bytes());

    let mut layers: Vec<&str> = input.layers.iter().map(String::as_str).collect();
    layers.sort_unstable();
    for layer in layers {
        field(&mut hasher, layer.as_bytes());
    }

    field(&mut hasher, &[input.include_gradcam as u8]);
    field(&mut hasher, &(input.feature_map_limit as u64).to_le_bytes());

    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base<'a>(layers: &'a [String], image: &'a [u8]) -> FingerprintInput<'a> {
        FingerprintInput {
            image,
            model_id: "resnet_mini",
            prediction_top_k: 5,
            explain_top_k: 3,
            layers,
            include_gradcam: true,
            feature_map_limit: 32,
        }
    }

    #[test]
    fn test_layer_order_does_not_matter() {
        let image = vec![1u8, 2, 3];
        let forward: Vec<String> = vec!["layer3".into(), "layer4".into()];
        let backward: Vec<String> = vec!["layer4".into(), "layer3".into()];
        assert_eq!(
            fingerprint(&base(&forward, &image)),
            fingerprint(&base(&backward, &image))
        );
    }

    #[test]
    fn test_each_field_changes_the_key() {
        let image = vec![1u8, 2, 3];
        let layers: Vec<String> = vec!["layer4".into()];
        let reference = fingerprint(&base(&layers, &image));

        let other_image = fingerprint(&base(&layers, &[9u8, 9, 9]));
        assert_ne!(reference, other_image);

        let mut input = base(&layers, &image);
        input.model_id = "vgg_mini";
        assert_ne!(reference, fingerprint(&input));

        let mut input = base(&layers, &image);
        input.explain_top_k = 1;
        assert_ne!(reference, fingerprint(&input));

        let mut input = base(&layers, &image);
        input.include_gradcam = false;
        assert_ne!(reference, fingerprint(&input));

        let mut input = base(&layers, &image);
        input.feature_map_limit = 8;
        assert_ne!(reference, fingerprint(&input));
    }

    #[test]
    fn test_different_layer_sets_differ() {
        let image = vec![0u8; 16];
        let a: Vec<String> = vec!["layer3".into()];
        let b: Vec<String> = vec!["layer3".into(), "layer4".into()];
        assert_ne!(fingerprint(&base(&a, &image)), fingerprint(&base(&b, &image)));
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let image = vec![0u8];
        let layers: Vec<String> = vec!["conv1".into()];
        let key = fingerprint(&base(&layers, &image));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
