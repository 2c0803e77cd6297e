//! Text embedders.
//!
//! [`HashEmbedder`] is always available: it maps text to a reproducible
//! standard-normal vector seeded from the text's SHA-256, so retrieval works
//! (with meaningless but stable vector scores) without any model or API key.
//! With the `openai` feature and a configured key, [`embedder_from_config`]
//! puts the remote embedder in front and keeps the hash embedder as fallback.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiEmbedder;

use anyhow::{Result, bail};
use hybrag_core::config::EmbeddingConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Turns text into fixed-size vectors.
pub trait Embedder: Send + Sync {
    /// Identifier shown in stats and logs.
    fn model(&self) -> &str;

    fn dimension(&self) -> usize;

    /// # Errors
    ///
    /// Implementation-specific (network, model, quota).
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts; output order matches input order.
    ///
    /// # Errors
    ///
    /// Fails if any single embedding fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Deterministic pseudo-random embeddings.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub const MODEL: &'static str = "hash-normal";

    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        Self::MODEL
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            bail!("hash embedder dimension must be positive");
        }
        let seed: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let mut rng = StdRng::from_seed(seed);
        Ok((0..self.dimension)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect())
    }
}

/// Primary embedder with a hash-embedder safety net.
pub struct FallbackEmbedder {
    primary: Box<dyn Embedder>,
    fallback: HashEmbedder,
}

impl FallbackEmbedder {
    #[must_use]
    pub fn new(primary: Box<dyn Embedder>) -> Self {
        let fallback = HashEmbedder::new(primary.dimension());
        Self { primary, fallback }
    }
}

impl Embedder for FallbackEmbedder {
    fn model(&self) -> &str {
        self.primary.model()
    }

    fn dimension(&self) -> usize {
        self.primary.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.primary.embed(text) {
            Ok(embedding) => Ok(embedding),
            Err(err) => {
                warn!(model = self.primary.model(), "embedding failed, using hash fallback: {err:#}");
                self.fallback.embed(text)
            }
        }
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match self.primary.embed_batch(texts) {
            Ok(embeddings) if embeddings.len() == texts.len() => Ok(embeddings),
            Ok(embeddings) => {
                warn!(
                    expected = texts.len(),
                    got = embeddings.len(),
                    "embedding batch length mismatch, using hash fallback"
                );
                self.fallback.embed_batch(texts)
            }
            Err(err) => {
                warn!(model = self.primary.model(), "batch embedding failed, using hash fallback: {err:#}");
                self.fallback.embed_batch(texts)
            }
        }
    }
}

/// Pick an embedder for `config`.
#[must_use]
pub fn embedder_from_config(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    let Some(api_key) = config.api_key() else {
        debug!(
            env = %config.api_key_env,
            "no embedding API key configured, using hash embedder"
        );
        return Box::new(HashEmbedder::new(config.dimension));
    };

    remote_embedder(config, api_key)
}

#[cfg(feature = "openai")]
fn remote_embedder(config: &EmbeddingConfig, api_key: String) -> Box<dyn Embedder> {
    Box::new(FallbackEmbedder::new(Box::new(OpenAiEmbedder::new(
        api_key,
        config.model.clone(),
        config.dimension,
    ))))
}

#[cfg(not(feature = "openai"))]
fn remote_embedder(config: &EmbeddingConfig, _api_key: String) -> Box<dyn Embedder> {
    warn!(
        model = %config.model,
        "embedding API key set but built without the `openai` feature; using hash embedder"
    );
    Box::new(HashEmbedder::new(config.dimension))
}

/// Cosine similarity in `[-1, 1]`; `None` for empty, mismatched, or zero
/// vectors.
#[must_use]
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f64> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f64;
    let mut left_norm_sq = 0.0_f64;
    let mut right_norm_sq = 0.0_f64;

    for (a, b) in left.iter().zip(right) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Embedder for Broken {
        fn model(&self) -> &str {
            "broken"
        }

        fn dimension(&self) -> usize {
            8
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("quota exceeded")
        }
    }

    #[test]
    fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed("insulin resistance").unwrap();
        let b = embedder.embed("insulin resistance").unwrap();
        let c = embedder.embed("migraine").unwrap();
        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_embedder_rejects_zero_dimension() {
        assert!(HashEmbedder::new(0).embed("x").is_err());
    }

    #[test]
    fn hash_embedder_values_look_standard_normal() {
        let v = HashEmbedder::new(4096).embed("statistics").unwrap();
        let mean = v.iter().map(|x| f64::from(*x)).sum::<f64>() / v.len() as f64;
        let var = v.iter().map(|x| (f64::from(*x) - mean).powi(2)).sum::<f64>() / v.len() as f64;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var - 1.0).abs() < 0.15, "variance {var}");
    }

    #[test]
    fn fallback_embedder_recovers_from_primary_failure() {
        let embedder = FallbackEmbedder::new(Box::new(Broken));
        let v = embedder.embed("anything").unwrap();
        assert_eq!(v, HashEmbedder::new(8).embed("anything").unwrap());
        assert_eq!(embedder.embed_batch(&["a", "b"]).unwrap().len(), 2);
        assert_eq!(embedder.model(), "broken");
    }

    #[test]
    fn config_without_key_uses_hash_embedder() {
        let config = EmbeddingConfig {
            api_key_env: "HYBRAG_TEST_KEY_THAT_IS_NEVER_SET".into(),
            dimension: 32,
            ..EmbeddingConfig::default()
        };
        let embedder = embedder_from_config(&config);
        assert_eq!(embedder.model(), HashEmbedder::MODEL);
        assert_eq!(embedder.dimension(), 32);
    }

    #[test]
    fn cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        let same = cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]).unwrap();
        assert!((same - 1.0).abs() < 1e-9);
        let opposite = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((opposite + 1.0).abs() < 1e-9);
    }
}
