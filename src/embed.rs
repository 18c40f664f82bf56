use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::error::EmbedError;

/// Source of fixed-length text vectors for the semantic dedup pass.
///
/// Called once per invocation with every accepted card's leading text; must
/// return one vector per input, in order.
pub trait Embedder: Send + Sync + fmt::Debug {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Deterministic bag-of-words embedder.
///
/// Lowercased tokens and adjacent token pairs are hashed into a fixed number
/// of buckets and the vector is L2-normalized. Buckets come from `FxHasher`
/// over the raw bytes, whose output is fixed for a given `rustc-hash`
/// release, so vectors are stable across runs and toolchains. No model
/// files, no I/O.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bucket(&self, feature: &str) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write(feature.as_bytes());
        (hasher.finish() % self.dimensions as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            vector[self.bucket(&format!("{} {}", pair[0], pair[1]))] += 0.5;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Cosine similarity in -1..=1; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}
