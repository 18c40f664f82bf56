use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;

use crate::embed::Embedder;
use crate::error::ConfigError;

/// Query used by the LLM cleaning preset: currency markers plus shopping vocabulary.
pub const PRODUCT_QUERY: &str = "$ USD CAD AUD EUR GBP JPY INR price cost sale buy add to cart \
                                 checkout order product item size color";

/// Weights of the four score terms.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoreWeights {
    pub price: f64,
    pub query: f64,
    pub density: f64,
    pub tag: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 2.6,
            query: 1.0,
            density: 0.6,
            tag: 0.3,
        }
    }
}

/// Base usefulness per tag. Only tags listed here are scored at all.
#[derive(Debug, Clone, PartialEq)]
pub struct TagWeights(BTreeMap<String, f64>);

impl TagWeights {
    pub fn get(&self, tag: &str) -> Option<f64> {
        self.0.get(tag).copied()
    }

    pub fn set(&mut self, tag: impl Into<String>, weight: f64) {
        self.0.insert(tag.into(), weight);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for TagWeights {
    fn default() -> Self {
        let table = [
            ("h1", 1.4),
            ("h2", 1.3),
            ("h3", 1.2),
            ("h4", 1.1),
            ("h5", 1.1),
            ("h6", 1.1),
            ("p", 1.1),
            ("li", 1.0),
            ("article", 1.5),
            ("section", 1.3),
            ("div", 0.6),
            ("span", 0.4),
        ];
        Self(table.into_iter().map(|(t, w)| (t.to_string(), w)).collect())
    }
}

/// What to do when the semantic pass is requested but cannot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingPolicy {
    /// Missing provider is a configuration error; provider failures abort the call.
    Required,
    /// Fall back to structural-only dedup.
    #[default]
    BestEffort,
}

/// Immutable settings for one or many `filter` invocations.
#[derive(Debug, Clone)]
pub struct Config {
    pub keep_top_n: usize,
    pub retention_ratio: Option<f64>,
    pub min_words: usize,
    pub max_chars: usize,
    pub query_terms: BTreeSet<String>,
    pub score_weights: ScoreWeights,
    pub tag_weights: TagWeights,
    pub similarity_threshold: Option<f32>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub embedding_policy: EmbeddingPolicy,
    /// Re-create the ancestor chain (path only) around every card.
    pub keep_ancestry: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keep_top_n: 40,
            retention_ratio: Some(0.5),
            min_words: 2,
            max_chars: 800,
            query_terms: BTreeSet::new(),
            score_weights: ScoreWeights::default(),
            tag_weights: TagWeights::default(),
            similarity_threshold: None,
            embedder: None,
            embedding_policy: EmbeddingPolicy::default(),
            keep_ancestry: false,
        }
    }
}

impl Config {
    /// Settings the LLM cleaning step runs with: a wide net and a shopping query.
    pub fn product_preset() -> Self {
        Self::default()
            .with_keep_top_n(200)
            .with_retention_ratio(Some(0.2))
            .with_query(PRODUCT_QUERY)
    }

    pub fn with_keep_top_n(mut self, n: usize) -> Self {
        self.keep_top_n = n;
        self
    }

    pub fn with_retention_ratio(mut self, ratio: Option<f64>) -> Self {
        self.retention_ratio = ratio;
        self
    }

    pub fn with_min_words(mut self, n: usize) -> Self {
        self.min_words = n;
        self
    }

    pub fn with_max_chars(mut self, n: usize) -> Self {
        self.max_chars = n;
        self
    }

    /// Split a free-text query into lowercase terms.
    pub fn with_query(mut self, query: &str) -> Self {
        self.query_terms = query.split_whitespace().map(str::to_lowercase).collect();
        self
    }

    pub fn with_score_weights(mut self, weights: ScoreWeights) -> Self {
        self.score_weights = weights;
        self
    }

    pub fn with_tag_weights(mut self, weights: TagWeights) -> Self {
        self.tag_weights = weights;
        self
    }

    pub fn with_semantic_dedup(mut self, embedder: Arc<dyn Embedder>, threshold: f32) -> Self {
        self.embedder = Some(embedder);
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_embedding_policy(mut self, policy: EmbeddingPolicy) -> Self {
        self.embedding_policy = policy;
        self
    }

    pub fn with_ancestry(mut self, keep: bool) -> Self {
        self.keep_ancestry = keep;
        self
    }

    /// The semantic pass runs only with both a threshold and a provider.
    pub fn semantic_pass(&self) -> Option<(&dyn Embedder, f32)> {
        match (&self.embedder, self.similarity_threshold) {
            (Some(embedder), Some(threshold)) => Some((embedder.as_ref(), threshold)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep_top_n == 0 {
            return Err(ConfigError::ZeroResultCap);
        }
        if self.max_chars == 0 {
            return Err(ConfigError::ZeroMaxChars);
        }
        if let Some(ratio) = self.retention_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::RetentionRatio(ratio));
            }
        }

        let w = &self.score_weights;
        for (name, value) in [
            ("price", w.price),
            ("query", w.query),
            ("density", w.density),
            ("tag", w.tag),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ScoreWeight { name, value });
            }
        }
        for (tag, value) in self.tag_weights.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::TagWeight {
                    tag: tag.to_string(),
                    value,
                });
            }
        }

        if let Some(threshold) = self.similarity_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::SimilarityThreshold(threshold));
            }
            if self.embedder.is_none() && self.embedding_policy == EmbeddingPolicy::Required {
                return Err(ConfigError::MissingEmbedder);
            }
        }
        Ok(())
    }
}

/// Flat, environment-friendly view of [`Config`].
///
/// Loaded from `CARDS_*` variables, e.g. `CARDS_KEEP_TOP_N=20` or
/// `CARDS_QUERY="wireless headphones"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub keep_top_n: usize,
    pub retention_ratio: Option<f64>,
    pub min_words: usize,
    pub max_chars: usize,
    pub query: Option<String>,
    pub weight_price: f64,
    pub weight_query: f64,
    pub weight_density: f64,
    pub weight_tag: f64,
    pub similarity_threshold: Option<f32>,
    pub embedding_policy: EmbeddingPolicy,
    pub keep_ancestry: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let base = Config::default();
        Self {
            keep_top_n: base.keep_top_n,
            retention_ratio: base.retention_ratio,
            min_words: base.min_words,
            max_chars: base.max_chars,
            query: None,
            weight_price: base.score_weights.price,
            weight_query: base.score_weights.query,
            weight_density: base.score_weights.density,
            weight_tag: base.score_weights.tag,
            similarity_threshold: None,
            embedding_policy: base.embedding_policy,
            keep_ancestry: base.keep_ancestry,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("CARDS").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Build a [`Config`]. The embedding provider is attached by the caller.
    pub fn into_config(self) -> Config {
        let config = Config {
            keep_top_n: self.keep_top_n,
            retention_ratio: self.retention_ratio,
            min_words: self.min_words,
            max_chars: self.max_chars,
            score_weights: ScoreWeights {
                price: self.weight_price,
                query: self.weight_query,
                density: self.weight_density,
                tag: self.weight_tag,
            },
            similarity_threshold: self.similarity_threshold,
            embedding_policy: self.embedding_policy,
            keep_ancestry: self.keep_ancestry,
            ..Config::default()
        };
        match self.query {
            Some(query) => config.with_query(&query),
            None => config,
        }
    }
}
