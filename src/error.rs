use thiserror::Error;

/// Rejected configuration. Raised before any tree work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("keep_top_n must be at least 1")]
    ZeroResultCap,
    #[error("max_chars must be at least 1")]
    ZeroMaxChars,
    #[error("retention_ratio {0} is outside 0..=1")]
    RetentionRatio(f64),
    #[error("score weight `{name}` must be finite and non-negative, got {value}")]
    ScoreWeight { name: &'static str, value: f64 },
    #[error("tag weight for `{tag}` must be finite and non-negative, got {value}")]
    TagWeight { tag: String, value: f64 },
    #[error("similarity_threshold {0} is outside -1..=1")]
    SimilarityThreshold(f32),
    #[error("similarity_threshold is set but no embedding provider is configured")]
    MissingEmbedder,
    #[error("failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding provider failed: {0}")]
    Provider(String),
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("semantic dedup failed: {0}")]
    Embedding(#[from] EmbedError),
}
