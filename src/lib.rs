//! Product-card extraction from e-commerce markup.
//!
//! [`filter`] turns a page into a short, ordered list of self-contained HTML
//! fragments, each holding one product (or a tight group of products) with
//! its price. [`clean_for_llm`] strips what is left of presentation noise
//! before the fragments are handed to a language model.

pub mod clean;
pub mod dom;
pub mod embed;
pub mod error;
pub mod filter;
pub mod settings;

pub use clean::{clean_cards, clean_for_llm, CleanOptions};
pub use embed::{cosine_similarity, Embedder, HashingEmbedder};
pub use error::{ConfigError, EmbedError, FilterError};
pub use filter::{filter, filter_cards, filter_many, Card};
pub use settings::{Config, EmbeddingPolicy, ScoreWeights, Settings, TagWeights};
