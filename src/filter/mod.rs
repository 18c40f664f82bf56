pub mod compact;
pub mod junk;
pub mod resolve;
pub mod score;
pub mod signals;
pub mod text_index;

use rayon::prelude::*;
use tracing::debug;

use crate::dom;
use crate::error::FilterError;
use crate::settings::Config;

pub use compact::Card;

/// Five-stage pipeline: normalize → strip junk → score → compact → resolve.
///
/// Malformed markup never fails the call; the only errors are configuration
/// problems (reported before any parsing) and, under
/// [`EmbeddingPolicy::Required`](crate::settings::EmbeddingPolicy), a failing
/// embedding provider.
pub fn filter(markup: &str, config: &Config) -> Result<Vec<String>, FilterError> {
    Ok(filter_cards(markup, config)?.iter().map(Card::html).collect())
}

/// [`filter`] without the final serialization: the cards themselves, in
/// document order.
pub fn filter_cards(markup: &str, config: &Config) -> Result<Vec<Card>, FilterError> {
    config.validate()?;
    if markup.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed = dom::normalize(markup);
    let doc = junk::strip_junk(&parsed);
    let candidates = score::score_all(&doc, config);
    debug!(nodes = doc.len(), candidates = candidates.len(), "scored");
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let cards = resolve::resolve_cards(&doc, candidates, config)?;
    debug!(cards = cards.len(), "filtered");
    Ok(cards)
}

/// Filter independent pages in parallel, one invocation per page, sharing
/// `config`. Results keep the input order.
pub fn filter_many<S>(pages: &[S], config: &Config) -> Result<Vec<Vec<String>>, FilterError>
where
    S: AsRef<str> + Sync,
{
    config.validate()?;
    pages
        .par_iter()
        .map(|page| filter(page.as_ref(), config))
        .collect()
}
