use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, warn};

use crate::dom::Document;
use crate::embed::cosine_similarity;
use crate::error::{EmbedError, FilterError};
use crate::settings::{Config, EmbeddingPolicy};

use super::compact::{Card, Compactor};
use super::score::ScoredCandidate;

/// Number of leading words of a card that are embedded.
const EMBED_WORDS: usize = 30;

/// Highest score first; equal scores keep document order.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.order.cmp(&b.order))
    });
}

/// Length of the ranked list kept by `retention_ratio`: at least one, never
/// more than `keep_top_n`.
pub fn retained_len(total: usize, config: &Config) -> usize {
    match config.retention_ratio {
        Some(ratio) => {
            let kept = ((total as f64) * ratio).floor() as usize;
            kept.max(1).min(config.keep_top_n).min(total)
        }
        None => total,
    }
}

/// Greedy non-overlapping selection in rank order.
///
/// A candidate is skipped when its card's source range lies inside a card
/// already accepted, or would swallow one. Source ranges either nest or are
/// disjoint, so accepted cards never overlap. Stops after `keep_top_n` cards.
/// Returned in acceptance order.
pub fn select_cards(
    doc: &Document,
    mut candidates: Vec<ScoredCandidate>,
    config: &Config,
) -> Vec<Card> {
    rank(&mut candidates);
    candidates.truncate(retained_len(candidates.len(), config));

    let mut compactor = Compactor::new(doc, config);
    let mut accepted: Vec<Card> = Vec::new();
    for candidate in &candidates {
        if accepted.len() >= config.keep_top_n {
            break;
        }
        let root = compactor.card_root(candidate.node);
        let range = compactor.range_of(root);
        if accepted
            .iter()
            .any(|card| card.range.contains(&range) || range.contains(&card.range))
        {
            continue;
        }
        accepted.push(compactor.build(root));
    }

    debug!(
        ranked = candidates.len(),
        accepted = accepted.len(),
        "structural overlap pass"
    );
    accepted
}

/// Indices of the cards that survive the semantic pass, in acceptance order.
///
/// A card is dropped when its leading text embeds closer than the threshold
/// to an earlier card that is itself still kept. Without a configured pass
/// every index survives.
pub fn semantic_dedup(cards: &[Card], config: &Config) -> Result<Vec<usize>, EmbedError> {
    let all = || (0..cards.len()).collect();
    let Some((embedder, threshold)) = config.semantic_pass() else {
        return Ok(all());
    };
    if cards.len() < 2 {
        return Ok(all());
    }

    let texts: Vec<String> = cards.iter().map(|c| leading_words(&c.text())).collect();
    let vectors = embedder.embed(&texts)?;
    if vectors.len() != texts.len() {
        return Err(EmbedError::CountMismatch {
            expected: texts.len(),
            got: vectors.len(),
        });
    }

    let mut kept: Vec<usize> = Vec::with_capacity(cards.len());
    for j in 0..cards.len() {
        let duplicate = kept
            .iter()
            .any(|&i| cosine_similarity(&vectors[i], &vectors[j]) > threshold);
        if !duplicate {
            kept.push(j);
        }
    }

    debug!(
        before = cards.len(),
        after = kept.len(),
        threshold,
        "semantic dedup pass"
    );
    Ok(kept)
}

fn leading_words(text: &str) -> String {
    text.split_whitespace()
        .take(EMBED_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full resolution: structural selection, optional semantic pass, document
/// ordering and byte-identical dedup.
pub fn resolve_cards(
    doc: &Document,
    candidates: Vec<ScoredCandidate>,
    config: &Config,
) -> Result<Vec<Card>, FilterError> {
    let cards = select_cards(doc, candidates, config);
    if config.similarity_threshold.is_some() && config.embedder.is_none() {
        warn!("similarity_threshold set without an embedder, semantic pass skipped");
    }

    let kept = match semantic_dedup(&cards, config) {
        Ok(kept) => kept,
        Err(err) if config.embedding_policy == EmbeddingPolicy::BestEffort => {
            warn!(error = %err, "semantic dedup unavailable, keeping structural result");
            (0..cards.len()).collect()
        }
        Err(err) => return Err(err.into()),
    };
    let mut keep = vec![false; cards.len()];
    for i in kept {
        keep[i] = true;
    }
    let mut cards: Vec<Card> = cards
        .into_iter()
        .zip(keep)
        .filter_map(|(card, keep)| keep.then_some(card))
        .collect();
    cards.sort_by_key(|card| card.range.start);

    let mut seen: HashSet<String> = HashSet::new();
    cards.retain(|card| seen.insert(card.html()));
    Ok(cards)
}

/// [`resolve_cards`], serialized.
pub fn resolve(
    doc: &Document,
    candidates: Vec<ScoredCandidate>,
    config: &Config,
) -> Result<Vec<String>, FilterError> {
    Ok(resolve_cards(doc, candidates, config)?
        .iter()
        .map(Card::html)
        .collect())
}
