use std::collections::BTreeSet;

use crate::dom::{serialize, Document, NodeId};
use crate::settings::Config;

use super::text_index::TextIndex;

/// An element eligible for output together with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub node: NodeId,
    /// Discovery position in document order.
    pub order: usize,
    pub score: f64,
}

/// Score every eligible element below the root, in document order.
///
/// Elements whose tag has no weight, whose text is empty, or whose text is
/// neither price-like nor at least `min_words` long are skipped unscored.
pub fn score_all(doc: &Document, config: &Config) -> Vec<ScoredCandidate> {
    let lengths = serialize::outer_lengths(doc);
    let index = TextIndex::new(doc);
    let query = QueryHits::new(&index, &config.query_terms);
    let mut candidates = Vec::new();

    for id in doc.element_descendants(doc.root()) {
        let Some(el) = doc.element(id) else {
            continue;
        };
        let Some(tag_weight) = config.tag_weights.get(&el.name) else {
            continue;
        };
        let words = index.word_count(id);
        if words == 0 {
            continue;
        }
        let price = index.is_price_like(doc, id);
        if !price && words < config.min_words {
            continue;
        }

        let density = match lengths[id] {
            0 => 0.0,
            len => index.byte_len(id) as f64 / len as f64,
        };
        let w = &config.score_weights;
        let score = w.price * f64::from(u8::from(price))
            + w.query * query.similarity(&index, id)
            + w.density * density
            + w.tag * tag_weight;

        candidates.push(ScoredCandidate {
            node: id,
            order: candidates.len(),
            score,
        });
    }

    candidates
}

/// Whether a lowercase query term matches a word of the text.
///
/// Words count both as written and with surrounding punctuation trimmed,
/// so `Wireless,` matches `wireless` while `$` still matches `$`.
pub fn term_matches(word: &str, term: &str) -> bool {
    let lower = word.to_lowercase();
    lower == term || lower.trim_matches(|c: char| !c.is_alphanumeric()) == term
}

/// Per-term prefix counts of matching words, so the query similarity of any
/// node is read off its word range.
pub struct QueryHits {
    terms: usize,
    prefix: Vec<Vec<u32>>,
}

impl QueryHits {
    pub fn new(index: &TextIndex, query: &BTreeSet<String>) -> Self {
        let words: Vec<&str> = if query.is_empty() {
            Vec::new()
        } else {
            index.words().collect()
        };
        let prefix = query
            .iter()
            .map(|term| {
                let mut counts = Vec::with_capacity(words.len() + 1);
                counts.push(0u32);
                let mut seen = 0u32;
                for word in &words {
                    seen += u32::from(term_matches(word, term));
                    counts.push(seen);
                }
                counts
            })
            .collect();
        Self {
            terms: query.len(),
            prefix,
        }
    }

    /// Fraction of query terms present among the node's words; 0 without a query.
    pub fn similarity(&self, index: &TextIndex, id: NodeId) -> f64 {
        if self.terms == 0 {
            return 0.0;
        }
        let range = index.word_range(id);
        let hits = self
            .prefix
            .iter()
            .filter(|counts| counts[range.end] > counts[range.start])
            .count();
        hits as f64 / self.terms as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::normalize;

    fn tag_of(doc: &Document, c: &ScoredCandidate) -> String {
        doc.element(c.node).unwrap().name.clone()
    }

    #[test]
    fn eligibility() {
        let doc = normalize(
            "<div><span class=\"price\">$19.99</span><span>Widget</span>\
             <b>bold words here</b><p></p><p>two words</p></div>",
        );
        let scored = score_all(&doc, &Config::default());
        let tags: Vec<_> = scored.iter().map(|c| tag_of(&doc, c)).collect();
        // div (price text), price span; lone "Widget" and untracked <b> skipped.
        assert_eq!(tags, vec!["div", "span", "p"]);
        let orders: Vec<_> = scored.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn price_outweighs_plain_text() {
        let doc = normalize("<p>Acme brass lamp</p><p>Acme brass $10.00</p>");
        let scored = score_all(&doc, &Config::default());
        assert_eq!(scored.len(), 2);
        assert!(scored[1].score > scored[0].score + 2.0);
    }

    #[test]
    fn query_terms_boost_matching_candidate() {
        let doc = normalize("<p>Wireless Mouse $25.00</p><p>Ethernet Mouse $25.00</p>");
        let config = Config::default().with_query("wireless");
        let scored = score_all(&doc, &config);
        assert_eq!(scored.len(), 2);
        assert!(scored[0].score > scored[1].score);

        let plain = score_all(&doc, &Config::default());
        assert_eq!(plain[0].score, plain[1].score);
    }

    #[test]
    fn score_is_the_weighted_sum() {
        let doc = normalize("<h1>Lamp $5.00</h1>");
        let scored = score_all(&doc, &Config::default());
        let text = "Lamp $5.00";
        let html = "<h1>Lamp $5.00</h1>";
        let expected = 2.6 + 0.6 * (text.len() as f64 / html.len() as f64) + 0.3 * 1.4;
        assert!((scored[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn score_is_deterministic() {
        let html = std::fs::read_to_string("tests/fixtures/listing.html").unwrap();
        let doc = normalize(&html);
        let a = score_all(&doc, &Config::default());
        let b = score_all(&doc, &Config::default());
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn similarity_fraction() {
        let doc = normalize("<p>Acme WIRELESS, earbuds $ 20</p><p>Studio headphones</p>");
        let index = TextIndex::new(&doc);
        let query: BTreeSet<String> = ["wireless", "headphones", "$"]
            .into_iter()
            .map(String::from)
            .collect();
        let hits = QueryHits::new(&index, &query);
        let ps: Vec<_> = doc.element_descendants(doc.root()).collect();
        assert!((hits.similarity(&index, ps[0]) - 2.0 / 3.0).abs() < 1e-9);
        assert!((hits.similarity(&index, ps[1]) - 1.0 / 3.0).abs() < 1e-9);
        assert!((hits.similarity(&index, doc.root()) - 1.0).abs() < 1e-9);

        let none = QueryHits::new(&index, &BTreeSet::new());
        assert_eq!(none.similarity(&index, ps[0]), 0.0);
    }

    #[test]
    fn term_matching_trims_punctuation() {
        assert!(term_matches("WIRELESS,", "wireless"));
        assert!(term_matches("$", "$"));
        assert!(term_matches("(lamp)", "lamp"));
        assert!(!term_matches("lamps", "lamp"));
    }

    #[test]
    fn deep_nesting_stays_linear_in_text_work() {
        let depth = 3_000;
        let html = format!(
            "{}<p>Acme lamp $1.00</p>{}",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let doc = normalize(&html);
        let scored = score_all(&doc, &Config::default());
        assert_eq!(scored.len(), depth + 1);
    }
}
