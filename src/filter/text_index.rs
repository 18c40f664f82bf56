use std::ops::Range;

use crate::dom::{Document, Node, NodeId};

use super::signals;

enum Step {
    Enter(NodeId),
    Exit(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    end: usize,
    /// Characters of normalized text before this word.
    chars_before: usize,
}

/// Normalized text of a whole document, built once.
///
/// Words are joined by single spaces in document order, so the normalized
/// text of any node is one contiguous slice of the page text. Each node
/// keeps the range of words it covers, and every per-node question (text,
/// length, word count, currency amount) is answered from that range without
/// walking the subtree again.
pub struct TextIndex {
    text: String,
    words: Vec<Word>,
    node_words: Vec<Range<usize>>,
    /// `(start, end)` byte ranges of currency amounts, sorted by start.
    amounts: Vec<(usize, usize)>,
}

impl TextIndex {
    pub fn new(doc: &Document) -> Self {
        let mut text = String::new();
        let mut words: Vec<Word> = Vec::new();
        let mut node_words = vec![0..0; doc.len()];
        let mut chars = 0;

        let mut stack = if doc.is_empty() {
            Vec::new()
        } else {
            vec![Step::Enter(doc.root())]
        };
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    node_words[id].start = words.len();
                    stack.push(Step::Exit(id));
                    match doc.node(id) {
                        Node::Text(raw) => {
                            for word in raw.split_whitespace() {
                                if !text.is_empty() {
                                    text.push(' ');
                                    chars += 1;
                                }
                                let start = text.len();
                                text.push_str(word);
                                words.push(Word {
                                    start,
                                    end: text.len(),
                                    chars_before: chars,
                                });
                                chars += word.chars().count();
                            }
                        }
                        Node::Element(el) => {
                            stack.extend(el.children.iter().rev().map(|&c| Step::Enter(c)));
                        }
                    }
                }
                Step::Exit(id) => node_words[id].end = words.len(),
            }
        }

        let amounts = signals::currency_amounts(&text).collect();
        Self {
            text,
            words,
            node_words,
            amounts,
        }
    }

    fn bytes(&self, id: NodeId) -> Range<usize> {
        let range = &self.node_words[id];
        if range.is_empty() {
            return 0..0;
        }
        self.words[range.start].start..self.words[range.end - 1].end
    }

    /// Whitespace-normalized text of `id`, as [`Document::text`] returns it.
    pub fn text(&self, id: NodeId) -> &str {
        &self.text[self.bytes(id)]
    }

    pub fn word_count(&self, id: NodeId) -> usize {
        self.node_words[id].len()
    }

    /// Length of the normalized text in characters.
    pub fn char_len(&self, id: NodeId) -> usize {
        let range = &self.node_words[id];
        if range.is_empty() {
            return 0;
        }
        let last = &self.words[range.end - 1];
        let last_chars = self.text[last.start..last.end].chars().count();
        last.chars_before + last_chars - self.words[range.start].chars_before
    }

    /// Length of the normalized text in bytes.
    pub fn byte_len(&self, id: NodeId) -> usize {
        self.bytes(id).len()
    }

    /// Whether the normalized text of `id` holds a currency amount.
    ///
    /// Equivalent to running the amount search on the node's own text: node
    /// text starts and ends on word boundaries of the page text, so an amount
    /// is found locally exactly when one starts and ends inside the range.
    pub fn has_amount(&self, id: NodeId) -> bool {
        let range = self.bytes(id);
        if range.is_empty() {
            return false;
        }
        let first = self.amounts.partition_point(|&(start, _)| start < range.start);
        self.amounts[first..]
            .iter()
            .take_while(|&&(start, _)| start < range.end)
            .any(|&(_, end)| end <= range.end)
    }

    /// Price-like signal: an amount in the node's text or a price-bearing
    /// attribute on the element itself.
    pub fn is_price_like(&self, doc: &Document, id: NodeId) -> bool {
        self.has_amount(id) || doc.element(id).is_some_and(signals::has_price_attribute)
    }

    /// Word index range covered by `id`.
    pub fn word_range(&self, id: NodeId) -> Range<usize> {
        self.node_words[id].clone()
    }

    /// Every word of the page, in order.
    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        self.words.iter().map(|w| &self.text[w.start..w.end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::normalize;

    #[test]
    fn slices_match_document_text() {
        let html = std::fs::read_to_string("tests/fixtures/listing.html").unwrap();
        let doc = normalize(&html);
        let index = TextIndex::new(&doc);
        for id in 0..doc.len() {
            let text = doc.text(id);
            assert_eq!(index.text(id), text, "node {id}");
            assert_eq!(index.char_len(id), text.chars().count(), "node {id}");
            assert_eq!(index.byte_len(id), text.len(), "node {id}");
            assert_eq!(index.word_count(id), text.split_whitespace().count(), "node {id}");
            assert_eq!(
                index.has_amount(id),
                signals::has_currency_amount(&text),
                "node {id}: {text}"
            );
        }
    }

    #[test]
    fn amounts_must_end_inside_the_node() {
        let doc = normalize("<div><b>USD</b> <i>40</i></div><p>€ 5</p>");
        let index = TextIndex::new(&doc);
        let id_of = |name: &str| {
            doc.element_descendants(doc.root())
                .find(|&id| doc.element(id).is_some_and(|el| el.name == name))
                .unwrap()
        };
        assert!(!index.has_amount(id_of("b")));
        assert!(index.has_amount(id_of("div")));
        assert!(index.has_amount(id_of("p")));
        assert_eq!(index.char_len(id_of("p")), 3);
    }

    #[test]
    fn empty_nodes() {
        let doc = normalize("<div><span></span></div>");
        let index = TextIndex::new(&doc);
        assert!(index.words().next().is_none());
        for id in 0..doc.len() {
            assert_eq!(index.text(id), "");
            assert!(!index.has_amount(id));
        }
    }
}
