use crate::dom::{serialize, Document, NodeId, Span};
use crate::settings::Config;

use super::junk;
use super::text_index::TextIndex;

/// Interval a card occupies in the source tree; compared for containment only.
pub type SourceRange = Span;

/// A self-contained, junk-pruned copy of the subtree around a candidate.
#[derive(Debug, Clone)]
pub struct Card {
    pub fragment: Document,
    pub range: SourceRange,
}

impl Card {
    pub fn html(&self) -> String {
        serialize::to_html(&self.fragment)
    }

    pub fn text(&self) -> String {
        self.fragment.text(self.fragment.root())
    }
}

/// Climbs from candidates to card roots and clones the pruned cards.
///
/// Whether a node may absorb its parent depends only on the parent, so both
/// the per-parent test and the final climb target are cached: every candidate
/// sharing an ancestor chain pays for that chain once. Text lengths and
/// amounts come from a page-wide [`TextIndex`].
pub struct Compactor<'a> {
    doc: &'a Document,
    config: &'a Config,
    index: TextIndex,
    junk: Vec<bool>,
    absorbable: Vec<Option<bool>>,
    climb_target: Vec<Option<NodeId>>,
}

impl<'a> Compactor<'a> {
    pub fn new(doc: &'a Document, config: &'a Config) -> Self {
        Self {
            doc,
            config,
            index: TextIndex::new(doc),
            junk: junk::junk_flags(doc),
            absorbable: vec![None; doc.len()],
            climb_target: vec![None; doc.len()],
        }
    }

    /// Root of the card for `node`: the highest ancestor-or-self reachable
    /// through parents that are not the document root, hold at most
    /// `max_chars` characters of text and still look like a price.
    pub fn card_root(&mut self, node: NodeId) -> NodeId {
        let mut path = Vec::new();
        let mut current = node;
        let target = loop {
            if let Some(known) = self.climb_target[current] {
                break known;
            }
            match self.doc.parent(current) {
                Some(parent) if self.can_absorb(parent) => {
                    path.push(current);
                    current = parent;
                }
                _ => break current,
            }
        };
        self.climb_target[current] = Some(target);
        for visited in path {
            self.climb_target[visited] = Some(target);
        }
        target
    }

    fn can_absorb(&mut self, parent: NodeId) -> bool {
        if let Some(known) = self.absorbable[parent] {
            return known;
        }
        let ok = parent != self.doc.root()
            && self.index.char_len(parent) <= self.config.max_chars
            && self.index.is_price_like(self.doc, parent);
        self.absorbable[parent] = Some(ok);
        ok
    }

    pub fn range_of(&self, root: NodeId) -> SourceRange {
        self.doc
            .element(root)
            .map(|el| el.span)
            .unwrap_or(Span {
                start: root,
                end: root,
            })
    }

    /// Clone the subtree at `root` without its junk descendants.
    pub fn build(&self, root: NodeId) -> Card {
        let keep = |_: &Document, id: NodeId| !self.junk[id];
        let fragment = if self.config.keep_ancestry {
            self.doc.copy_with_ancestry(root, keep)
        } else {
            self.doc.copy_filtered(root, keep)
        };
        Card {
            fragment,
            range: self.range_of(root),
        }
    }

    /// Climb and build in one step.
    pub fn compact(&mut self, node: NodeId) -> Card {
        let root = self.card_root(node);
        self.build(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::normalize;

    fn find(doc: &Document, name: &str) -> NodeId {
        doc.element_descendants(doc.root())
            .find(|&id| doc.element(id).is_some_and(|el| el.name == name))
            .unwrap()
    }

    #[test]
    fn climbs_while_price_and_size_allow() {
        let doc = normalize(
            "<section><div class=\"tile\"><h3>Acme Lamp</h3><span>$10.00</span></div></section>",
        );
        let config = Config::default();
        let mut compactor = Compactor::new(&doc, &config);
        let card = compactor.compact(find(&doc, "span"));
        // Climbs through the tile up to the section; the body is never absorbed.
        assert!(card.html().starts_with("<section>"));
        assert_eq!(card.text(), "Acme Lamp $10.00");
    }

    #[test]
    fn does_not_climb_past_size_cap() {
        let filler = "x".repeat(190);
        let html = format!("<div><p>{filler}</p><span>$5.00</span></div>");
        let doc = normalize(&html);
        let config = Config::default().with_max_chars(50);
        let mut compactor = Compactor::new(&doc, &config);
        let span = find(&doc, "span");
        assert_eq!(compactor.card_root(span), span);
        assert_eq!(compactor.compact(span).html(), "<span>$5.00</span>");
    }

    #[test]
    fn stops_where_price_is_lost() {
        let doc = normalize(
            "<div id=\"outer\"><p>Lamp blurb without an amount</p>\
             <div id=\"inner\">Acme lamp <b>$10.00</b></div></div>",
        );
        let config = Config::default();
        let mut compactor = Compactor::new(&doc, &config);
        let card = compactor.compact(find(&doc, "b"));
        // Outer text still contains the amount, so climbing continues to it.
        assert!(card.html().starts_with("<div id=\"outer\">"));

        let doc = normalize(
            "<div id=\"outer\"><div id=\"inner\"><span class=\"amount\">ten</span> dollars</div><p>Other</p></div>",
        );
        let mut compactor = Compactor::new(&doc, &config);
        let card = compactor.compact(find(&doc, "span"));
        // The attribute signal belongs to the span only; its parent has no amount.
        assert_eq!(card.html(), "<span class=\"amount\">ten</span>");
    }

    #[test]
    fn prunes_junk_descendants_but_keeps_order_and_attributes() {
        let doc = normalize(
            "<li class=\"tile\" data-sku=\"7\"><h2>Lamp</h2><div class=\"promo\">Bundle deal</div>\
             <span class=\"price\">$10.00</span><p>Free shipping on orders over $50</p></li>",
        );
        let config = Config::default();
        let mut compactor = Compactor::new(&doc, &config);
        let card = compactor.compact(find(&doc, "li"));
        assert_eq!(
            card.html(),
            "<li class=\"tile\" data-sku=\"7\"><h2>Lamp</h2><span class=\"price\">$10.00</span></li>"
        );
        assert_eq!(card.fragment.parent(card.fragment.root()), None);
    }

    #[test]
    fn range_is_the_source_span_of_the_card_root() {
        let doc = normalize("<ul><li>a $1.00</li><li>b $2.00</li></ul>");
        let config = Config::default().with_max_chars(8);
        let mut compactor = Compactor::new(&doc, &config);
        let lis: Vec<_> = doc
            .element_descendants(doc.root())
            .filter(|&id| doc.element(id).is_some_and(|el| el.name == "li"))
            .collect();
        let a = compactor.compact(lis[0]);
        let b = compactor.compact(lis[1]);
        assert!(!a.range.contains(&b.range));
        assert!(!b.range.contains(&a.range));
        assert!(a.range.start < b.range.start);
    }

    #[test]
    fn ancestry_wraps_card_with_path() {
        let doc = normalize(
            "<main class=\"plp\"><ul class=\"grid\"><li>Lamp $10.00</li><li>Desk lamp with long arm $25.00</li></ul></main>",
        );
        let config = Config::default().with_max_chars(20).with_ancestry(true);
        let mut compactor = Compactor::new(&doc, &config);
        let li = find(&doc, "li");
        assert_eq!(
            compactor.compact(li).html(),
            "<main class=\"plp\"><ul class=\"grid\"><li>Lamp $10.00</li></ul></main>"
        );
    }
}
