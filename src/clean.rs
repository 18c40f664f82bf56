use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::dom::{self, serialize, Document, NodeId};
use crate::filter::Card;

static LEADING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<([A-Za-z][A-Za-z0-9]*)").unwrap());

/// What `clean_for_llm` removes from each fragment.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Elements dropped with their whole subtree.
    pub strip_tags: Vec<String>,
    /// Attribute names to drop. `*` matches any run of characters and `?`
    /// exactly one; everything else matches literally.
    pub strip_attributes: Vec<String>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        let tags = ["style", "script", "form", "header", "footer", "noscript"];
        let attributes = [
            "style",
            "aria-??",
            "role",
            "data-pct-off-codes",
            "data-module-*",
            "tab-index",
            "data-testid",
            "data-test-id",
        ];
        Self {
            strip_tags: tags.iter().map(|t| t.to_string()).collect(),
            strip_attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Anchored regex matching any of the wildcard patterns.
fn wildcard_regex(patterns: &[String]) -> Option<Regex> {
    if patterns.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = patterns
        .iter()
        .map(|pattern| {
            let mut out = String::new();
            for c in pattern.chars() {
                match c {
                    '*' => out.push_str(".*"),
                    '?' => out.push('.'),
                    c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
                }
            }
            out
        })
        .collect();
    Regex::new(&format!("^(?:{})$", alternatives.join("|"))).ok()
}

/// Containers a fragment must sit in to parse as written. Table parts are
/// only valid inside a table; in body context the parser drops their tags
/// and keeps the bare text.
fn context_chain(tag: &str) -> &'static [&'static str] {
    match tag {
        "caption" | "colgroup" | "thead" | "tbody" | "tfoot" => &["table"],
        "col" => &["table", "colgroup"],
        "tr" => &["table", "tbody"],
        "td" | "th" => &["table", "tbody", "tr"],
        _ => &[],
    }
}

/// Parse a serialized fragment in the context its leading tag needs.
/// Returns the document and the container whose children are the fragment.
fn parse_fragment(fragment: &str) -> (Document, NodeId) {
    let chain = LEADING_TAG_RE
        .captures(fragment)
        .map_or(&[][..], |caps| context_chain(&caps[1].to_ascii_lowercase()));
    if chain.is_empty() {
        let doc = dom::normalize(fragment);
        let root = doc.root();
        return (doc, root);
    }

    let open: String = chain.iter().map(|tag| format!("<{tag}>")).collect();
    let close: String = chain.iter().rev().map(|tag| format!("</{tag}>")).collect();
    let doc = dom::normalize(&format!("{open}{fragment}{close}"));
    let mut container = doc.root();
    for name in chain {
        let next = doc
            .children(container)
            .iter()
            .copied()
            .find(|&child| doc.element(child).is_some_and(|el| el.name == *name));
        match next {
            Some(child) => container = child,
            None => break,
        }
    }
    (doc, container)
}

struct Stripper<'a> {
    options: &'a CleanOptions,
    attr_pattern: Option<Regex>,
}

impl<'a> Stripper<'a> {
    fn new(options: &'a CleanOptions) -> Self {
        Self {
            options,
            attr_pattern: wildcard_regex(&options.strip_attributes),
        }
    }

    fn strips_tag(&self, name: &str) -> bool {
        self.options.strip_tags.iter().any(|t| t == name)
    }

    /// Copy of the subtree at `from` without stripped elements and
    /// attributes. `from` itself is always kept.
    fn strip(&self, doc: &Document, from: NodeId) -> Document {
        let mut out = doc.copy_filtered(from, |d, id| {
            d.element(id).is_some_and(|el| !self.strips_tag(&el.name))
        });
        if let Some(pattern) = &self.attr_pattern {
            out.retain_attrs(|name| !pattern.is_match(name));
        }
        out
    }
}

fn non_empty(cleaned: impl Iterator<Item = String>) -> Vec<String> {
    cleaned
        .filter_map(|html| {
            let html = html.trim();
            (!html.is_empty()).then(|| html.to_string())
        })
        .collect()
}

/// Strip unwanted tags and attributes from each fragment and join the
/// results with newlines. Fragments that end up empty are skipped.
///
/// Fragments are parsed in the context their leading tag requires, so a
/// `<tr>` or `<td>` keeps its table markup.
pub fn clean_for_llm<S: AsRef<str>>(fragments: &[S], options: &CleanOptions) -> String {
    let stripper = Stripper::new(options);
    let cleaned = non_empty(fragments.iter().map(|fragment| {
        let (parsed, container) = parse_fragment(fragment.as_ref());
        let doc = stripper.strip(&parsed, container);
        serialize::inner_html(&doc, doc.root())
    }));

    debug!(fragments = fragments.len(), kept = cleaned.len(), "cleaned for llm");
    cleaned.join("\n")
}

/// [`clean_for_llm`] over cards straight from
/// [`filter_cards`](crate::filter::filter_cards), without a second parse.
/// A card whose root element is itself a stripped tag is skipped.
pub fn clean_cards(cards: &[Card], options: &CleanOptions) -> String {
    let stripper = Stripper::new(options);
    let cleaned = non_empty(cards.iter().filter_map(|card| {
        let doc = &card.fragment;
        let root = doc.element(doc.root())?;
        if stripper.strips_tag(&root.name) {
            return None;
        }
        Some(serialize::to_html(&stripper.strip(doc, doc.root())))
    }));

    debug!(cards = cards.len(), kept = cleaned.len(), "cleaned cards for llm");
    cleaned.join("\n")
}
