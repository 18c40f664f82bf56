use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::dom::{Document, Node, NodeId};

/// Tags that are page chrome by definition.
const CHROME_TAGS: &[&str] = &["nav", "header", "footer", "aside"];

/// How much leading text the textual signal looks at.
const TEXT_HEAD_CHARS: usize = 120;

// Whole identity tokens only: `product-sort` is junk, `assortment` is not.
static NEG_IDENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^a-z0-9])(?:nav|navbar|navigation|filters?|facets?|sort|pagination|pager|newsletter|social|share|breadcrumbs?|promos?|promotions?|upsell|coupons?|banner|ads?|advert|advertisement|sidebar|reviews?-list)(?:[^a-z0-9]|$)",
    )
    .unwrap()
});

static NEG_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*home\b|\b(?:sale|discount|percent off|\d+\s?% off|save \$?\d+|free shipping|contact us|log ?in|sign in|account|terms of (?:use|service)|terms (?:&|and) conditions)\b",
    )
    .unwrap()
});

/// Structural signal: chrome tag, or a negative term in class/id.
pub fn is_structural_junk(doc: &Document, id: NodeId) -> bool {
    let Some(el) = doc.element(id) else {
        return false;
    };
    CHROME_TAGS.contains(&el.name.as_str()) || NEG_IDENTITY_RE.is_match(&el.identity())
}

/// Textual signal: promotional or site-chrome wording in an element's
/// leading text.
pub fn is_textual_junk(head: &str) -> bool {
    NEG_TEXT_RE.is_match(head)
}

/// First `max` characters of `words` joined by single spaces.
fn head_of<'a>(words: impl Iterator<Item = &'a str>, max: usize) -> String {
    let mut head = String::new();
    for word in words {
        if !head.is_empty() {
            head.push(' ');
        }
        head.push_str(word);
        if head.chars().count() >= max {
            break;
        }
    }
    match head.char_indices().nth(max) {
        Some((cut, _)) => head[..cut].to_string(),
        None => head,
    }
}

/// Junk verdict for every node id.
///
/// Elements are judged bottom-up: the textual signal reads an element's
/// leading text with its junk descendants already left out, so a page
/// wrapper is not condemned by the `<header>` inside it. Leading text is
/// assembled from the children's own (already truncated) heads, so the pass
/// stays linear in the size of the tree. The root is never junk.
pub fn junk_flags(doc: &Document) -> Vec<bool> {
    let mut junk = vec![false; doc.len()];
    let mut heads = vec![String::new(); doc.len()];
    for id in (0..doc.len()).rev() {
        let head = match doc.node(id) {
            Node::Text(text) => head_of(text.split_whitespace(), TEXT_HEAD_CHARS),
            Node::Element(el) => {
                let mut kept = Vec::with_capacity(el.children.len());
                for &child in &el.children {
                    let head = std::mem::take(&mut heads[child]);
                    if !junk[child] && !head.is_empty() {
                        kept.push(head);
                    }
                }
                head_of(kept.iter().map(String::as_str), TEXT_HEAD_CHARS)
            }
        };
        if id != doc.root() && doc.element(id).is_some() {
            junk[id] = is_structural_junk(doc, id) || is_textual_junk(&head);
        }
        heads[id] = head;
    }
    junk
}

/// Filtered copy of `doc` without junk wrappers and their subtrees. The
/// root itself is never removed.
pub fn strip_junk(doc: &Document) -> Document {
    let junk = junk_flags(doc);
    let stripped = doc.copy_filtered(doc.root(), |_, id| !junk[id]);
    debug!(
        flagged = junk.iter().filter(|&&j| j).count(),
        before = doc.len(),
        after = stripped.len(),
        "junk pre-pass"
    );
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{normalize, serialize::to_html};

    fn first(doc: &Document) -> NodeId {
        doc.element_descendants(doc.root()).next().unwrap()
    }

    fn junk(html: &str) -> bool {
        let doc = normalize(html);
        junk_flags(&doc)[first(&doc)]
    }

    #[test]
    fn chrome_tags() {
        assert!(junk("<nav>Shoes</nav>"));
        assert!(junk("<header>Store</header>"));
        assert!(junk("<footer>About</footer>"));
        assert!(junk("<aside>Related</aside>"));
        assert!(!junk("<article>Lamp $10.00</article>"));
    }

    #[test]
    fn negative_identity_terms() {
        for html in [
            "<div class=\"main-nav\">x</div>",
            "<div id=\"breadcrumbs\">x</div>",
            "<div class=\"plp Filters\">x</div>",
            "<div class=\"sort-by\">x</div>",
            "<ul class=\"pagination\">x</ul>",
            "<div class=\"hero promo-banner\">x</div>",
            "<div class=\"upsell\">x</div>",
            "<div class=\"coupon\">x</div>",
            "<div class=\"ad\">x</div>",
            "<div class=\"social-share\">x</div>",
            "<div class=\"newsletter_signup\">x</div>",
            "<div class=\"reviews-list\">x</div>",
        ] {
            assert!(junk(html), "{html}");
        }
    }

    #[test]
    fn identity_terms_need_token_boundaries() {
        for html in [
            "<div class=\"product-card\">Lamp</div>",
            "<div class=\"assortment\">Lamp</div>",
            "<div class=\"canvas\">Lamp</div>",
            "<div class=\"badge loaded\">Lamp</div>",
            "<div id=\"shared-price\">Lamp</div>",
        ] {
            assert!(!junk(html), "{html}");
        }
    }

    #[test]
    fn textual_signal() {
        assert!(junk("<div>Summer SALE on all lamps</div>"));
        assert!(junk("<div>Get 20% off today</div>"));
        assert!(junk("<div>Free shipping on orders over $50</div>"));
        assert!(junk("<div>Save $10 when you join</div>"));
        assert!(junk("<div>Home / Lighting / Lamps</div>"));
        assert!(junk("<div>Sign in to your account</div>"));
        assert!(junk("<p>Terms of Service</p>"));
        assert!(!junk("<div>Wholesale brass lamp $10.00</div>"));
        assert!(!junk("<div>Lamp for the home office $10.00</div>"));
    }

    #[test]
    fn textual_signal_reads_only_the_head() {
        let filler = "lamp ".repeat(30);
        assert!(!junk(&format!("<div>{filler} free shipping</div>")));
    }

    #[test]
    fn wrapper_is_judged_without_its_chrome() {
        let doc = normalize(
            "<div id=\"app\"><header>Home | My account | Sign in</header>\
             <p>Brass lamp $10.00</p><p class=\"note\">Sign in for member prices</p></div>",
        );
        let flags = junk_flags(&doc);
        let app = first(&doc);
        assert!(!flags[app]);
        let flagged: Vec<_> = doc
            .element_descendants(doc.root())
            .filter(|&id| flags[id])
            .filter_map(|id| doc.element(id).map(|el| el.name.clone()))
            .collect();
        assert_eq!(flagged, vec!["header", "p"]);
    }

    #[test]
    fn strip_removes_whole_subtrees() {
        let doc = normalize(
            "<nav><a>Home</a></nav><div class=\"card\"><h2>Lamp</h2>\
             <span class=\"coupon\">Use code LAMP</span><b>$10.00</b></div>",
        );
        let clean = strip_junk(&doc);
        assert_eq!(
            to_html(&clean),
            "<body><div class=\"card\"><h2>Lamp</h2><b>$10.00</b></div></body>"
        );
    }
}
