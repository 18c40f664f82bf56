use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{Document, Element, Node, NodeId, Span};

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Tags deleted with their subtree before anything is scored.
pub const NON_CONTENT_TAGS: &[&str] = &["script", "style", "svg", "iframe", "form", "noscript"];

/// Parse raw markup into a [`Document`] rooted at the content container.
///
/// Parsing is browser-lenient: broken nesting is auto-closed, never rejected.
/// When the parse has no `<body>` the input is wrapped in one and parsed
/// again; failing that, the document element becomes the root. Non-content
/// elements, comments and doctypes are left out of the result.
pub fn normalize(raw: &str) -> Document {
    let parsed = Html::parse_document(raw);
    if let Some(body) = parsed.select(&BODY).next() {
        return build(body);
    }

    debug!("no content root found, wrapping input in <body>");
    let wrapped = Html::parse_document(&format!("<body>{raw}</body>"));
    match wrapped.select(&BODY).next() {
        Some(body) => build(body),
        None => build(wrapped.root_element()),
    }
}

fn build(root: ElementRef<'_>) -> Document {
    let mut doc = Document::with_capacity(256);
    let mut stack = vec![(*root, None::<NodeId>)];

    while let Some((node, parent)) = stack.pop() {
        let converted = match node.value() {
            scraper::Node::Element(el) => {
                if parent.is_some() && NON_CONTENT_TAGS.contains(&el.name()) {
                    continue;
                }
                Node::Element(Element {
                    name: el.name().to_string(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    children: Vec::new(),
                    span: Span { start: 0, end: 0 },
                })
            }
            scraper::Node::Text(text) => Node::Text(String::from(&**text)),
            _ => continue,
        };

        let id = doc.push(converted, parent);
        if matches!(doc.node(id), Node::Element(_)) {
            let children: Vec<_> = node.children().collect();
            for child in children.into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }
    }

    assign_spans(&mut doc);
    doc
}

/// Ids are pre-order positions, so a span ends at the span end of the last
/// child (or at the element itself when it has none).
fn assign_spans(doc: &mut Document) {
    let mut ends = vec![0; doc.nodes.len()];
    for id in (0..doc.nodes.len()).rev() {
        ends[id] = match &doc.nodes[id] {
            Node::Element(el) => el.children.last().map_or(id, |&last| ends[last]),
            Node::Text(_) => id,
        };
        if let Node::Element(el) = &mut doc.nodes[id] {
            el.span = Span {
                start: id,
                end: ends[id],
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::serialize::to_html;

    fn names(doc: &Document) -> Vec<String> {
        doc.element_descendants(doc.root())
            .filter_map(|id| doc.element(id).map(|el| el.name.clone()))
            .collect()
    }

    #[test]
    fn fragment_gets_body_root() {
        let doc = normalize("<span class=\"price\">$5.00</span>");
        assert_eq!(doc.element(doc.root()).unwrap().name, "body");
        assert_eq!(names(&doc), vec!["span"]);
    }

    #[test]
    fn empty_input_still_has_root() {
        let doc = normalize("");
        assert!(doc.element(doc.root()).is_some());
        assert_eq!(doc.text(doc.root()), "");
    }

    #[test]
    fn strips_non_content_elements() {
        let html = "<div>Lamp<script>var x = 1;</script><style>p{}</style>\
                    <noscript>enable js</noscript><form><input></form>\
                    <svg><path/></svg><iframe src=\"x\"></iframe><!-- note --></div>";
        let doc = normalize(html);
        assert_eq!(names(&doc), vec!["div"]);
        assert_eq!(doc.text(doc.root()), "Lamp");
    }

    #[test]
    fn malformed_nesting_is_recovered() {
        let doc = normalize("<div><p>Lamp <b>$10.00</div><p>second");
        assert_eq!(doc.text(doc.root()), "Lamp $10.00 second");
        assert!(names(&doc).contains(&"b".to_string()));
    }

    #[test]
    fn attributes_survive_round_trip() {
        let doc = normalize("<div class=\"a\" data-price=\"1\" id=\"z\"></div>");
        assert_eq!(to_html(&doc), "<body><div class=\"a\" data-price=\"1\" id=\"z\"></div></body>");
    }

    #[test]
    fn spans_are_preorder_positions() {
        let doc = normalize("<div><p>a</p></div>");
        let root = doc.element(doc.root()).unwrap().span;
        assert_eq!(root.start, 0);
        assert_eq!(root.end, doc.len() - 1);
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let depth = 5_000;
        let html = format!("{}$1.00{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let doc = normalize(&html);
        assert_eq!(doc.text(doc.root()), "$1.00");
        assert!(doc.len() > depth);
    }
}
