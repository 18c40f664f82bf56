use std::io;

use html5ever::serialize::{
    serialize, HtmlSerializer, Serialize, SerializeOpts, Serializer, TraversalScope,
};
use html5ever::{namespace_url, ns, LocalName, QualName};

use super::{Document, Element, Node, NodeId};

fn element_name(el: &Element) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(el.name.as_str()))
}

fn attr_names(el: &Element) -> Vec<QualName> {
    el.attrs
        .iter()
        .map(|(name, _)| QualName::new(None, ns!(), LocalName::from(name.as_str())))
        .collect()
}

enum Step {
    Open(NodeId),
    Close(NodeId),
}

/// A node of a [`Document`] as html5ever sees it. `deep` controls whether
/// descendants are written; a shallow element is just its own tags.
struct Subtree<'a> {
    doc: &'a Document,
    id: NodeId,
    deep: bool,
}

impl Subtree<'_> {
    fn start<S: Serializer>(&self, serializer: &mut S, el: &Element) -> io::Result<()> {
        let names = attr_names(el);
        let attrs = names
            .iter()
            .zip(&el.attrs)
            .map(|(name, (_, value))| (name, value.as_str()));
        serializer.start_elem(element_name(el), attrs)
    }
}

impl Serialize for Subtree<'_> {
    fn serialize<S: Serializer>(
        &self,
        serializer: &mut S,
        traversal_scope: TraversalScope,
    ) -> io::Result<()> {
        let mut stack = match traversal_scope {
            TraversalScope::IncludeNode => vec![Step::Open(self.id)],
            TraversalScope::ChildrenOnly(_) => self
                .doc
                .children(self.id)
                .iter()
                .rev()
                .map(|&c| Step::Open(c))
                .collect(),
        };

        while let Some(step) = stack.pop() {
            match step {
                Step::Open(current) => match self.doc.node(current) {
                    Node::Text(text) => serializer.write_text(text)?,
                    Node::Element(el) => {
                        self.start(serializer, el)?;
                        stack.push(Step::Close(current));
                        if self.deep {
                            stack.extend(el.children.iter().rev().map(|&c| Step::Open(c)));
                        }
                    }
                },
                Step::Close(current) => {
                    if let Some(el) = self.doc.element(current) {
                        serializer.end_elem(element_name(el))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn render(doc: &Document, id: NodeId, traversal_scope: TraversalScope) -> String {
    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..SerializeOpts::default()
    };
    let node = Subtree { doc, id, deep: true };
    // Writing into a Vec cannot fail.
    let _ = serialize(&mut buf, &node, opts);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serialize a whole document, root included.
pub fn to_html(doc: &Document) -> String {
    if doc.is_empty() {
        return String::new();
    }
    outer_html(doc, doc.root())
}

/// HTML serialization of the subtree at `id`, the element's own tags included.
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    render(doc, id, TraversalScope::IncludeNode)
}

/// Serialization of the children of `id`, without the element's own tags.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let context = doc.element(id).map(element_name);
    render(doc, id, TraversalScope::ChildrenOnly(context))
}

/// Serialized length in bytes of every node, as `outer_html(doc, id).len()`
/// would report it, computed in a single bottom-up pass.
///
/// Each node is serialized shallowly (text under its parent's context, so
/// raw-text parents are honoured) and children's lengths are summed in.
pub fn outer_lengths(doc: &Document) -> Vec<usize> {
    let mut lens = vec![0; doc.len()];
    let mut buf = Vec::new();
    for id in (0..doc.len()).rev() {
        buf.clear();
        let context = doc.parent(id).and_then(|p| doc.element(p)).map(element_name);
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(context),
            ..SerializeOpts::default()
        };
        {
            let mut serializer = HtmlSerializer::new(&mut buf, opts);
            let node = Subtree { doc, id, deep: false };
            let _ = node.serialize(&mut serializer, TraversalScope::IncludeNode);
        }
        lens[id] = buf.len() + doc.children(id).iter().map(|&c| lens[c]).sum::<usize>();
    }
    lens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::normalize;

    #[test]
    fn escapes_text_and_attributes() {
        let doc = normalize("<p title='say \"hi\" &amp; go'>a &lt; b &amp; c</p>");
        assert_eq!(
            to_html(&doc),
            "<body><p title=\"say &quot;hi&quot; &amp; go\">a &lt; b &amp; c</p></body>"
        );
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        let doc = normalize("<div><img src=\"a.png\"><br>Lamp</div>");
        assert_eq!(
            to_html(&doc),
            "<body><div><img src=\"a.png\"><br>Lamp</div></body>"
        );
    }

    #[test]
    fn inner_html_skips_own_tags() {
        let doc = normalize("<p>a</p><p>b</p>");
        assert_eq!(inner_html(&doc, doc.root()), "<p>a</p><p>b</p>");
    }

    #[test]
    fn raw_text_parents_are_not_escaped() {
        let doc = normalize("<xmp>a < b && c</xmp>");
        assert_eq!(to_html(&doc), "<body><xmp>a < b && c</xmp></body>");
        let lens = outer_lengths(&doc);
        assert_eq!(lens[doc.root()], to_html(&doc).len());
    }

    #[test]
    fn lengths_match_serialization() {
        let doc = normalize(
            "<ul class=\"grid\"><li>Lamp &amp; shade <b>$10.00</b></li><li><img src=x>€5</li></ul>",
        );
        let lens = outer_lengths(&doc);
        for id in 0..doc.len() {
            assert_eq!(lens[id], outer_html(&doc, id).len(), "node {id}");
        }
    }
}
