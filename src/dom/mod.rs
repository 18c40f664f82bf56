pub mod normalize;
pub mod serialize;

pub use normalize::normalize;

/// Index of a node inside a [`Document`] arena.
pub type NodeId = usize;

/// Pre-order interval an element occupied in the normalized source tree.
///
/// `start` is the element's own position, `end` the position of its last
/// descendant. Filtered copies keep the spans of the tree they came from, so
/// two spans from the same invocation can always be compared for containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<NodeId>,
    pub span: Span,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Class list and id joined by a space, used for identity matching.
    pub fn identity(&self) -> String {
        let class = self.attr("class").unwrap_or_default();
        let id = self.attr("id").unwrap_or_default();
        match (class.is_empty(), id.is_empty()) {
            (false, false) => format!("{class} {id}"),
            (false, true) => class.to_string(),
            (true, false) => id.to_string(),
            (true, true) => String::new(),
        }
    }

    fn shallow_clone(&self) -> Element {
        Element {
            name: self.name.clone(),
            attrs: self.attrs.clone(),
            children: Vec::new(),
            span: self.span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Arena-backed element tree.
///
/// Nodes are always appended in pre-order, so a child's id is greater than its
/// parent's and every subtree can be processed bottom-up by walking ids in
/// reverse. All traversals use explicit stacks.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
}

impl Document {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
        }
    }

    /// Append `node` under `parent`. Callers must push in pre-order.
    pub(crate) fn push(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.parents.push(parent);
        if let Some(Node::Element(el)) = parent.and_then(|p| self.nodes.get_mut(p)) {
            el.children.push(id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.nodes.get(id) {
            Some(Node::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id).copied().flatten()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id) {
            Some(Node::Element(el)) => &el.children,
            _ => &[],
        }
    }

    /// Nodes strictly below `id`, in document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Element ids strictly below `id`, in document order.
    pub fn element_descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id)
            .filter(|&d| matches!(self.nodes[d], Node::Element(_)))
    }

    /// Whitespace-normalized inner text: every run of whitespace collapses to
    /// a single space and the result is trimmed.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match &self.nodes[current] {
                Node::Text(text) => {
                    for word in text.split_whitespace() {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(word);
                    }
                }
                Node::Element(el) => stack.extend(el.children.iter().rev()),
            }
        }
        out
    }

    /// Drop attributes rejected by `keep(name)` from every element.
    pub fn retain_attrs<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        for node in &mut self.nodes {
            if let Node::Element(el) = node {
                el.attrs.retain(|(name, _)| keep(name));
            }
        }
    }

    /// Ancestors of `id` below the root, outermost first.
    pub fn ancestors_below_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == self.root() {
                break;
            }
            chain.push(p);
            current = self.parent(p);
        }
        chain.reverse();
        chain
    }

    /// Copy the subtree at `from` into a fresh document, dropping every
    /// descendant element (and its subtree) for which `keep` returns false.
    /// The copied root is always kept; spans are carried over unchanged.
    pub fn copy_filtered<F>(&self, from: NodeId, mut keep: F) -> Document
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        let mut out = Document::with_capacity(self.len().min(64));
        self.copy_into(&mut out, from, None, &mut keep);
        out
    }

    /// Copy the subtree at `from` under a chain of shallow clones of its
    /// ancestors (excluding the root), each holding only the path child.
    pub fn copy_with_ancestry<F>(&self, from: NodeId, mut keep: F) -> Document
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        let mut out = Document::with_capacity(64);
        let mut parent = None;
        for ancestor in self.ancestors_below_root(from) {
            if let Some(el) = self.element(ancestor) {
                parent = Some(out.push(Node::Element(el.shallow_clone()), parent));
            }
        }
        self.copy_into(&mut out, from, parent, &mut keep);
        out
    }

    fn copy_into<F>(&self, out: &mut Document, from: NodeId, under: Option<NodeId>, keep: &mut F)
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(from, under)];
        while let Some((src, parent)) = stack.pop() {
            let copied = match &self.nodes[src] {
                Node::Text(text) => Node::Text(text.clone()),
                Node::Element(el) => {
                    if src != from && !keep(self, src) {
                        continue;
                    }
                    Node::Element(el.shallow_clone())
                }
            };
            let id = out.push(copied, parent);
            for &child in self.children(src).iter().rev() {
                stack.push((child, Some(id)));
            }
        }
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.doc.children(id).iter().rev());
        Some(id)
    }
}
