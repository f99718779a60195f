use super::{Attr, NodeId, NodeKind, Span, SyntaxTree};

/// Borrowed handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

/// Resolved attribute of a node.
#[derive(Clone, Debug)]
pub enum AttrRef<'t> {
    Str(&'t str),
    Bool(bool),
    Node(NodeRef<'t>),
    List(Vec<NodeRef<'t>>),
}

impl<'t> NodeRef<'t> {
    pub(crate) fn new(tree: &'t SyntaxTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.tree.arena().get(self.id).kind
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind() == kind
    }

    pub fn span(&self) -> Span {
        self.tree.arena().get(self.id).span
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        let parent = self.tree.arena().get(self.id).parent?;
        Some(NodeRef::new(self.tree, parent))
    }

    /// Nearest strict ancestor of the given kind.
    pub fn ancestor(&self, kind: NodeKind) -> Option<NodeRef<'t>> {
        let mut current = self.parent();
        while let Some(node) = current {
            if node.kind() == kind {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }

    pub fn attr(&self, name: &str) -> Option<AttrRef<'t>> {
        let tree = self.tree;
        let attr = tree.arena().get(self.id).attr(name)?;
        Some(match attr {
            Attr::Str(value) => AttrRef::Str(value.as_str()),
            Attr::Bool(value) => AttrRef::Bool(*value),
            Attr::Node(id) => AttrRef::Node(NodeRef::new(tree, *id)),
            Attr::List(ids) => {
                AttrRef::List(ids.iter().map(|id| NodeRef::new(tree, *id)).collect())
            }
        })
    }

    pub fn str_attr(&self, name: &str) -> Option<&'t str> {
        match self.tree.arena().get(self.id).attr(name)? {
            Attr::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn bool_attr(&self, name: &str) -> Option<bool> {
        match self.tree.arena().get(self.id).attr(name)? {
            Attr::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Single child node stored under `name`.
    pub fn child(&self, name: &str) -> Option<NodeRef<'t>> {
        match self.tree.arena().get(self.id).attr(name)? {
            Attr::Node(id) => Some(NodeRef::new(self.tree, *id)),
            _ => None,
        }
    }

    /// Child list stored under `name`; empty when absent.
    pub fn list(&self, name: &str) -> Vec<NodeRef<'t>> {
        match self.tree.arena().get(self.id).attr(name) {
            Some(Attr::List(ids)) => ids.iter().map(|id| NodeRef::new(self.tree, *id)).collect(),
            _ => Vec::new(),
        }
    }

    /// Walk a dotted attribute path such as `func.value.id`.
    ///
    /// Every segment but the last must name a single child node.
    pub fn get(&self, path: &str) -> Option<AttrRef<'t>> {
        let mut segments = path.split('.');
        let last = segments.next_back()?;
        let mut current = *self;
        for segment in segments {
            current = current.child(segment)?;
        }
        current.attr(last)
    }

    /// String attribute at the end of a dotted path.
    pub fn get_str(&self, path: &str) -> Option<&'t str> {
        match self.get(path)? {
            AttrRef::Str(value) => Some(value),
            _ => None,
        }
    }

    /// `name` for declarations, `id` for names.
    pub fn name(&self) -> Option<&'t str> {
        self.str_attr("name").or_else(|| self.str_attr("id"))
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeRef<'t>> {
        let mut children = Vec::new();
        for (_, attr) in self.tree.arena().get(self.id).attrs() {
            match attr {
                Attr::Node(id) => children.push(NodeRef::new(self.tree, *id)),
                Attr::List(ids) => {
                    children.extend(ids.iter().map(|id| NodeRef::new(self.tree, *id)))
                }
                Attr::Str(_) | Attr::Bool(_) => {}
            }
        }
        children.sort_by_key(|child| child.span().start());
        children
    }

    /// Every node below this one, pre-order, in document order.
    pub fn descendants(&self) -> Vec<NodeRef<'t>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef<'t>> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children().into_iter().rev());
        }
        out
    }

    pub fn descendants_of_kind(&self, kind: NodeKind) -> Vec<NodeRef<'t>> {
        self.descendants()
            .into_iter()
            .filter(|node| node.kind() == kind)
            .collect()
    }

    /// Source text covered by the node.
    pub fn source_code(&self) -> &'t str {
        let span = self.span();
        let index = self.tree.line_index();
        let start = index.offset(span.lineno.saturating_sub(1), span.col_offset);
        let end = index.offset(span.end_lineno.saturating_sub(1), span.end_col_offset);
        match (start, end) {
            (Some(start), Some(end)) if start <= end => &self.tree.source()[start..end],
            _ => "",
        }
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let span = self.span();
        write!(
            f,
            "{}@{}:{}-{}:{}",
            self.kind(),
            span.lineno,
            span.col_offset,
            span.end_lineno,
            span.end_col_offset
        )
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tree.same_arena(other.tree)
    }
}

impl Eq for NodeRef<'_> {}
