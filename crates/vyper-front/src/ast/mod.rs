//! Node arena for Vyper syntax trees.
//!
//! Nodes are stored in a flat arena and addressed by [`NodeId`]. Each node
//! carries a kind, a source span and an ordered list of named attributes,
//! mirroring the attribute names of Vyper's own AST (`func`, `value`,
//! `attr`, `id`, `target`, `annotation`, `body`, ...). A [`SyntaxTree`] is a
//! cheap-to-clone view of an arena rooted at one node.

mod node;

use std::fmt;
use std::sync::Arc;

use derive_more::Display;

use crate::line_index::LineIndex;

pub use node::{AttrRef, NodeRef};

/// Index of a node inside its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source position of a node.
///
/// Lines are 1-based, columns are 0-based and counted in characters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub lineno: u32,
    pub col_offset: u32,
    pub end_lineno: u32,
    pub end_col_offset: u32,
}

impl Span {
    pub fn new(lineno: u32, col_offset: u32, end_lineno: u32, end_col_offset: u32) -> Self {
        Self {
            lineno,
            col_offset,
            end_lineno,
            end_col_offset,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        let (lineno, col_offset) =
            (self.lineno, self.col_offset).min((other.lineno, other.col_offset));
        let (end_lineno, end_col_offset) = (self.end_lineno, self.end_col_offset)
            .max((other.end_lineno, other.end_col_offset));
        Span::new(lineno, col_offset, end_lineno, end_col_offset)
    }

    /// Whether the 1-based line `line` falls inside this span.
    pub fn contains_line(&self, line: u32) -> bool {
        self.lineno <= line && line <= self.end_lineno
    }

    pub(crate) fn start(&self) -> (u32, u32) {
        (self.lineno, self.col_offset)
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    FunctionDef,
    Arguments,
    Arg,
    VariableDecl,
    StructDef,
    FlagDef,
    EventDef,
    InterfaceDef,
    Import,
    ImportFrom,
    ExportsDecl,
    ImplementsDecl,
    InitializesDecl,
    UsesDecl,
    AnnAssign,
    Assign,
    AugAssign,
    Return,
    Expr,
    Pass,
    Break,
    Continue,
    If,
    For,
    Log,
    Assert,
    Raise,
    Call,
    Keyword,
    Attribute,
    Subscript,
    Name,
    Int,
    Hex,
    Decimal,
    Str,
    NameConstant,
    BinOp,
    BoolOp,
    Compare,
    UnaryOp,
    Tuple,
    List,
    Dict,
}

impl NodeKind {
    /// Kinds that introduce a module-level name.
    pub fn is_top_level_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDef
                | NodeKind::VariableDecl
                | NodeKind::StructDef
                | NodeKind::FlagDef
                | NodeKind::EventDef
                | NodeKind::InterfaceDef
        )
    }
}

/// Attribute value stored on a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Attr {
    Str(String),
    Bool(bool),
    Node(NodeId),
    List(Vec<NodeId>),
}

#[derive(Clone, Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    attrs: Vec<(&'static str, Attr)>,
}

impl NodeData {
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs
            .iter()
            .find_map(|(key, value)| (*key == name).then_some(value))
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&'static str, &Attr)> {
        self.attrs.iter().map(|(key, value)| (*key, value))
    }

    pub(crate) fn set_attr(&mut self, name: &'static str, value: Attr) {
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attrs.push((name, value)),
        }
    }
}

/// Flat storage for every node of one parsed document.
#[derive(Clone, Debug, Default)]
pub struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    /// Allocate a node and adopt every node referenced by its attributes.
    ///
    /// Children must be allocated before their parent.
    pub fn alloc(
        &mut self,
        kind: NodeKind,
        span: Span,
        attrs: Vec<(&'static str, Attr)>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for (_, attr) in &attrs {
            match attr {
                Attr::Node(child) => self.nodes[child.index()].parent = Some(id),
                Attr::List(children) => {
                    for child in children {
                        self.nodes[child.index()].parent = Some(id);
                    }
                }
                Attr::Str(_) | Attr::Bool(_) => {}
            }
        }
        self.nodes.push(NodeData {
            kind,
            span,
            parent: None,
            attrs,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    /// Turn an existing node into a literal of `kind`, keeping its span and parent.
    pub(crate) fn replace_with_literal(&mut self, id: NodeId, kind: NodeKind, value: String) {
        let node = self.get_mut(id);
        node.kind = kind;
        node.attrs = vec![("value", Attr::Str(value))];
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Immutable syntax tree view: a shared arena plus the node acting as root.
#[derive(Clone)]
pub struct SyntaxTree {
    arena: Arc<Arena>,
    root: NodeId,
    index: Arc<LineIndex>,
}

impl SyntaxTree {
    pub fn new(arena: Arena, root: NodeId, source: &str) -> Self {
        Self {
            arena: Arc::new(arena),
            root,
            index: Arc::new(LineIndex::new(source)),
        }
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef::new(self, id)
    }

    /// A view rooted at `id`, sharing this tree's arena.
    pub fn subtree(&self, id: NodeId) -> SyntaxTree {
        SyntaxTree {
            arena: Arc::clone(&self.arena),
            root: id,
            index: Arc::clone(&self.index),
        }
    }

    /// A tree over a modified copy of this tree's arena, same root and source.
    pub(crate) fn with_arena(&self, arena: Arena) -> SyntaxTree {
        SyntaxTree {
            arena: Arc::new(arena),
            root: self.root,
            index: Arc::clone(&self.index),
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn source(&self) -> &str {
        self.index.text()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.index
    }

    /// Whether both views share one arena.
    pub fn same_arena(&self, other: &SyntaxTree) -> bool {
        Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("root", &self.root().kind())
            .field("nodes", &self.arena.len())
            .finish()
    }
}
