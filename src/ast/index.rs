//! Declaration and reference queries over the facade's trees.
//!
//! Names are not unique across scopes, so every lookup here is tied to one
//! syntactic shape (a `self.x` access, a bare name, a type annotation).
//! Results come back in document order.

use lsp_types::Position;
use vyper_front::{NodeKind, NodeRef, Span, SyntaxTree, unwrap_type};

use super::{Ast, NodeFilter};

const USER_TYPE_KINDS: &[NodeKind] = &[NodeKind::StructDef, NodeKind::FlagDef];
const TYPE_DECLARATION_KINDS: &[NodeKind] =
    &[NodeKind::StructDef, NodeKind::FlagDef, NodeKind::EventDef];

fn descendants_in<'t>(
    tree: Option<&'t SyntaxTree>,
    kinds: &[NodeKind],
    filter: &NodeFilter,
) -> Vec<NodeRef<'t>> {
    let Some(tree) = tree else {
        return Vec::new();
    };
    tree.root()
        .descendants()
        .into_iter()
        .filter(|node| kinds.contains(&node.kind()) && filter.matches(*node))
        .collect()
}

fn target_id<'t>(node: NodeRef<'t>) -> Option<&'t str> {
    node.get_str("target.id")
}

/// Whether a type annotation names `name`, looking through `public(...)`
/// and similar wrappers.
fn annotation_names(node: NodeRef<'_>, name: &str) -> bool {
    node.child("annotation")
        .map(unwrap_type)
        .is_some_and(|annotation| {
            annotation.is(NodeKind::Name) && annotation.str_attr("id") == Some(name)
        })
}

/// Span of a top-level node, widened to include a function's decorators.
fn declaration_span(node: NodeRef<'_>) -> Span {
    node.list("decorator_list")
        .iter()
        .fold(node.span(), |span, decorator| span.cover(decorator.span()))
}

impl Ast {
    /// Nodes of the given kinds below the root of the best tree.
    pub fn get_descendants(&self, kinds: &[NodeKind], filter: &NodeFilter) -> Vec<NodeRef<'_>> {
        descendants_in(self.best_tree(), kinds, filter)
    }

    pub fn get_top_level_nodes(&self) -> Vec<NodeRef<'_>> {
        self.best_tree()
            .map(|tree| tree.root().list("body"))
            .unwrap_or_default()
    }

    pub fn get_enums(&self) -> Vec<String> {
        self.flags().keys().cloned().collect()
    }

    pub fn get_structs(&self) -> Vec<String> {
        self.structs().keys().cloned().collect()
    }

    pub fn get_events(&self) -> Vec<String> {
        self.get_descendants(&[NodeKind::EventDef], &NodeFilter::new())
            .iter()
            .filter_map(|node| node.name().map(str::to_string))
            .collect()
    }

    /// Struct and flag names, in declaration order.
    pub fn get_user_defined_types(&self) -> Vec<String> {
        self.get_descendants(USER_TYPE_KINDS, &NodeFilter::new())
            .iter()
            .filter_map(|node| node.name().map(str::to_string))
            .collect()
    }

    pub fn get_constants(&self) -> Vec<String> {
        let Some(raw) = self.raw_tree() else {
            return Vec::new();
        };
        let filter = NodeFilter::new().eq("is_constant", true);
        raw.root()
            .list("body")
            .into_iter()
            .filter(|node| node.is(NodeKind::VariableDecl) && filter.matches(*node))
            .filter_map(|node| target_id(node).map(str::to_string))
            .collect()
    }

    /// Every declared storage name, constants and immutables included.
    pub fn get_state_variables(&self) -> Vec<String> {
        descendants_in(self.raw_tree(), &[NodeKind::VariableDecl], &NodeFilter::new())
            .into_iter()
            .filter_map(|node| target_id(node).map(str::to_string))
            .collect()
    }

    pub fn get_enum_variants(&self, name: &str) -> Vec<String> {
        let Some(node) = self.find_type_declaration_node_for_name(name) else {
            return Vec::new();
        };
        node.children()
            .into_iter()
            .filter(|child| child.is(NodeKind::Expr))
            .filter_map(|child| child.get_str("value.id").map(str::to_string))
            .collect()
    }

    pub fn get_struct_fields(&self, name: &str) -> Vec<String> {
        let Some(node) = self.find_type_declaration_node_for_name(name) else {
            return Vec::new();
        };
        node.children()
            .into_iter()
            .filter(|child| child.is(NodeKind::AnnAssign))
            .filter_map(|child| target_id(child).map(str::to_string))
            .collect()
    }

    /// Function definitions decorated with `@internal`.
    pub fn get_internal_function_nodes(&self) -> Vec<NodeRef<'_>> {
        self.get_descendants(&[NodeKind::FunctionDef], &NodeFilter::new())
            .into_iter()
            .filter(|node| {
                node.list("decorator_list")
                    .iter()
                    .any(|decorator| {
                        decorator.is(NodeKind::Name) && decorator.str_attr("id") == Some("internal")
                    })
            })
            .collect()
    }

    pub fn get_internal_functions(&self) -> Vec<String> {
        self.functions()
            .iter()
            .filter(|(_, function)| function.is_internal())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Field names for a struct, variant names for a flag.
    pub fn get_attributes_for_symbol(&self, symbol: &str) -> Vec<String> {
        match self.find_type_declaration_node_for_name(symbol).map(|node| node.kind()) {
            Some(NodeKind::StructDef) => self.get_struct_fields(symbol),
            Some(NodeKind::FlagDef) => self.get_enum_variants(symbol),
            _ => Vec::new(),
        }
    }

    /// `self.<function>(...)` call sites.
    pub fn find_nodes_referencing_internal_function(&self, function: &str) -> Vec<NodeRef<'_>> {
        let filter = NodeFilter::new()
            .eq("func.attr", function)
            .eq("func.value.id", "self");
        self.get_descendants(&[NodeKind::Call], &filter)
    }

    /// `self.<variable>` accesses.
    pub fn find_nodes_referencing_state_variable(&self, variable: &str) -> Vec<NodeRef<'_>> {
        let filter = NodeFilter::new().eq("value.id", "self").eq("attr", variable);
        self.get_descendants(&[NodeKind::Attribute], &filter)
    }

    /// Bare reads of a constant, excluding the name inside its own declaration.
    pub fn find_nodes_referencing_constant(&self, constant: &str) -> Vec<NodeRef<'_>> {
        self.get_descendants(&[NodeKind::Name], &NodeFilter::new().eq("id", constant))
            .into_iter()
            .filter(|node| !node.parent().is_some_and(|parent| parent.is(NodeKind::VariableDecl)))
            .collect()
    }

    /// Uses of a flag as a type or as the receiver of a variant access.
    ///
    /// Grouped by shape: annotated locals, variant accesses, storage
    /// declarations, parameters, then return types.
    pub fn find_nodes_referencing_enum(&self, name: &str) -> Vec<NodeRef<'_>> {
        let mut nodes = self.get_descendants(
            &[NodeKind::AnnAssign],
            &NodeFilter::new().eq("annotation.id", name),
        );
        nodes.extend(
            self.get_descendants(&[NodeKind::Attribute], &NodeFilter::new().eq("value.id", name)),
        );
        nodes.extend(self.type_annotation_references(name));
        nodes
    }

    /// `<Flag>.<variant>` accesses.
    pub fn find_nodes_referencing_enum_variant(
        &self,
        name: &str,
        variant: &str,
    ) -> Vec<NodeRef<'_>> {
        let filter = NodeFilter::new().eq("attr", variant).eq("value.id", name);
        self.get_descendants(&[NodeKind::Attribute], &filter)
    }

    /// Uses of a struct or event: annotated locals, constructor calls,
    /// storage declarations, parameters and return types.
    pub fn find_nodes_referencing_struct(&self, name: &str) -> Vec<NodeRef<'_>> {
        let mut nodes = self.get_descendants(
            &[NodeKind::AnnAssign],
            &NodeFilter::new().eq("annotation.id", name),
        );
        nodes.extend(
            self.get_descendants(&[NodeKind::Call], &NodeFilter::new().eq("func.id", name)),
        );
        nodes.extend(self.type_annotation_references(name));
        nodes
    }

    fn type_annotation_references(&self, name: &str) -> Vec<NodeRef<'_>> {
        let mut nodes: Vec<NodeRef<'_>> = self
            .get_descendants(&[NodeKind::VariableDecl], &NodeFilter::new())
            .into_iter()
            .filter(|node| annotation_names(*node, name))
            .collect();
        nodes.extend(
            self.get_descendants(&[NodeKind::Arg], &NodeFilter::new())
                .into_iter()
                .filter(|node| annotation_names(*node, name)),
        );
        nodes.extend(self.get_descendants(
            &[NodeKind::FunctionDef],
            &NodeFilter::new().eq("returns.id", name),
        ));
        nodes
    }

    /// A function definition outside any interface body.
    pub fn find_function_declaration_node_for_name(&self, function: &str) -> Option<NodeRef<'_>> {
        self.get_descendants(&[NodeKind::FunctionDef], &NodeFilter::new().eq("name", function))
            .into_iter()
            .find(|node| !node.parent().is_some_and(|parent| parent.is(NodeKind::InterfaceDef)))
    }

    pub fn find_state_variable_declaration_node_for_name(
        &self,
        variable: &str,
    ) -> Option<NodeRef<'_>> {
        descendants_in(
            self.raw_tree(),
            &[NodeKind::VariableDecl],
            &NodeFilter::new().eq("target.id", variable),
        )
        .into_iter()
        .next()
    }

    /// Struct, flag or event named `symbol`, or the flag variant named `symbol`.
    pub fn find_type_declaration_node_for_name(&self, symbol: &str) -> Option<NodeRef<'_>> {
        for node in self.get_descendants(TYPE_DECLARATION_KINDS, &NodeFilter::new()) {
            if node.name() == Some(symbol) {
                return Some(node);
            }
            if node.is(NodeKind::FlagDef) {
                let variant = node
                    .children()
                    .into_iter()
                    .find(|child| {
                        child.is(NodeKind::Expr) && child.get_str("value.id") == Some(symbol)
                    });
                if variant.is_some() {
                    return variant;
                }
            }
        }
        None
    }

    /// Top-level declaration whose lines contain `position`.
    ///
    /// Decorators count as part of their function. Past the last node, or
    /// between two nodes, the last node starting above the cursor is used.
    pub fn find_top_level_node_at_pos(&self, position: Position) -> Option<NodeRef<'_>> {
        let line = position.line + 1;
        let nodes = self.get_top_level_nodes();
        nodes
            .iter()
            .copied()
            .find(|node| declaration_span(*node).contains_line(line))
            .or_else(|| {
                nodes
                    .iter()
                    .copied()
                    .filter(|node| declaration_span(*node).lineno <= line)
                    .last()
            })
    }

    /// Bare-name uses of `symbol`, skipping dict keys and the target of the
    /// annotated assignment that declares it.
    pub fn find_nodes_referencing_symbol(&self, symbol: &str) -> Vec<NodeRef<'_>> {
        self.get_descendants(&[NodeKind::Name], &NodeFilter::new().eq("id", symbol))
            .into_iter()
            .filter(|node| match node.parent() {
                Some(parent) if parent.is(NodeKind::Dict) => {
                    !parent.list("keys").iter().any(|key| key.id() == node.id())
                }
                Some(parent) if parent.is(NodeKind::AnnAssign) => {
                    parent.child("target").map(|target| target.id()) != Some(node.id())
                }
                _ => true,
            })
            .collect()
    }

    /// First binding of `symbol`: a parameter, an annotated local or a
    /// storage declaration.
    pub fn find_node_declaring_symbol(&self, symbol: &str) -> Option<NodeRef<'_>> {
        self.get_descendants(
            &[NodeKind::Arg, NodeKind::AnnAssign, NodeKind::VariableDecl],
            &NodeFilter::new(),
        )
        .into_iter()
        .find(|node| match node.kind() {
            NodeKind::Arg => node.str_attr("arg") == Some(symbol),
            _ => target_id(*node) == Some(symbol),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn ast_for(source: &str) -> Ast {
        let mut ast = Ast::new();
        let diagnostics = ast.build(&Document::new("file:///tmp/test_contract.vy", source));
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        ast
    }

    fn lines(nodes: &[NodeRef<'_>]) -> Vec<u32> {
        nodes.iter().map(|node| node.span().lineno).collect()
    }

    #[test]
    fn test_get_constants() {
        let ast = ast_for(
            "
x: constant(uint256) = 123
y: uint256
z: constant(bool) = True

@deploy
def __init__():
    self.y = x
",
        );
        assert_eq!(ast.get_constants(), vec!["x", "z"]);
        assert_eq!(ast.get_state_variables(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_flags_and_variants() {
        let ast = ast_for("\nflag Foo:\n    Bar\n    Baz\n\nmy_color: Foo\n");
        assert_eq!(ast.get_enums(), vec!["Foo"]);
        assert_eq!(ast.get_enum_variants("Foo"), vec!["Bar", "Baz"]);
        assert_eq!(ast.get_enum_variants("Bar"), Vec::<String>::new());
        assert_eq!(ast.get_attributes_for_symbol("Foo"), vec!["Bar", "Baz"]);
    }

    #[test]
    fn test_struct_fields() {
        let ast = ast_for("\nstruct Foo:\n    bar: uint256\n    baz: address\n");
        assert_eq!(ast.get_structs(), vec!["Foo"]);
        assert_eq!(ast.get_struct_fields("Foo"), vec!["bar", "baz"]);
        assert_eq!(ast.get_struct_fields("Bar"), Vec::<String>::new());
    }

    #[test]
    fn test_user_defined_types_and_events() {
        let ast = ast_for(
            "
struct Foo:
    bar: uint256
    baz: address

event FooEvent:
    arg1: indexed(uint256)
    arg2: indexed(address)

flag FooFlag:
    Bar
    Baz
",
        );
        assert_eq!(ast.get_user_defined_types(), vec!["Foo", "FooFlag"]);
        assert_eq!(ast.get_events(), vec!["FooEvent"]);
    }

    #[test]
    fn test_internal_functions() {
        let ast = ast_for(
            "
@internal
def foo():
    pass

@external
def bar():
    self.foo()
",
        );
        assert_eq!(ast.get_internal_functions(), vec!["foo"]);
        assert_eq!(ast.get_internal_function_nodes().len(), 1);

        let references = ast.find_nodes_referencing_internal_function("foo");
        assert_eq!(lines(&references), vec![8]);
        assert_eq!(
            ast.find_function_declaration_node_for_name("foo")
                .map(|n| n.span().lineno),
            Some(3)
        );
        assert!(ast.find_function_declaration_node_for_name("baz").is_none());
    }

    #[test]
    fn test_state_variable_references() {
        let ast = ast_for(
            "
x: uint256
y: address
z: bool

@external
def foo():
    self.x = 123
    self.y = msg.sender
    self.z = True
",
        );
        assert_eq!(lines(&ast.find_nodes_referencing_state_variable("x")), vec![8]);
        assert_eq!(lines(&ast.find_nodes_referencing_state_variable("y")), vec![9]);
        assert_eq!(lines(&ast.find_nodes_referencing_state_variable("z")), vec![10]);
        assert_eq!(
            ast.find_state_variable_declaration_node_for_name("y").map(|n| n.span().lineno),
            Some(3)
        );
        assert!(ast.find_state_variable_declaration_node_for_name("baz").is_none());
    }

    #[test]
    fn test_constant_references_exclude_declaration() {
        let ast = ast_for(
            "
x: constant(uint256) = 10 ** 2
y: uint256
z: constant(bool) = True

@external
def foo():
    self.y = x
",
        );
        assert_eq!(lines(&ast.find_nodes_referencing_constant("x")), vec![8]);
        assert!(ast.find_nodes_referencing_constant("z").is_empty());
    }

    #[test]
    fn test_flag_references() {
        let ast = ast_for(
            "
flag Foo:
    Bar
    Baz

@external
def foo():
    x: Foo = Foo.Bar
    y: Foo = Foo.Baz

@external
def bar() -> Foo:
    return Foo.Bar
",
        );
        let references = ast.find_nodes_referencing_enum("Foo");
        assert_eq!(lines(&references), vec![8, 9, 8, 9, 13, 12]);

        assert_eq!(lines(&ast.find_nodes_referencing_enum_variant("Foo", "Bar")), vec![8, 13]);
        assert_eq!(lines(&ast.find_nodes_referencing_enum_variant("Foo", "Baz")), vec![9]);
    }

    #[test]
    fn test_struct_references() {
        let ast = ast_for(
            "
struct Foo:
    bar: uint256
    baz: address

stored: public(Foo)

@external
def foo(f: Foo):
    x: Foo = Foo(bar=123, baz=msg.sender)

@external
def bar() -> Foo:
    return Foo(bar=123, baz=msg.sender)
",
        );
        let references = ast.find_nodes_referencing_struct("Foo");
        // annotated local, two constructor calls, storage, parameter, return type
        assert_eq!(lines(&references), vec![10, 10, 14, 6, 9, 13]);
    }

    #[test]
    fn test_symbol_references_in_function() {
        let ast = ast_for(
            "
@internal
def foo() -> uint256:
    x: uint256 = 123
    y: uint256 = x
    return y

@external
def bar():
    self.foo()
",
        );
        let function = ast.get_internal_function_nodes()[0];
        let scoped = Ast::from_node(function);
        assert_eq!(lines(&scoped.find_nodes_referencing_symbol("x")), vec![5]);
        assert_eq!(lines(&scoped.find_nodes_referencing_symbol("y")), vec![6]);
        assert_eq!(
            scoped.find_node_declaring_symbol("y").map(|n| n.span().lineno),
            Some(5)
        );
    }

    #[test]
    fn test_dict_keys_are_not_references() {
        let ast = ast_for(
            "
struct Point:
    x: uint256
    y: uint256

@internal
def foo(x: uint256) -> Point:
    p: Point = Point({x: x, y: 1})
    return p
",
        );
        let function = ast.get_internal_function_nodes()[0];
        let scoped = Ast::from_node(function);
        let references = scoped.find_nodes_referencing_symbol("x");
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].span().col_offset, 25);
        assert!(scoped.find_nodes_referencing_symbol("y").is_empty());
        assert_eq!(
            scoped.find_node_declaring_symbol("x").map(|n| n.kind()),
            Some(NodeKind::Arg)
        );
    }

    #[test]
    fn test_type_declaration_lookup() {
        let ast = ast_for(
            "
struct Foo:
    bar: uint256
    baz: address

flag Bar:
    Baz

@external
def foo():
    x: Foo = Foo(bar=123, baz=msg.sender)
",
        );
        let line_of = |name: &str| {
            ast.find_type_declaration_node_for_name(name)
                .map(|n| n.span().lineno)
        };
        assert_eq!(line_of("Foo"), Some(2));
        assert_eq!(line_of("Bar"), Some(6));
        assert_eq!(line_of("Baz"), Some(7));
        assert_eq!(line_of("baz"), None);
        assert_eq!(ast.get_attributes_for_symbol("Baz"), Vec::<String>::new());
    }

    #[test]
    fn test_top_level_node_at_position() {
        let ast = ast_for(
            "
x: uint256
y: address
z: bool

flag Foo:
    Bar
    Baz

@external
def foo():
    self.x = 123
    self.y = msg.sender
    self.z = True
",
        );
        let line_at = |line: u32| {
            ast.find_top_level_node_at_pos(Position { line, character: 0 })
                .map(|node| node.span().lineno)
        };
        // inside the function body
        assert_eq!(line_at(12), Some(11));
        // on the decorator
        assert_eq!(line_at(9), Some(11));
        // blank line after the flag
        assert_eq!(line_at(8), Some(6));
        // past the end of the file
        assert_eq!(line_at(40), Some(11));
        assert_eq!(line_at(1), Some(2));
    }

    #[test]
    fn test_node_declaring_symbol() {
        let ast = ast_for(
            "
x: uint256
y: address

@external
def foo():
    self.x = 123
    self.y = msg.sender
",
        );
        assert_eq!(ast.find_node_declaring_symbol("x").map(|n| n.span().lineno), Some(2));
        assert_eq!(ast.find_node_declaring_symbol("y").map(|n| n.span().lineno), Some(3));
    }

    #[test]
    fn test_queries_without_tree() {
        let ast = Ast::new();
        assert!(ast.get_constants().is_empty());
        assert!(ast.get_enums().is_empty());
        assert!(ast.get_enum_variants("Foo").is_empty());
        assert!(ast.get_events().is_empty());
        assert!(ast.get_user_defined_types().is_empty());
        assert!(ast.get_state_variables().is_empty());
        assert!(ast.get_internal_function_nodes().is_empty());
        assert!(ast.find_nodes_referencing_internal_function("foo").is_empty());
        assert!(ast.find_nodes_referencing_struct("Foo").is_empty());
        assert!(ast.find_nodes_referencing_symbol("x").is_empty());
        assert!(ast.find_function_declaration_node_for_name("foo").is_none());
        assert!(ast.find_type_declaration_node_for_name("Foo").is_none());
        assert!(ast.find_top_level_node_at_pos(Position { line: 0, character: 0 }).is_none());
        assert!(ast.find_node_declaring_symbol("x").is_none());
    }
}
