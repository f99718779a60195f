//! Go-to-declaration, go-to-implementation and find-references.
//!
//! The navigator reads the line under the cursor, classifies the symbol by
//! the shape of the surrounding text, and asks the facade for the matching
//! nodes. Results are editor ranges in the current document.

use lsp_types::{Position, Range};
use vyper_front::{NodeKind, NodeRef};

use crate::ast::Ast;
use crate::cursor::{expression_at, is_self_member, is_word_char, word_at};
use crate::diagnostics::range_from_span;
use crate::document::Document;

pub fn range_from_node(node: NodeRef<'_>) -> Range {
    range_from_span(node.span())
}

fn identifier_prefix(text: &str) -> Option<(&str, &str)> {
    let first = text.chars().next()?;
    if !(first.is_alphabetic() || first == '_') {
        return None;
    }
    let end = text.find(|c: char| !is_word_char(c)).unwrap_or(text.len());
    Some(text.split_at(end))
}

/// Split a leading `Name.Member` off an expression such as `Color.RED.x`.
fn enum_variant_parts(expression: &str) -> Option<(&str, &str)> {
    let (name, rest) = identifier_prefix(expression)?;
    let (variant, _) = identifier_prefix(rest.strip_prefix('.')?)?;
    Some((name, variant))
}

/// Symbol under the cursor and the text it sits in.
struct CursorContext {
    line: String,
    word: String,
    expression: String,
    self_member: bool,
}

impl CursorContext {
    fn at(document: &Document, position: Position) -> Option<Self> {
        let (line, index) = document.cursor(position)?;
        let word = word_at(&line, index);
        let expression = expression_at(&line, index);
        let self_member = is_self_member(&line, index);
        Some(Self {
            line,
            word,
            expression,
            self_member,
        })
    }

    fn is_top_level(&self) -> bool {
        self.line.chars().next().is_some_and(|c| !c.is_whitespace())
    }

    fn is_indented(&self) -> bool {
        self.line.chars().next().is_some_and(char::is_whitespace)
    }

    fn is_self_access(&self) -> bool {
        self.self_member
    }
}

pub struct Navigator<'a> {
    ast: &'a Ast,
}

impl<'a> Navigator<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self { ast }
    }

    pub fn find_references(&self, document: &Document, position: Position) -> Vec<Range> {
        self.references(document, position)
            .into_iter()
            .map(|range| document.utf16_range(range))
            .collect()
    }

    pub fn find_declaration(&self, document: &Document, position: Position) -> Option<Range> {
        self.declaration(document, position)
            .map(|range| document.utf16_range(range))
    }

    /// Body of the function called through `self`, or of the interface
    /// method declared on the cursor line.
    pub fn find_implementation(&self, document: &Document, position: Position) -> Option<Range> {
        self.implementation(document, position)
            .map(|range| document.utf16_range(range))
    }

    fn contains(names: &[String], word: &str) -> bool {
        names.iter().any(|name| name == word)
    }

    fn is_state_variable_declaration(&self, context: &CursorContext) -> bool {
        context.is_top_level() && Self::contains(&self.ast.get_state_variables(), &context.word)
    }

    fn is_constant_declaration(&self, context: &CursorContext) -> bool {
        context.line.contains("constant(") && self.is_state_variable_declaration(context)
    }

    fn is_internal_function(&self, context: &CursorContext) -> bool {
        let on_definition = context.line.starts_with("def")
            && Self::contains(&self.ast.get_internal_functions(), &context.word);
        let on_call = context.is_self_access() && self.ast.functions().contains_key(&context.word);
        on_definition || on_call
    }

    fn is_state_variable_access(&self, context: &CursorContext) -> bool {
        context.is_self_access() && Self::contains(&self.ast.get_state_variables(), &context.word)
    }

    fn references(&self, document: &Document, position: Position) -> Vec<Range> {
        if self.ast.best_tree().is_none() {
            return Vec::new();
        }
        let Some(context) = CursorContext::at(document, position) else {
            return Vec::new();
        };
        if context.word.is_empty() {
            return Vec::new();
        }
        let word = context.word.as_str();
        tracing::debug!(word, expression = %context.expression, "Finding references");

        let finalize = |nodes: Vec<NodeRef<'_>>| nodes.into_iter().map(range_from_node).collect();

        if Self::contains(&self.ast.get_enums(), word) {
            return finalize(self.ast.find_nodes_referencing_enum(word));
        }
        if Self::contains(&self.ast.get_structs(), word)
            || Self::contains(&self.ast.get_events(), word)
        {
            return finalize(self.ast.find_nodes_referencing_struct(word));
        }
        if self.is_internal_function(&context) {
            return finalize(self.ast.find_nodes_referencing_internal_function(word));
        }
        if self.is_constant_declaration(&context) {
            return finalize(self.ast.find_nodes_referencing_constant(word));
        }
        if self.is_state_variable_declaration(&context) || self.is_state_variable_access(&context) {
            return finalize(self.ast.find_nodes_referencing_state_variable(word));
        }

        let Some(top_level) = self.ast.find_top_level_node_at_pos(position) else {
            return Vec::new();
        };
        match top_level.kind() {
            NodeKind::FlagDef => match top_level.name() {
                Some(name) => finalize(self.ast.find_nodes_referencing_enum_variant(name, word)),
                None => Vec::new(),
            },
            NodeKind::FunctionDef => {
                let scoped = Ast::from_node(top_level);
                scoped
                    .find_nodes_referencing_symbol(word)
                    .into_iter()
                    .map(range_from_node)
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn declaration(&self, document: &Document, position: Position) -> Option<Range> {
        self.ast.best_tree()?;
        let context = CursorContext::at(document, position)?;
        if context.word.is_empty() {
            return None;
        }
        let word = context.word.as_str();
        tracing::debug!(word, expression = %context.expression, "Finding declaration");

        if context.is_self_access() {
            let node = if self.ast.functions().contains_key(word) {
                self.ast.find_function_declaration_node_for_name(word)
            } else {
                self.ast.find_state_variable_declaration_node_for_name(word)
            };
            return node.map(range_from_node);
        }
        if Self::contains(&self.ast.get_user_defined_types(), word)
            || Self::contains(&self.ast.get_events(), word)
        {
            return self.ast.find_type_declaration_node_for_name(word).map(range_from_node);
        }
        if Self::contains(&self.ast.get_constants(), word) {
            return self
                .ast
                .find_state_variable_declaration_node_for_name(word)
                .map(range_from_node);
        }

        let top_level = self.ast.find_top_level_node_at_pos(position)?;
        if !top_level.is(NodeKind::FunctionDef) {
            return None;
        }
        let scoped = Ast::from_node(top_level);
        if let Some(node) = scoped.find_node_declaring_symbol(word) {
            return Some(range_from_node(node));
        }

        // `Flag.VARIANT` resolves to the flag itself
        let (name, variant) = enum_variant_parts(&context.expression)?;
        if Self::contains(&self.ast.get_enums(), name)
            && Self::contains(&self.ast.get_enum_variants(name), variant)
        {
            return self.ast.find_type_declaration_node_for_name(name).map(range_from_node);
        }
        None
    }

    fn implementation(&self, document: &Document, position: Position) -> Option<Range> {
        let context = CursorContext::at(document, position)?;
        let word = context.word.as_str();

        if context.is_self_access() {
            if !self.ast.functions().contains_key(word) {
                return None;
            }
            return self.ast.find_function_declaration_node_for_name(word).map(range_from_node);
        }

        if context.is_indented() && context.line.trim_start().starts_with("def") {
            return self.ast.find_function_declaration_node_for_name(word).map(range_from_node);
        }
        None
    }
}
