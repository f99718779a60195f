use lsp_types::Position;
use vyper_front::{render_type, unwrap_type};

use crate::ast::Ast;
use crate::cursor::{expression_at, is_self_member, word_at};
use crate::document::Document;
use crate::handlers::function_header;

pub struct HoverHandler<'a> {
    ast: &'a Ast,
}

impl<'a> HoverHandler<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self { ast }
    }

    /// Markdown describing the symbol under the cursor.
    pub fn hover_info(&self, document: &Document, position: Position) -> Option<String> {
        let (line, index) = document.cursor(position)?;
        let word = word_at(&line, index);
        let expression = expression_at(&line, index);
        if word.is_empty() {
            return None;
        }
        let is_self_access = is_self_member(&line, index);

        if !is_self_access && let Some(info) = self.module_member(&expression) {
            return Some(info);
        }

        if is_self_access
            && self
                .ast
                .functions()
                .get(&word)
                .is_some_and(|function| function.is_internal())
        {
            let node = self.ast.find_function_declaration_node_for_name(&word)?;
            return function_header(node).map(|header| format!("(Internal Function) {header}"));
        }

        if is_self_access && self.ast.variables().contains_key(&word) {
            let typ = self.declared_type(&word)?;
            return Some(format!("(State Variable) **{word}** : **{typ}**"));
        }

        let contains = |names: Vec<String>| names.iter().any(|name| *name == word);
        let label = if contains(self.ast.get_structs()) {
            Some("Struct")
        } else if contains(self.ast.get_enums()) {
            Some("Flag")
        } else if contains(self.ast.get_events()) {
            Some("Event")
        } else {
            None
        };
        if let Some(label) = label {
            self.ast.find_type_declaration_node_for_name(&word)?;
            return Some(format!("({label}) **{word}**"));
        }

        if contains(self.ast.get_constants()) {
            let typ = self.declared_type(&word)?;
            return Some(format!("(Constant) **{word}** : **{typ}**"));
        }
        None
    }

    /// `alias.member` where `alias` names an imported module.
    fn module_member(&self, expression: &str) -> Option<String> {
        let (module_name, member) = expression.split_once('.')?;
        if member.contains('.') {
            return None;
        }
        let module = self.ast.imports().get(module_name)?;
        if module.functions.contains_key(member) {
            Some(format!("(Module Function) **{module_name}.{member}**"))
        } else if module.variables.contains_key(member) {
            Some(format!("(Module Variable) **{module_name}.{member}**"))
        } else {
            None
        }
    }

    /// Declared type of a storage variable, without `public(...)` and friends.
    fn declared_type(&self, name: &str) -> Option<String> {
        let node = self.ast.find_state_variable_declaration_node_for_name(name)?;
        let annotation = node.child("annotation")?;
        Some(render_type(unwrap_type(annotation)))
    }
}
