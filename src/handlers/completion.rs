//! Trigger-character completion.

use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionItemLabelDetails, CompletionList, Documentation,
    Position,
};
use vyper_front::{FunctionType, NodeKind, NodeRef, base_types, unwrap_type};

use crate::ast::Ast;
use crate::cursor::{in_parentheses, is_word_char};
use crate::document::Document;

pub const DECORATORS: [&str; 7] = [
    "payable",
    "nonpayable",
    "view",
    "pure",
    "external",
    "internal",
    "deploy",
];

/// Keywords whose line ends in a colon that is not a type annotation.
const DECLARATION_KEYWORDS: &[&str] = &["flag", "struct", "event", "enum", "interface"];

/// Whether `line` opens with `keyword` as a whole word.
fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Which functions of an imported module are reachable from the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberScope {
    /// Inside a function body: internal and deploy functions.
    Function,
    /// On an `exports:` declaration: external functions.
    Exports,
    /// Anywhere else: variables only.
    Module,
}

impl MemberScope {
    fn admits(self, function: &FunctionType) -> bool {
        match self {
            MemberScope::Function => function.is_internal() || function.is_deploy(),
            MemberScope::Exports => function.is_external(),
            MemberScope::Module => false,
        }
    }
}

fn item(label: impl Into<String>, kind: CompletionItemKind) -> CompletionItem {
    CompletionItem {
        label: label.into(),
        kind: Some(kind),
        ..Default::default()
    }
}

fn list(items: Vec<CompletionItem>) -> CompletionList {
    CompletionList {
        is_incomplete: false,
        items,
    }
}

/// Dotted expression at the end of `text`, e.g. `self.owner` in
/// `x = self.owner`.
fn trailing_expression(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .find(|(_, c)| !(is_word_char(*c) || *c == '.'))
        .map(|(offset, c)| offset + c.len_utf8())
        .unwrap_or(0);
    &text[start..]
}

pub struct CompletionHandler<'a> {
    ast: &'a Ast,
}

impl<'a> CompletionHandler<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self { ast }
    }

    /// Completions for `trigger` typed at `position`. No trigger, no items.
    pub fn complete(
        &self,
        document: &Document,
        position: Position,
        trigger: Option<&str>,
    ) -> CompletionList {
        let Some((line, index)) = document.cursor(position) else {
            return list(Vec::new());
        };
        let Some(trigger) = trigger else {
            return list(Vec::new());
        };
        tracing::debug!(trigger, line = position.line, "Completion trigger");

        let items = match trigger {
            "." => self.dot_completions(&line, index, position),
            "@" => DECORATORS
                .iter()
                .map(|decorator| item(*decorator, CompletionItemKind::KEYWORD))
                .collect(),
            ":" if !self.is_declaration_colon(&line, index) => {
                let spaced = line.chars().nth(index).is_some_and(|c| c == ' ');
                self.type_completions(!spaced)
            }
            " " => {
                let before: String = line.chars().take(index).collect();
                if before.trim_end().ends_with(':') && !self.is_declaration_colon(&line, index) {
                    self.type_completions(false)
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };
        list(items)
    }

    fn is_declaration_colon(&self, line: &str, index: usize) -> bool {
        let trimmed = line.trim_start();
        DECLARATION_KEYWORDS
            .iter()
            .any(|keyword| starts_with_keyword(trimmed, keyword))
            || (starts_with_keyword(trimmed, "def") && !in_parentheses(line, index))
    }

    /// User-defined types followed by every primitive type.
    fn type_completions(&self, leading_space: bool) -> Vec<CompletionItem> {
        let user_types = self.ast.get_user_defined_types();
        let base = base_types();
        user_types
            .iter()
            .map(|name| (name, CompletionItemKind::STRUCT))
            .chain(base.iter().map(|name| (name, CompletionItemKind::TYPE_PARAMETER)))
            .map(|(name, kind)| CompletionItem {
                insert_text: leading_space.then(|| format!(" {name}")),
                ..item(name.clone(), kind)
            })
            .collect()
    }

    fn dot_completions(&self, line: &str, index: usize, position: Position) -> Vec<CompletionItem> {
        // the cursor normally sits right after the dot; otherwise use the
        // end of the line
        let before: String = line.chars().take(index).collect();
        let text = match before.strip_suffix('.') {
            Some(text) => text.to_string(),
            None => line.trim_end().trim_end_matches('.').to_string(),
        };
        let receiver = trailing_expression(&text);
        if receiver.is_empty() {
            return Vec::new();
        }

        let top_level = self.ast.find_top_level_node_at_pos(position);
        let scope = match top_level.map(|node| node.kind()) {
            _ if line.trim_start().starts_with("exports:") => MemberScope::Exports,
            Some(NodeKind::FunctionDef) => MemberScope::Function,
            Some(NodeKind::ExportsDecl) => MemberScope::Exports,
            _ => MemberScope::Module,
        };

        let mut items = self.receiver_completions(receiver, scope);
        if let Some(function) = top_level.filter(|node| node.is(NodeKind::FunctionDef)) {
            items.extend(
                self.local_struct_type(function, receiver)
                    .map(|name| self.struct_field_items(&name))
                    .unwrap_or_default(),
            );
        }
        if items.is_empty() {
            items = self
                .ast
                .get_attributes_for_symbol(receiver)
                .into_iter()
                .map(|name| item(name, CompletionItemKind::FIELD))
                .collect();
        }
        tracing::debug!(receiver, count = items.len(), "Dot completions");
        items
    }

    fn receiver_completions(&self, receiver: &str, scope: MemberScope) -> Vec<CompletionItem> {
        if receiver == "self" {
            return self.self_completions();
        }
        if let Some(variable) = receiver.strip_prefix("self.") {
            return self
                .state_variable_struct_type(variable)
                .map(|name| self.struct_field_items(&name))
                .unwrap_or_default();
        }
        if self.ast.imports().contains_key(receiver) {
            return self.module_completions(receiver, scope);
        }
        if self.ast.flags().contains_key(receiver) {
            return self
                .ast
                .get_enum_variants(receiver)
                .into_iter()
                .map(|variant| item(variant, CompletionItemKind::ENUM_MEMBER))
                .collect();
        }
        Vec::new()
    }

    /// Internal functions and storage variables reachable through `self`.
    fn self_completions(&self) -> Vec<CompletionItem> {
        let mut items: Vec<CompletionItem> = self
            .ast
            .get_internal_functions()
            .into_iter()
            .map(|name| item(name, CompletionItemKind::FUNCTION))
            .collect();
        if let Some(raw) = self.ast.raw_tree() {
            items.extend(
                raw.root()
                    .list("body")
                    .into_iter()
                    .filter(|node| node.is(NodeKind::VariableDecl))
                    .filter(|node| {
                        node.bool_attr("is_constant") != Some(true)
                            && node.bool_attr("is_immutable") != Some(true)
                    })
                    .filter_map(|node| node.get_str("target.id"))
                    .map(|name| item(name, CompletionItemKind::VARIABLE)),
            );
        }
        items
    }

    /// Members of the module imported as `alias` that `scope` can reach.
    pub fn module_completions(&self, alias: &str, scope: MemberScope) -> Vec<CompletionItem> {
        let Some(module) = self.ast.imports().get(alias) else {
            return Vec::new();
        };

        let mut items: Vec<CompletionItem> = module
            .functions
            .iter()
            .filter(|(_, function)| scope.admits(function))
            .map(|(name, function)| {
                let signature = function.signature();
                let doc_string = function.doc_string.as_deref().unwrap_or_default();
                CompletionItem {
                    label_details: Some(CompletionItemLabelDetails {
                        detail: Some(signature.clone()),
                        description: None,
                    }),
                    // most editors ignore label details, so repeat the signature
                    documentation: Some(Documentation::String(format!(
                        "{signature}\n{doc_string}"
                    ))),
                    ..item(name.clone(), CompletionItemKind::FUNCTION)
                }
            })
            .collect();
        items.extend(module.variables.keys().map(|name| CompletionItem {
            documentation: Some(Documentation::String(format!("Variable: {name}"))),
            ..item(name.clone(), CompletionItemKind::VARIABLE)
        }));
        items
    }

    fn struct_field_items(&self, name: &str) -> Vec<CompletionItem> {
        self.ast
            .get_struct_fields(name)
            .into_iter()
            .map(|field| item(field, CompletionItemKind::FIELD))
            .collect()
    }

    fn struct_type_of(&self, declaration: NodeRef<'_>) -> Option<String> {
        let annotation = unwrap_type(declaration.child("annotation")?);
        let name = annotation.str_attr("id")?;
        self.ast
            .get_structs()
            .into_iter()
            .find(|candidate| candidate == name)
    }

    /// Struct type of a parameter or annotated local named `name`.
    fn local_struct_type(&self, function: NodeRef<'_>, name: &str) -> Option<String> {
        function
            .descendants()
            .into_iter()
            .find(|node| match node.kind() {
                NodeKind::Arg => node.str_attr("arg") == Some(name),
                NodeKind::AnnAssign => node.get_str("target.id") == Some(name),
                _ => false,
            })
            .and_then(|declaration| self.struct_type_of(declaration))
    }

    fn state_variable_struct_type(&self, name: &str) -> Option<String> {
        let declaration = self.ast.find_state_variable_declaration_node_for_name(name)?;
        self.struct_type_of(declaration)
    }
}
