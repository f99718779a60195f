//! Signature help for calls to local functions, imported module functions
//! and struct constructors.

use lsp_types::{
    ParameterInformation, ParameterLabel, Position, SignatureHelp, SignatureInformation,
};
use vyper_front::{Member, NodeRef, render_type};

use crate::ast::Ast;
use crate::cursor::{call_context, is_word_char, parse_call_expression};
use crate::document::Document;

/// `name(a: T, b: U) -> R` with the character range of every parameter.
fn signature_label(
    name: &str,
    params: &[(String, String)],
    returns: Option<&str>,
) -> (String, Vec<[u32; 2]>) {
    let mut label = format!("{name}(");
    let mut offsets = Vec::with_capacity(params.len());
    for (i, (param, typ)) in params.iter().enumerate() {
        if i > 0 {
            label.push_str(", ");
        }
        let start = label.chars().count() as u32;
        label.push_str(&format!("{param}: {typ}"));
        offsets.push([start, label.chars().count() as u32]);
    }
    label.push(')');
    if let Some(returns) = returns {
        label.push_str(" -> ");
        label.push_str(returns);
    }
    (label, offsets)
}

fn members(members: &[Member]) -> Vec<(String, String)> {
    members
        .iter()
        .map(|member| (member.name.clone(), member.typ.clone()))
        .collect()
}

fn function_params(node: NodeRef<'_>) -> Vec<(String, String)> {
    node.child("args")
        .map(|args| args.list("args"))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|arg| {
            let name = arg.str_attr("arg")?;
            let typ = arg.child("annotation").map(render_type).unwrap_or_default();
            Some((name.to_string(), typ))
        })
        .collect()
}

fn help(
    name: &str,
    params: &[(String, String)],
    returns: Option<&str>,
    documentation: Option<String>,
    active_parameter: u32,
) -> SignatureHelp {
    let (label, offsets) = signature_label(name, params, returns);
    let parameters = offsets
        .into_iter()
        .map(|offsets| ParameterInformation {
            label: ParameterLabel::LabelOffsets(offsets),
            documentation: None,
        })
        .collect();
    SignatureHelp {
        signatures: vec![SignatureInformation {
            label,
            documentation: documentation.map(lsp_types::Documentation::String),
            parameters: Some(parameters),
            active_parameter: Some(active_parameter),
        }],
        active_signature: Some(0),
        active_parameter: Some(active_parameter),
    }
}

pub struct SignatureHandler<'a> {
    ast: &'a Ast,
}

impl<'a> SignatureHandler<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self { ast }
    }

    pub fn signature_help(&self, document: &Document, position: Position) -> Option<SignatureHelp> {
        let (line, index) = document.cursor(position)?;
        let context = call_context(&line, index)?;
        tracing::debug!(
            callee = %context.callee,
            active_parameter = context.active_parameter,
            "Found call expression"
        );

        if !context.callee.is_empty() && context.callee.chars().all(is_word_char) {
            return self.struct_constructor(&context.callee, context.active_parameter);
        }

        let (receiver, function) = parse_call_expression(&context.callee)?;
        if receiver == "self" {
            self.local_function(&function, context.active_parameter)
        } else {
            self.module_function(&receiver, &function, context.active_parameter)
        }
    }

    fn local_function(&self, name: &str, active_parameter: u32) -> Option<SignatureHelp> {
        let node = self.ast.find_function_declaration_node_for_name(name)?;
        let returns = node.child("returns").map(render_type);
        let documentation = node.str_attr("doc_string").map(|doc| doc.trim().to_string());
        Some(help(
            name,
            &function_params(node),
            returns.as_deref(),
            documentation,
            active_parameter,
        ))
    }

    fn module_function(
        &self,
        alias: &str,
        name: &str,
        active_parameter: u32,
    ) -> Option<SignatureHelp> {
        let module = self.ast.imports().get(alias)?;
        let function = module.functions.get(name)?;
        Some(help(
            &function.name,
            &members(&function.params),
            function.returns.as_deref(),
            function.doc_string.as_ref().map(|doc| doc.trim().to_string()),
            active_parameter,
        ))
    }

    fn struct_constructor(&self, name: &str, active_parameter: u32) -> Option<SignatureHelp> {
        let fields = &self.ast.structs().get(name)?.fields;
        Some(help(name, &members(fields), None, None, active_parameter))
    }
}
