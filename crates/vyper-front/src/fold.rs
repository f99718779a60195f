//! Constant folding.
//!
//! Reads of module constants are replaced by their literal values and the
//! constant declarations are dropped from the module body.

use indexmap::IndexMap;

use crate::ast::{Attr, NodeId, NodeKind, NodeRef, SyntaxTree};
use crate::errors::{CompileError, CompileErrorKind, CompileResult};
use crate::types::ModuleType;

#[derive(Clone, Debug, PartialEq)]
enum Literal {
    Int(i128),
    Bool(bool),
    Str(String),
    Hex(String),
    Decimal(String),
}

impl Literal {
    fn into_node(self) -> (NodeKind, String) {
        match self {
            Literal::Int(value) => (NodeKind::Int, value.to_string()),
            Literal::Bool(true) => (NodeKind::NameConstant, "True".to_string()),
            Literal::Bool(false) => (NodeKind::NameConstant, "False".to_string()),
            Literal::Str(value) => (NodeKind::Str, value),
            Literal::Hex(value) => (NodeKind::Hex, value),
            Literal::Decimal(value) => (NodeKind::Decimal, value),
        }
    }
}

pub(crate) fn fold(annotated: &SyntaxTree, module: &ModuleType) -> CompileResult<SyntaxTree> {
    let root = annotated.root();

    let mut constants: IndexMap<&str, Literal> = IndexMap::new();
    for (name, var) in module.variables.iter().filter(|(_, var)| var.is_constant) {
        let Some(value) = annotated.node(var.decl).child("value") else {
            continue;
        };
        if let Some(literal) = evaluate(value, &constants)? {
            constants.insert(name.as_str(), literal);
        }
    }

    let mut arena = annotated.arena().clone();
    for node in root.descendants() {
        match node.kind() {
            NodeKind::BinOp => {
                // surfaces division by zero anywhere in the module
                evaluate(node, &constants)?;
            }
            NodeKind::Name => {
                let Some(literal) = node.str_attr("id").and_then(|id| constants.get(id)) else {
                    continue;
                };
                if is_constant_declaration_part(node) || is_call_target(node) {
                    continue;
                }
                let (kind, value) = literal.clone().into_node();
                arena.replace_with_literal(node.id(), kind, value);
            }
            _ => {}
        }
    }

    let body: Vec<NodeId> = root
        .list("body")
        .iter()
        .filter(|node| !is_constant_declaration(**node))
        .map(|node| node.id())
        .collect();
    tracing::trace!(folded = constants.len(), "folded constants");
    arena.get_mut(root.id()).set_attr("body", Attr::List(body));
    Ok(annotated.with_arena(arena))
}

fn is_constant_declaration(node: NodeRef<'_>) -> bool {
    node.is(NodeKind::VariableDecl) && node.bool_attr("is_constant") == Some(true)
}

fn is_constant_declaration_part(node: NodeRef<'_>) -> bool {
    node.ancestor(NodeKind::VariableDecl)
        .is_some_and(is_constant_declaration)
}

fn is_call_target(node: NodeRef<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        parent.is(NodeKind::Call) && parent.child("func").is_some_and(|func| func.id() == node.id())
    })
}

fn evaluate(
    node: NodeRef<'_>,
    constants: &IndexMap<&str, Literal>,
) -> CompileResult<Option<Literal>> {
    let literal = match node.kind() {
        NodeKind::Int => node
            .str_attr("value")
            .and_then(|value| value.replace('_', "").parse().ok())
            .map(Literal::Int),
        NodeKind::Hex => node.str_attr("value").map(|v| Literal::Hex(v.to_string())),
        NodeKind::Decimal => node.str_attr("value").map(|v| Literal::Decimal(v.to_string())),
        NodeKind::Str => node.str_attr("value").map(|v| Literal::Str(v.to_string())),
        NodeKind::NameConstant => node.str_attr("value").map(|v| Literal::Bool(v == "True")),
        NodeKind::Name => node.str_attr("id").and_then(|id| constants.get(id)).cloned(),
        NodeKind::UnaryOp => {
            let Some(operand) = node.child("operand") else {
                return Ok(None);
            };
            match (node.str_attr("op"), evaluate(operand, constants)?) {
                (Some("-"), Some(Literal::Int(value))) => value.checked_neg().map(Literal::Int),
                (Some("not"), Some(Literal::Bool(value))) => Some(Literal::Bool(!value)),
                _ => None,
            }
        }
        NodeKind::BinOp => {
            let (Some(left), Some(right)) = (node.child("left"), node.child("right")) else {
                return Ok(None);
            };
            let left = evaluate(left, constants)?;
            let right = evaluate(right, constants)?;
            match (left, right) {
                (Some(Literal::Int(l)), Some(Literal::Int(r))) => {
                    binary(node, node.str_attr("op").unwrap_or_default(), l, r)?.map(Literal::Int)
                }
                _ => None,
            }
        }
        _ => None,
    };
    Ok(literal)
}

fn binary(node: NodeRef<'_>, op: &str, l: i128, r: i128) -> CompileResult<Option<i128>> {
    if matches!(op, "/" | "//" | "%") && r == 0 {
        return Err(CompileError::at(
            CompileErrorKind::FoldingException,
            "Division by zero",
            node.span(),
        ));
    }
    let shift = || u32::try_from(r).ok().filter(|bits| *bits < 128);
    Ok(match op {
        "+" => l.checked_add(r),
        "-" => l.checked_sub(r),
        "*" => l.checked_mul(r),
        "/" | "//" => l.checked_div(r),
        "%" => l.checked_rem(r),
        "**" => u32::try_from(r).ok().and_then(|exp| l.checked_pow(exp)),
        "<<" => shift().and_then(|bits| l.checked_shl(bits)),
        ">>" => shift().and_then(|bits| l.checked_shr(bits)),
        "&" => Some(l & r),
        "|" => Some(l | r),
        "^" => Some(l ^ r),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::semantics::annotate;

    fn fold_source(source: &str) -> CompileResult<SyntaxTree> {
        let parsed = parser::parse(source).unwrap();
        let module = annotate(&parsed.tree, None, &[], true).unwrap();
        let annotated = module.tree.clone().unwrap();
        fold(&annotated, &module)
    }

    #[test]
    fn test_constant_reads_are_inlined() {
        let folded = fold_source(
            "X: constant(uint256) = 2 * 3\ny: uint256\n\n@external\ndef foo():\n    self.y = X\n",
        )
        .unwrap();
        let body = folded.root().list("body");
        assert_eq!(body.len(), 2);
        let assign = body[1].list("body")[0];
        let value = assign.child("value").unwrap();
        assert_eq!(value.kind(), NodeKind::Int);
        assert_eq!(value.str_attr("value"), Some("6"));
    }

    #[test]
    fn test_division_by_zero() {
        let error = fold_source("X: constant(uint256) = 1 / 0\n").unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::FoldingException);
        assert_eq!(error.span.map(|s| s.lineno), Some(1));
    }
}
