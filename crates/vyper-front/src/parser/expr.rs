use super::{Parser, deprecation};
use crate::ast::{Attr, NodeId, NodeKind, Span};
use crate::errors::CompileResult;
use crate::lexer::TokenKind;

/// Binary operator levels, loosest first.
const BINARY_LEVELS: &[&[&str]] = &[
    &["|"],
    &["^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "//", "%"],
];

const COMPARISONS: &[&str] = &["==", "!=", "<", "<=", ">", ">="];

const DEPRECATED_BUILTINS: &[(&str, &str)] =
    &[("_abi_encode", "abi_encode"), ("_abi_decode", "abi_decode")];

impl Parser {
    /// One expression, or a bare tuple when followed by commas.
    pub(super) fn expression_list(&mut self) -> CompileResult<NodeId> {
        let first = self.expression()?;
        if !self.peek().is_op(",") {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat_op(",").is_some() {
            if self.at_line_end() || self.peek().is_op("=") {
                break;
            }
            elements.push(self.expression()?);
        }
        let span = self.span_of(first).cover(self.span_of(elements[elements.len() - 1]));
        Ok(self.alloc(NodeKind::Tuple, span, vec![("elements", Attr::List(elements))]))
    }

    pub(super) fn expression(&mut self) -> CompileResult<NodeId> {
        self.bool_op("or")
    }

    fn bool_op(&mut self, op: &'static str) -> CompileResult<NodeId> {
        let operand = |parser: &mut Parser| match op {
            "or" => parser.bool_op("and"),
            _ => parser.not_expr(),
        };
        let first = operand(self)?;
        if !self.peek().is_name(op) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_name(op).is_some() {
            values.push(operand(self)?);
        }
        let span = self.span_of(first).cover(self.span_of(values[values.len() - 1]));
        Ok(self.alloc(
            NodeKind::BoolOp,
            span,
            vec![("op", Attr::Str(op.to_string())), ("values", Attr::List(values))],
        ))
    }

    fn not_expr(&mut self) -> CompileResult<NodeId> {
        if let Some(start) = self.eat_name("not") {
            let operand = self.not_expr()?;
            let span = start.cover(self.span_of(operand));
            return Ok(self.alloc(
                NodeKind::UnaryOp,
                span,
                vec![("op", Attr::Str("not".to_string())), ("operand", Attr::Node(operand))],
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> CompileResult<NodeId> {
        let mut left = self.binary(0)?;
        loop {
            let (op, width) = match &self.peek().kind {
                TokenKind::Op(op) if COMPARISONS.contains(op) => (op.to_string(), 1),
                TokenKind::Name(name) if name == "in" => ("in".to_string(), 1),
                TokenKind::Name(name) if name == "not" && self.peek_nth(1).is_name("in") => {
                    ("not in".to_string(), 2)
                }
                _ => return Ok(left),
            };
            for _ in 0..width {
                self.advance();
            }
            let right = self.binary(0)?;
            let span = self.span_of(left).cover(self.span_of(right));
            left = self.alloc(
                NodeKind::Compare,
                span,
                vec![
                    ("left", Attr::Node(left)),
                    ("op", Attr::Str(op)),
                    ("right", Attr::Node(right)),
                ],
            );
        }
    }

    fn binary(&mut self, level: usize) -> CompileResult<NodeId> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };
        let mut left = self.binary(level + 1)?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Op(op) if ops.contains(op) => *op,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.binary(level + 1)?;
            left = self.bin_op(left, op, right);
        }
    }

    fn bin_op(&mut self, left: NodeId, op: &str, right: NodeId) -> NodeId {
        let span = self.span_of(left).cover(self.span_of(right));
        self.alloc(
            NodeKind::BinOp,
            span,
            vec![
                ("left", Attr::Node(left)),
                ("op", Attr::Str(op.to_string())),
                ("right", Attr::Node(right)),
            ],
        )
    }

    fn unary(&mut self) -> CompileResult<NodeId> {
        let op = match &self.peek().kind {
            TokenKind::Op(op @ ("-" | "+" | "~")) => *op,
            _ => return self.power(),
        };
        let start = self.advance().span;
        let operand = self.unary()?;
        let span = start.cover(self.span_of(operand));
        Ok(self.alloc(
            NodeKind::UnaryOp,
            span,
            vec![("op", Attr::Str(op.to_string())), ("operand", Attr::Node(operand))],
        ))
    }

    fn power(&mut self) -> CompileResult<NodeId> {
        let base = self.postfix()?;
        if self.eat_op("**").is_none() {
            return Ok(base);
        }
        let exponent = self.unary()?;
        Ok(self.bin_op(base, "**", exponent))
    }

    fn postfix(&mut self) -> CompileResult<NodeId> {
        let mut node = self.atom()?;
        loop {
            let start = self.span_of(node);
            if self.eat_op(".").is_some() {
                let (attr, attr_span) = self.expect_ident()?;
                node = self.alloc(
                    NodeKind::Attribute,
                    start.cover(attr_span),
                    vec![("value", Attr::Node(node)), ("attr", Attr::Str(attr))],
                );
            } else if self.eat_op("(").is_some() {
                let (args, keywords, end) = self.call_arguments()?;
                node = self.alloc(
                    NodeKind::Call,
                    start.cover(end),
                    vec![
                        ("func", Attr::Node(node)),
                        ("args", Attr::List(args)),
                        ("keywords", Attr::List(keywords)),
                    ],
                );
            } else if self.eat_op("[").is_some() {
                let slice = self.expression_list()?;
                let end = self.expect_op("]")?;
                node = self.alloc(
                    NodeKind::Subscript,
                    start.cover(end),
                    vec![("value", Attr::Node(node)), ("slice", Attr::Node(slice))],
                );
            } else {
                return Ok(node);
            }
        }
    }

    fn call_arguments(&mut self) -> CompileResult<(Vec<NodeId>, Vec<NodeId>, Span)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.peek().is_op(")") {
            let is_keyword =
                matches!(self.peek().kind, TokenKind::Name(_)) && self.peek_nth(1).is_op("=");
            if is_keyword {
                let (arg, arg_span) = self.expect_ident()?;
                self.advance();
                let value = self.expression()?;
                let span = arg_span.cover(self.span_of(value));
                keywords.push(self.alloc(
                    NodeKind::Keyword,
                    span,
                    vec![("arg", Attr::Str(arg)), ("value", Attr::Node(value))],
                ));
            } else {
                args.push(self.expression()?);
            }
            if self.eat_op(",").is_none() {
                break;
            }
        }
        let end = self.expect_op(")")?;
        Ok((args, keywords, end))
    }

    fn atom(&mut self) -> CompileResult<NodeId> {
        let token = self.peek().clone();
        let span = token.span;
        match token.kind {
            TokenKind::Name(name) => {
                self.advance();
                if name == "True" || name == "False" {
                    return Ok(self.alloc(
                        NodeKind::NameConstant,
                        span,
                        vec![("value", Attr::Str(name))],
                    ));
                }
                if let Some((old, new)) = DEPRECATED_BUILTINS.iter().find(|(old, _)| *old == name) {
                    self.warnings.push(deprecation(old, new));
                }
                Ok(self.name_node(name, span))
            }
            TokenKind::Int(value) => {
                self.advance();
                Ok(self.alloc(NodeKind::Int, span, vec![("value", Attr::Str(value))]))
            }
            TokenKind::Hex(value) => {
                self.advance();
                Ok(self.alloc(NodeKind::Hex, span, vec![("value", Attr::Str(value))]))
            }
            TokenKind::Decimal(value) => {
                self.advance();
                Ok(self.alloc(NodeKind::Decimal, span, vec![("value", Attr::Str(value))]))
            }
            TokenKind::Str(value) | TokenKind::Bytes(value) => {
                self.advance();
                Ok(self.alloc(NodeKind::Str, span, vec![("value", Attr::Str(value))]))
            }
            TokenKind::Op("(") => {
                self.advance();
                if let Some(end) = self.eat_op(")") {
                    return Ok(self.alloc(
                        NodeKind::Tuple,
                        span.cover(end),
                        vec![("elements", Attr::List(Vec::new()))],
                    ));
                }
                let first = self.expression()?;
                if self.eat_op(")").is_some() {
                    return Ok(first);
                }
                let mut elements = vec![first];
                while self.eat_op(",").is_some() {
                    if self.peek().is_op(")") {
                        break;
                    }
                    elements.push(self.expression()?);
                }
                let end = self.expect_op(")")?;
                Ok(self.alloc(
                    NodeKind::Tuple,
                    span.cover(end),
                    vec![("elements", Attr::List(elements))],
                ))
            }
            TokenKind::Op("[") => {
                self.advance();
                let mut elements = Vec::new();
                while !self.peek().is_op("]") {
                    elements.push(self.expression()?);
                    if self.eat_op(",").is_none() {
                        break;
                    }
                }
                let end = self.expect_op("]")?;
                Ok(self.alloc(
                    NodeKind::List,
                    span.cover(end),
                    vec![("elements", Attr::List(elements))],
                ))
            }
            TokenKind::Op("{") => {
                self.advance();
                let mut keys = Vec::new();
                let mut values = Vec::new();
                while !self.peek().is_op("}") {
                    keys.push(self.expression()?);
                    self.expect_op(":")?;
                    values.push(self.expression()?);
                    if self.eat_op(",").is_none() {
                        break;
                    }
                }
                let end = self.expect_op("}")?;
                Ok(self.alloc(
                    NodeKind::Dict,
                    span.cover(end),
                    vec![("keys", Attr::List(keys)), ("values", Attr::List(values))],
                ))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::NodeKind;
    use crate::parser::parse;

    fn expression_kind(source: &str) -> (NodeKind, String) {
        let tree = parse(&format!("x: uint256 = {source}\n")).unwrap().tree;
        let value = tree.root().list("body")[0].child("value").unwrap();
        (value.kind(), value.source_code().to_string())
    }

    #[test]
    fn test_precedence() {
        let tree = parse("x: int128 = 1 + 2 * 3\n").unwrap().tree;
        let value = tree.root().list("body")[0].child("value").unwrap();
        assert_eq!(value.str_attr("op"), Some("+"));
        assert_eq!(value.child("right").unwrap().str_attr("op"), Some("*"));
    }

    #[test]
    fn test_power_binds_tighter_than_unary() {
        let tree = parse("x: int128 = -2 ** 2\n").unwrap().tree;
        let value = tree.root().list("body")[0].child("value").unwrap();
        assert_eq!(value.kind(), NodeKind::UnaryOp);
        assert_eq!(value.child("operand").unwrap().kind(), NodeKind::BinOp);
    }

    #[test]
    fn test_call_with_keywords() {
        let tree = parse("p: Point = Point(x=1, y=2)\n").unwrap().tree;
        let call = tree.root().list("body")[0].child("value").unwrap();
        assert_eq!(call.kind(), NodeKind::Call);
        let keywords: Vec<_> = call
            .list("keywords")
            .iter()
            .filter_map(|k| k.str_attr("arg"))
            .collect();
        assert_eq!(keywords, vec!["x", "y"]);
    }

    #[test]
    fn test_source_code_of_nested_expression() {
        assert_eq!(
            expression_kind("self.foo(self.bar(), 2)"),
            (NodeKind::Call, "self.foo(self.bar(), 2)".to_string())
        );
        assert_eq!(
            expression_kind("self.balances[msg.sender]"),
            (NodeKind::Subscript, "self.balances[msg.sender]".to_string())
        );
    }

    #[test]
    fn test_abi_encode_deprecation() {
        let parsed = parse("x: Bytes[64] = _abi_encode(1)\n").unwrap();
        assert_eq!(
            parsed.warnings,
            vec!["_abi_encode will be deprecated in a future release, use abi_encode instead."]
        );
    }
}
