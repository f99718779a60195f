//! Recursive-descent parser producing the raw (un-annotated) tree.

mod expr;

use crate::ast::{Arena, Attr, NodeId, NodeKind, Span, SyntaxTree};
use crate::errors::{CompileError, CompileErrorKind, CompileResult};
use crate::lexer::{Token, TokenKind, tokenize};

/// Output of a successful parse.
pub(crate) struct Parsed {
    pub tree: SyntaxTree,
    pub warnings: Vec<String>,
}

pub(crate) fn parse(source: &str) -> CompileResult<Parsed> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        arena: Arena::default(),
        warnings: Vec::new(),
    };
    let root = parser.module()?;
    let mut warnings: Vec<String> = Vec::new();
    for warning in parser.warnings {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
    Ok(Parsed {
        tree: SyntaxTree::new(parser.arena, root, source),
        warnings,
    })
}

pub(crate) fn deprecation(old: &str, new: &str) -> String {
    format!("{old} will be deprecated in a future release, use {new} instead.")
}

const VARIABLE_WRAPPERS: &[(&str, &str)] = &[
    ("public", "is_public"),
    ("constant", "is_constant"),
    ("immutable", "is_immutable"),
    ("transient", "is_transient"),
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    arena: Arena,
    warnings: Vec<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, op: &str) -> Option<Span> {
        self.peek().is_op(op).then(|| self.advance().span)
    }

    fn eat_name(&mut self, name: &str) -> Option<Span> {
        self.peek().is_name(name).then(|| self.advance().span)
    }

    fn expect_op(&mut self, op: &str) -> CompileResult<Span> {
        self.eat_op(op)
            .ok_or_else(|| self.unexpected(&format!("'{op}'")))
    }

    fn expect_name(&mut self, name: &str) -> CompileResult<Span> {
        self.eat_name(name)
            .ok_or_else(|| self.unexpected(&format!("'{name}'")))
    }

    fn expect_ident(&mut self) -> CompileResult<(String, Span)> {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok((name, span))
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let token = self.peek();
        CompileError::syntax(
            format!("Expected {expected}, found {}", token.describe()),
            token.span,
        )
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof
        )
    }

    fn expect_line_end(&mut self) -> CompileResult<()> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Dedent | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn alloc(&mut self, kind: NodeKind, span: Span, attrs: Vec<(&'static str, Attr)>) -> NodeId {
        self.arena.alloc(kind, span, attrs)
    }

    fn span_of(&self, id: NodeId) -> Span {
        self.arena.get(id).span
    }

    fn kind_of(&self, id: NodeId) -> NodeKind {
        self.arena.get(id).kind
    }

    fn name_node(&mut self, name: String, span: Span) -> NodeId {
        self.alloc(NodeKind::Name, span, vec![("id", Attr::Str(name))])
    }

    fn module(&mut self) -> CompileResult<NodeId> {
        let mut body = Vec::new();
        let mut doc_string = None;
        self.skip_newlines();
        if let TokenKind::Str(value) = &self.peek().kind
            && self.peek_nth(1).kind == TokenKind::Newline
        {
            doc_string = Some(value.clone());
            self.advance();
        }
        loop {
            self.skip_newlines();
            if self.peek().kind == TokenKind::Eof {
                break;
            }
            body.push(self.top_level()?);
        }
        let end = self.peek().span;
        let mut attrs = vec![("body", Attr::List(body))];
        if let Some(doc) = doc_string {
            attrs.push(("doc_string", Attr::Str(doc)));
        }
        Ok(self.alloc(
            NodeKind::Module,
            Span::new(1, 0, end.end_lineno, end.end_col_offset),
            attrs,
        ))
    }

    fn top_level(&mut self) -> CompileResult<NodeId> {
        let token = self.peek().clone();
        let keyword = match &token.kind {
            TokenKind::Op("@") => return self.decorated(),
            TokenKind::Str(_) => return self.simple_statement(),
            TokenKind::Name(name) => name.as_str(),
            TokenKind::Indent => return Err(CompileError::syntax("unexpected indent", token.span)),
            _ => return Err(self.unexpected("a top-level declaration")),
        };
        let is_annotation = self.peek_nth(1).is_op(":");
        match keyword {
            "def" => self.function_def(Vec::new()),
            "struct" => self.member_block(NodeKind::StructDef),
            "event" => self.member_block(NodeKind::EventDef),
            "flag" => self.flag_def(false),
            "enum" => self.flag_def(true),
            "interface" => self.interface_def(),
            "import" => self.import(),
            "from" => self.import_from(),
            "exports" if is_annotation => self.module_decl(NodeKind::ExportsDecl),
            "implements" if is_annotation => self.module_decl(NodeKind::ImplementsDecl),
            "initializes" if is_annotation => self.module_decl(NodeKind::InitializesDecl),
            "uses" if is_annotation => self.module_decl(NodeKind::UsesDecl),
            _ if is_annotation => self.variable_decl(),
            _ => Err(CompileError::syntax("Invalid top-level statement", token.span)),
        }
    }

    fn decorated(&mut self) -> CompileResult<NodeId> {
        let mut decorators = Vec::new();
        while self.eat_op("@").is_some() {
            decorators.push(self.expression()?);
            self.expect_line_end()?;
            self.skip_newlines();
        }
        if !self.peek().is_name("def") {
            return Err(self.unexpected("'def' after decorators"));
        }
        self.function_def(decorators)
    }

    fn function_def(&mut self, decorators: Vec<NodeId>) -> CompileResult<NodeId> {
        let start = self.expect_name("def")?;
        let (name, _) = self.expect_ident()?;

        let args_start = self.expect_op("(")?;
        let mut args = Vec::new();
        let mut defaults = Vec::new();
        while !self.peek().is_op(")") {
            let (arg, arg_span) = self.expect_ident()?;
            self.expect_op(":")?;
            let annotation = self.expression()?;
            let span = arg_span.cover(self.span_of(annotation));
            args.push(self.alloc(
                NodeKind::Arg,
                span,
                vec![("arg", Attr::Str(arg)), ("annotation", Attr::Node(annotation))],
            ));
            if self.eat_op("=").is_some() {
                defaults.push(self.expression()?);
            }
            if self.eat_op(",").is_none() {
                break;
            }
        }
        let args_end = self.expect_op(")")?;
        let arguments = self.alloc(
            NodeKind::Arguments,
            args_start.cover(args_end),
            vec![("args", Attr::List(args)), ("defaults", Attr::List(defaults))],
        );

        let returns = match self.eat_op("->") {
            Some(_) => Some(self.expression()?),
            None => None,
        };
        self.expect_op(":")?;
        let (mut body, end) = self.block()?;

        let mut doc_string = None;
        if let Some(&first) = body.first()
            && self.kind_of(first) == NodeKind::Expr
            && let Some(Attr::Node(value)) = self.arena.get(first).attr("value")
            && self.kind_of(*value) == NodeKind::Str
            && let Some(Attr::Str(doc)) = self.arena.get(*value).attr("value")
        {
            doc_string = Some(doc.clone());
            body.remove(0);
        }

        let mut attrs = vec![
            ("decorator_list", Attr::List(decorators)),
            ("name", Attr::Str(name)),
            ("args", Attr::Node(arguments)),
        ];
        if let Some(returns) = returns {
            attrs.push(("returns", Attr::Node(returns)));
        }
        attrs.push(("body", Attr::List(body)));
        if let Some(doc) = doc_string {
            attrs.push(("doc_string", Attr::Str(doc)));
        }
        Ok(self.alloc(NodeKind::FunctionDef, start.cover(end), attrs))
    }

    /// Indented block, or a single statement on the same line.
    fn block(&mut self) -> CompileResult<(Vec<NodeId>, Span)> {
        let mut body = Vec::new();
        if self.peek().kind == TokenKind::Newline {
            self.advance();
            if self.peek().kind != TokenKind::Indent {
                return Err(self.unexpected("an indented block"));
            }
            self.advance();
            loop {
                self.skip_newlines();
                match self.peek().kind {
                    TokenKind::Dedent => {
                        self.advance();
                        break;
                    }
                    TokenKind::Eof => break,
                    _ => body.push(self.statement()?),
                }
            }
        } else {
            body.push(self.simple_statement()?);
        }
        let end = match body.last() {
            Some(&last) => self.span_of(last),
            None => return Err(self.unexpected("an indented block")),
        };
        Ok((body, end))
    }

    fn member_block(&mut self, kind: NodeKind) -> CompileResult<NodeId> {
        let start = self.advance().span;
        let (name, _) = self.expect_ident()?;
        self.expect_op(":")?;
        let (body, end) = self.block()?;
        for &member in &body {
            if !matches!(self.kind_of(member), NodeKind::AnnAssign | NodeKind::Pass) {
                return Err(CompileError::at(
                    CompileErrorKind::StructureException,
                    format!("Invalid {} member", kind_keyword(kind)),
                    self.span_of(member),
                ));
            }
        }
        Ok(self.alloc(
            kind,
            start.cover(end),
            vec![("name", Attr::Str(name)), ("body", Attr::List(body))],
        ))
    }

    fn flag_def(&mut self, deprecated: bool) -> CompileResult<NodeId> {
        let start = self.advance().span;
        if deprecated {
            self.warnings.push(deprecation("enum", "flag"));
        }
        let (name, _) = self.expect_ident()?;
        self.expect_op(":")?;
        let (body, end) = self.block()?;
        for &member in &body {
            let is_variant = match self.arena.get(member).attr("value") {
                Some(Attr::Node(value)) => self.kind_of(*value) == NodeKind::Name,
                _ => false,
            };
            if !is_variant && self.kind_of(member) != NodeKind::Pass {
                return Err(CompileError::at(
                    CompileErrorKind::StructureException,
                    "Invalid flag member",
                    self.span_of(member),
                ));
            }
        }
        Ok(self.alloc(
            NodeKind::FlagDef,
            start.cover(end),
            vec![("name", Attr::Str(name)), ("body", Attr::List(body))],
        ))
    }

    fn interface_def(&mut self) -> CompileResult<NodeId> {
        let start = self.advance().span;
        let (name, _) = self.expect_ident()?;
        self.expect_op(":")?;
        if self.peek().kind != TokenKind::Newline {
            return Err(self.unexpected("end of line"));
        }
        self.advance();
        if self.peek().kind != TokenKind::Indent {
            return Err(self.unexpected("an indented block"));
        }
        self.advance();

        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().kind == TokenKind::Dedent {
                self.advance();
                break;
            }
            if self.peek().kind == TokenKind::Eof {
                break;
            }
            if self.peek().is_name("def") {
                body.push(self.function_def(Vec::new())?);
            } else if self.peek().is_name("pass") {
                body.push(self.simple_statement()?);
            } else {
                return Err(self.unexpected("a function signature"));
            }
        }
        let end = match body.last() {
            Some(&last) => self.span_of(last),
            None => return Err(self.unexpected("an indented block")),
        };
        Ok(self.alloc(
            NodeKind::InterfaceDef,
            start.cover(end),
            vec![("name", Attr::Str(name)), ("body", Attr::List(body))],
        ))
    }

    fn dotted_name(&mut self) -> CompileResult<(String, Span)> {
        let (mut name, mut span) = self.expect_ident()?;
        while self.peek().is_op(".") {
            self.advance();
            let (part, part_span) = self.expect_ident()?;
            name.push('.');
            name.push_str(&part);
            span = span.cover(part_span);
        }
        Ok((name, span))
    }

    fn import(&mut self) -> CompileResult<NodeId> {
        let start = self.advance().span;
        let (name, mut end) = self.dotted_name()?;
        let mut attrs = vec![("name", Attr::Str(name))];
        if self.eat_name("as").is_some() {
            let (alias, alias_span) = self.expect_ident()?;
            end = alias_span;
            attrs.push(("alias", Attr::Str(alias)));
        }
        self.expect_line_end()?;
        Ok(self.alloc(NodeKind::Import, start.cover(end), attrs))
    }

    fn import_from(&mut self) -> CompileResult<NodeId> {
        let start = self.advance().span;
        let mut level = 0u32;
        while self.eat_op(".").is_some() {
            level += 1;
        }
        let module = if self.peek().is_name("import") {
            String::new()
        } else {
            self.dotted_name()?.0
        };
        self.expect_name("import")?;
        let (name, mut end) = self.expect_ident()?;
        let mut attrs = vec![
            ("module", Attr::Str(module)),
            ("name", Attr::Str(name)),
            ("level", Attr::Str(level.to_string())),
        ];
        if self.eat_name("as").is_some() {
            let (alias, alias_span) = self.expect_ident()?;
            end = alias_span;
            attrs.push(("alias", Attr::Str(alias)));
        }
        self.expect_line_end()?;
        Ok(self.alloc(NodeKind::ImportFrom, start.cover(end), attrs))
    }

    fn module_decl(&mut self, kind: NodeKind) -> CompileResult<NodeId> {
        let start = self.advance().span;
        self.expect_op(":")?;
        let annotation = self.expression()?;
        let span = start.cover(self.span_of(annotation));
        self.expect_line_end()?;
        Ok(self.alloc(kind, span, vec![("annotation", Attr::Node(annotation))]))
    }

    fn variable_decl(&mut self) -> CompileResult<NodeId> {
        let (name, name_span) = self.expect_ident()?;
        let target = self.name_node(name, name_span);
        self.expect_op(":")?;
        let annotation = self.expression()?;
        let value = match self.eat_op("=") {
            Some(_) => Some(self.expression()?),
            None => None,
        };
        let end = self.span_of(value.unwrap_or(annotation));
        self.expect_line_end()?;

        let mut flags: Vec<(&'static str, Attr)> = VARIABLE_WRAPPERS
            .iter()
            .map(|(_, flag)| (*flag, Attr::Bool(false)))
            .collect();
        let mut wrapped = annotation;
        while self.kind_of(wrapped) == NodeKind::Call {
            let call = self.arena.get(wrapped);
            let callee = match call.attr("func") {
                Some(Attr::Node(func)) => match self.arena.get(*func).attr("id") {
                    Some(Attr::Str(id)) => id.clone(),
                    _ => break,
                },
                _ => break,
            };
            let Some(&(_, flag)) = VARIABLE_WRAPPERS.iter().find(|(w, _)| *w == callee) else {
                break;
            };
            let inner = match call.attr("args") {
                Some(Attr::List(args)) => args.first().copied(),
                _ => None,
            };
            for slot in flags.iter_mut().filter(|(f, _)| *f == flag) {
                slot.1 = Attr::Bool(true);
            }
            match inner {
                Some(inner) => wrapped = inner,
                None => break,
            }
        }

        let mut attrs = vec![
            ("target", Attr::Node(target)),
            ("annotation", Attr::Node(annotation)),
        ];
        if let Some(value) = value {
            attrs.push(("value", Attr::Node(value)));
        }
        attrs.extend(flags);
        Ok(self.alloc(NodeKind::VariableDecl, name_span.cover(end), attrs))
    }

    fn statement(&mut self) -> CompileResult<NodeId> {
        if self.peek().is_name("if") {
            return self.if_statement();
        }
        if self.peek().is_name("for") {
            return self.for_statement();
        }
        self.simple_statement()
    }

    fn simple_statement(&mut self) -> CompileResult<NodeId> {
        let statement = self.small_statement()?;
        self.expect_line_end()?;
        Ok(statement)
    }

    fn small_statement(&mut self) -> CompileResult<NodeId> {
        let token = self.peek().clone();
        let span = token.span;
        if let TokenKind::Name(keyword) = &token.kind {
            match keyword.as_str() {
                "pass" | "break" | "continue" => {
                    self.advance();
                    let kind = match keyword.as_str() {
                        "pass" => NodeKind::Pass,
                        "break" => NodeKind::Break,
                        _ => NodeKind::Continue,
                    };
                    return Ok(self.alloc(kind, span, Vec::new()));
                }
                "return" => {
                    self.advance();
                    if self.at_line_end() {
                        return Ok(self.alloc(NodeKind::Return, span, Vec::new()));
                    }
                    let value = self.expression_list()?;
                    let span = span.cover(self.span_of(value));
                    return Ok(self.alloc(
                        NodeKind::Return,
                        span,
                        vec![("value", Attr::Node(value))],
                    ));
                }
                "log" => {
                    self.advance();
                    let value = self.expression()?;
                    let span = span.cover(self.span_of(value));
                    return Ok(self.alloc(NodeKind::Log, span, vec![("value", Attr::Node(value))]));
                }
                "assert" => {
                    self.advance();
                    let test = self.expression()?;
                    let mut end = self.span_of(test);
                    let mut attrs = vec![("test", Attr::Node(test))];
                    if self.eat_op(",").is_some() {
                        let msg = self.expression()?;
                        end = self.span_of(msg);
                        attrs.push(("msg", Attr::Node(msg)));
                    }
                    return Ok(self.alloc(NodeKind::Assert, span.cover(end), attrs));
                }
                "raise" => {
                    self.advance();
                    if self.at_line_end() {
                        return Ok(self.alloc(NodeKind::Raise, span, Vec::new()));
                    }
                    let exc = self.expression()?;
                    let span = span.cover(self.span_of(exc));
                    return Ok(self.alloc(NodeKind::Raise, span, vec![("exc", Attr::Node(exc))]));
                }
                _ => {}
            }
        }

        let target = self.expression_list()?;
        let start = self.span_of(target);
        if self.eat_op(":").is_some() {
            if self.kind_of(target) != NodeKind::Name {
                return Err(CompileError::at(
                    CompileErrorKind::StructureException,
                    "Only simple names can be declared",
                    start,
                ));
            }
            let annotation = self.expression()?;
            let mut end = self.span_of(annotation);
            let mut attrs = vec![
                ("target", Attr::Node(target)),
                ("annotation", Attr::Node(annotation)),
            ];
            if self.eat_op("=").is_some() {
                let value = self.expression()?;
                end = self.span_of(value);
                attrs.push(("value", Attr::Node(value)));
            }
            return Ok(self.alloc(NodeKind::AnnAssign, start.cover(end), attrs));
        }
        if self.eat_op("=").is_some() {
            let value = self.expression_list()?;
            let end = self.span_of(value);
            return Ok(self.alloc(
                NodeKind::Assign,
                start.cover(end),
                vec![("target", Attr::Node(target)), ("value", Attr::Node(value))],
            ));
        }
        if let TokenKind::Op(op) = self.peek().kind
            && let Some(op) = op.strip_suffix('=')
            && !matches!(op, "" | "=" | "!" | "<" | ">")
        {
            self.advance();
            let value = self.expression()?;
            let end = self.span_of(value);
            return Ok(self.alloc(
                NodeKind::AugAssign,
                start.cover(end),
                vec![
                    ("target", Attr::Node(target)),
                    ("op", Attr::Str(op.to_string())),
                    ("value", Attr::Node(value)),
                ],
            ));
        }
        Ok(self.alloc(NodeKind::Expr, start, vec![("value", Attr::Node(target))]))
    }

    fn if_statement(&mut self) -> CompileResult<NodeId> {
        // `elif` is parsed as a nested `if` in the else branch
        let start = self.advance().span;
        let test = self.expression()?;
        self.expect_op(":")?;
        let (body, mut end) = self.block()?;
        let mut orelse = Vec::new();
        if self.peek().is_name("elif") {
            let nested = self.if_statement()?;
            end = self.span_of(nested);
            orelse.push(nested);
        } else if self.eat_name("else").is_some() {
            self.expect_op(":")?;
            let (else_body, else_end) = self.block()?;
            orelse = else_body;
            end = else_end;
        }
        Ok(self.alloc(
            NodeKind::If,
            start.cover(end),
            vec![
                ("test", Attr::Node(test)),
                ("body", Attr::List(body)),
                ("orelse", Attr::List(orelse)),
            ],
        ))
    }

    fn for_statement(&mut self) -> CompileResult<NodeId> {
        let start = self.advance().span;
        let (name, name_span) = self.expect_ident()?;
        let mut target = self.name_node(name, name_span);
        if self.eat_op(":").is_some() {
            let annotation = self.expression()?;
            let span = name_span.cover(self.span_of(annotation));
            target = self.alloc(
                NodeKind::AnnAssign,
                span,
                vec![("target", Attr::Node(target)), ("annotation", Attr::Node(annotation))],
            );
        }
        self.expect_name("in")?;
        let iter = self.expression()?;
        self.expect_op(":")?;
        let (body, end) = self.block()?;
        Ok(self.alloc(
            NodeKind::For,
            start.cover(end),
            vec![
                ("target", Attr::Node(target)),
                ("iter", Attr::Node(iter)),
                ("body", Attr::List(body)),
            ],
        ))
    }
}

fn kind_keyword(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::EventDef => "event",
        _ => "struct",
    }
}
