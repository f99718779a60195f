//! Indentation-aware tokenizer.
//!
//! Raw tokens come from a `logos` lexer. A layout pass on top produces
//! `Newline`, `Indent` and `Dedent` tokens the way Python's tokenizer does:
//! newlines inside brackets are ignored, blank and comment-only lines never
//! change indentation.

use std::ops::Range;

use logos::{Lexer, Logos};

use crate::ast::Span;
use crate::errors::{CompileError, CompileResult};
use crate::line_index::LineIndex;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Name(String),
    Int(String),
    Hex(String),
    Decimal(String),
    Str(String),
    Bytes(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Op(o) if *o == op)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Name(name) => format!("'{name}'"),
            TokenKind::Int(value) | TokenKind::Hex(value) | TokenKind::Decimal(value) => {
                format!("'{value}'")
            }
            TokenKind::Str(_) | TokenKind::Bytes(_) => "string literal".to_string(),
            TokenKind::Op(op) => format!("'{op}'"),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

const OPERATORS: &[&str] = &[
    "**=", "//=", "<<=", ">>=", "->", "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[",
    "]", "{", "}", ",", ":", ".", "@", "&", "|", "^", "~", ";",
];

fn operator(text: &str) -> Option<&'static str> {
    OPERATORS.iter().copied().find(|op| *op == text)
}

/// Tokens as `logos` sees them, before indentation is resolved.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\x0c]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
enum RawToken {
    #[token("\n")]
    Newline,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Name(String),

    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| lex.slice().to_string())]
    Hex(String),

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*", |lex| lex.slice().to_string())]
    Decimal(String),

    #[token("\"", |lex| quoted(lex, '"'))]
    #[token("'", |lex| quoted(lex, '\''))]
    Str(String),

    #[token("b\"", |lex| quoted(lex, '"'))]
    #[token("b'", |lex| quoted(lex, '\''))]
    #[token("x\"", |lex| quoted(lex, '"'))]
    #[token("x'", |lex| quoted(lex, '\''))]
    Bytes(String),

    #[regex(
        r"\*\*=|//=|<<=|>>=|->|\*\*|//|==|!=|<=|>=|<<|>>|\+=|-=|\*=|/=|%=|&=|\|=|\^=|[-+*/%<>=()\[\]{},:.@&|^~;]",
        |lex| operator(lex.slice())
    )]
    Op(StaticStr),
}

/// `&'static str` behind an alias: the `Logos` derive rewrites lifetimes in
/// field types to the source lifetime, which would break `'static`.
type StaticStr = &'static str;

/// Body of a string literal whose opening quote was just matched.
///
/// A second and third quote right after the first open a triple-quoted
/// string. `None` when the literal is never closed.
fn quoted(lex: &mut Lexer<'_, RawToken>, quote: char) -> Option<String> {
    let rest = lex.remainder();
    let triple_quote = quote.to_string().repeat(3);
    let triple = rest.starts_with(&triple_quote[1..]);
    let (open, closing) = if triple {
        (2, triple_quote)
    } else {
        (0, quote.to_string())
    };

    let mut chars = rest[open..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\n' if !triple => return None,
            _ if rest[open + i..].starts_with(closing.as_str()) => {
                let body = &rest[open..open + i];
                lex.bump(open + i + closing.len());
                return Some(unescape(body));
            }
            _ => {}
        }
    }
    None
}

fn unescape(body: &str) -> String {
    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some(escaped @ ('\\' | '\'' | '"')) => value.push(escaped),
            Some('\n') | None => {}
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
        }
    }
    value
}

/// Layout pass: turns raw tokens into logical lines.
struct Layout<'a> {
    source: &'a str,
    index: LineIndex,
    depth: usize,
    indents: Vec<u32>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

pub(crate) fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    let mut layout = Layout {
        source,
        index: LineIndex::new(source),
        depth: 0,
        indents: vec![0],
        at_line_start: true,
        tokens: Vec::new(),
    };
    let mut lexer = RawToken::lexer(source);
    while let Some(raw) = lexer.next() {
        let span = layout.span(lexer.span());
        match raw {
            Ok(raw) => layout.feed(raw, lexer.span().start, span)?,
            Err(()) => return Err(lex_error(lexer.slice(), span)),
        }
    }
    Ok(layout.finish())
}

fn lex_error(slice: &str, span: Span) -> CompileError {
    let at = Span::new(span.lineno, span.col_offset, span.lineno, span.col_offset);
    if slice.ends_with(['"', '\'']) {
        return CompileError::syntax("unterminated string literal", at);
    }
    let c = slice.chars().next().unwrap_or(' ');
    CompileError::syntax(format!("invalid character '{c}'"), at)
}

impl Layout<'_> {
    fn span(&self, range: Range<usize>) -> Span {
        let (line, col) = self.index.line_col(range.start);
        let (end_line, end_col) = self.index.line_col(range.end);
        Span::new(line + 1, col, end_line + 1, end_col)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    fn last_is_line_end(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent)
        )
    }

    fn feed(&mut self, raw: RawToken, offset: usize, span: Span) -> CompileResult<()> {
        let kind = match raw {
            RawToken::Newline => {
                if self.depth == 0 {
                    if !self.last_is_line_end() {
                        self.push(TokenKind::Newline, span);
                    }
                    self.at_line_start = true;
                }
                return Ok(());
            }
            RawToken::Name(name) => TokenKind::Name(name),
            RawToken::Int(value) => TokenKind::Int(value),
            RawToken::Hex(value) => TokenKind::Hex(value),
            RawToken::Decimal(value) => TokenKind::Decimal(value),
            RawToken::Str(value) => TokenKind::Str(value),
            RawToken::Bytes(value) => TokenKind::Bytes(value),
            RawToken::Op(op) => TokenKind::Op(op),
        };

        if self.at_line_start && self.depth == 0 {
            self.indent_to(self.indent_width(offset), span)?;
            self.at_line_start = false;
        }
        if let TokenKind::Op(op) = kind {
            match op {
                "(" | "[" | "{" => self.depth += 1,
                ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        self.push(kind, span);
        Ok(())
    }

    /// Width of the whitespace between the start of the line and `offset`.
    fn indent_width(&self, offset: usize) -> u32 {
        let line_start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);
        self.source[line_start..offset]
            .chars()
            .fold(0, |width, c| match c {
                ' ' => width + 1,
                '\t' => (width / 8 + 1) * 8,
                _ => width,
            })
    }

    fn indent_to(&mut self, width: u32, span: Span) -> CompileResult<()> {
        let at = Span::new(span.lineno, span.col_offset, span.lineno, span.col_offset);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, at);
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, at);
            }
            if self.indents.last().copied() != Some(width) {
                return Err(CompileError::syntax(
                    "unindent does not match any outer indentation level",
                    at,
                ));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<Token> {
        let end = self.span(self.source.len()..self.source.len());
        if !self.last_is_line_end() {
            self.push(TokenKind::Newline, end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, end);
        }
        self.push(TokenKind::Eof, end);
        self.tokens
    }
}
