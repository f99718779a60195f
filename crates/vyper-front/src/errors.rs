//! Error types for the Vyper front-end

use derive_more::{Display, Error};

use crate::ast::{NodeRef, Span};

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum CompileErrorKind {
    SyntaxException,
    StructureException,
    NamespaceCollision,
    UndeclaredDefinition,
    UnknownType,
    ModuleNotFound,
    FoldingException,
}

/// An error raised while parsing, annotating or folding a module.
///
/// Errors either point at one place (`span`) or carry a list of related
/// places (`annotations`), or both.
#[derive(Clone, Debug, Display, Error, PartialEq)]
#[display("{kind}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub span: Option<Span>,
    pub annotations: Vec<Span>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            annotations: Vec::new(),
        }
    }

    pub fn at(kind: CompileErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self::new(kind, message).with_span(span)
    }

    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::at(CompileErrorKind::SyntaxException, message, span)
    }

    pub(crate) fn structure(message: impl Into<String>, node: NodeRef<'_>) -> Self {
        Self::at(CompileErrorKind::StructureException, message, node.span())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_annotation(mut self, span: Span) -> Self {
        self.annotations.push(span);
        self
    }
}
