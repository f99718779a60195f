//! Front-end for the Vyper language server.
//!
//! Turns Vyper source into three tree variants: the raw parse tree, a
//! semantically annotated copy with module type tables, and a copy with
//! module constants folded away. Annotation and folding may fail while
//! parsing succeeds; callers get whatever could be produced.

pub mod ast;
mod compile;
pub mod errors;
mod fold;
mod lexer;
pub mod line_index;
mod parser;
mod semantics;
pub mod types;

pub use ast::{Attr, AttrRef, NodeId, NodeKind, NodeRef, Span, SyntaxTree};
pub use compile::{Compilation, Frontend, VyperFrontend};
pub use errors::{CompileError, CompileErrorKind, CompileResult};
pub use line_index::LineIndex;
pub use semantics::{render_type, unwrap_type};
pub use types::{
    EventType, FlagType, FunctionType, InterfaceType, Member, ModuleType, Mutability, StructType,
    VarInfo, Visibility, base_types, is_base_type,
};
