//! Symbol resolution and navigation for Vyper sources.
//!
//! The [`Ast`] facade owns the trees of one document; [`Navigator`] and the
//! [`handlers`] answer editor queries against it.

pub mod ast;
pub mod cursor;
pub mod debounce;
pub mod diagnostics;
pub mod document;
pub mod handlers;
pub mod navigation;

pub use crate::ast::{Ast, BuildState, ModuleTables, TreeVariant};
pub use crate::debounce::Debouncer;
pub use crate::document::Document;
pub use crate::handlers::{CompletionHandler, HoverHandler, MemberScope, SignatureHandler};
pub use crate::navigation::Navigator;
