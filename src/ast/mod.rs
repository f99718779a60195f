//! Syntax tree facade.
//!
//! [`Ast`] owns the trees produced for one document and the module tables
//! derived from them. Queries always run against the best tree available,
//! so navigation keeps working while the document is mid-edit and fails to
//! compile.

mod filter;
mod index;

use std::fmt;
use std::sync::Arc;

use derive_more::Display;
use indexmap::IndexMap;
use lsp_types::Diagnostic;
use vyper_front::{
    Compilation, EventType, FlagType, Frontend, FunctionType, InterfaceType, ModuleType, NodeRef,
    StructType, SyntaxTree, VarInfo, VyperFrontend,
};

use crate::diagnostics;
use crate::document::Document;

pub use filter::{Expected, NodeFilter};

/// The three tree variants a build can produce.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum TreeVariant {
    #[display("annotated")]
    Annotated,
    #[display("raw")]
    Raw,
    #[display("folded")]
    Folded,
}

impl TreeVariant {
    /// Query preference, best first. Folded trees come last because folding
    /// removes constant declarations.
    pub const PREFERENCE: [TreeVariant; 3] =
        [TreeVariant::Annotated, TreeVariant::Raw, TreeVariant::Folded];
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum BuildState {
    /// Nothing has been built yet.
    #[display("empty")]
    Empty,
    /// Every tree variant is current.
    #[display("ready")]
    Ready,
    /// The document parsed but annotation or folding failed.
    #[display("partially ready")]
    PartiallyReady,
    /// The document did not parse; trees from the previous build are kept.
    #[display("failed")]
    Failed,
}

/// Module-level tables taken from the last successful annotation.
#[derive(Clone, Debug, Default)]
pub struct ModuleTables {
    pub functions: IndexMap<String, FunctionType>,
    pub variables: IndexMap<String, VarInfo>,
    pub flags: IndexMap<String, FlagType>,
    pub structs: IndexMap<String, StructType>,
    pub events: IndexMap<String, EventType>,
    pub interfaces: IndexMap<String, InterfaceType>,
    /// Imported modules by alias.
    pub imports: IndexMap<String, Arc<ModuleType>>,
}

impl ModuleTables {
    pub fn from_module(module: &ModuleType) -> Self {
        Self {
            functions: module.functions.clone(),
            variables: module.variables.clone(),
            flags: module.flags.clone(),
            structs: module.structs.clone(),
            events: module.events.clone(),
            interfaces: module.interfaces.clone(),
            imports: module.imports.clone(),
        }
    }
}

/// Trees and tables for one document.
pub struct Ast {
    frontend: Arc<dyn Frontend + Send + Sync>,
    raw: Option<SyntaxTree>,
    annotated: Option<SyntaxTree>,
    folded: Option<SyntaxTree>,
    tables: ModuleTables,
    state: BuildState,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ast")
            .field("state", &self.state)
            .field("best_variant", &self.best_variant())
            .field("functions", &self.tables.functions.len())
            .field("imports", &self.tables.imports.len())
            .finish()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self::with_frontend(Arc::new(VyperFrontend))
    }

    pub fn with_frontend(frontend: Arc<dyn Frontend + Send + Sync>) -> Self {
        Self {
            frontend,
            raw: None,
            annotated: None,
            folded: None,
            tables: ModuleTables::default(),
            state: BuildState::Empty,
        }
    }

    /// A facade over a single tree, e.g. a function body.
    ///
    /// Its tables are empty; only tree queries are meaningful.
    pub fn from_tree(tree: SyntaxTree) -> Self {
        let mut ast = Self::new();
        ast.raw = Some(tree.clone());
        ast.annotated = Some(tree);
        ast.state = BuildState::Ready;
        ast
    }

    /// A facade scoped to the subtree rooted at `node`.
    pub fn from_node(node: NodeRef<'_>) -> Self {
        Self::from_tree(node.tree().subtree(node.id()))
    }

    /// Compile `document` and install whatever trees could be produced.
    ///
    /// A document that does not parse leaves the previous trees and tables
    /// in place. One that parses but fails annotation replaces the raw tree
    /// and drops the others, keeping the previous tables.
    pub fn build(&mut self, document: &Document) -> Vec<Diagnostic> {
        let source = document.source();
        let search_paths = document.search_paths();
        tracing::debug!(uri = document.uri(), "Building syntax trees");

        let mut diagnostics = Vec::new();
        match self.frontend.compile(&source, &search_paths) {
            Ok(compilation) => {
                self.install(&compilation);
                if let Some(error) = compilation.error() {
                    diagnostics.extend(diagnostics::from_compile_error(error));
                }
                diagnostics.extend(diagnostics::deprecation_warnings(
                    &compilation.warnings,
                    &document.lines(),
                ));
            }
            Err(error) => {
                tracing::debug!(%error, "Parse failed, keeping previous trees");
                self.state = BuildState::Failed;
                diagnostics.extend(diagnostics::from_compile_error(&error));
            }
        }

        for diagnostic in &mut diagnostics {
            diagnostic.range = document.utf16_range(diagnostic.range);
        }
        tracing::debug!(
            state = %self.state,
            diagnostics = diagnostics.len(),
            "Build finished"
        );
        diagnostics
    }

    fn install(&mut self, compilation: &Compilation) {
        self.raw = Some(compilation.raw.clone());
        match &compilation.annotated {
            Ok(module) => {
                self.annotated = module.tree.clone();
                self.folded = compilation.folded_tree().cloned();
                self.tables = ModuleTables::from_module(module);
                self.state = if self.folded.is_some() {
                    BuildState::Ready
                } else {
                    BuildState::PartiallyReady
                };
            }
            Err(_) => {
                self.annotated = None;
                self.folded = None;
                self.state = BuildState::PartiallyReady;
            }
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn tree(&self, variant: TreeVariant) -> Option<&SyntaxTree> {
        match variant {
            TreeVariant::Annotated => self.annotated.as_ref(),
            TreeVariant::Raw => self.raw.as_ref(),
            TreeVariant::Folded => self.folded.as_ref(),
        }
    }

    pub fn best_variant(&self) -> Option<TreeVariant> {
        TreeVariant::PREFERENCE
            .into_iter()
            .find(|variant| self.tree(*variant).is_some())
    }

    /// The most annotated tree available.
    pub fn best_tree(&self) -> Option<&SyntaxTree> {
        self.best_variant().and_then(|variant| self.tree(variant))
    }

    /// The un-annotated tree; the only one where constant declarations are
    /// guaranteed to survive.
    pub fn raw_tree(&self) -> Option<&SyntaxTree> {
        self.raw.as_ref()
    }

    pub fn functions(&self) -> &IndexMap<String, FunctionType> {
        &self.tables.functions
    }

    pub fn variables(&self) -> &IndexMap<String, VarInfo> {
        &self.tables.variables
    }

    pub fn flags(&self) -> &IndexMap<String, FlagType> {
        &self.tables.flags
    }

    pub fn structs(&self) -> &IndexMap<String, StructType> {
        &self.tables.structs
    }

    pub fn imports(&self) -> &IndexMap<String, Arc<ModuleType>> {
        &self.tables.imports
    }
}
