use std::path::PathBuf;
use std::sync::Arc;

use crate::ast::SyntaxTree;
use crate::errors::{CompileError, CompileResult};
use crate::types::ModuleType;
use crate::{fold, parser, semantics};

/// Result of running the pipeline on one document.
///
/// Parsing must succeed for a compilation to exist at all; annotation and
/// folding can each fail on their own.
#[derive(Clone, Debug)]
pub struct Compilation {
    pub raw: SyntaxTree,
    pub annotated: CompileResult<Arc<ModuleType>>,
    /// `None` when annotation failed and folding never ran.
    pub folded: Option<CompileResult<SyntaxTree>>,
    pub warnings: Vec<String>,
}

impl Compilation {
    /// The annotated tree, if annotation succeeded.
    pub fn annotated_tree(&self) -> Option<&SyntaxTree> {
        self.annotated.as_ref().ok().and_then(|module| module.tree.as_ref())
    }

    pub fn folded_tree(&self) -> Option<&SyntaxTree> {
        self.folded.as_ref().and_then(|folded| folded.as_ref().ok())
    }

    /// First error raised after parsing, if any.
    pub fn error(&self) -> Option<&CompileError> {
        match (&self.annotated, &self.folded) {
            (Err(error), _) => Some(error),
            (Ok(_), Some(Err(error))) => Some(error),
            _ => None,
        }
    }
}

/// A compiler front-end that turns Vyper source into syntax trees.
pub trait Frontend {
    fn compile(&self, source: &str, search_paths: &[PathBuf]) -> CompileResult<Compilation>;
}

/// The built-in front-end.
#[derive(Clone, Copy, Debug, Default)]
pub struct VyperFrontend;

impl Frontend for VyperFrontend {
    fn compile(&self, source: &str, search_paths: &[PathBuf]) -> CompileResult<Compilation> {
        let parsed = parser::parse(source)?;
        let annotated = semantics::annotate(&parsed.tree, None, search_paths, true);
        let folded = match &annotated {
            Ok(module) => module
                .tree
                .as_ref()
                .map(|tree| fold::fold(tree, module)),
            Err(_) => None,
        };
        if let Err(error) = &annotated {
            tracing::debug!(%error, "annotation failed");
        }
        Ok(Compilation {
            raw: parsed.tree,
            annotated,
            folded,
            warnings: parsed.warnings,
        })
    }
}
