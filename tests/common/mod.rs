//! Common test utilities for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use lsp_types::{Diagnostic, Position};
use vyper_lsp::{Ast, Document};

pub fn pos(line: u32, character: u32) -> Position {
    Position { line, character }
}

/// Load a contract from `tests/fixtures`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Document {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    let source = fs::read_to_string(&path).expect("Failed to read fixture");
    Document::from_path(&path, &source).expect("Fixture path is absolute")
}

/// Build `document`, failing the test on any diagnostic.
pub fn build_clean(document: &Document) -> Ast {
    let mut ast = Ast::new();
    let diagnostics: Vec<Diagnostic> = ast.build(document);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    ast
}

/// Write `files` into `dir` and open the first one as a document.
#[allow(dead_code)]
pub fn write_project(dir: &Path, files: &[(&str, &str)]) -> Document {
    for (name, source) in files {
        fs::write(dir.join(name), source).expect("Failed to write project file");
    }
    let (name, source) = files[0];
    let path: PathBuf = dir.join(name);
    Document::from_path(&path, source).expect("Project path is absolute")
}
