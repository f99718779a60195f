//! Vyper language server entry point.

mod cli;
mod lsp;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Command};
use lsp_types::DiagnosticSeverity;
use ropey::Rope;
use vyper_lsp::diagnostics::print_diagnostic;
use vyper_lsp::{Ast, Document};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            tcp,
            log_level,
            debounce_ms,
        } => {
            let options = lsp::ServeOptions {
                tcp,
                log_level,
                debounce_ms,
            };
            if let Err(e) = lsp::serve(options) {
                eprintln!("LSP server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Check { file } => {
            if !check_file(&file) {
                std::process::exit(1);
            }
        }
    }
}

/// Build `path` once and print its diagnostics. Returns `false` on errors.
fn check_file(path: &Path) -> bool {
    let source_code = match std::fs::File::open(path).and_then(Rope::from_reader) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file: {e}");
            std::process::exit(1);
        }
    };

    let absolute = match std::fs::canonicalize(path) {
        Ok(absolute) => absolute,
        Err(e) => {
            eprintln!("Error resolving path: {e}");
            std::process::exit(1);
        }
    };
    let Some(document) = Document::from_path(&absolute, &source_code.to_string()) else {
        eprintln!("Error: {} is not a valid file path", absolute.display());
        std::process::exit(1);
    };
    let mut ast = Ast::new();
    let diagnostics = ast.build(&document);

    let file_name = path.display().to_string();
    for diag in &diagnostics {
        print_diagnostic(diag, &source_code, &file_name);
    }

    let errors = diagnostics
        .iter()
        .filter(|diag| diag.severity == Some(DiagnosticSeverity::ERROR))
        .count();
    if diagnostics.is_empty() {
        println!("✓ No errors");
    } else {
        println!(
            "{} error(s), {} warning(s)",
            errors,
            diagnostics.len() - errors
        );
    }
    errors == 0
}
