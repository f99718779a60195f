//! Command-line interface for the Vyper language server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vyper-lsp")]
#[command(about = "Language server for Vyper smart contracts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the Language Server Protocol (LSP) server
    #[command(alias = "lsp")]
    Serve {
        /// Listen on a TCP address instead of stdio
        #[arg(long, value_name = "ADDR")]
        tcp: Option<String>,

        /// Log filter, e.g. `info` or `vyper_lsp=debug`
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Quiet window before an edited document is rebuilt
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,
    },
    /// Build a file and print its diagnostics
    Check {
        /// Path to a `.vy` file
        file: PathBuf,
    },
}
