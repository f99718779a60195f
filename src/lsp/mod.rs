//! Language Server Protocol implementation for Vyper.
//!
//! This module provides LSP support with features like:
//! - Navigation: declaration, definition, implementation and references
//! - Hover, completion and signature help
//! - Diagnostics: published after a debounced rebuild

mod config;
mod server;
mod tracing_layer;

pub use server::{ServeOptions, serve};
