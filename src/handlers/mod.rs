//! Completion, hover and signature help.
//!
//! Handlers run on every keystroke against text that usually does not
//! compile, so each one reads the current line plus whatever tree the facade
//! holds and returns an empty result when nothing matches.

pub mod completion;
pub mod hover;
pub mod signature;

pub use completion::{CompletionHandler, DECORATORS, MemberScope};
pub use hover::HoverHandler;
pub use signature::SignatureHandler;

use vyper_front::NodeRef;

/// `def name(...) -> T:` as written, up to and including the colon that
/// opens the body.
pub(crate) fn function_header<'t>(node: NodeRef<'t>) -> Option<&'t str> {
    let source = node.source_code();
    let mut depth = 0usize;
    for (offset, c) in source.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return Some(&source[..=offset]),
            _ => {}
        }
    }
    None
}
