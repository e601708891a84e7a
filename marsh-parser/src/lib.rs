//! Parser for the marsh shell's expression language.
//!
//! The entry point is [`parse`], which turns a command line into an [`ast::Node`]
//! tree (or `None` for blank input). Syntax errors are embedded in the tree as
//! [`ast::NodeKind::SyntaxError`] nodes rather than reported out-of-band; callers
//! check [`ast::Node::is_syntax_error`] before evaluating.

pub mod ast;
pub mod parser;

pub use parser::{Parser, parse};
