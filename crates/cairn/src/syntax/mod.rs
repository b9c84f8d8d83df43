//! # Syntax
//!
//! Token kinds, source positions and the parse tree the recognizer builds.

mod kind;
mod text;
mod tree;

pub use kind::TokenKind;
pub use text::{TextRange, TextSize};
pub use tree::ParseTree;
