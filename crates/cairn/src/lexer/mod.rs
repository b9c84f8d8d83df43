//! # Lexer Boundary
//!
//! Tokenization itself is out of scope; any lexer works as long as it yields
//! [`Token`]s in input order. [`TokenCursor`] wraps that output for the
//! recognizer and supplies the end-of-input sentinel.

mod cursor;
mod token;

pub use cursor::{Checkpoint, TokenCursor};
pub use token::Token;
