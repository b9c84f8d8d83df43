//! # Cairn
//!
//! A recursive-descent parsing toolkit whose grammars analyze themselves.
//!
//! ## Overview
//!
//! Grammars are written as plain data with [`Production`] combinators. When
//! a grammar is built, cairn checks it and computes everything the parser
//! needs up front:
//!
//! - **Lookahead**: each optional, repetition and alternation gets a
//!   decision table, extended beyond one token only where branches share a
//!   prefix
//! - **Ambiguity detection**: conflicting alternatives are reported when
//!   the grammar is built, not when input is parsed
//! - **FOLLOW sets per call site**: used to repair syntax errors
//! - **Content assist**: the tokens valid at any position in the grammar
//!
//! The [`Parser`] never stops at a syntax error. It records the error,
//! repairs it by inserting or deleting a single token or by skipping to a
//! safe continuation point, and keeps going.
//!
//! ## Quick Start
//!
//! ```rust
//! use cairn::grammar::{GrammarBuilder, Production};
//! use cairn::lexer::Token;
//! use cairn::parser::{Parser, ParserConfig};
//! use cairn::syntax::{TextRange, TextSize, TokenKind};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Kind {
//!     Ident,
//!     Dot,
//!     Semi,
//!     Eof,
//! }
//!
//! impl TokenKind for Kind {
//!     fn eof() -> Self {
//!         Kind::Eof
//!     }
//! }
//!
//! // statement: qualifiedName ';'
//! // qualifiedName: Ident ('.' Ident)*
//! let grammar = GrammarBuilder::new()
//!     .rule("statement", [Production::rule("qualifiedName"), Production::token(Kind::Semi)])
//!     .rule(
//!         "qualifiedName",
//!         [
//!             Production::token(Kind::Ident),
//!             Production::star([Production::token(Kind::Dot), Production::token(Kind::Ident).at(2)]),
//!         ],
//!     )
//!     .build()
//!     .expect("grammar is well formed");
//!
//! // "a.;" is missing an identifier after the dot.
//! let tokens = vec![
//!     Token::new(Kind::Ident, "a", TextRange::at(TextSize::from(0), TextSize::from(1))),
//!     Token::new(Kind::Dot, ".", TextRange::at(TextSize::from(1), TextSize::from(1))),
//!     Token::new(Kind::Semi, ";", TextRange::at(TextSize::from(2), TextSize::from(1))),
//! ];
//!
//! let mut parser = Parser::new(grammar, ParserConfig::default());
//! let output = parser.parse_tokens(tokens).expect("no fault");
//! assert_eq!(output.errors.len(), 1);
//! assert_eq!(output.errors[0].to_string(), "expecting token of type Ident but found ';'");
//! // The missing identifier was synthesized and parsing went on.
//! assert!(output.tree.tokens().iter().any(|token| token.inserted));
//! ```
//!
//! ## Modules
//!
//! - [`syntax`] - Token kinds, text positions and the parse tree
//! - [`lexer`] - The token sequence the parser consumes
//! - [`grammar`] - Grammar definition, analysis and the grammar registry
//! - [`lookahead`] - Lookahead decisions computed from the grammar
//! - [`parser`] - The recognizer and its error recovery
//! - [`error`] - Grammar errors, syntax errors and faults
//! - [`testing`] - Sentence generation for property tests

pub mod error;
pub mod grammar;
pub mod lexer;
pub mod lookahead;
pub mod parser;
pub mod syntax;
pub mod testing;

pub use error::{
    GrammarError, GrammarErrors, ParseFault, ParseMetrics, ParseOutput, RecognitionError,
    Recovery,
};
pub use grammar::{
    AnalyzedGrammar, Branch, GrammarBuilder, GrammarDefinition, GrammarPath, Guard, Production,
    analyzed,
};
pub use lexer::{Token, TokenCursor};
pub use parser::{Parser, ParserConfig};
pub use syntax::{ParseTree, TextRange, TextSize, TokenKind};
