//! # Error Types
//!
//! Errors reported while building grammars and while recognizing input.
//!
//! ## Overview
//!
//! - **Grammar errors** ([`GrammarError`], [`GrammarErrors`]): found once per
//!   grammar during self-analysis. They are fatal and cached, so every later
//!   attempt to use the same grammar definition sees the identical list.
//! - **Recognition errors** ([`RecognitionError`]): syntax errors in the
//!   input. They never abort a parse; they are collected in
//!   [`ParseOutput::errors`] alongside whatever value recovery produced.
//! - **Faults** ([`ParseFault`]): conditions that are not about the input at
//!   all, such as asking for a rule that does not exist or exceeding the
//!   rule nesting limit. These are the only errors a parse call returns.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let output = parser.parse_tokens(tokens)?;
//! for error in &output.errors {
//!     eprintln!("{} at {}", error, error.span());
//! }
//! ```
//!
//! ## Diagnostics Support
//!
//! With the `diagnostics` feature, [`GrammarError`] implements
//! `miette::Diagnostic` and [`crate::syntax::TextRange`] converts into a
//! `miette::SourceSpan`.

mod grammar;

pub use grammar::{ERROR_SEPARATOR, GrammarError, GrammarErrorCategory, GrammarErrors};

use crate::lexer::Token;
use crate::syntax::{ParseTree, TextRange, TokenKind};
use compact_str::CompactString;
use std::fmt::Write;
use thiserror::Error;

/// The repair applied for a recognition error, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// A missing token was synthesized; no input was consumed for it.
    SingleTokenInsertion,
    /// One unexpected token was skipped and the next one matched.
    SingleTokenDeletion,
    /// Tokens were skipped inside a repetition until it could continue.
    InRepetition { skipped: usize },
    /// The enclosing rule was abandoned after skipping to a follow token.
    Resync { skipped: usize },
}

/// Where in the grammar an error was detected and what was done about it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Live rule stack at detection time, outermost first.
    pub rule_stack: Vec<CompactString>,
    pub recovery: Option<Recovery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionErrorKind<K: TokenKind> {
    #[error("expecting token of type {expected:?} but found '{found}'")]
    MismatchedToken { expected: K, found: CompactString },

    #[error("{}", describe_alternatives(.label.as_deref(), .expected, .found))]
    NoViableAlternative {
        /// Lookahead sequences of every branch, in declaration order.
        expected: Vec<Vec<K>>,
        label: Option<CompactString>,
        found: CompactString,
    },

    #[error("{}", describe_early_exit(.label.as_deref(), .expected, .found))]
    EarlyExit {
        expected: Vec<Vec<K>>,
        label: Option<CompactString>,
        found: CompactString,
    },

    #[error("redundant input, expecting end of input but found '{found}'")]
    NotAllInputConsumed { found: CompactString },
}

/// A syntax error found in the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct RecognitionError<K: TokenKind> {
    pub kind: RecognitionErrorKind<K>,
    /// The offending token.
    pub token: Token<K>,
    /// The last token consumed before the error, if any.
    pub previous: Option<Token<K>>,
    pub context: ErrorContext,
}

impl<K: TokenKind> RecognitionError<K> {
    #[must_use]
    pub const fn span(&self) -> TextRange {
        self.token.range
    }

    #[must_use]
    pub const fn recovery(&self) -> Option<Recovery> {
        self.context.recovery
    }

    #[must_use]
    pub const fn is_mismatched_token(&self) -> bool {
        matches!(self.kind, RecognitionErrorKind::MismatchedToken { .. })
    }

    #[must_use]
    pub const fn is_no_viable_alternative(&self) -> bool {
        matches!(self.kind, RecognitionErrorKind::NoViableAlternative { .. })
    }

    #[must_use]
    pub const fn is_early_exit(&self) -> bool {
        matches!(self.kind, RecognitionErrorKind::EarlyExit { .. })
    }

    #[must_use]
    pub const fn is_not_all_input_consumed(&self) -> bool {
        matches!(self.kind, RecognitionErrorKind::NotAllInputConsumed { .. })
    }

    /// Name of the rule that was active when the error was found.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        self.context.rule_stack.last().map(CompactString::as_str)
    }
}

fn format_paths<K: std::fmt::Debug>(paths: &[Vec<K>]) -> String {
    let mut out = String::new();
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{path:?}");
    }
    if out.is_empty() {
        out.push_str("<nothing>");
    }
    out
}

fn describe_alternatives<K: std::fmt::Debug>(
    label: Option<&str>,
    expected: &[Vec<K>],
    found: &str,
) -> String {
    match label {
        Some(label) => format!("expecting: {label} but found '{found}'"),
        None => format!(
            "expecting one of these token sequences: {} but found '{found}'",
            format_paths(expected)
        ),
    }
}

fn describe_early_exit<K: std::fmt::Debug>(
    label: Option<&str>,
    expected: &[Vec<K>],
    found: &str,
) -> String {
    match label {
        Some(label) => format!("expecting at least one iteration of: {label} but found '{found}'"),
        None => format!(
            "expecting at least one iteration starting with one of these token sequences: {} but found '{found}'",
            format_paths(expected)
        ),
    }
}

/// Non-recognition failures of a parse call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFault {
    #[error("rule <{0}> is not defined in this grammar")]
    UnknownRule(CompactString),

    #[error(
        "rule nesting exceeded {limit} frames while entering <{rule}>; left-recursive grammars are not supported"
    )]
    RecursionLimit { rule: CompactString, limit: usize },

    #[error("grammar path is empty")]
    EmptyPath,
}

#[derive(Debug, Clone, Default)]
pub struct ParseMetrics {
    pub tokens_consumed: usize,
    pub errors_recovered: usize,
    pub backtracks: usize,
    pub max_depth: usize,
    pub parse_time: std::time::Duration,
}

/// Result of one parse call: the value built for the start rule plus every
/// recognition error found on the way.
#[derive(Debug, Clone)]
pub struct ParseOutput<K: TokenKind> {
    pub tree: ParseTree<K>,
    pub errors: Vec<RecognitionError<K>>,
    pub metrics: ParseMetrics,
}

impl<K: TokenKind> ParseOutput<K> {
    /// `true` when no syntax error was recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
