//! # Grammar Module
//!
//! Grammar definition, resolution and self-analysis.
//!
//! ## Overview
//!
//! A grammar is a set of named rules whose bodies are plain data built from
//! [`Production`] combinators. Building it runs the self-analysis:
//!
//! - **Structure checks**: rule names, duplicate rules and occurrences,
//!   malformed alternations
//! - **Resolution**: every rule reference gets a weak handle to its target
//! - **FIRST / FOLLOW**: per rule and per call site ([`FollowKey`])
//! - **Lookahead**: one decision per optional, repetition and alternation,
//!   with ambiguity detection
//!
//! Every problem found is collected into [`GrammarErrors`](crate::error::GrammarErrors);
//! a grammar with errors is never handed out.
//!
//! ## Usage
//!
//! ```rust
//! use cairn::grammar::{Branch, GrammarBuilder, Production};
//! # use cairn::syntax::TokenKind;
//! # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! # enum Kind { LSquare, RSquare, Comma, Number, Eof }
//! # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
//!
//! let grammar = GrammarBuilder::new()
//!     .rule(
//!         "array",
//!         [
//!             Production::token(Kind::LSquare),
//!             Production::star_sep(Kind::Comma, [Production::rule("value")]),
//!             Production::token(Kind::RSquare),
//!         ],
//!     )
//!     .rule(
//!         "value",
//!         [Production::choice([
//!             Branch::new([Production::token(Kind::Number)]),
//!             Branch::new([Production::rule("array")]),
//!         ])],
//!     )
//!     .build()
//!     .expect("grammar is well formed");
//! assert!(grammar.rule("value").is_some());
//! ```
//!
//! ## Registry
//!
//! Grammars defined through [`GrammarDefinition`] are analyzed once per
//! process and shared; see [`analyzed`].

mod analysis;
mod builder;
mod expr;
mod first;
mod follow;
mod guard;
mod path;
mod registry;
mod rule_set;
mod walker;

pub use analysis::{AnalysisConfig, AnalyzedGrammar};
pub use builder::{GrammarBuilder, PlaceholderFn, Rule, RuleOptions};
pub use expr::{
    Alternation, Branch, DecisionKind, OptionalProd, Production, Reference, Repetition, Terminal,
};
pub use first::{FirstSets, TokenSet};
pub use follow::{FollowKey, FollowTable};
pub use guard::{
    AcceptFn, ArgValue, ArgsFn, CallArgs, Guard, GuardContext, GuardFn,
};
pub use path::GrammarPath;
pub use registry::{GrammarDefinition, analyzed};
pub use rule_set::RuleSet;
pub use walker::{RestItem, RestWalker, concat_rest, rest_after_iteration, walk_rest};
