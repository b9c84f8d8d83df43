//! # Parser Module
//!
//! The recursive-descent recognizer that runs an analyzed grammar over a
//! token sequence.
//!
//! ## Overview
//!
//! A [`Parser`] walks the productions of its grammar directly. Decisions
//! (optionals, repetitions, alternations) are taken with the lookahead
//! tables computed during analysis, or with explicit guards where the
//! grammar provides them.
//!
//! ## Error Recovery
//!
//! Syntax errors never abort a parse. They are recorded and repaired, from
//! the least invasive repair to the most:
//!
//! 1. **Single-token insertion or deletion** at a mismatched token
//! 2. **In-repetition resync**: skip ahead to the next iteration of a loop
//! 3. **Rule resync**: abandon the current rule and continue at a token
//!    that may follow it; the rule's placeholder stands in for its result
//!
//! All recovery is off while a backtracking guard runs, so a speculative
//! path either matches cleanly or fails.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut parser = Parser::new(grammar, ParserConfig::default());
//! let output = parser.parse_tokens(tokens)?;
//! if !output.is_clean() {
//!     for error in &output.errors {
//!         eprintln!("{error} at {}", error.span());
//!     }
//! }
//! ```

mod config;
mod events;
mod recognizer;
mod recovery;
mod state;

pub use config::ParserConfig;
pub use events::{NullEventHandler, ParseEvent, ParseEventHandler, RecordingEventHandler};
pub use recognizer::Parser;
pub use state::RecognizerPhase;

pub use crate::error::ParseOutput;
pub use crate::syntax::ParseTree;
