//! # Testing Utilities
//!
//! Helpers for testing grammars and the parsers built on them.
//!
//! [`SentenceGenerator`] derives token sequences that a grammar accepts,
//! recording every rule call on the way. Driven by a property-testing
//! strategy it checks properties over arbitrary valid input, such as "a
//! clean sentence parses without errors" or "the token after a call is in
//! that call's follow set".

mod generators;

pub use generators::{CallSite, GeneratedSentence, SentenceGenerator};
