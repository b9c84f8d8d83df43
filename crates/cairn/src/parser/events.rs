use crate::error::Recovery;
use crate::syntax::TokenKind;
use compact_str::CompactString;
use std::sync::{Arc, Mutex};

/// A parsing event for debugging and tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent<K: TokenKind> {
    /// Started a rule at a token index
    EnterRule { rule: CompactString, position: usize },
    /// Left a rule, normally or after resyncing
    ExitRule { rule: CompactString, recovered: bool },
    /// Consumed (or synthesized) a token
    ConsumeToken { kind: K, text: CompactString },
    /// Repaired a syntax error
    Recovered {
        rule: CompactString,
        recovery: Recovery,
    },
    /// Finished a speculative run of a rule
    Backtrack { rule: CompactString, accepted: bool },
}

/// Receives parse events while [`ParserConfig::trace_events`](crate::parser::ParserConfig::trace_events)
/// is set.
pub trait ParseEventHandler<K: TokenKind>: Send {
    fn handle(&mut self, event: ParseEvent<K>);
}

/// A no-op event handler
pub struct NullEventHandler;

impl<K: TokenKind> ParseEventHandler<K> for NullEventHandler {
    fn handle(&mut self, _event: ParseEvent<K>) {}
}

/// Keeps every event in memory. Clones share the same log, so one copy can
/// be installed in a parser while another is inspected.
pub struct RecordingEventHandler<K: TokenKind> {
    events: Arc<Mutex<Vec<ParseEvent<K>>>>,
}

impl<K: TokenKind> RecordingEventHandler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ParseEvent<K>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl<K: TokenKind> Default for RecordingEventHandler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TokenKind> Clone for RecordingEventHandler<K> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<K: TokenKind> ParseEventHandler<K> for RecordingEventHandler<K> {
    fn handle(&mut self, event: ParseEvent<K>) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        events.push(event);
    }
}
