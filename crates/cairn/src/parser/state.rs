//! Per-parse mutable state.

use crate::error::{ParseMetrics, RecognitionError};
use crate::grammar::{ArgValue, Rule};
use crate::lexer::{Checkpoint, Token, TokenCursor};
use crate::syntax::{ParseTree, TokenKind};
use compact_str::CompactString;
use std::sync::Arc;

/// Where the recognizer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecognizerPhase {
    /// Input set, nothing parsed yet.
    #[default]
    Ready,
    Running,
    /// Speculatively running a rule for a backtracking guard.
    Backtracking,
    /// Repairing a syntax error.
    Recovering,
    /// The parse ran to completion; syntax errors may have been recorded.
    Done,
    /// The start rule failed without recovery and the rest of the input
    /// was abandoned.
    Failed,
}

/// One live rule invocation.
pub(crate) struct Frame<K: TokenKind> {
    pub rule: Arc<Rule<K>>,
    /// Occurrence of the call site that entered this rule.
    pub occurrence: u32,
    pub args: Arc<[ArgValue]>,
    pub children: Vec<ParseTree<K>>,
}

/// Everything needed to undo a speculative run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot {
    checkpoint: Checkpoint,
    errors: usize,
    depth: usize,
    children: usize,
    tokens_consumed: usize,
    errors_recovered: usize,
}

pub(crate) struct Session<K: TokenKind> {
    pub cursor: TokenCursor<K>,
    pub frames: Vec<Frame<K>>,
    pub errors: Vec<RecognitionError<K>>,
    /// Nesting of active backtracking guards.
    pub backtracking: usize,
    pub phase: RecognizerPhase,
    pub metrics: ParseMetrics,
}

impl<K: TokenKind> Session<K> {
    pub fn new(tokens: Vec<Token<K>>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            frames: Vec::new(),
            errors: Vec::new(),
            backtracking: 0,
            phase: RecognizerPhase::Ready,
            metrics: ParseMetrics::default(),
        }
    }

    /// Rewind to the first token and forget all results.
    pub fn rewind(&mut self) {
        self.cursor.rewind();
        self.frames.clear();
        self.errors.clear();
        self.backtracking = 0;
        self.phase = RecognizerPhase::Ready;
        self.metrics = ParseMetrics::default();
    }

    pub const fn is_backtracking(&self) -> bool {
        self.backtracking > 0
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            checkpoint: self.cursor.checkpoint(),
            errors: self.errors.len(),
            depth: self.frames.len(),
            children: self.frames.last().map_or(0, |frame| frame.children.len()),
            tokens_consumed: self.metrics.tokens_consumed,
            errors_recovered: self.metrics.errors_recovered,
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.cursor.restore(snapshot.checkpoint);
        self.errors.truncate(snapshot.errors);
        self.frames.truncate(snapshot.depth);
        if let Some(frame) = self.frames.last_mut() {
            frame.children.truncate(snapshot.children);
        }
        self.metrics.tokens_consumed = snapshot.tokens_consumed;
        self.metrics.errors_recovered = snapshot.errors_recovered;
    }

    pub fn push_child(&mut self, tree: ParseTree<K>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.children.push(tree);
        }
    }

    pub fn current_rule(&self) -> Option<&Arc<Rule<K>>> {
        self.frames.last().map(|frame| &frame.rule)
    }

    /// Rule names of the live frames, outermost first.
    pub fn rule_stack(&self) -> Vec<CompactString> {
        self.frames
            .iter()
            .map(|frame| CompactString::from(frame.rule.name()))
            .collect()
    }

    pub fn args(&self) -> &[ArgValue] {
        match self.frames.last() {
            Some(frame) => &frame.args,
            None => &[],
        }
    }
}
