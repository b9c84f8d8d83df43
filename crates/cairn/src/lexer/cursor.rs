//! # Token Cursor
//!
//! The recognizer's view of the lexer output: a pre-tokenized vector with a
//! movable position. Looking past the last token never fails, it yields the
//! end-of-input sentinel as many times as asked.
//!
//! ```rust,ignore
//! let mut cursor = TokenCursor::new(tokens);
//! let checkpoint = cursor.checkpoint();
//! // ... speculative parsing ...
//! cursor.restore(checkpoint);
//! ```

use crate::lexer::Token;
use crate::syntax::{TextSize, TokenKind};

/// Saved cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkpoint(usize);

impl Checkpoint {
    /// Token index this checkpoint points at.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TokenCursor<K: TokenKind> {
    tokens: Vec<Token<K>>,
    pos: usize,
    eof: Token<K>,
}

impl<K: TokenKind> TokenCursor<K> {
    /// Wrap lexer output. A trailing end-of-input token, if the lexer emits
    /// one, is dropped in favour of the cursor's own sentinel.
    #[must_use]
    pub fn new(mut tokens: Vec<Token<K>>) -> Self {
        while tokens.last().is_some_and(Token::is_eof) {
            tokens.pop();
        }
        let end = tokens
            .last()
            .map_or_else(TextSize::zero, |token| token.range.end());
        Self {
            tokens,
            pos: 0,
            eof: Token::eof(end),
        }
    }

    /// The `k`-th upcoming token, 1-based. `la(0)` is the previously consumed
    /// token, or the sentinel at the start of input.
    #[must_use]
    pub fn la(&self, k: usize) -> &Token<K> {
        if k == 0 {
            return self.previous().unwrap_or(&self.eof);
        }
        self.tokens.get(self.pos + k - 1).unwrap_or(&self.eof)
    }

    #[must_use]
    pub fn previous(&self) -> Option<&Token<K>> {
        self.pos.checked_sub(1).and_then(|idx| self.tokens.get(idx))
    }

    /// Consume and return the next token. At the end this keeps returning
    /// the sentinel without moving.
    pub fn advance(&mut self) -> Token<K> {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                token.clone()
            }
            None => self.eof.clone(),
        }
    }

    /// Drop the next token and return the one that becomes current.
    pub fn skip(&mut self) -> &Token<K> {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        self.la(1)
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Jump past the last token.
    pub fn move_to_end(&mut self) {
        self.pos = self.tokens.len();
    }

    /// Offset where the next token starts, used to place synthesized tokens.
    #[must_use]
    pub fn offset(&self) -> TextSize {
        self.la(1).range.start()
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub const fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.pos)
    }

    /// Move back to the first token.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.0.min(self.tokens.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token<K>] {
        &self.tokens
    }
}

impl<K: TokenKind> Default for TokenCursor<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
