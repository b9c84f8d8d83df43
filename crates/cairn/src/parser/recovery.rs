//! # Error Recovery
//!
//! Cursor-level building blocks of the two recovery tiers.
//!
//! - **In-rule** repairs fix a single mismatched token: insert the expected
//!   token when the one found may legally follow it, otherwise delete the
//!   found token when the one after it is the expected one.
//! - **Resync** skips ahead to a token some live rule can continue with.
//!   It is used after a repetition loop stops early and when a rule is
//!   abandoned.

use crate::grammar::TokenSet;
use crate::lexer::{Token, TokenCursor};
use crate::syntax::TokenKind;

/// A single-token repair of a mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InRuleRepair<K: TokenKind> {
    /// Pretend the expected token was there.
    Insert(Token<K>),
    /// Drop the unexpected token; the next one is the expected one.
    Delete,
}

/// Insertion needs an insertable kind and a found token that may follow
/// the expected one.
pub(crate) fn can_insert<K: TokenKind>(cursor: &TokenCursor<K>, expected: K, follows: &TokenSet<K>) -> bool {
    expected.is_insertable() && follows.matches(cursor.la(1).kind)
}

pub(crate) fn can_delete<K: TokenKind>(cursor: &TokenCursor<K>, expected: K) -> bool {
    cursor.la(2).matches(expected)
}

/// Pick the repair for a mismatch on `expected`. Insertion wins over
/// deletion.
pub(crate) fn single_token_repair<K: TokenKind>(
    cursor: &TokenCursor<K>,
    expected: K,
    follows: &TokenSet<K>,
) -> Option<InRuleRepair<K>> {
    if can_insert(cursor, expected, follows) {
        Some(InRuleRepair::Insert(Token::synthesized(expected, cursor.offset())))
    } else if can_delete(cursor, expected) {
        Some(InRuleRepair::Delete)
    } else {
        None
    }
}

/// Kind of the first upcoming token that is in `follows`. End of input
/// always qualifies.
pub(crate) fn find_resync_kind<K: TokenKind>(cursor: &TokenCursor<K>, follows: &TokenSet<K>) -> K {
    let mut k = 1;
    loop {
        let token = cursor.la(k);
        if token.is_eof() || follows.matches(token.kind) {
            return token.kind;
        }
        k += 1;
    }
}

/// Skip tokens until the next one is of `kind` or input ends. Returns the
/// number of tokens skipped.
pub(crate) fn resync_to<K: TokenKind>(cursor: &mut TokenCursor<K>, kind: K) -> usize {
    let mut skipped = 0;
    while cursor.la(1).kind != kind && !cursor.is_at_end() {
        cursor.skip();
        skipped += 1;
    }
    skipped
}
