use crate::syntax::{TextRange, TextSize, TokenKind};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A token handed over by the external lexer.
///
/// Tokens are immutable values: a kind, the source text it represents and its
/// byte range. The recognizer creates tokens of its own only for single-token
/// insertion, and marks them with [`Token::inserted`].
///
/// # Example
///
/// ```rust
/// use cairn::lexer::Token;
/// use cairn::syntax::{TextRange, TextSize, TokenKind};
///
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Number, Eof }
/// # impl TokenKind for Kind {
/// #     fn eof() -> Self { Kind::Eof }
/// # }
/// let token = Token::new(
///     Kind::Number,
///     "42",
///     TextRange::at(TextSize::from(0), TextSize::from(2)),
/// );
/// assert!(!token.inserted);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Token<K: TokenKind> {
    pub kind: K,
    pub text: CompactString,
    pub range: TextRange,
    /// `true` for tokens synthesized by error recovery.
    pub inserted: bool,
}

impl<K: TokenKind> Token<K> {
    #[must_use]
    pub fn new(kind: K, text: impl Into<CompactString>, range: TextRange) -> Self {
        Self {
            kind,
            text: text.into(),
            range,
            inserted: false,
        }
    }

    /// The end-of-input sentinel positioned at `offset`.
    #[must_use]
    pub fn eof(offset: TextSize) -> Self {
        Self::new(K::eof(), "", TextRange::empty(offset))
    }

    /// A placeholder for a token that was missing from the input.
    #[must_use]
    pub fn synthesized(kind: K, offset: TextSize) -> Self {
        Self {
            kind,
            text: kind.insertion_text().into(),
            range: TextRange::empty(offset),
            inserted: true,
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == K::eof()
    }

    /// Whether this token is accepted where `expected` is required.
    #[must_use]
    pub fn matches(&self, expected: K) -> bool {
        self.kind.is_a(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        Semi,
        Punct,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }

        fn parent(self) -> Option<Self> {
            matches!(self, Self::Semi).then_some(Self::Punct)
        }

        fn insertion_text(self) -> &'static str {
            match self {
                Self::Semi => ";",
                _ => "",
            }
        }
    }

    #[test]
    fn test_synthesized_token() {
        let token = Token::synthesized(TestKind::Semi, TextSize::from(7));
        assert!(token.inserted);
        assert_eq!(token.text, ";");
        assert!(token.range.is_empty());
        assert_eq!(token.range.start().into(), 7);
    }

    #[test]
    fn test_matches_uses_hierarchy() {
        let token = Token::new(
            TestKind::Semi,
            ";",
            TextRange::at(TextSize::zero(), TextSize::from(1)),
        );
        assert!(token.matches(TestKind::Punct));
        assert!(!token.is_eof());
        assert!(Token::<TestKind>::eof(TextSize::zero()).is_eof());
    }
}
