use crate::lexer::TokenCursor;
use crate::lookahead::LookaheadPath;
use crate::syntax::TokenKind;
use ahash::RandomState;
use hashbrown::HashMap;

/// Compiled selector over the lookahead paths of a decision.
///
/// When no path is longer than one token the decision is a plain table
/// from token kind to alternative. Otherwise paths are tried in declaration
/// order against the upcoming tokens.
#[derive(Debug, Clone)]
pub enum PathTable<K: TokenKind> {
    Single {
        first: HashMap<K, usize, RandomState>,
        /// Alternative selected by an empty path, if any.
        fallback: Option<usize>,
    },
    Multi {
        alternatives: Vec<Vec<LookaheadPath<K>>>,
    },
}

impl<K: TokenKind> PathTable<K> {
    #[must_use]
    pub fn build(alternatives: &[Vec<LookaheadPath<K>>]) -> Self {
        if alternatives.iter().flatten().any(|path| path.len() > 1) {
            return Self::Multi {
                alternatives: alternatives.to_vec(),
            };
        }
        let mut first: HashMap<K, usize, RandomState> = HashMap::default();
        let mut fallback = None;
        for (index, paths) in alternatives.iter().enumerate() {
            for path in paths {
                match path.first() {
                    Some(&kind) => {
                        first.entry(kind).or_insert(index);
                    }
                    None => {
                        fallback.get_or_insert(index);
                    }
                }
            }
        }
        Self::Single { first, fallback }
    }

    /// Index of the first alternative whose lookahead matches the cursor.
    #[must_use]
    pub fn select(&self, cursor: &TokenCursor<K>) -> Option<usize> {
        match self {
            Self::Single { first, fallback } => {
                let mut best = *fallback;
                let mut kind = Some(cursor.la(1).kind);
                while let Some(current) = kind {
                    if let Some(&index) = first.get(&current) {
                        best = Some(best.map_or(index, |b| b.min(index)));
                    }
                    kind = current.parent();
                }
                best
            }
            Self::Multi { alternatives } => alternatives.iter().position(|paths| {
                paths.iter().any(|path| {
                    path.iter()
                        .enumerate()
                        .all(|(i, &expected)| cursor.la(i + 1).kind.is_a(expected))
                })
            }),
        }
    }

    #[must_use]
    pub fn accepts(&self, cursor: &TokenCursor<K>) -> bool {
        self.select(cursor).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Token;
    use crate::syntax::{TextRange, TextSize};
    use smallvec::smallvec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        Keyword,
        If,
        Ident,
        Colon,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }

        fn parent(self) -> Option<Self> {
            matches!(self, Self::If).then_some(Self::Keyword)
        }
    }

    use TestKind::*;

    fn cursor(kinds: &[TestKind]) -> TokenCursor<TestKind> {
        TokenCursor::new(
            kinds
                .iter()
                .zip(0u32..)
                .map(|(&kind, at)| Token::new(kind, "t", TextRange::at(TextSize::from(at), TextSize::from(1))))
                .collect(),
        )
    }

    #[test]
    fn test_single_token_table_prefers_declaration_order() {
        let table = PathTable::build(&[
            vec![smallvec![Ident]],
            vec![smallvec![Keyword]],
            vec![smallvec![If], LookaheadPath::new()],
        ]);
        assert!(matches!(table, PathTable::Single { fallback: Some(2), .. }));
        assert_eq!(table.select(&cursor(&[Ident])), Some(0));
        // `If` is listed under branch 2 but also matches `Keyword` in branch 1.
        assert_eq!(table.select(&cursor(&[If])), Some(1));
        assert_eq!(table.select(&cursor(&[Colon])), Some(2));
    }

    #[test]
    fn test_multi_token_paths() {
        let table = PathTable::build(&[
            vec![smallvec![Ident, Colon]],
            vec![smallvec![Ident]],
        ]);
        assert!(matches!(table, PathTable::Multi { .. }));
        assert_eq!(table.select(&cursor(&[Ident, Colon])), Some(0));
        assert_eq!(table.select(&cursor(&[Ident, Ident])), Some(1));
        assert!(!table.accepts(&cursor(&[Colon])));
    }
}
