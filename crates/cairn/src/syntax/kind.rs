/// Trait for token type tags.
///
/// A token kind is whatever the external lexer attaches to each token. Kinds
/// may form a hierarchy through [`TokenKind::parent`]: a token whose kind is a
/// descendant of the expected kind is accepted wherever the ancestor is.
///
/// ## Example
///
/// ```rust
/// use cairn::syntax::TokenKind;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Keyword,
///     If,
///     Ident,
///     Number,
///     Eof,
/// }
///
/// impl TokenKind for Kind {
///     fn eof() -> Self {
///         Kind::Eof
///     }
///
///     fn parent(self) -> Option<Self> {
///         match self {
///             Kind::If => Some(Kind::Keyword),
///             _ => None,
///         }
///     }
///
///     fn is_insertable(self) -> bool {
///         !matches!(self, Kind::Ident | Kind::Number)
///     }
/// }
///
/// assert!(Kind::If.is_a(Kind::Keyword));
/// assert!(!Kind::Keyword.is_a(Kind::If));
/// ```
pub trait TokenKind:
    Copy + PartialEq + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static
{
    /// The end-of-input sentinel kind.
    fn eof() -> Self;

    /// Direct parent of this kind in the token hierarchy.
    fn parent(self) -> Option<Self> {
        None
    }

    /// Whether the recognizer may synthesize a token of this kind during
    /// single-token insertion. Value-bearing kinds (identifiers, literals)
    /// should usually return `false`.
    fn is_insertable(self) -> bool {
        true
    }

    /// Text image given to a synthesized token of this kind.
    fn insertion_text(self) -> &'static str {
        ""
    }

    /// `true` when `self` equals `expected` or descends from it.
    fn is_a(self, expected: Self) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == expected {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}
