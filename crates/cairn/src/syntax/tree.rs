use crate::lexer::Token;
use crate::syntax::{TextRange, TokenKind};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Concrete parse tree produced by the recognizer.
///
/// Every rule invocation becomes a [`ParseTree::Node`] whose children are the
/// tokens and sub-rule nodes matched by the rule body in input order. Optional
/// parts, repetitions and alternations do not create nodes of their own.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serialize",
    serde(bound(serialize = "K: Serialize", deserialize = "K: Deserialize<'de>"))
)]
pub enum ParseTree<K: TokenKind> {
    Token(Token<K>),
    Node {
        rule: CompactString,
        children: Vec<ParseTree<K>>,
        /// Set when the rule aborted and this node stands in for its result.
        recovered: bool,
    },
}

impl<K: TokenKind> ParseTree<K> {
    #[must_use]
    pub fn node(rule: impl Into<CompactString>, children: Vec<Self>) -> Self {
        Self::Node {
            rule: rule.into(),
            children,
            recovered: false,
        }
    }

    /// Rule name for nodes, `None` for tokens.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Node { rule, .. } => Some(rule.as_str()),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Node { children, .. } => children,
            Self::Token(_) => &[],
        }
    }

    #[must_use]
    pub fn as_token(&self) -> Option<&Token<K>> {
        match self {
            Self::Token(token) => Some(token),
            Self::Node { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_recovered(&self) -> bool {
        matches!(self, Self::Node { recovered: true, .. })
    }

    /// All leaf tokens in input order, including synthesized ones.
    #[must_use]
    pub fn tokens(&self) -> Vec<&Token<K>> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a Token<K>>) {
        match self {
            Self::Token(token) => out.push(token),
            Self::Node { children, .. } => {
                for child in children {
                    child.collect_tokens(out);
                }
            }
        }
    }

    /// First node (pre-order, including `self`) produced by `rule`.
    #[must_use]
    pub fn find(&self, rule: &str) -> Option<&Self> {
        if self.rule() == Some(rule) {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(rule))
    }

    /// Source span covered by the tree's non-synthesized tokens.
    #[must_use]
    pub fn range(&self) -> Option<TextRange> {
        self.tokens()
            .into_iter()
            .filter(|token| !token.inserted)
            .map(|token| token.range)
            .reduce(TextRange::cover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::TextSize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        A,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    fn token(at: u32) -> ParseTree<TestKind> {
        ParseTree::Token(Token::new(
            TestKind::A,
            "a",
            TextRange::at(TextSize::from(at), TextSize::from(1)),
        ))
    }

    #[test]
    fn test_tokens_and_range() {
        let inner = ParseTree::node("inner", vec![token(2), token(4)]);
        let tree = ParseTree::node("outer", vec![token(0), inner]);
        assert_eq!(tree.tokens().len(), 3);
        assert_eq!(
            tree.range(),
            Some(TextRange::new(TextSize::from(0), TextSize::from(5)))
        );
        assert_eq!(tree.find("inner").map(ParseTree::children).map(<[_]>::len), Some(2));
        assert!(tree.find("missing").is_none());
    }

    #[test]
    fn test_recovered_flag() {
        let tree: ParseTree<TestKind> = ParseTree::Node {
            rule: "x".into(),
            children: Vec::new(),
            recovered: true,
        };
        assert!(tree.is_recovered());
        assert_eq!(tree.range(), None);
    }
}
