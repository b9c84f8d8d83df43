use crate::grammar::AnalyzedGrammar;
use crate::lexer::{Token, TokenCursor};
use crate::syntax::{ParseTree, TokenKind};
use compact_str::CompactString;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Argument value passed to a parametrized rule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ArgValue {
    Integer(i64),
    Float(f64),
    String(CompactString),
    Char(char),
    Bool(bool),
}

impl ArgValue {
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<char> for ArgValue {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

/// Read-only view of the parse state handed to guards and argument builders.
pub struct GuardContext<'a, K: TokenKind> {
    cursor: &'a TokenCursor<K>,
    args: &'a [ArgValue],
    grammar: &'a AnalyzedGrammar<K>,
}

impl<'a, K: TokenKind> GuardContext<'a, K> {
    pub(crate) const fn new(
        cursor: &'a TokenCursor<K>,
        args: &'a [ArgValue],
        grammar: &'a AnalyzedGrammar<K>,
    ) -> Self {
        Self {
            cursor,
            args,
            grammar,
        }
    }

    /// The `k`-th upcoming token (1-based); end-of-input past the last one.
    #[must_use]
    pub fn la(&self, k: usize) -> &'a Token<K> {
        self.cursor.la(k)
    }

    #[must_use]
    pub fn la_kind(&self, k: usize) -> K {
        self.cursor.la(k).kind
    }

    /// Arguments of the rule invocation the guard runs in.
    #[must_use]
    pub const fn args(&self) -> &'a [ArgValue] {
        self.args
    }

    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&'a ArgValue> {
        self.args.get(index)
    }

    /// Whether the next token can start `rule`.
    #[must_use]
    pub fn is_next_rule(&self, rule: &str) -> bool {
        self.grammar
            .rule_first(rule)
            .is_some_and(|first| first.matches(self.la_kind(1)))
    }
}

pub type GuardFn<K> = Arc<dyn Fn(&GuardContext<'_, K>) -> bool + Send + Sync>;
pub type ArgsFn<K> = Arc<dyn Fn(&GuardContext<'_, K>) -> Vec<ArgValue> + Send + Sync>;
pub type AcceptFn<K> = Arc<dyn Fn(&ParseTree<K>) -> bool + Send + Sync>;

/// An explicit decision predicate replacing computed lookahead.
#[derive(Clone)]
pub enum Guard<K: TokenKind> {
    /// Plain predicate over the current lookahead and rule arguments.
    When(GuardFn<K>),
    /// Speculatively run `rule` from the current position and restore all
    /// state afterwards. The guard holds if the rule recognized without error
    /// and, when given, `accept` approves the tree it built.
    Backtrack {
        rule: CompactString,
        args: CallArgs<K>,
        accept: Option<AcceptFn<K>>,
    },
}

impl<K: TokenKind> Guard<K> {
    pub fn when(predicate: impl Fn(&GuardContext<'_, K>) -> bool + Send + Sync + 'static) -> Self {
        Self::When(Arc::new(predicate))
    }

    pub fn backtrack(rule: impl Into<CompactString>) -> Self {
        Self::Backtrack {
            rule: rule.into(),
            args: CallArgs::None,
            accept: None,
        }
    }

    /// Rule speculatively run by a backtracking guard.
    #[must_use]
    pub fn backtrack_rule(&self) -> Option<&str> {
        match self {
            Self::Backtrack { rule, .. } => Some(rule),
            Self::When(_) => None,
        }
    }

    /// Add an acceptance test to a backtracking guard. No effect on `When`.
    #[must_use]
    pub fn accept_if(self, accept: impl Fn(&ParseTree<K>) -> bool + Send + Sync + 'static) -> Self {
        match self {
            Self::Backtrack { rule, args, .. } => Self::Backtrack {
                rule,
                args,
                accept: Some(Arc::new(accept)),
            },
            guard @ Self::When(_) => guard,
        }
    }

    /// Set the arguments of a backtracking guard's rule. No effect on `When`.
    #[must_use]
    pub fn with_args(self, call_args: CallArgs<K>) -> Self {
        match self {
            Self::Backtrack { rule, accept, .. } => Self::Backtrack {
                rule,
                args: call_args,
                accept,
            },
            guard @ Self::When(_) => guard,
        }
    }
}

impl<K: TokenKind> fmt::Debug for Guard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::When(_) => f.write_str("When(..)"),
            Self::Backtrack { rule, accept, .. } => f
                .debug_struct("Backtrack")
                .field("rule", rule)
                .field("accept", &accept.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// Arguments supplied at a rule call site.
#[derive(Clone)]
pub enum CallArgs<K: TokenKind> {
    None,
    Fixed(Arc<[ArgValue]>),
    Computed(ArgsFn<K>),
}

impl<K: TokenKind> CallArgs<K> {
    pub fn fixed(values: impl IntoIterator<Item = ArgValue>) -> Self {
        Self::Fixed(values.into_iter().collect())
    }

    pub fn computed(
        build: impl Fn(&GuardContext<'_, K>) -> Vec<ArgValue> + Send + Sync + 'static,
    ) -> Self {
        Self::Computed(Arc::new(build))
    }

    /// Forward the caller's own arguments unchanged.
    #[must_use]
    pub fn inherit() -> Self {
        Self::computed(|cx| cx.args().to_vec())
    }

    pub(crate) fn evaluate(&self, cx: &GuardContext<'_, K>) -> Vec<ArgValue> {
        match self {
            Self::None => Vec::new(),
            Self::Fixed(values) => values.to_vec(),
            Self::Computed(build) => build(cx),
        }
    }
}

impl<K: TokenKind> Default for CallArgs<K> {
    fn default() -> Self {
        Self::None
    }
}

impl<K: TokenKind> fmt::Debug for CallArgs<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Fixed(values) => f.debug_tuple("Fixed").field(values).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    #[test]
    fn test_arg_value_accessors() {
        assert_eq!(ArgValue::from(true).as_bool(), Some(true));
        assert_eq!(ArgValue::from(3_i64).as_integer(), Some(3));
        assert_eq!(ArgValue::from("mood").as_str(), Some("mood"));
        assert_eq!(ArgValue::from('x').as_bool(), None);
    }

    #[test]
    fn test_guard_builders() {
        let guard: Guard<TestKind> = Guard::backtrack("statement")
            .accept_if(|tree| tree.children().is_empty())
            .with_args(CallArgs::fixed([ArgValue::Bool(true)]));
        match &guard {
            Guard::Backtrack { rule, args, accept } => {
                assert_eq!(rule, "statement");
                assert!(accept.is_some());
                assert!(matches!(args, CallArgs::Fixed(values) if values.len() == 1));
            }
            Guard::When(_) => panic!("expected a backtracking guard"),
        }
        assert_eq!(
            format!("{guard:?}"),
            "Backtrack { rule: \"statement\", accept: true, .. }"
        );
    }
}
