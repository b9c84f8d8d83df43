//! The grammar model: rule bodies as plain data.
//!
//! A rule body is a list of [`Production`]s mirroring the declared nesting.
//! Occurrence indices tell apart repeated uses of the same production kind
//! inside one body; `0` means "not given" and is replaced with the next free
//! index in declaration order when the grammar is built.

use crate::grammar::{CallArgs, Guard, Rule};
use crate::syntax::TokenKind;
use compact_str::CompactString;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// The kinds of productions that need a lookahead decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecisionKind {
    Optional,
    ZeroOrMore,
    OneOrMore,
    Alternation,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Optional => "Optional",
            Self::ZeroOrMore => "ZeroOrMore",
            Self::OneOrMore => "OneOrMore",
            Self::Alternation => "Alternation",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Terminal<K: TokenKind> {
    pub kind: K,
    pub occurrence: u32,
}

/// A call to another rule.
///
/// The target is attached during resolution as a non-owning handle. Until
/// then, and for names that never resolve, the reference behaves as a rule
/// with an empty body.
#[derive(Clone)]
pub struct Reference<K: TokenKind> {
    pub name: CompactString,
    pub occurrence: u32,
    pub args: CallArgs<K>,
    resolved: OnceLock<Weak<Rule<K>>>,
}

impl<K: TokenKind> Reference<K> {
    #[must_use]
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            occurrence: 0,
            args: CallArgs::None,
            resolved: OnceLock::new(),
        }
    }

    /// Attach the target rule. Later calls keep the first handle.
    pub(crate) fn resolve(&self, rule: &Arc<Rule<K>>) {
        let _ = self.resolved.set(Arc::downgrade(rule));
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.definition().is_some()
    }

    /// The referenced rule, if resolved and still alive.
    #[must_use]
    pub fn definition(&self) -> Option<Arc<Rule<K>>> {
        self.resolved.get().and_then(Weak::upgrade)
    }

    /// Run `f` over the referenced rule's body, or over an empty body when
    /// the reference is unresolved.
    pub fn with_body<R>(&self, f: impl FnOnce(&[Production<K>]) -> R) -> R {
        match self.definition() {
            Some(rule) => f(rule.body()),
            None => f(&[]),
        }
    }
}

impl<K: TokenKind> fmt::Debug for Reference<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("name", &self.name)
            .field("occurrence", &self.occurrence)
            .field("args", &self.args)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OptionalProd<K: TokenKind> {
    pub body: Vec<Production<K>>,
    pub occurrence: u32,
    pub guard: Option<Guard<K>>,
}

/// Body of a `ZeroOrMore` or `OneOrMore`.
#[derive(Debug, Clone)]
pub struct Repetition<K: TokenKind> {
    pub body: Vec<Production<K>>,
    pub occurrence: u32,
    /// Token required between iterations.
    pub separator: Option<K>,
    pub guard: Option<Guard<K>>,
    /// Human readable description used in error messages.
    pub label: Option<CompactString>,
}

/// One branch of an alternation: an implicit sequence with an optional guard.
#[derive(Debug, Clone)]
pub struct Branch<K: TokenKind> {
    pub sequence: Vec<Production<K>>,
    pub guard: Option<Guard<K>>,
}

impl<K: TokenKind> Branch<K> {
    pub fn new(sequence: impl IntoIterator<Item = Production<K>>) -> Self {
        Self {
            sequence: sequence.into_iter().collect(),
            guard: None,
        }
    }

    /// A branch selected when `predicate` holds, regardless of lookahead.
    pub fn when(
        predicate: impl Fn(&crate::grammar::GuardContext<'_, K>) -> bool + Send + Sync + 'static,
        sequence: impl IntoIterator<Item = Production<K>>,
    ) -> Self {
        Self::guarded(Guard::when(predicate), sequence)
    }

    pub fn guarded(guard: Guard<K>, sequence: impl IntoIterator<Item = Production<K>>) -> Self {
        Self {
            sequence: sequence.into_iter().collect(),
            guard: Some(guard),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alternation<K: TokenKind> {
    pub branches: Vec<Branch<K>>,
    pub occurrence: u32,
    /// Resolve lookahead conflicts silently in declaration order.
    pub ignore_ambiguities: bool,
    pub label: Option<CompactString>,
}

impl<K: TokenKind> Alternation<K> {
    /// Whether branches are chosen by explicit guards instead of lookahead.
    #[must_use]
    pub fn is_guarded(&self) -> bool {
        self.branches.first().is_some_and(|branch| branch.guard.is_some())
    }
}

/// A node of a rule body.
///
/// # Example
///
/// ```rust
/// use cairn::grammar::{Branch, Production};
/// # use cairn::syntax::TokenKind;
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Ident, Dot, Number, Eof }
/// # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
///
/// // qualifiedName: Ident (Dot Ident)*
/// let body = vec![
///     Production::token(Kind::Ident),
///     Production::star([Production::token(Kind::Dot), Production::token(Kind::Ident).at(2)]),
/// ];
///
/// // operand: qualifiedName | Number
/// let operand = Production::choice([
///     Branch::new([Production::rule("qualifiedName")]),
///     Branch::new([Production::token(Kind::Number)]),
/// ]);
/// # let _ = (body, operand);
/// ```
#[derive(Debug, Clone)]
pub enum Production<K: TokenKind> {
    Terminal(Terminal<K>),
    Reference(Reference<K>),
    Sequence(Vec<Production<K>>),
    Optional(OptionalProd<K>),
    ZeroOrMore(Repetition<K>),
    OneOrMore(Repetition<K>),
    Alternation(Alternation<K>),
}

fn repetition<K: TokenKind>(
    body: impl IntoIterator<Item = Production<K>>,
    separator: Option<K>,
) -> Repetition<K> {
    Repetition {
        body: body.into_iter().collect(),
        occurrence: 0,
        separator,
        guard: None,
        label: None,
    }
}

impl<K: TokenKind> Production<K> {
    /// Consume one token of `kind` (or of a descendant kind).
    #[must_use]
    pub const fn token(kind: K) -> Self {
        Self::Terminal(Terminal {
            kind,
            occurrence: 0,
        })
    }

    /// Call the rule named `name`.
    pub fn rule(name: impl Into<CompactString>) -> Self {
        Self::Reference(Reference::new(name))
    }

    /// Call the rule named `name` with arguments.
    pub fn rule_with(name: impl Into<CompactString>, args: CallArgs<K>) -> Self {
        let mut reference = Reference::new(name);
        reference.args = args;
        Self::Reference(reference)
    }

    pub fn seq(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Sequence(items.into_iter().collect())
    }

    pub fn opt(body: impl IntoIterator<Item = Self>) -> Self {
        Self::Optional(OptionalProd {
            body: body.into_iter().collect(),
            occurrence: 0,
            guard: None,
        })
    }

    /// Zero or more repetitions of `body`.
    pub fn star(body: impl IntoIterator<Item = Self>) -> Self {
        Self::ZeroOrMore(repetition(body, None))
    }

    /// One or more repetitions of `body`.
    pub fn plus(body: impl IntoIterator<Item = Self>) -> Self {
        Self::OneOrMore(repetition(body, None))
    }

    /// Zero or more repetitions of `body` separated by `separator`.
    pub fn star_sep(separator: K, body: impl IntoIterator<Item = Self>) -> Self {
        Self::ZeroOrMore(repetition(body, Some(separator)))
    }

    /// One or more repetitions of `body` separated by `separator`.
    pub fn plus_sep(separator: K, body: impl IntoIterator<Item = Self>) -> Self {
        Self::OneOrMore(repetition(body, Some(separator)))
    }

    pub fn choice(branches: impl IntoIterator<Item = Branch<K>>) -> Self {
        Self::Alternation(Alternation {
            branches: branches.into_iter().collect(),
            occurrence: 0,
            ignore_ambiguities: false,
            label: None,
        })
    }

    /// Set an explicit occurrence index. No effect on sequences.
    #[must_use]
    pub fn at(mut self, occurrence: u32) -> Self {
        if let Some(slot) = self.occurrence_mut() {
            *slot = occurrence;
        }
        self
    }

    /// Attach an explicit guard to an optional or a repetition, replacing its
    /// computed lookahead. No effect on other productions.
    #[must_use]
    pub fn gated(mut self, gate: Guard<K>) -> Self {
        match &mut self {
            Self::Optional(opt) => opt.guard = Some(gate),
            Self::ZeroOrMore(rep) | Self::OneOrMore(rep) => rep.guard = Some(gate),
            _ => {}
        }
        self
    }

    /// Shorthand for [`Production::gated`] with a plain predicate.
    #[must_use]
    pub fn when(
        self,
        predicate: impl Fn(&crate::grammar::GuardContext<'_, K>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.gated(Guard::when(predicate))
    }

    /// Describe a repetition or alternation for error messages.
    #[must_use]
    pub fn label(mut self, text: impl Into<CompactString>) -> Self {
        match &mut self {
            Self::ZeroOrMore(rep) | Self::OneOrMore(rep) => rep.label = Some(text.into()),
            Self::Alternation(alt) => alt.label = Some(text.into()),
            _ => {}
        }
        self
    }

    /// Let an alternation resolve lookahead conflicts in declaration order
    /// instead of reporting them.
    #[must_use]
    pub fn ignore_ambiguities(mut self) -> Self {
        if let Self::Alternation(alt) = &mut self {
            alt.ignore_ambiguities = true;
        }
        self
    }

    #[must_use]
    pub const fn occurrence(&self) -> Option<u32> {
        match self {
            Self::Terminal(t) => Some(t.occurrence),
            Self::Reference(r) => Some(r.occurrence),
            Self::Optional(o) => Some(o.occurrence),
            Self::ZeroOrMore(r) | Self::OneOrMore(r) => Some(r.occurrence),
            Self::Alternation(a) => Some(a.occurrence),
            Self::Sequence(_) => None,
        }
    }

    pub(crate) fn occurrence_mut(&mut self) -> Option<&mut u32> {
        match self {
            Self::Terminal(t) => Some(&mut t.occurrence),
            Self::Reference(r) => Some(&mut r.occurrence),
            Self::Optional(o) => Some(&mut o.occurrence),
            Self::ZeroOrMore(r) | Self::OneOrMore(r) => Some(&mut r.occurrence),
            Self::Alternation(a) => Some(&mut a.occurrence),
            Self::Sequence(_) => None,
        }
    }

    /// Decision kind for optionals, repetitions and alternations.
    #[must_use]
    pub const fn decision_kind(&self) -> Option<DecisionKind> {
        match self {
            Self::Optional(_) => Some(DecisionKind::Optional),
            Self::ZeroOrMore(_) => Some(DecisionKind::ZeroOrMore),
            Self::OneOrMore(_) => Some(DecisionKind::OneOrMore),
            Self::Alternation(_) => Some(DecisionKind::Alternation),
            Self::Terminal(_) | Self::Reference(_) | Self::Sequence(_) => None,
        }
    }

    /// Direct structural children. References report none: their body
    /// belongs to another rule.
    pub fn for_each_child(&self, mut f: impl FnMut(&Self)) {
        match self {
            Self::Terminal(_) | Self::Reference(_) => {}
            Self::Sequence(items) => items.iter().for_each(f),
            Self::Optional(opt) => opt.body.iter().for_each(f),
            Self::ZeroOrMore(rep) | Self::OneOrMore(rep) => rep.body.iter().for_each(f),
            Self::Alternation(alt) => {
                for branch in &alt.branches {
                    branch.sequence.iter().for_each(&mut f);
                }
            }
        }
    }

    pub(crate) fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut Self)) {
        match self {
            Self::Terminal(_) | Self::Reference(_) => {}
            Self::Sequence(items) => items.iter_mut().for_each(f),
            Self::Optional(opt) => opt.body.iter_mut().for_each(f),
            Self::ZeroOrMore(rep) | Self::OneOrMore(rep) => rep.body.iter_mut().for_each(f),
            Self::Alternation(alt) => {
                for branch in &mut alt.branches {
                    branch.sequence.iter_mut().for_each(&mut f);
                }
            }
        }
    }

    /// Explicit guards attached directly to this production or to its
    /// alternation branches.
    pub fn guards(&self) -> impl Iterator<Item = &Guard<K>> + '_ {
        let (own, branches): (Option<&Guard<K>>, &[Branch<K>]) = match self {
            Self::Optional(opt) => (opt.guard.as_ref(), &[]),
            Self::ZeroOrMore(rep) | Self::OneOrMore(rep) => (rep.guard.as_ref(), &[]),
            Self::Alternation(alt) => (None, &alt.branches),
            Self::Terminal(_) | Self::Reference(_) | Self::Sequence(_) => (None, &[]),
        };
        own.into_iter()
            .chain(branches.iter().filter_map(|branch| branch.guard.as_ref()))
    }

    /// Pre-order traversal of this production and everything nested in it,
    /// without crossing into referenced rules.
    pub fn visit(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        self.for_each_child(|child| child.visit(f));
    }

    /// Short description used in grammar error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Terminal(t) => format!("Consume({:?})", t.kind),
            Self::Reference(r) => format!("Call({})", r.name),
            Self::Sequence(_) => "Sequence".to_string(),
            Self::Optional(_) => "Optional".to_string(),
            Self::ZeroOrMore(_) => "ZeroOrMore".to_string(),
            Self::OneOrMore(_) => "OneOrMore".to_string(),
            Self::Alternation(_) => "Alternation".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        A,
        B,
        Comma,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    #[test]
    fn test_at_sets_occurrence() {
        let prod: Production<TestKind> = Production::token(TestKind::A).at(3);
        assert_eq!(prod.occurrence(), Some(3));
        let seq: Production<TestKind> = Production::seq([]).at(3);
        assert_eq!(seq.occurrence(), None);
    }

    #[test]
    fn test_visit_is_preorder_and_stays_in_rule() {
        let prod = Production::seq([
            Production::token(TestKind::A),
            Production::star_sep(TestKind::Comma, [Production::rule("item")]),
            Production::choice([
                Branch::new([Production::token(TestKind::B)]),
                Branch::new([]),
            ]),
        ]);
        let mut seen = Vec::new();
        prod.visit(&mut |p| seen.push(p.describe()));
        assert_eq!(
            seen,
            vec![
                "Sequence",
                "Consume(A)",
                "ZeroOrMore",
                "Call(item)",
                "Alternation",
                "Consume(B)"
            ]
        );
    }

    #[test]
    fn test_unresolved_reference_has_empty_body() {
        let reference: Reference<TestKind> = Reference::new("missing");
        assert!(!reference.is_resolved());
        assert_eq!(reference.with_body(<[_]>::len), 0);
    }

    #[test]
    fn test_modifiers_only_touch_matching_variants() {
        let alt: Production<TestKind> = Production::choice([Branch::new([])])
            .ignore_ambiguities()
            .label("an item");
        match alt {
            Production::Alternation(a) => {
                assert!(a.ignore_ambiguities);
                assert_eq!(a.label.as_deref(), Some("an item"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let rep = Production::plus([Production::token(TestKind::A)]).when(|cx| cx.la_kind(1) == TestKind::A);
        assert!(matches!(rep, Production::OneOrMore(ref r) if r.guard.is_some()));
    }
}
