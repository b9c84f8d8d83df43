//! Positions inside a grammar and the tokens valid there.

use crate::error::ParseFault;
use crate::grammar::{
    DecisionKind, FirstSets, Production, RestItem, RestWalker, RuleSet, TokenSet, concat_rest,
    walk_rest,
};
use crate::syntax::TokenKind;
use compact_str::CompactString;
use std::ops::ControlFlow;

/// One exact descent position: the chain of rule calls from a start rule,
/// optionally followed by the last token consumed in the innermost rule.
///
/// `occurrence_stack[i]` is the occurrence of the call that entered
/// `rule_stack[i]`; the entry for the start rule is ignored.
///
/// # Example
///
/// ```rust
/// use cairn::grammar::GrammarPath;
/// # use cairn::syntax::TokenKind;
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Colon, Eof }
/// # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
///
/// // json > object > objectItem, right after the first Colon
/// let path = GrammarPath::new("json")
///     .enter("object", 1)
///     .enter("objectItem", 1)
///     .after_token(Kind::Colon, 1);
/// assert_eq!(path.rule_stack.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarPath<K: TokenKind> {
    pub rule_stack: Vec<CompactString>,
    pub occurrence_stack: Vec<u32>,
    pub last_token: Option<(K, u32)>,
}

impl<K: TokenKind> GrammarPath<K> {
    #[must_use]
    pub fn new(start: impl Into<CompactString>) -> Self {
        Self {
            rule_stack: vec![start.into()],
            occurrence_stack: vec![1],
            last_token: None,
        }
    }

    /// Descend into the call of `rule` at `occurrence` in the current
    /// innermost rule.
    #[must_use]
    pub fn enter(mut self, rule: impl Into<CompactString>, occurrence: u32) -> Self {
        self.rule_stack.push(rule.into());
        self.occurrence_stack.push(occurrence);
        self
    }

    /// Mark the position right after the terminal `kind` at `occurrence` in
    /// the innermost rule.
    #[must_use]
    pub const fn after_token(mut self, kind: K, occurrence: u32) -> Self {
        self.last_token = Some((kind, occurrence));
        self
    }
}

/// What the walk looks for once the end of the rule chain is reached.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PathTarget<K> {
    /// The start of the innermost rule.
    Start,
    /// Right after a terminal occurrence.
    AfterToken(K, u32),
    /// The first tokens inside a decision production.
    Inside(DecisionKind, u32),
}

/// Tokens valid at a path position, and whether the whole rest of the path
/// can be skipped (the position may be followed by end of input).
#[derive(Debug, Clone)]
pub(crate) struct PathTokens<K: TokenKind> {
    pub tokens: TokenSet<K>,
    pub reaches_end: bool,
}

/// Follows a rule chain down from its start rule, accumulating the rest of
/// every enclosing rule on the way.
struct PathWalker<'p, K: TokenKind> {
    rules: &'p RuleSet<K>,
    first: &'p FirstSets<K>,
    /// Calls still to descend into, outermost first.
    pending: Vec<(&'p str, u32)>,
    target: PathTarget<K>,
    found: Option<PathTokens<K>>,
}

impl<'p, K: TokenKind> PathWalker<'p, K> {
    fn finish(&mut self, rest: &[RestItem<'p, K>]) -> ControlFlow<(), bool> {
        let (tokens, reaches_end) = self.first.first_of_rest(rest);
        self.found = Some(PathTokens {
            tokens,
            reaches_end,
        });
        ControlFlow::Break(())
    }

    fn descend(&mut self, body: &'p [Production<K>], rest: &[RestItem<'p, K>]) -> ControlFlow<()> {
        if self.pending.is_empty() && matches!(self.target, PathTarget::Start) {
            let mut full: Vec<_> = body.iter().map(RestItem::Production).collect();
            full.extend_from_slice(rest);
            self.finish(&full)?;
        }
        walk_rest(self, body, rest)
    }
}

impl<'p, K: TokenKind> RestWalker<'p, K> for PathWalker<'p, K> {
    fn enter(
        &mut self,
        prod: &'p Production<K>,
        curr_rest: &'p [Production<K>],
        prev_rest: &[RestItem<'p, K>],
    ) -> ControlFlow<(), bool> {
        let Some(&(next_rule, next_occurrence)) = self.pending.first() else {
            return match (prod, self.target) {
                (Production::Terminal(t), PathTarget::AfterToken(kind, occurrence))
                    if t.kind == kind && t.occurrence == occurrence =>
                {
                    self.finish(&concat_rest(curr_rest, prev_rest))
                }
                (_, PathTarget::Inside(kind, occurrence))
                    if prod.decision_kind() == Some(kind)
                        && prod.occurrence() == Some(occurrence) =>
                {
                    let mut tokens = TokenSet::new();
                    let mut reaches_end = false;
                    match prod {
                        Production::Optional(opt) => {
                            let (first, nullable) = self.first.first_of_sequence(&opt.body);
                            tokens = first;
                            reaches_end = nullable;
                        }
                        Production::ZeroOrMore(rep) | Production::OneOrMore(rep) => {
                            let (first, nullable) = self.first.first_of_sequence(&rep.body);
                            tokens = first;
                            reaches_end = nullable;
                        }
                        Production::Alternation(alt) => {
                            for branch in &alt.branches {
                                let (first, nullable) =
                                    self.first.first_of_sequence(&branch.sequence);
                                tokens.extend(&first);
                                reaches_end |= nullable;
                            }
                        }
                        Production::Terminal(_)
                        | Production::Reference(_)
                        | Production::Sequence(_) => {}
                    }
                    self.found = Some(PathTokens {
                        tokens,
                        reaches_end,
                    });
                    ControlFlow::Break(())
                }
                _ => ControlFlow::Continue(true),
            };
        };

        if let Production::Reference(reference) = prod
            && reference.name == next_rule
            && reference.occurrence == next_occurrence
        {
            self.pending.remove(0);
            let rest = concat_rest(curr_rest, prev_rest);
            self.descend(self.rules.body(&reference.name), &rest)?;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(true)
    }
}

/// Walk `path` from its start rule and collect the tokens valid at `target`.
///
/// Returns an empty set when the path does not describe a position of the
/// grammar.
pub(crate) fn tokens_at<'p, K: TokenKind>(
    rules: &'p RuleSet<K>,
    first: &'p FirstSets<K>,
    start: &str,
    calls: impl IntoIterator<Item = (&'p str, u32)>,
    target: PathTarget<K>,
) -> Result<PathTokens<K>, ParseFault> {
    let root = rules
        .get(start)
        .ok_or_else(|| ParseFault::UnknownRule(start.into()))?;
    let pending: Vec<_> = calls.into_iter().collect();
    if let Some(&(unknown, _)) = pending.iter().find(|(name, _)| !rules.contains(name)) {
        return Err(ParseFault::UnknownRule(unknown.into()));
    }
    let mut walker = PathWalker {
        rules,
        first,
        pending,
        target,
        found: None,
    };
    let _ = walker.descend(root.body(), &[]);
    Ok(walker.found.unwrap_or(PathTokens {
        tokens: TokenSet::new(),
        reaches_end: false,
    }))
}

/// Resolve a public [`GrammarPath`] query.
pub(crate) fn query<K: TokenKind>(
    rules: &RuleSet<K>,
    first: &FirstSets<K>,
    path: &GrammarPath<K>,
    inside: Option<(DecisionKind, u32)>,
) -> Result<TokenSet<K>, ParseFault> {
    let (start, calls) = path.rule_stack.split_first().ok_or(ParseFault::EmptyPath)?;
    let calls = calls
        .iter()
        .map(CompactString::as_str)
        .zip(path.occurrence_stack.iter().skip(1).copied());
    let target = match (inside, path.last_token) {
        (Some((kind, occurrence)), _) => PathTarget::Inside(kind, occurrence),
        (None, Some((kind, occurrence))) => PathTarget::AfterToken(kind, occurrence),
        (None, None) => PathTarget::Start,
    };
    let found = tokens_at(rules, first, start, calls, target)?;
    let mut tokens = found.tokens;
    if found.reaches_end && inside.is_none() {
        tokens.insert(K::eof());
    }
    Ok(tokens)
}
