//! # Lookahead
//!
//! Decision tables computed once from the grammar shape.
//!
//! Every optional, repetition and alternation gets a [`Decision`] keyed by
//! its kind, occurrence and enclosing rule. Alternations compare the token
//! paths of their branches; optionals and repetitions compare the paths
//! into their body against the paths of whatever follows them in the rule.
//! Paths start one token long and are extended only where needed to tell
//! the alternatives apart, up to the configured bound.
//!
//! Alternations whose branches still share a path at the bound are reported
//! as ambiguous, unless they are guarded or explicitly marked to resolve
//! conflicts in declaration order.

mod paths;
mod table;

pub use table::PathTable;

use crate::error::GrammarError;
use crate::grammar::{
    AnalysisConfig, DecisionKind, FirstSets, Production, RestItem, RestWalker, RuleSet, concat_rest,
    walk_rest,
};
use crate::lexer::TokenCursor;
use crate::syntax::TokenKind;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use paths::{Item, PathEnumerator, stack};
use smallvec::SmallVec;
use std::fmt;
use std::ops::ControlFlow;

/// A sequence of upcoming token kinds.
pub type LookaheadPath<K> = SmallVec<[K; 4]>;

/// Identifies one decision production of the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookaheadKey {
    pub kind: DecisionKind,
    pub occurrence: u32,
    pub rule: CompactString,
}

impl LookaheadKey {
    pub fn new(kind: DecisionKind, occurrence: u32, rule: impl Into<CompactString>) -> Self {
        Self {
            kind,
            occurrence,
            rule: rule.into(),
        }
    }
}

impl fmt::Display for LookaheadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} in {}", self.kind, self.occurrence, self.rule)
    }
}

/// What immediately follows a repetition inside its own rule body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTerminal<K> {
    Token { kind: K, occurrence: u32 },
    /// The repetition is the last thing in the rule.
    EndOfRule,
    /// Something other than a plain terminal comes next.
    Other,
}

/// The lookahead decision of one production.
#[derive(Debug, Clone)]
pub struct Decision<K: TokenKind> {
    kind: DecisionKind,
    paths: Vec<Vec<LookaheadPath<K>>>,
    table: PathTable<K>,
    next_terminal: Option<NextTerminal<K>>,
}

impl<K: TokenKind> Decision<K> {
    #[must_use]
    pub const fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Lookahead paths per alternative. Optionals and repetitions have a
    /// single entry: the paths that enter their body.
    #[must_use]
    pub fn paths(&self) -> &[Vec<LookaheadPath<K>>] {
        &self.paths
    }

    #[must_use]
    pub const fn table(&self) -> &PathTable<K> {
        &self.table
    }

    #[must_use]
    pub fn select(&self, cursor: &TokenCursor<K>) -> Option<usize> {
        self.table.select(cursor)
    }

    /// For optionals and repetitions: whether the body should be entered.
    #[must_use]
    pub fn accepts(&self, cursor: &TokenCursor<K>) -> bool {
        self.table.accepts(cursor)
    }

    /// Every path of every alternative, in declaration order, for error
    /// messages.
    #[must_use]
    pub fn expected(&self) -> Vec<Vec<K>> {
        let mut out: Vec<Vec<K>> = Vec::new();
        for path in self.paths.iter().flatten() {
            if !out.iter().any(|known| known.as_slice() == path.as_slice()) {
                out.push(path.to_vec());
            }
        }
        out
    }

    /// Terminal right after a repetition in its rule; `None` for optionals
    /// and alternations.
    #[must_use]
    pub const fn next_terminal(&self) -> Option<NextTerminal<K>> {
        self.next_terminal
    }
}

pub(crate) type RuleDecisions<K> = HashMap<(DecisionKind, u32), Decision<K>, RandomState>;
pub(crate) type DecisionTable<K> = HashMap<CompactString, RuleDecisions<K>, RandomState>;

struct DecisionSite<'g, K: TokenKind> {
    prod: &'g Production<K>,
    rest: Vec<RestItem<'g, K>>,
}

/// Collects every decision production of a rule body with its in-rule rest.
struct DecisionCollector<'g, K: TokenKind> {
    sites: Vec<DecisionSite<'g, K>>,
}

impl<'g, K: TokenKind> RestWalker<'g, K> for DecisionCollector<'g, K> {
    fn enter(
        &mut self,
        prod: &'g Production<K>,
        curr_rest: &'g [Production<K>],
        prev_rest: &[RestItem<'g, K>],
    ) -> ControlFlow<(), bool> {
        if prod.decision_kind().is_some() {
            self.sites.push(DecisionSite {
                prod,
                rest: concat_rest(curr_rest, prev_rest),
            });
        }
        ControlFlow::Continue(true)
    }
}

fn next_terminal<K: TokenKind>(rest: &[RestItem<'_, K>]) -> NextTerminal<K> {
    match rest.first() {
        None => NextTerminal::EndOfRule,
        Some(RestItem::Production(Production::Terminal(terminal))) => NextTerminal::Token {
            kind: terminal.kind,
            occurrence: terminal.occurrence,
        },
        Some(_) => NextTerminal::Other,
    }
}

/// Build the decision of every production of every rule, reporting
/// structural problems and ambiguities into `errors`.
pub(crate) fn synthesize<K: TokenKind>(
    rules: &RuleSet<K>,
    first: &FirstSets<K>,
    config: &AnalysisConfig,
    errors: &mut Vec<GrammarError>,
) -> DecisionTable<K> {
    let enumerator = PathEnumerator::new(rules, config.path_depth_limit);
    let mut table = DecisionTable::default();
    for rule in rules.iter() {
        let mut collector = DecisionCollector { sites: Vec::new() };
        let _ = walk_rest(&mut collector, rule.body(), &[]);

        let mut decisions = RuleDecisions::default();
        for site in collector.sites {
            let (Some(kind), Some(occurrence)) = (site.prod.decision_kind(), site.prod.occurrence())
            else {
                continue;
            };
            let after = || stack(site.rest.iter().copied().map(Item::from));
            let decision = match site.prod {
                Production::Alternation(alt) => {
                    let guarded = alt.is_guarded();
                    let last = alt.branches.len().saturating_sub(1);
                    for (index, branch) in alt.branches.iter().enumerate() {
                        if !guarded && index < last && first.first_of_sequence(&branch.sequence).1 {
                            errors.push(GrammarError::EmptyBranchNotLast {
                                rule: rule.name().to_string(),
                                occurrence,
                                branch: index,
                            });
                        }
                    }
                    let paths = enumerator.sequences(
                        alt.branches
                            .iter()
                            .map(|branch| vec![Item::Seq(branch.sequence.as_slice())])
                            .collect(),
                        config.max_lookahead,
                    );
                    if !guarded && !alt.ignore_ambiguities {
                        for (branches, path) in find_ambiguities(&paths) {
                            errors.push(GrammarError::AmbiguousAlternatives {
                                rule: rule.name().to_string(),
                                occurrence,
                                branches,
                                path: format!("{:?}", path.as_slice()),
                            });
                        }
                    }
                    Decision {
                        kind,
                        table: PathTable::build(&paths),
                        paths,
                        next_terminal: None,
                    }
                }
                Production::Optional(opt) => {
                    let mut paths = enumerator.sequences(
                        vec![vec![Item::Seq(opt.body.as_slice())], after()],
                        config.max_lookahead,
                    );
                    paths.truncate(1);
                    Decision {
                        kind,
                        table: PathTable::build(&paths),
                        paths,
                        next_terminal: None,
                    }
                }
                Production::ZeroOrMore(rep) | Production::OneOrMore(rep) => {
                    if first.first_of_sequence(&rep.body).0.is_empty() {
                        errors.push(GrammarError::NoConsumingPath {
                            rule: rule.name().to_string(),
                            production: site.prod.describe(),
                            occurrence,
                        });
                    }
                    let mut paths = enumerator.sequences(
                        vec![vec![Item::Seq(rep.body.as_slice())], after()],
                        config.max_lookahead,
                    );
                    paths.truncate(1);
                    Decision {
                        kind,
                        table: PathTable::build(&paths),
                        paths,
                        next_terminal: Some(next_terminal(&site.rest)),
                    }
                }
                Production::Terminal(_) | Production::Reference(_) | Production::Sequence(_) => {
                    continue;
                }
            };
            decisions.insert((kind, occurrence), decision);
        }
        table.insert(CompactString::from(rule.name()), decisions);
    }
    table
}

/// Paths shared by several alternatives, and paths of an earlier
/// alternative that are a strict prefix of a later one's (the later
/// alternative could then never be chosen on that input).
fn find_ambiguities<K: TokenKind>(alternatives: &[Vec<LookaheadPath<K>>]) -> Vec<(Vec<usize>, LookaheadPath<K>)> {
    let mut found: Vec<(Vec<usize>, LookaheadPath<K>)> = Vec::new();
    for (alt, paths) in alternatives.iter().enumerate() {
        for path in paths {
            if found.iter().any(|(_, known)| known == path) {
                continue;
            }
            let branches: Vec<usize> = alternatives
                .iter()
                .enumerate()
                .filter(|&(other, other_paths)| other == alt || other_paths.contains(path))
                .map(|(other, _)| other)
                .collect();
            if branches.len() > 1 {
                found.push((branches, path.clone()));
            }
        }
    }

    for (target, paths) in alternatives.iter().enumerate() {
        for path in paths {
            for (earlier, earlier_paths) in alternatives.iter().enumerate().take(target) {
                for prefix in earlier_paths {
                    let shadows = !prefix.is_empty()
                        && prefix.len() < path.len()
                        && prefix.iter().zip(path.iter()).all(|(&p, &t)| t.is_a(p));
                    if shadows {
                        found.push((vec![earlier, target], prefix.clone()));
                    }
                }
            }
        }
    }
    found
}
