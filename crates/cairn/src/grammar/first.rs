//! FIRST sets and nullability.
//!
//! Rule-level facts are solved once as a fixed point over the whole rule set,
//! which keeps the computation finite for mutually recursive (and even left
//! recursive) rules. Production-level queries then combine those facts
//! without following references again.

use crate::grammar::{Production, RestItem, RuleSet};
use crate::syntax::TokenKind;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt;

/// A small ordered set of token kinds.
///
/// Kinds keep their insertion order, which makes error messages and test
/// expectations deterministic.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet<K: TokenKind> {
    kinds: SmallVec<[K; 8]>,
}

impl<K: TokenKind> Default for TokenSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TokenKind> TokenSet<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            kinds: SmallVec::new(),
        }
    }

    /// Insert `kind`; returns `false` if it was already present.
    pub fn insert(&mut self, kind: K) -> bool {
        if self.kinds.contains(&kind) {
            false
        } else {
            self.kinds.push(kind);
            true
        }
    }

    /// Add every kind of `other`; returns whether anything was added.
    pub fn extend(&mut self, other: &Self) -> bool {
        let mut grew = false;
        for &kind in &other.kinds {
            grew |= self.insert(kind);
        }
        grew
    }

    /// Exact membership.
    #[must_use]
    pub fn contains(&self, kind: K) -> bool {
        self.kinds.contains(&kind)
    }

    /// Whether a token of `kind` matches some member, honouring the kind
    /// hierarchy.
    #[must_use]
    pub fn matches(&self, kind: K) -> bool {
        self.kinds.iter().any(|&member| kind.is_a(member))
    }

    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.kinds.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[K] {
        &self.kinds
    }
}

impl<K: TokenKind> FromIterator<K> for TokenSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl<K: TokenKind> fmt::Debug for TokenSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds.iter()).finish()
    }
}

#[derive(Debug, Clone)]
struct RuleFirst<K: TokenKind> {
    first: TokenSet<K>,
    nullable: bool,
}

/// FIRST sets and nullability of every rule of a grammar.
#[derive(Debug, Clone)]
pub struct FirstSets<K: TokenKind> {
    rules: HashMap<CompactString, RuleFirst<K>, RandomState>,
}

impl<K: TokenKind> FirstSets<K> {
    #[must_use]
    pub fn compute(rules: &RuleSet<K>) -> Self {
        let mut sets = Self {
            rules: rules
                .iter()
                .map(|rule| {
                    (
                        CompactString::from(rule.name()),
                        RuleFirst {
                            first: TokenSet::new(),
                            nullable: false,
                        },
                    )
                })
                .collect(),
        };

        // Both components only grow, so comparing sizes detects change.
        loop {
            let mut changed = false;
            for rule in rules.iter() {
                let (first, nullable) = sets.first_of_sequence(rule.body());
                if let Some(entry) = sets.rules.get_mut(rule.name())
                    && (entry.first.len() != first.len() || entry.nullable != nullable)
                {
                    entry.first = first;
                    entry.nullable = nullable;
                    changed = true;
                }
            }
            if !changed {
                break sets;
            }
        }
    }

    /// FIRST set of the rule named `name`.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&TokenSet<K>> {
        self.rules.get(name).map(|facts| &facts.first)
    }

    /// Whether the rule can match without consuming input. Unknown names
    /// behave as empty bodies.
    #[must_use]
    pub fn is_rule_nullable(&self, name: &str) -> bool {
        self.rules.get(name).is_none_or(|facts| facts.nullable)
    }

    #[must_use]
    pub fn first_of(&self, prod: &Production<K>) -> (TokenSet<K>, bool) {
        let mut set = TokenSet::new();
        let nullable = self.collect(prod, &mut set);
        (set, nullable)
    }

    #[must_use]
    pub fn first_of_sequence(&self, items: &[Production<K>]) -> (TokenSet<K>, bool) {
        let mut set = TokenSet::new();
        let nullable = self.collect_sequence(items, &mut set);
        (set, nullable)
    }

    /// FIRST of a rest computed by a walker, and whether the whole rest can
    /// be skipped.
    #[must_use]
    pub fn first_of_rest(&self, rest: &[RestItem<'_, K>]) -> (TokenSet<K>, bool) {
        let mut set = TokenSet::new();
        for item in rest {
            let nullable = match item {
                RestItem::Production(prod) => self.collect(prod, &mut set),
                RestItem::Again(rep) => {
                    match rep.separator {
                        Some(separator) => {
                            set.insert(separator);
                        }
                        None => {
                            self.collect_sequence(&rep.body, &mut set);
                        }
                    }
                    true
                }
            };
            if !nullable {
                return (set, false);
            }
        }
        (set, true)
    }

    #[must_use]
    pub fn is_nullable(&self, prod: &Production<K>) -> bool {
        self.first_of(prod).1
    }

    fn collect(&self, prod: &Production<K>, out: &mut TokenSet<K>) -> bool {
        match prod {
            Production::Terminal(terminal) => {
                out.insert(terminal.kind);
                false
            }
            Production::Reference(reference) => match self.rules.get(reference.name.as_str()) {
                Some(facts) => {
                    out.extend(&facts.first);
                    facts.nullable
                }
                None => true,
            },
            Production::Sequence(items) => self.collect_sequence(items, out),
            Production::Optional(opt) => {
                self.collect_sequence(&opt.body, out);
                true
            }
            Production::ZeroOrMore(rep) => {
                self.collect_sequence(&rep.body, out);
                true
            }
            Production::OneOrMore(rep) => self.collect_sequence(&rep.body, out),
            Production::Alternation(alt) => {
                let mut nullable = false;
                for branch in &alt.branches {
                    nullable |= self.collect_sequence(&branch.sequence, out);
                }
                nullable
            }
        }
    }

    fn collect_sequence(&self, items: &[Production<K>], out: &mut TokenSet<K>) -> bool {
        items.iter().all(|item| self.collect(item, out))
    }
}
