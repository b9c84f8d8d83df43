//! FOLLOW sets per rule call site.
//!
//! For a call `callee` made from `caller`, the follow set is FIRST of what
//! comes after the call inside `caller`. When that rest can be empty the
//! follow set of `caller` itself is added, and the follow set of a rule is
//! the union over all of its call sites. The entry rule, and any rule no one
//! calls, ends at end of input. The mutual dependency is solved as a fixed
//! point.

use crate::grammar::{FirstSets, Production, RestItem, RestWalker, RuleSet, TokenSet, concat_rest, walk_rest};
use crate::syntax::TokenKind;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::fmt;
use std::ops::ControlFlow;

/// Identifies the exit boundary of one rule invocation: `rule`, called at
/// occurrence `occurrence` from inside `caller`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FollowKey {
    pub rule: CompactString,
    pub occurrence: u32,
    pub caller: CompactString,
}

impl FollowKey {
    pub fn new(
        rule: impl Into<CompactString>,
        occurrence: u32,
        caller: impl Into<CompactString>,
    ) -> Self {
        Self {
            rule: rule.into(),
            occurrence,
            caller: caller.into(),
        }
    }
}

impl fmt::Display for FollowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} in {}", self.rule, self.occurrence, self.caller)
    }
}

struct CallSite<K: TokenKind> {
    key: FollowKey,
    local: TokenSet<K>,
    reaches_end: bool,
}

/// Collects every call site of one rule with the FIRST set of its rest.
struct CallSiteCollector<'a, K: TokenKind> {
    caller: &'a str,
    first: &'a FirstSets<K>,
    sites: Vec<CallSite<K>>,
}

impl<'p, K: TokenKind> RestWalker<'p, K> for CallSiteCollector<'_, K> {
    fn enter(
        &mut self,
        prod: &'p Production<K>,
        curr_rest: &'p [Production<K>],
        prev_rest: &[RestItem<'p, K>],
    ) -> ControlFlow<(), bool> {
        if let Production::Reference(reference) = prod {
            let (local, reaches_end) = self
                .first
                .first_of_rest(&concat_rest(curr_rest, prev_rest));
            self.sites.push(CallSite {
                key: FollowKey::new(reference.name.clone(), reference.occurrence, self.caller),
                local,
                reaches_end,
            });
        }
        ControlFlow::Continue(true)
    }
}

#[derive(Debug, Clone)]
pub struct FollowTable<K: TokenKind> {
    sites: HashMap<FollowKey, TokenSet<K>, RandomState>,
    rules: HashMap<CompactString, TokenSet<K>, RandomState>,
}

impl<K: TokenKind> FollowTable<K> {
    #[must_use]
    pub fn compute(rules: &RuleSet<K>, first: &FirstSets<K>, entry: &str) -> Self {
        let mut sites = Vec::new();
        for rule in rules.iter() {
            let mut collector = CallSiteCollector {
                caller: rule.name(),
                first,
                sites: Vec::new(),
            };
            let _ = walk_rest(&mut collector, rule.body(), &[]);
            sites.append(&mut collector.sites);
        }

        let mut rule_follow: HashMap<CompactString, TokenSet<K>, RandomState> = rules
            .iter()
            .map(|rule| (CompactString::from(rule.name()), TokenSet::new()))
            .collect();
        for rule in rules.iter() {
            let called = sites.iter().any(|site| site.key.rule == rule.name());
            if (rule.name() == entry || !called)
                && let Some(follow) = rule_follow.get_mut(rule.name())
            {
                follow.insert(K::eof());
            }
        }

        loop {
            let mut changed = false;
            for site in &sites {
                let mut addition = site.local.clone();
                if site.reaches_end
                    && let Some(caller) = rule_follow.get(&site.key.caller)
                {
                    addition.extend(caller);
                }
                if let Some(follow) = rule_follow.get_mut(&site.key.rule) {
                    changed |= follow.extend(&addition);
                }
            }
            if !changed {
                break;
            }
        }

        let sites = sites
            .into_iter()
            .map(|site| {
                let mut follow = site.local;
                if site.reaches_end
                    && let Some(caller) = rule_follow.get(&site.key.caller)
                {
                    follow.extend(caller);
                }
                (site.key, follow)
            })
            .collect();

        Self {
            sites,
            rules: rule_follow,
        }
    }

    /// Follow set of one call site.
    #[must_use]
    pub fn get(&self, key: &FollowKey) -> Option<&TokenSet<K>> {
        self.sites.get(key)
    }

    /// Union of the follow sets of every call site of `rule`.
    #[must_use]
    pub fn of_rule(&self, rule: &str) -> Option<&TokenSet<K>> {
        self.rules.get(rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FollowKey, &TokenSet<K>)> {
        self.sites.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Branch;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        LCurly,
        RCurly,
        LSquare,
        RSquare,
        Comma,
        Colon,
        Str,
        Num,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    use TestKind::*;

    fn json() -> RuleSet<TestKind> {
        RuleSet::from_bodies([
            ("json", vec![Production::choice([
                Branch::new([Production::rule("object")]),
                Branch::new([Production::rule("array")]),
            ])]),
            ("object", vec![
                Production::token(LCurly),
                Production::star_sep(Comma, [Production::rule("objectItem")]),
                Production::token(RCurly),
            ]),
            ("objectItem", vec![
                Production::token(Str),
                Production::token(Colon),
                Production::rule("value"),
            ]),
            ("array", vec![
                Production::token(LSquare),
                Production::star_sep(Comma, [Production::rule("value")]),
                Production::token(RSquare),
            ]),
            ("value", vec![Production::choice([
                Branch::new([Production::token(Str)]),
                Branch::new([Production::token(Num)]),
                Branch::new([Production::rule("object")]),
                Branch::new([Production::rule("array")]),
            ])]),
        ])
    }

    fn follow(table: &FollowTable<TestKind>, rule: &str, occurrence: u32, caller: &str) -> Vec<TestKind> {
        table
            .get(&FollowKey::new(rule, occurrence, caller))
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_local_follow_inside_caller() {
        let rules = json();
        let first = FirstSets::compute(&rules);
        let table = FollowTable::compute(&rules, &first, "json");

        assert_eq!(follow(&table, "objectItem", 0, "object"), vec![Comma, RCurly]);
        assert_eq!(follow(&table, "value", 0, "array"), vec![Comma, RSquare]);
    }

    #[test]
    fn test_follow_recurses_into_caller_at_rule_end() {
        let rules = json();
        let first = FirstSets::compute(&rules);
        let table = FollowTable::compute(&rules, &first, "json");

        // `value` ends `objectItem`, so it inherits objectItem's follow.
        assert_eq!(follow(&table, "value", 0, "objectItem"), vec![Comma, RCurly]);
        // Entry rule boundary is end of input.
        assert_eq!(follow(&table, "object", 0, "json"), vec![Eof]);
        let object = table.of_rule("object").map(|s| s.iter().collect::<Vec<_>>());
        assert_eq!(object, Some(vec![Eof, Comma, RCurly, RSquare]));
        assert_eq!(
            format!("{}", FollowKey::new("value", 1, "array")),
            "value#1 in array"
        );
    }
}
