use crate::grammar::{Production, Rule};
use crate::syntax::TokenKind;
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::sync::Arc;

/// The rules of a grammar in declaration order, indexed by name.
///
/// This is the owning side of the rule graph: references between rules only
/// hold weak handles into it.
#[derive(Debug)]
pub struct RuleSet<K: TokenKind> {
    rules: Vec<Arc<Rule<K>>>,
    index: HashMap<CompactString, usize, RandomState>,
}

impl<K: TokenKind> RuleSet<K> {
    /// Index `rules` by name. Later duplicates are ignored.
    #[must_use]
    pub fn new(rules: Vec<Arc<Rule<K>>>) -> Self {
        let mut index = HashMap::with_capacity_and_hasher(rules.len(), RandomState::new());
        for (position, rule) in rules.iter().enumerate() {
            index
                .entry(CompactString::from(rule.name()))
                .or_insert(position);
        }
        Self { rules, index }
    }

    #[cfg(test)]
    pub(crate) fn from_bodies<'a>(
        bodies: impl IntoIterator<Item = (&'a str, Vec<Production<K>>)>,
    ) -> Self {
        Self::new(
            bodies
                .into_iter()
                .map(|(name, body)| Arc::new(Rule::new(name.into(), body, crate::grammar::RuleOptions::new())))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Rule<K>>> {
        self.index.get(name).map(|&position| &self.rules[position])
    }

    /// Body of the rule named `name`; empty for unknown names.
    #[must_use]
    pub fn body(&self, name: &str) -> &[Production<K>] {
        self.get(name).map_or(&[], |rule| rule.body())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Rule<K>>> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Attach every reference to its target rule and report names that do
    /// not resolve, including rules named by backtracking guards.
    pub(crate) fn resolve(&self) -> Vec<crate::error::GrammarError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            for prod in rule.body() {
                prod.visit(&mut |p| {
                    if let Production::Reference(reference) = p {
                        match self.get(&reference.name) {
                            Some(target) => reference.resolve(target),
                            None => errors.push(unresolved(rule.name(), &reference.name)),
                        }
                    }
                    for guard in p.guards() {
                        if let Some(target) = guard.backtrack_rule()
                            && !self.contains(target)
                        {
                            errors.push(unresolved(rule.name(), target));
                        }
                    }
                });
            }
        }
        errors
    }
}

fn unresolved(rule: &str, reference: &str) -> crate::error::GrammarError {
    crate::error::GrammarError::UnresolvedReference {
        rule: rule.to_string(),
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarError;
    use crate::grammar::{Branch, Guard};

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

    #[test]
    fn test_resolve_attaches_weak_handles() {
        let rules = RuleSet::from_bodies([
            ("start", vec![Production::rule("item"), Production::rule("missing")]),
            ("item", vec![Production::token(TestKind::A)]),
        ]);
        let errors = rules.resolve();
        assert_eq!(
            errors,
            vec![GrammarError::UnresolvedReference {
                rule: "start".into(),
                reference: "missing".into(),
            }]
        );

        let body = rules.body("start");
        let Production::Reference(item) = &body[0] else {
            panic!("expected a reference");
        };
        assert!(item.is_resolved());
        assert_eq!(item.definition().map(|r| r.name().to_string()), Some("item".into()));
        let Production::Reference(missing) = &body[1] else {
            panic!("expected a reference");
        };
        assert!(!missing.is_resolved());
    }

    #[test]
    fn test_backtrack_guard_targets_are_checked() {
        let rules = RuleSet::from_bodies([(
            "start",
            vec![Production::choice([
                Branch::guarded(Guard::backtrack("ghost"), [Production::token(TestKind::A)]),
                Branch::guarded(Guard::when(|_| true), []),
            ])],
        )]);
        assert_eq!(
            rules.resolve(),
            vec![GrammarError::UnresolvedReference {
                rule: "start".into(),
                reference: "ghost".into(),
            }]
        );
    }

    #[test]
    fn test_duplicates_keep_first_definition() {
        let rules = RuleSet::from_bodies([
            ("a", vec![Production::token(TestKind::A)]),
            ("a", vec![]),
        ]);
        assert_eq!(rules.get("a").map(|r| r.body().len()), Some(1));
        assert_eq!(rules.len(), 2);
        assert!(rules.body("nope").is_empty());
    }
}
