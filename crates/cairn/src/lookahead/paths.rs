//! Enumeration of bounded lookahead paths.
//!
//! Every alternative starts as a stack of grammar items still to be
//! matched. Paths are grown one token length at a time; a path stops growing
//! as soon as its prefix is unique among the alternatives, its items run
//! out, or it reaches the lookahead bound.

use crate::grammar::{Production, Repetition, RestItem, RuleSet};
use crate::lookahead::LookaheadPath;
use crate::syntax::TokenKind;
use smallvec::SmallVec;

#[derive(Debug)]
pub(crate) enum Item<'g, K: TokenKind> {
    Prod(&'g Production<K>),
    Seq(&'g [Production<K>]),
    Token(K),
    /// End of the body of the innermost open rule.
    Leave,
    /// A further iteration of `rep`. Not offered when the prefix has not
    /// grown since `mark`, so empty iterations cannot loop.
    Again {
        rep: &'g Repetition<K>,
        mark: Option<usize>,
    },
}

impl<K: TokenKind> Clone for Item<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: TokenKind> Copy for Item<'_, K> {}

impl<'g, K: TokenKind> From<RestItem<'g, K>> for Item<'g, K> {
    fn from(item: RestItem<'g, K>) -> Self {
        match item {
            RestItem::Production(prod) => Self::Prod(prod),
            RestItem::Again(rep) => Self::Again { rep, mark: None },
        }
    }
}

/// Items in match order, turned into a stack (next item last).
pub(crate) fn stack<'g, K: TokenKind>(items: impl DoubleEndedIterator<Item = Item<'g, K>>) -> Vec<Item<'g, K>> {
    items.rev().collect()
}

#[derive(Debug, Clone)]
struct PartialPath<'g, K: TokenKind> {
    prefix: LookaheadPath<K>,
    suffix: Vec<Item<'g, K>>,
    /// Rules whose bodies are being expanded, with the prefix length at
    /// which each was entered.
    open: SmallVec<[(&'g str, usize); 4]>,
    /// Rule expansions left before the next token must appear.
    fuel: usize,
}

pub(crate) struct PathEnumerator<'g, K: TokenKind> {
    rules: &'g RuleSet<K>,
    fuel: usize,
}

impl<'g, K: TokenKind> PathEnumerator<'g, K> {
    pub(crate) const fn new(rules: &'g RuleSet<K>, fuel: usize) -> Self {
        Self { rules, fuel }
    }

    /// Lookahead paths of at most `k` tokens telling the alternatives apart.
    ///
    /// Each alternative is given as an item stack. The result holds the
    /// final paths per alternative, in discovery order and without
    /// duplicates.
    pub(crate) fn sequences(&self, alternatives: Vec<Vec<Item<'g, K>>>, k: usize) -> Vec<Vec<LookaheadPath<K>>> {
        let k = k.max(1);
        let mut current: Vec<Vec<PartialPath<'g, K>>> = alternatives
            .into_iter()
            .map(|suffix| {
                let mut out = Vec::new();
                self.expand(
                    PartialPath {
                        prefix: LookaheadPath::new(),
                        suffix,
                        open: SmallVec::new(),
                        fuel: self.fuel,
                    },
                    1,
                    &mut out,
                );
                out
            })
            .collect();
        let mut known: Vec<Vec<LookaheadPath<K>>> = current
            .iter()
            .map(|paths| paths.iter().map(|path| path.prefix.clone()).collect())
            .collect();
        let mut result: Vec<Vec<LookaheadPath<K>>> = vec![Vec::new(); current.len()];

        for length in 1..=k {
            let mut next: Vec<Vec<PartialPath<'g, K>>> = vec![Vec::new(); current.len()];
            for (alt, paths) in current.into_iter().enumerate() {
                for path in paths {
                    let done = path.suffix.is_empty()
                        || path.prefix.len() >= k
                        || is_unique(&known, alt, &path.prefix);
                    if done {
                        if !result[alt].contains(&path.prefix) {
                            result[alt].push(path.prefix);
                        }
                        continue;
                    }
                    let mut grown = Vec::new();
                    self.expand(path, length + 1, &mut grown);
                    for path in grown {
                        if !known[alt].contains(&path.prefix) {
                            known[alt].push(path.prefix.clone());
                        }
                        next[alt].push(path);
                    }
                }
            }
            current = next;
        }
        result
    }

    /// Grow `start` until its prefix holds `length` tokens or its items run
    /// out.
    ///
    /// Paths that keep expanding rules without ever reaching a token are
    /// dropped, and so are paths that enter a rule again at the position
    /// where it is already open. The latter only arise from left recursion,
    /// which has no finite lookahead.
    fn expand(&self, start: PartialPath<'g, K>, length: usize, out: &mut Vec<PartialPath<'g, K>>) {
        let mut work = vec![start];
        'paths: while let Some(mut path) = work.pop() {
            loop {
                if path.prefix.len() >= length {
                    out.push(path);
                    continue 'paths;
                }
                let Some(item) = path.suffix.pop() else {
                    out.push(path);
                    continue 'paths;
                };
                match item {
                    Item::Token(kind) => {
                        path.prefix.push(kind);
                        path.fuel = self.fuel;
                    }
                    Item::Seq(items) => path.suffix.extend(items.iter().rev().map(Item::Prod)),
                    Item::Leave => {
                        path.open.pop();
                    }
                    Item::Again { rep, mark } => {
                        if mark == Some(path.prefix.len()) {
                            continue;
                        }
                        let mut again = path.clone();
                        push_iteration(&mut again, rep, true);
                        // The extra iteration is explored first.
                        work.push(path);
                        work.push(again);
                        continue 'paths;
                    }
                    Item::Prod(prod) => match prod {
                        Production::Terminal(terminal) => {
                            path.prefix.push(terminal.kind);
                            path.fuel = self.fuel;
                        }
                        Production::Reference(reference) => {
                            let name = reference.name.as_str();
                            let position = path.prefix.len();
                            if path.open.contains(&(name, position)) {
                                continue 'paths;
                            }
                            let Some(fuel) = path.fuel.checked_sub(1) else {
                                continue 'paths;
                            };
                            path.fuel = fuel;
                            path.open.push((name, position));
                            path.suffix.push(Item::Leave);
                            path.suffix.push(Item::Seq(self.rules.body(name)));
                        }
                        Production::Sequence(items) => path.suffix.push(Item::Seq(items)),
                        Production::Optional(opt) => {
                            let mut taken = path.clone();
                            taken.suffix.push(Item::Seq(&opt.body));
                            work.push(path);
                            work.push(taken);
                            continue 'paths;
                        }
                        Production::ZeroOrMore(rep) => {
                            let mut taken = path.clone();
                            push_iteration(&mut taken, rep, false);
                            work.push(path);
                            work.push(taken);
                            continue 'paths;
                        }
                        Production::OneOrMore(rep) => push_iteration(&mut path, rep, false),
                        Production::Alternation(alt) => {
                            for branch in alt.branches.iter().rev() {
                                let mut taken = path.clone();
                                taken.suffix.push(Item::Seq(&branch.sequence));
                                work.push(taken);
                            }
                            continue 'paths;
                        }
                    },
                }
            }
        }
    }
}

fn push_iteration<'g, K: TokenKind>(path: &mut PartialPath<'g, K>, rep: &'g Repetition<K>, separated: bool) {
    path.suffix.push(Item::Again {
        rep,
        mark: Some(path.prefix.len()),
    });
    path.suffix.push(Item::Seq(&rep.body));
    if separated && let Some(separator) = rep.separator {
        path.suffix.push(Item::Token(separator));
    }
}

/// Whether two paths of equal length can match the same input.
pub(crate) fn overlaps<K: TokenKind>(a: &[K], b: &[K]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| x.is_a(y) || y.is_a(x))
}

fn is_unique<K: TokenKind>(known: &[Vec<LookaheadPath<K>>], alt: usize, prefix: &[K]) -> bool {
    known
        .iter()
        .enumerate()
        .filter(|&(other, _)| other != alt)
        .all(|(_, paths)| !paths.iter().any(|path| overlaps(path, prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Branch;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        A,
        B,
        C,
        Comma,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    use TestKind::*;

    fn alternatives(branches: &[Vec<Production<TestKind>>]) -> Vec<Vec<Item<'_, TestKind>>> {
        branches
            .iter()
            .map(|branch| vec![Item::Seq(branch.as_slice())])
            .collect()
    }

    fn plain(result: Vec<Vec<LookaheadPath<TestKind>>>) -> Vec<Vec<Vec<TestKind>>> {
        result
            .into_iter()
            .map(|paths| paths.into_iter().map(|p| p.to_vec()).collect())
            .collect()
    }

    #[test]
    fn test_distinct_first_tokens_stop_at_one() {
        let rules = RuleSet::from_bodies([]);
        let branches = vec![
            vec![Production::token(A), Production::token(B)],
            vec![Production::token(B)],
        ];
        let result = PathEnumerator::new(&rules, 8).sequences(alternatives(&branches), 3);
        assert_eq!(plain(result), vec![vec![vec![A]], vec![vec![B]]]);
    }

    #[test]
    fn test_shared_prefix_grows_to_discriminate() {
        let rules = RuleSet::from_bodies([("item", vec![Production::token(A), Production::token(B)])]);
        let branches = vec![
            vec![Production::rule("item"), Production::token(C)],
            vec![Production::token(A), Production::token(B), Production::token(A)],
            vec![Production::token(C)],
        ];
        let result = PathEnumerator::new(&rules, 8).sequences(alternatives(&branches), 3);
        assert_eq!(
            plain(result),
            vec![vec![vec![A, B, C]], vec![vec![A, B, A]], vec![vec![C]]]
        );
    }

    #[test]
    fn test_bound_keeps_ambiguous_prefixes() {
        let rules = RuleSet::from_bodies([]);
        let branches = vec![
            vec![Production::token(A), Production::token(B)],
            vec![Production::token(A), Production::token(C)],
        ];
        let result = PathEnumerator::new(&rules, 8).sequences(alternatives(&branches), 1);
        assert_eq!(plain(result), vec![vec![vec![A]], vec![vec![A]]]);
    }

    #[test]
    fn test_repetitions_and_empty_branches() {
        let rules = RuleSet::from_bodies([]);
        let branches = vec![
            vec![Production::plus_sep(Comma, [Production::token(A)])],
            vec![Production::token(A), Production::token(B)],
            vec![],
        ];
        let result = PathEnumerator::new(&rules, 8).sequences(alternatives(&branches), 2);
        assert_eq!(
            plain(result),
            vec![vec![vec![A, Comma], vec![A]], vec![vec![A, B]], vec![vec![]]]
        );
    }

    #[test]
    fn test_left_recursion_is_dropped_not_looped() {
        let rules = RuleSet::from_bodies([(
            "list",
            vec![Production::choice([
                Branch::new([Production::rule("list"), Production::token(A)]),
                Branch::new([Production::token(B)]),
            ])],
        )]);
        let branches = vec![vec![Production::rule("list")], vec![Production::token(C)]];
        let result = PathEnumerator::new(&rules, 4).sequences(alternatives(&branches), 2);
        assert_eq!(plain(result), vec![vec![vec![B]], vec![vec![C]]]);
    }

    #[test]
    fn test_left_recursive_branches_stay_finite() {
        // Each recursive branch used to fork once per expansion until the
        // fuel ran out.
        let rules = RuleSet::from_bodies([(
            "e",
            vec![Production::choice([
                Branch::new([Production::rule("e"), Production::token(A)]),
                Branch::new([Production::rule("e"), Production::token(B)]),
                Branch::new([Production::token(C)]),
            ])],
        )]);
        let Production::Alternation(alt) = &rules.body("e")[0] else {
            panic!("expected an alternation");
        };
        let branches = alt
            .branches
            .iter()
            .map(|branch| vec![Item::Seq(branch.sequence.as_slice())])
            .collect();
        let result = PathEnumerator::new(&rules, 64).sequences(branches, 3);
        assert_eq!(
            plain(result),
            vec![vec![vec![C, A]], vec![vec![C, B]], vec![vec![C]]]
        );
    }

    #[test]
    fn test_rule_may_repeat_once_its_body_is_done() {
        // `word` is entered twice before any token, but not recursively.
        let rules = RuleSet::from_bodies([
            ("word", vec![Production::opt([Production::token(A)])]),
            ("pair", vec![Production::rule("word"), Production::rule("word").at(2), Production::token(B)]),
        ]);
        let branches = vec![vec![Production::rule("pair")], vec![Production::token(C)]];
        let result = PathEnumerator::new(&rules, 8).sequences(alternatives(&branches), 1);
        assert_eq!(plain(result), vec![vec![vec![A], vec![B]], vec![vec![C]]]);
    }

    #[test]
    fn test_overlap_uses_hierarchy_both_ways() {
        assert!(overlaps(&[A, B], &[A, B]));
        assert!(!overlaps(&[A], &[A, B]));
        assert!(!overlaps(&[A, B], &[A, C]));
    }
}
