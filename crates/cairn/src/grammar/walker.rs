//! Rest-of-grammar traversal.
//!
//! A [`RestWalker`] sees every production of a rule body together with
//! everything that can follow it: the remaining siblings (`curr_rest`) and
//! the rest inherited from the enclosing productions (`prev_rest`). The
//! rewrite rules are:
//!
//! - inside a sequence or an optional, the rest is `curr_rest ++ prev_rest`;
//! - inside a repetition, another iteration may come first, so the rest is
//!   `(body)? ++ curr_rest ++ prev_rest`, or `(separator body)? ++ ...` for
//!   separated repetitions;
//! - every alternation branch continues with the same rest.

use crate::grammar::{Production, Repetition};
use crate::syntax::TokenKind;
use std::ops::ControlFlow;

/// One element of a computed rest.
#[derive(Debug)]
pub enum RestItem<'p, K: TokenKind> {
    Production(&'p Production<K>),
    /// An optional further iteration of a repetition, separator included.
    Again(&'p Repetition<K>),
}

impl<K: TokenKind> Clone for RestItem<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: TokenKind> Copy for RestItem<'_, K> {}

/// Visitor over productions and their rests.
pub trait RestWalker<'p, K: TokenKind> {
    /// Called for each production in walk order. Return
    /// `Continue(true)` to descend into its nested productions,
    /// `Continue(false)` to skip them and `Break` to stop the walk.
    fn enter(
        &mut self,
        prod: &'p Production<K>,
        curr_rest: &'p [Production<K>],
        prev_rest: &[RestItem<'p, K>],
    ) -> ControlFlow<(), bool>;
}

/// Walk `body` with `prev_rest` as the inherited rest.
///
/// References are never followed here; walkers that need to cross rule
/// boundaries do so from [`RestWalker::enter`].
pub fn walk_rest<'p, K, W>(
    walker: &mut W,
    body: &'p [Production<K>],
    prev_rest: &[RestItem<'p, K>],
) -> ControlFlow<()>
where
    K: TokenKind,
    W: RestWalker<'p, K> + ?Sized,
{
    for (index, prod) in body.iter().enumerate() {
        let curr_rest = &body[index + 1..];
        if !walker.enter(prod, curr_rest, prev_rest)? {
            continue;
        }
        match prod {
            Production::Terminal(_) | Production::Reference(_) => {}
            Production::Sequence(items) => {
                walk_rest(walker, items, &concat_rest(curr_rest, prev_rest))?;
            }
            Production::Optional(opt) => {
                walk_rest(walker, &opt.body, &concat_rest(curr_rest, prev_rest))?;
            }
            Production::ZeroOrMore(rep) | Production::OneOrMore(rep) => {
                let rest = rest_after_iteration(rep, curr_rest, prev_rest);
                walk_rest(walker, &rep.body, &rest)?;
            }
            Production::Alternation(alt) => {
                let rest = concat_rest(curr_rest, prev_rest);
                for branch in &alt.branches {
                    walk_rest(walker, &branch.sequence, &rest)?;
                }
            }
        }
    }
    ControlFlow::Continue(())
}

#[must_use]
pub fn concat_rest<'p, K: TokenKind>(
    curr_rest: &'p [Production<K>],
    prev_rest: &[RestItem<'p, K>],
) -> Vec<RestItem<'p, K>> {
    curr_rest
        .iter()
        .map(RestItem::Production)
        .chain(prev_rest.iter().copied())
        .collect()
}

/// Rest seen from inside the body of `rep`.
#[must_use]
pub fn rest_after_iteration<'p, K: TokenKind>(
    rep: &'p Repetition<K>,
    curr_rest: &'p [Production<K>],
    prev_rest: &[RestItem<'p, K>],
) -> Vec<RestItem<'p, K>> {
    let mut rest = Vec::with_capacity(curr_rest.len() + prev_rest.len() + 1);
    rest.push(RestItem::Again(rep));
    rest.extend(curr_rest.iter().map(RestItem::Production));
    rest.extend_from_slice(prev_rest);
    rest
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
        D,
        Comma,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    use TestKind::*;

    fn describe(rest: &[RestItem<'_, TestKind>]) -> Vec<String> {
        rest.iter()
            .map(|item| match item {
                RestItem::Production(p) => p.describe(),
                RestItem::Again(rep) => match rep.separator {
                    Some(sep) => format!("Again({sep:?})"),
                    None => "Again".to_string(),
                },
            })
            .collect()
    }

    /// Records the rest seen at every terminal.
    #[derive(Default)]
    struct TerminalRests {
        seen: Vec<(TestKind, Vec<String>)>,
    }

    impl<'p> RestWalker<'p, TestKind> for TerminalRests {
        fn enter(
            &mut self,
            prod: &'p Production<TestKind>,
            curr_rest: &'p [Production<TestKind>],
            prev_rest: &[RestItem<'p, TestKind>],
        ) -> ControlFlow<(), bool> {
            if let Production::Terminal(t) = prod {
                self.seen
                    .push((t.kind, describe(&concat_rest(curr_rest, prev_rest))));
            }
            ControlFlow::Continue(true)
        }
    }

    #[test]
    fn test_rests_follow_rewrite_rules() {
        // A (B)* (C | D) ; with a separated repetition around the alternation
        let body = vec![
            Production::token(A),
            Production::star([Production::token(B)]),
            Production::plus_sep(
                Comma,
                [Production::choice([
                    Branch::new([Production::token(C)]),
                    Branch::new([Production::token(D)]),
                ])],
            ),
        ];
        let mut walker = TerminalRests::default();
        assert!(walk_rest(&mut walker, &body, &[]).is_continue());
        assert_eq!(
            walker.seen,
            vec![
                (A, vec!["ZeroOrMore".to_string(), "OneOrMore".to_string()]),
                (B, vec!["Again".to_string(), "OneOrMore".to_string()]),
                (C, vec!["Again(Comma)".to_string()]),
                (D, vec!["Again(Comma)".to_string()]),
            ]
        );
    }

    struct StopAtFirst(usize);

    impl<'p> RestWalker<'p, TestKind> for StopAtFirst {
        fn enter(
            &mut self,
            _prod: &'p Production<TestKind>,
            _curr_rest: &'p [Production<TestKind>],
            _prev_rest: &[RestItem<'p, TestKind>],
        ) -> ControlFlow<(), bool> {
            self.0 += 1;
            ControlFlow::Break(())
        }
    }

    #[test]
    fn test_break_stops_walk() {
        let body = vec![Production::token(A), Production::token(B)];
        let mut walker = StopAtFirst(0);
        assert!(walk_rest(&mut walker, &body, &[]).is_break());
        assert_eq!(walker.0, 1);
    }
}
