//! FOLLOW sets checked against sentences derived from the grammar itself.

mod common;

use cairn::grammar::{AnalyzedGrammar, Branch, GrammarBuilder, Production, analyzed};
use cairn::syntax::TokenKind;
use cairn::testing::{GeneratedSentence, SentenceGenerator};
use common::JsonGrammar;
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Select,
    Ident,
    Comma,
    From,
    Where,
    Equals,
    Number,
    LParen,
    RParen,
    Semi,
    Eof,
}

impl TokenKind for Kind {
    fn eof() -> Self {
        Self::Eof
    }
}

/// A small SQL-like language with nested calls and optional tails, so that
/// rules end in several different contexts.
fn queries() -> Arc<AnalyzedGrammar<Kind>> {
    use Kind::*;
    use Production as P;

    GrammarBuilder::new()
        .rule("script", [P::plus([P::rule("query"), P::token(Semi)])])
        .rule(
            "query",
            [
                P::token(Select),
                P::plus_sep(Comma, [P::rule("expr")]),
                P::token(From),
                P::token(Ident),
                P::opt([P::token(Where), P::rule("expr").at(2), P::token(Equals), P::rule("expr").at(3)]),
            ],
        )
        .rule(
            "expr",
            [P::choice([
                Branch::new([P::token(Number)]),
                Branch::new([P::token(Ident), P::opt([P::rule("call")])]),
                Branch::new([P::token(LParen), P::rule("query"), P::token(RParen)]),
            ])],
        )
        .rule("call", [P::token(LParen), P::star_sep(Comma, [P::rule("expr")]), P::token(RParen)])
        .build()
        .expect("grammar is well formed")
}

fn check_follows<K: TokenKind>(grammar: &AnalyzedGrammar<K>, sentence: &GeneratedSentence<K>) -> Result<(), TestCaseError> {
    for site in &sentence.call_sites {
        let next = sentence.kind_after(site);
        match &site.key {
            Some(key) => {
                let follow = grammar.follow_set(key);
                prop_assert!(
                    follow.is_some_and(|set| set.matches(next)),
                    "{next:?} after {key} is not in {follow:?} (sentence {:?})",
                    sentence.tokens
                );
            }
            None => prop_assert_eq!(next, K::eof()),
        }
    }
    Ok(())
}

#[test]
fn test_every_call_site_has_a_follow_set() {
    let grammar = queries();
    let sentence = SentenceGenerator::new(&grammar).generate(&[]);
    assert!(!sentence.truncated);
    assert!(sentence.call_sites.iter().any(|site| site.key.is_none()));
    for site in sentence.call_sites.iter().filter_map(|site| site.key.as_ref()) {
        assert!(grammar.follow_set(site).is_some(), "no follow set for {site}");
    }
}

proptest! {
    #[test]
    fn query_follows_cover_derived_sentences(choices in proptest::collection::vec(any::<u32>(), 0..128)) {
        let grammar = queries();
        let sentence = SentenceGenerator::new(&grammar).max_depth(5).generate(&choices);
        prop_assume!(!sentence.truncated);
        check_follows(&grammar, &sentence)?;
    }

    #[test]
    fn json_follows_cover_derived_sentences(choices in proptest::collection::vec(any::<u32>(), 0..128)) {
        let grammar = analyzed::<JsonGrammar>().expect("json grammar is valid");
        let sentence = SentenceGenerator::new(&grammar).max_iterations(4).generate(&choices);
        prop_assume!(!sentence.truncated);
        check_follows(&grammar, &sentence)?;
    }
}
