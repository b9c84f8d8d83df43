use crate::error::{GrammarError, GrammarErrors, ParseFault};
use crate::grammar::path::{self, PathTarget, PathTokens};
use crate::grammar::{
    DecisionKind, FirstSets, FollowKey, FollowTable, GrammarPath, Rule, RuleSet, TokenSet,
};
use crate::lookahead::{self, Decision, DecisionTable, LookaheadKey, NextTerminal};
use crate::syntax::TokenKind;
use compact_str::CompactString;
use std::sync::Arc;

/// Settings that shape the self-analysis of a grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Longest token sequence a decision may inspect.
    pub max_lookahead: usize,
    /// Rule expansions allowed between two tokens while enumerating
    /// lookahead paths. Paths that exceed it are abandoned.
    pub path_depth_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_lookahead: 1,
            path_depth_limit: 64,
        }
    }
}

/// A resolved grammar together with everything computed from its shape.
///
/// Immutable once built and shared read-only by every parser using it.
#[derive(Debug)]
pub struct AnalyzedGrammar<K: TokenKind> {
    rules: RuleSet<K>,
    entry: CompactString,
    first: FirstSets<K>,
    follows: FollowTable<K>,
    decisions: DecisionTable<K>,
    config: AnalysisConfig,
}

/// Resolve, validate and analyze `rules`. `errors` holds what the builder
/// already found; analysis adds to it and fails if anything was reported.
pub(crate) fn analyze<K: TokenKind>(
    rules: RuleSet<K>,
    entry: CompactString,
    config: AnalysisConfig,
    mut errors: Vec<GrammarError>,
) -> Result<Arc<AnalyzedGrammar<K>>, GrammarErrors> {
    let unresolved = rules.resolve();
    let resolved = unresolved.is_empty();
    errors.extend(unresolved);
    if !resolved || !rules.contains(&entry) {
        return Err(GrammarErrors::new(errors));
    }

    let first = FirstSets::compute(&rules);
    let decisions = lookahead::synthesize(&rules, &first, &config, &mut errors);
    if !errors.is_empty() {
        return Err(GrammarErrors::new(errors));
    }

    let follows = FollowTable::compute(&rules, &first, &entry);
    Ok(Arc::new(AnalyzedGrammar {
        rules,
        entry,
        first,
        follows,
        decisions,
        config,
    }))
}

impl<K: TokenKind> AnalyzedGrammar<K> {
    #[must_use]
    pub const fn rules(&self) -> &RuleSet<K> {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Arc<Rule<K>>> {
        self.rules.get(name)
    }

    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[must_use]
    pub const fn first_sets(&self) -> &FirstSets<K> {
        &self.first
    }

    /// Tokens that can start `rule`.
    #[must_use]
    pub fn rule_first(&self, rule: &str) -> Option<&TokenSet<K>> {
        self.first.rule(rule)
    }

    #[must_use]
    pub const fn follows(&self) -> &FollowTable<K> {
        &self.follows
    }

    #[must_use]
    pub fn follow_set(&self, key: &FollowKey) -> Option<&TokenSet<K>> {
        self.follows.get(key)
    }

    #[must_use]
    pub fn lookahead(&self, key: &LookaheadKey) -> Option<&Decision<K>> {
        self.decision(&key.rule, key.kind, key.occurrence)
    }

    pub(crate) fn decision(&self, rule: &str, kind: DecisionKind, occurrence: u32) -> Option<&Decision<K>> {
        self.decisions
            .get(rule)
            .and_then(|decisions| decisions.get(&(kind, occurrence)))
    }

    /// The terminal that immediately follows a repetition in its own rule.
    #[must_use]
    pub fn first_after_repetition(&self, key: &LookaheadKey) -> Option<NextTerminal<K>> {
        self.lookahead(key).and_then(Decision::next_terminal)
    }

    /// Tokens valid right after the position `path` describes. End of input
    /// is included when nothing more is required.
    ///
    /// # Errors
    ///
    /// [`ParseFault::EmptyPath`] for an empty rule stack and
    /// [`ParseFault::UnknownRule`] when the path names an unknown rule.
    pub fn next_possible_tokens(&self, path: &GrammarPath<K>) -> Result<TokenSet<K>, ParseFault> {
        path::query(&self.rules, &self.first, path, None)
    }

    /// Tokens that can start the body of the optional at `occurrence` in the
    /// innermost rule of `path`.
    ///
    /// # Errors
    ///
    /// As for [`AnalyzedGrammar::next_possible_tokens`].
    pub fn next_inside_optional(&self, path: &GrammarPath<K>, occurrence: u32) -> Result<TokenSet<K>, ParseFault> {
        path::query(&self.rules, &self.first, path, Some((DecisionKind::Optional, occurrence)))
    }

    /// Tokens that can start an iteration of the zero-or-more repetition at
    /// `occurrence`.
    ///
    /// # Errors
    ///
    /// As for [`AnalyzedGrammar::next_possible_tokens`].
    pub fn next_inside_zero_or_more(
        &self,
        path: &GrammarPath<K>,
        occurrence: u32,
    ) -> Result<TokenSet<K>, ParseFault> {
        path::query(&self.rules, &self.first, path, Some((DecisionKind::ZeroOrMore, occurrence)))
    }

    /// # Errors
    ///
    /// As for [`AnalyzedGrammar::next_possible_tokens`].
    pub fn next_inside_one_or_more(
        &self,
        path: &GrammarPath<K>,
        occurrence: u32,
    ) -> Result<TokenSet<K>, ParseFault> {
        path::query(&self.rules, &self.first, path, Some((DecisionKind::OneOrMore, occurrence)))
    }

    /// Tokens that may follow the terminal `kind` at `occurrence` in the
    /// innermost rule of a live call chain, given outermost first.
    pub(crate) fn tokens_after<'a>(
        &'a self,
        start: &str,
        calls: impl IntoIterator<Item = (&'a str, u32)>,
        kind: K,
        occurrence: u32,
    ) -> Result<PathTokens<K>, ParseFault> {
        path::tokens_at(
            &self.rules,
            &self.first,
            start,
            calls,
            PathTarget::AfterToken(kind, occurrence),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarErrorCategory;
    use crate::grammar::{Branch, GrammarBuilder, Production};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        Ident,
        Dot,
        Semi,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    use TestKind::*;

    fn statements() -> GrammarBuilder<TestKind> {
        GrammarBuilder::new()
            .rule("program", [Production::star([Production::rule("statement")])])
            .rule(
                "statement",
                [Production::rule("qualifiedName"), Production::token(Semi)],
            )
            .rule(
                "qualifiedName",
                [
                    Production::token(Ident),
                    Production::star([Production::token(Dot), Production::token(Ident).at(2)]),
                ],
            )
    }

    #[test]
    fn test_analysis_exposes_tables() {
        let grammar = statements().build().expect("grammar is well formed");
        assert_eq!(grammar.entry_point(), "program");
        assert_eq!(grammar.rules().len(), 3);
        assert_eq!(
            grammar
                .follow_set(&FollowKey::new("qualifiedName", 1, "statement"))
                .map(TokenSet::as_slice),
            Some(&[Semi][..])
        );
        assert_eq!(
            grammar.first_after_repetition(&LookaheadKey::new(
                DecisionKind::ZeroOrMore,
                1,
                "qualifiedName"
            )),
            Some(NextTerminal::EndOfRule)
        );
        assert!(
            grammar
                .lookahead(&LookaheadKey::new(DecisionKind::Optional, 1, "program"))
                .is_none()
        );
    }

    #[test]
    fn test_content_assist_queries() {
        let grammar = statements().build().expect("grammar is well formed");
        let after_ident = GrammarPath::new("program")
            .enter("statement", 1)
            .enter("qualifiedName", 1)
            .after_token(Ident, 1);
        assert_eq!(
            grammar.next_possible_tokens(&after_ident).map(|s| s.as_slice().to_vec()),
            Ok(vec![Dot, Semi])
        );
        let inside = GrammarPath::new("qualifiedName");
        assert_eq!(
            grammar
                .next_inside_zero_or_more(&inside, 1)
                .map(|s| s.as_slice().to_vec()),
            Ok(vec![Dot])
        );
        assert!(grammar.next_inside_one_or_more(&inside, 1).is_ok_and(|s| s.is_empty()));
    }

    #[test]
    fn test_unresolved_reference_stops_analysis() {
        let errors = GrammarBuilder::<TestKind>::new()
            .rule(
                "start",
                [Production::choice([
                    Branch::new([Production::rule("missing")]),
                    Branch::new([Production::rule("missing")]),
                ])],
            )
            .build()
            .expect_err("reference does not resolve");
        // Ambiguity is not checked on an unresolved grammar.
        assert!(
            errors
                .iter()
                .all(|e| e.category() == GrammarErrorCategory::UnresolvedReference)
        );
        assert_eq!(errors.len(), 2);
    }
}
