use crate::error::{GrammarError, GrammarErrors};
use crate::grammar::{AnalysisConfig, AnalyzedGrammar, DecisionKind, Production, RuleSet, analysis};
use crate::syntax::{ParseTree, TokenKind};
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

pub type PlaceholderFn<K> = Arc<dyn Fn(ParseTree<K>) -> ParseTree<K> + Send + Sync>;

/// A named grammar rule.
pub struct Rule<K: TokenKind> {
    name: CompactString,
    body: Vec<Production<K>>,
    options: RuleOptions<K>,
}

impl<K: TokenKind> Rule<K> {
    pub(crate) fn new(
        name: CompactString,
        body: Vec<Production<K>>,
        options: RuleOptions<K>,
    ) -> Self {
        Self {
            name,
            body,
            options,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn body(&self) -> &[Production<K>] {
        &self.body
    }

    #[must_use]
    pub const fn options(&self) -> &RuleOptions<K> {
        &self.options
    }
}

impl<K: TokenKind> fmt::Debug for Rule<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("body", &self.body)
            .field("options", &self.options)
            .finish()
    }
}

/// Per-rule recovery settings.
#[derive(Clone)]
pub struct RuleOptions<K: TokenKind> {
    resync: bool,
    placeholder: Option<PlaceholderFn<K>>,
}

impl<K: TokenKind> Default for RuleOptions<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TokenKind> RuleOptions<K> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resync: true,
            placeholder: None,
        }
    }

    /// Never abandon this rule to resync on a follow token; let the error
    /// reach the caller instead. A rule invoked as the parse start always
    /// resyncs.
    #[must_use]
    pub const fn no_resync(mut self) -> Self {
        self.resync = false;
        self
    }

    /// Build the value that replaces the rule's result after it is
    /// abandoned. The closure receives the partial node, already flagged as
    /// recovered, holding whatever was matched before the error.
    #[must_use]
    pub fn placeholder(
        mut self,
        build: impl Fn(ParseTree<K>) -> ParseTree<K> + Send + Sync + 'static,
    ) -> Self {
        self.placeholder = Some(Arc::new(build));
        self
    }

    #[must_use]
    pub const fn resync_enabled(&self) -> bool {
        self.resync
    }

    pub(crate) fn recovery_value(&self, partial: ParseTree<K>) -> ParseTree<K> {
        match &self.placeholder {
            Some(build) => build(partial),
            None => partial,
        }
    }
}

impl<K: TokenKind> fmt::Debug for RuleOptions<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleOptions")
            .field("resync", &self.resync)
            .field("placeholder", &self.placeholder.is_some())
            .finish()
    }
}

/// Builder for grammars.
///
/// Rules are registered by name with a body built from [`Production`]
/// combinators. [`GrammarBuilder::build`] checks the structure, resolves
/// references and runs the self-analysis that yields lookahead and follow
/// tables.
///
/// # Example
///
/// ```rust
/// use cairn::grammar::{GrammarBuilder, Production};
/// # use cairn::syntax::TokenKind;
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Ident, Dot, Eof }
/// # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
///
/// let grammar = GrammarBuilder::new()
///     .entry_point("qualifiedName")
///     .rule(
///         "qualifiedName",
///         [
///             Production::token(Kind::Ident),
///             Production::star([Production::token(Kind::Dot), Production::token(Kind::Ident)]),
///         ],
///     )
///     .build()
///     .expect("grammar is well formed");
/// assert_eq!(grammar.entry_point(), "qualifiedName");
/// ```
pub struct GrammarBuilder<K: TokenKind> {
    rules: Vec<(CompactString, Vec<Production<K>>, RuleOptions<K>)>,
    entry: Option<CompactString>,
    config: AnalysisConfig,
}

impl<K: TokenKind> Default for GrammarBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TokenKind> GrammarBuilder<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            entry: None,
            config: AnalysisConfig::default(),
        }
    }

    /// Rule whose follow boundary is end of input. Defaults to the first
    /// registered rule.
    #[must_use]
    pub fn entry_point(mut self, name: impl Into<CompactString>) -> Self {
        self.entry = Some(name.into());
        self
    }

    #[must_use]
    pub fn rule(
        self,
        name: impl Into<CompactString>,
        body: impl IntoIterator<Item = Production<K>>,
    ) -> Self {
        self.rule_with(name, body, |options| options)
    }

    /// Register a rule and adjust its [`RuleOptions`].
    #[must_use]
    pub fn rule_with(
        mut self,
        name: impl Into<CompactString>,
        body: impl IntoIterator<Item = Production<K>>,
        configure: impl FnOnce(RuleOptions<K>) -> RuleOptions<K>,
    ) -> Self {
        self.rules.push((
            name.into(),
            body.into_iter().collect(),
            configure(RuleOptions::new()),
        ));
        self
    }

    /// Upper bound on the number of tokens a lookahead decision may inspect.
    #[must_use]
    pub fn max_lookahead(mut self, k: usize) -> Self {
        self.config.max_lookahead = k.max(1);
        self
    }

    #[must_use]
    pub fn analysis_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Check, resolve and analyze the grammar.
    ///
    /// # Errors
    ///
    /// Returns every problem found, in discovery order. Analysis does not
    /// stop at the first error.
    pub fn build(self) -> Result<Arc<AnalyzedGrammar<K>>, GrammarErrors> {
        let mut errors = Vec::new();
        if self.rules.is_empty() {
            errors.push(GrammarError::NoRules);
            return Err(GrammarErrors::new(errors));
        }

        let mut seen: HashSet<CompactString, ahash::RandomState> = HashSet::default();
        let mut rules = Vec::with_capacity(self.rules.len());
        for (name, mut body, options) in self.rules {
            if !is_valid_rule_name(&name) {
                errors.push(GrammarError::InvalidRuleName {
                    name: name.to_string(),
                });
            }
            if !seen.insert(name.clone()) {
                errors.push(GrammarError::DuplicateRule {
                    name: name.to_string(),
                });
                continue;
            }
            assign_occurrences(&name, &mut body, &mut errors);
            check_alternations(&name, &body, &mut errors);
            rules.push(Arc::new(Rule::new(name, body, options)));
        }

        let entry = match self.entry {
            Some(entry) => {
                if !seen.contains(&entry) {
                    errors.push(GrammarError::UnknownEntryPoint {
                        name: entry.to_string(),
                    });
                }
                entry
            }
            None => rules
                .first()
                .map(|rule| CompactString::from(rule.name()))
                .unwrap_or_default(),
        };

        analysis::analyze(RuleSet::new(rules), entry, self.config, errors)
    }
}

/// `^[a-zA-Z_]\w*$` over ASCII.
fn is_valid_rule_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OccurrenceKey<K> {
    Terminal(K),
    Reference(CompactString),
    Decision(DecisionKind),
}

fn occurrence_key<K: TokenKind>(prod: &Production<K>) -> Option<OccurrenceKey<K>> {
    match prod {
        Production::Terminal(t) => Some(OccurrenceKey::Terminal(t.kind)),
        Production::Reference(r) => Some(OccurrenceKey::Reference(r.name.clone())),
        Production::Sequence(_) => None,
        other => other.decision_kind().map(OccurrenceKey::Decision),
    }
}

fn visit_mut<K: TokenKind>(prod: &mut Production<K>, f: &mut impl FnMut(&mut Production<K>)) {
    f(prod);
    prod.for_each_child_mut(|child| visit_mut(child, f));
}

/// Replace unset occurrence indices with the lowest free index per
/// production key, in declaration order, and report explicit duplicates.
fn assign_occurrences<K: TokenKind>(
    rule: &str,
    body: &mut [Production<K>],
    errors: &mut Vec<GrammarError>,
) {
    let mut taken: HashMap<OccurrenceKey<K>, HashSet<u32>, ahash::RandomState> =
        HashMap::default();
    for prod in body.iter() {
        prod.visit(&mut |p| {
            let (Some(key), Some(occurrence)) = (occurrence_key(p), p.occurrence()) else {
                return;
            };
            if occurrence != 0 && !taken.entry(key).or_default().insert(occurrence) {
                errors.push(GrammarError::DuplicateOccurrence {
                    rule: rule.to_string(),
                    production: p.describe(),
                    occurrence,
                });
            }
        });
    }

    let mut next: HashMap<OccurrenceKey<K>, u32, ahash::RandomState> = HashMap::default();
    for prod in body.iter_mut() {
        visit_mut(prod, &mut |p| {
            let Some(key) = occurrence_key(p) else {
                return;
            };
            let Some(slot) = p.occurrence_mut() else {
                return;
            };
            if *slot != 0 {
                return;
            }
            let used = taken.entry(key.clone()).or_default();
            let counter = next.entry(key).or_insert(1);
            while used.contains(counter) {
                *counter += 1;
            }
            *slot = *counter;
            used.insert(*counter);
        });
    }
}

fn check_alternations<K: TokenKind>(
    rule: &str,
    body: &[Production<K>],
    errors: &mut Vec<GrammarError>,
) {
    for prod in body {
        prod.visit(&mut |p| {
            let Production::Alternation(alt) = p else {
                return;
            };
            if alt.branches.is_empty() {
                errors.push(GrammarError::EmptyAlternation {
                    rule: rule.to_string(),
                    occurrence: alt.occurrence,
                });
                return;
            }
            let guarded = alt.branches.iter().filter(|b| b.guard.is_some()).count();
            if guarded != 0 && guarded != alt.branches.len() {
                errors.push(GrammarError::MixedGuards {
                    rule: rule.to_string(),
                    occurrence: alt.occurrence,
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarErrorCategory;
    use crate::grammar::Branch;

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

    fn occurrences(body: &[Production<TestKind>]) -> Vec<(String, u32)> {
        let mut out = Vec::new();
        for prod in body {
            prod.visit(&mut |p| {
                if let Some(occurrence) = p.occurrence() {
                    out.push((p.describe(), occurrence));
                }
            });
        }
        out
    }

    #[test]
    fn test_rule_name_pattern() {
        assert!(is_valid_rule_name("json"));
        assert!(is_valid_rule_name("_private2"));
        assert!(!is_valid_rule_name("2fast"));
        assert!(!is_valid_rule_name("with-dash"));
        assert!(!is_valid_rule_name(""));
    }

    #[test]
    fn test_occurrences_inferred_in_declaration_order() {
        let mut body = vec![
            Production::token(TestKind::A),
            Production::opt([Production::token(TestKind::A), Production::token(TestKind::B)]),
            Production::token(TestKind::A).at(2),
            Production::opt([Production::token(TestKind::A)]),
        ];
        let mut errors = Vec::new();
        assign_occurrences("r", &mut body, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(
            occurrences(&body),
            vec![
                ("Consume(A)".to_string(), 1),
                ("Optional".to_string(), 1),
                ("Consume(A)".to_string(), 3),
                ("Consume(B)".to_string(), 1),
                ("Consume(A)".to_string(), 2),
                ("Optional".to_string(), 2),
                ("Consume(A)".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_duplicate_explicit_occurrence() {
        let mut body = vec![
            Production::rule("item").at(1),
            Production::token(TestKind::Comma),
            Production::rule("item").at(1),
        ];
        let mut errors = Vec::new();
        assign_occurrences("list", &mut body, &mut errors);
        assert_eq!(
            errors,
            vec![GrammarError::DuplicateOccurrence {
                rule: "list".into(),
                production: "Call(item)".into(),
                occurrence: 1,
            }]
        );
    }

    #[test]
    fn test_structure_errors_accumulate() {
        let errors = GrammarBuilder::<TestKind>::new()
            .rule("bad-name", [Production::token(TestKind::A)])
            .rule("ok", [Production::choice([])])
            .rule("ok", [Production::token(TestKind::B)])
            .rule(
                "mixed",
                [Production::choice([
                    Branch::when(|_| true, [Production::token(TestKind::A)]),
                    Branch::new([Production::token(TestKind::B)]),
                ])],
            )
            .build()
            .expect_err("grammar is malformed");
        let rendered: Vec<_> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(errors.len(), 4, "{rendered:?}");
        assert!(matches!(errors.as_slice()[0], GrammarError::InvalidRuleName { .. }));
        assert!(matches!(errors.as_slice()[1], GrammarError::EmptyAlternation { .. }));
        assert!(matches!(errors.as_slice()[2], GrammarError::DuplicateRule { .. }));
        assert!(matches!(errors.as_slice()[3], GrammarError::MixedGuards { .. }));
        assert!(
            errors
                .iter()
                .all(|e| e.category() == GrammarErrorCategory::Structure)
        );
    }

    #[test]
    fn test_unknown_entry_point_and_empty_grammar() {
        let errors = GrammarBuilder::<TestKind>::new()
            .entry_point("start")
            .rule("other", [Production::token(TestKind::A)])
            .build()
            .expect_err("entry point is missing");
        assert_eq!(
            errors.as_slice(),
            &[GrammarError::UnknownEntryPoint {
                name: "start".into()
            }]
        );

        let errors = GrammarBuilder::<TestKind>::new()
            .build()
            .expect_err("no rules");
        assert_eq!(errors.as_slice(), &[GrammarError::NoRules]);
    }

    #[test]
    fn test_rule_options() {
        let options: RuleOptions<TestKind> = RuleOptions::new()
            .no_resync()
            .placeholder(|_| ParseTree::node("missing", Vec::new()));
        assert!(!options.resync_enabled());
        let value = options.recovery_value(ParseTree::node("x", Vec::new()));
        assert_eq!(value.rule(), Some("missing"));
    }
}
