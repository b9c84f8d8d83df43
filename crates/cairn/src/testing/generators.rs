use crate::grammar::{AnalyzedGrammar, FollowKey, Production};
use crate::lexer::Token;
use crate::syntax::{TextRange, TextSize, TokenKind};
use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::HashMap;

/// A rule call made while deriving a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Call site of the rule; `None` for the start rule.
    pub key: Option<FollowKey>,
    /// Index of the first token after the call. Equal to the sentence
    /// length when the call ends the input.
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct GeneratedSentence<K: TokenKind> {
    pub tokens: Vec<K>,
    /// Every rule call, in the order the calls finished.
    pub call_sites: Vec<CallSite>,
    /// Set when derivation hit the hard nesting cap and stopped early; the
    /// sentence is then not guaranteed to be valid.
    pub truncated: bool,
}

impl<K: TokenKind> GeneratedSentence<K> {
    /// Tokens with a text image of the kind's debug name, separated by
    /// single spaces.
    #[must_use]
    pub fn to_tokens(&self) -> Vec<Token<K>> {
        let mut offset = 0_u32;
        self.tokens
            .iter()
            .map(|&kind| {
                let text = CompactString::from(format!("{kind:?}"));
                let len = TextSize::of(&text);
                let token = Token::new(kind, text, TextRange::at(TextSize::from(offset), len));
                offset += len.into() + 1;
                token
            })
            .collect()
    }

    /// Kind found right after `site`; end of input past the last token.
    #[must_use]
    pub fn kind_after(&self, site: &CallSite) -> K {
        self.tokens.get(site.end).copied().unwrap_or_else(K::eof)
    }
}

/// Smallest rule nesting needed to derive a finite token sequence from
/// each rule. Rules that can never finish are absent.
fn min_heights<K: TokenKind>(grammar: &AnalyzedGrammar<K>) -> HashMap<CompactString, usize, RandomState> {
    let mut heights: HashMap<CompactString, usize, RandomState> = HashMap::default();
    loop {
        let mut changed = false;
        for rule in grammar.rules().iter() {
            let Some(height) = sequence_height(rule.body(), &heights) else {
                continue;
            };
            let height = height + 1;
            if heights.get(rule.name()).is_none_or(|&known| height < known) {
                heights.insert(rule.name().into(), height);
                changed = true;
            }
        }
        if !changed {
            return heights;
        }
    }
}

fn sequence_height<K: TokenKind>(
    items: &[Production<K>],
    heights: &HashMap<CompactString, usize, RandomState>,
) -> Option<usize> {
    items
        .iter()
        .try_fold(0, |acc, item| production_height(item, heights).map(|h| acc.max(h)))
}

fn production_height<K: TokenKind>(
    prod: &Production<K>,
    heights: &HashMap<CompactString, usize, RandomState>,
) -> Option<usize> {
    match prod {
        Production::Terminal(_) | Production::Optional(_) | Production::ZeroOrMore(_) => Some(0),
        Production::Reference(reference) => heights.get(&reference.name).copied(),
        Production::Sequence(items) => sequence_height(items, heights),
        Production::OneOrMore(rep) => sequence_height(&rep.body, heights),
        Production::Alternation(alt) => alt
            .branches
            .iter()
            .filter_map(|branch| sequence_height(&branch.sequence, heights))
            .min(),
    }
}

/// Consumes a stream of choice values; past its end every choice is `0`.
struct Choices<'c> {
    stream: &'c [u32],
    next: usize,
}

impl Choices<'_> {
    fn pick(&mut self, options: usize) -> usize {
        if options <= 1 {
            return 0;
        }
        let value = self.stream.get(self.next).copied().unwrap_or(0);
        self.next += 1;
        value as usize % options
    }
}

/// Derives valid sentences from a grammar, steered by a stream of choice
/// values such as the ones a property-testing strategy produces.
///
/// Every optional, repetition count and alternation branch consumes one
/// value from the stream. Past `max_depth` nested rules the generator only
/// takes the shortest way out, so derivation terminates for any stream.
/// Guards are ignored: sentences follow the grammar shape only.
///
/// # Example
///
/// ```rust
/// use cairn::grammar::{GrammarBuilder, Production};
/// use cairn::testing::SentenceGenerator;
/// # use cairn::syntax::TokenKind;
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Ident, Dot, Eof }
/// # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
///
/// let grammar = GrammarBuilder::new()
///     .rule(
///         "qualifiedName",
///         [
///             Production::token(Kind::Ident),
///             Production::star([Production::token(Kind::Dot), Production::token(Kind::Ident).at(2)]),
///         ],
///     )
///     .build()
///     .expect("grammar is well formed");
///
/// let sentence = SentenceGenerator::new(&grammar).generate(&[2]);
/// assert_eq!(sentence.tokens, vec![Kind::Ident, Kind::Dot, Kind::Ident, Kind::Dot, Kind::Ident]);
/// ```
pub struct SentenceGenerator<'g, K: TokenKind> {
    grammar: &'g AnalyzedGrammar<K>,
    heights: HashMap<CompactString, usize, RandomState>,
    max_depth: usize,
    max_iterations: usize,
}

impl<'g, K: TokenKind> SentenceGenerator<'g, K> {
    #[must_use]
    pub fn new(grammar: &'g AnalyzedGrammar<K>) -> Self {
        Self {
            grammar,
            heights: min_heights(grammar),
            max_depth: 8,
            max_iterations: 3,
        }
    }

    /// Rule nesting after which only the shortest derivations are taken.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Most iterations a repetition is given beyond its minimum.
    #[must_use]
    pub const fn max_iterations(mut self, count: usize) -> Self {
        self.max_iterations = count;
        self
    }

    /// A sentence of the grammar's entry point.
    #[must_use]
    pub fn generate(&self, choices: &[u32]) -> GeneratedSentence<K> {
        self.generate_from(self.grammar.entry_point(), choices)
            .unwrap_or_else(|| GeneratedSentence {
                tokens: Vec::new(),
                call_sites: Vec::new(),
                truncated: true,
            })
    }

    /// A sentence of `rule`, or `None` if the grammar has no such rule.
    #[must_use]
    pub fn generate_from(&self, rule: &str, choices: &[u32]) -> Option<GeneratedSentence<K>> {
        let rule = self.grammar.rule(rule)?;
        let mut run = Derivation {
            generator: self,
            choices: Choices {
                stream: choices,
                next: 0,
            },
            sentence: GeneratedSentence {
                tokens: Vec::new(),
                call_sites: Vec::new(),
                truncated: false,
            },
        };
        run.sequence(rule.body(), rule.name(), 1);
        let end = run.sentence.tokens.len();
        run.sentence.call_sites.push(CallSite { key: None, end });
        Some(run.sentence)
    }

    fn height(&self, items: &[Production<K>]) -> usize {
        sequence_height(items, &self.heights).unwrap_or(usize::MAX)
    }
}

struct Derivation<'s, 'g, 'c, K: TokenKind> {
    generator: &'s SentenceGenerator<'g, K>,
    choices: Choices<'c>,
    sentence: GeneratedSentence<K>,
}

impl<K: TokenKind> Derivation<'_, '_, '_, K> {
    fn shallow(&self, depth: usize) -> bool {
        depth < self.generator.max_depth
    }

    fn sequence(&mut self, items: &[Production<K>], rule: &str, depth: usize) {
        for item in items {
            self.production(item, rule, depth);
        }
    }

    fn production(&mut self, prod: &Production<K>, rule: &str, depth: usize) {
        match prod {
            Production::Terminal(terminal) => self.sentence.tokens.push(terminal.kind),
            Production::Reference(reference) => {
                if depth >= self.generator.max_depth.saturating_mul(2) {
                    self.sentence.truncated = true;
                    return;
                }
                reference.with_body(|body| self.sequence(body, &reference.name, depth + 1));
                let end = self.sentence.tokens.len();
                self.sentence.call_sites.push(CallSite {
                    key: Some(FollowKey::new(reference.name.clone(), reference.occurrence, rule)),
                    end,
                });
            }
            Production::Sequence(items) => self.sequence(items, rule, depth),
            Production::Optional(opt) => {
                if self.shallow(depth) && self.choices.pick(2) == 1 {
                    self.sequence(&opt.body, rule, depth);
                }
            }
            Production::ZeroOrMore(rep) | Production::OneOrMore(rep) => {
                let minimum = usize::from(matches!(prod, Production::OneOrMore(_)));
                let extra = if self.shallow(depth) {
                    self.choices.pick(self.generator.max_iterations + 1)
                } else {
                    0
                };
                for iteration in 0..minimum + extra {
                    if iteration > 0
                        && let Some(separator) = rep.separator
                    {
                        self.sentence.tokens.push(separator);
                    }
                    self.sequence(&rep.body, rule, depth);
                }
            }
            Production::Alternation(alt) => {
                let index = if self.shallow(depth) {
                    self.choices.pick(alt.branches.len())
                } else {
                    alt.branches
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, branch)| self.generator.height(&branch.sequence))
                        .map_or(0, |(index, _)| index)
                };
                if let Some(branch) = alt.branches.get(index) {
                    self.sequence(&branch.sequence, rule, depth);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Branch, GrammarBuilder};
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        LSquare,
        RSquare,
        Comma,
        Number,
        Eof,
    }

    impl TokenKind for TestKind {
        fn eof() -> Self {
            Self::Eof
        }
    }

    use TestKind::*;

    fn arrays() -> Arc<AnalyzedGrammar<TestKind>> {
        GrammarBuilder::new()
            .rule("value", [Production::choice([
                Branch::new([Production::rule("array")]),
                Branch::new([Production::token(Number)]),
            ])])
            .rule(
                "array",
                [
                    Production::token(LSquare),
                    Production::star_sep(Comma, [Production::rule("value")]),
                    Production::token(RSquare),
                ],
            )
            .build()
            .expect("grammar is well formed")
    }

    #[test]
    fn test_min_heights() {
        let grammar = arrays();
        let heights = min_heights(&grammar);
        assert_eq!(heights.get("array"), Some(&1));
        assert_eq!(heights.get("value"), Some(&1));
    }

    #[test]
    fn test_choices_steer_derivation() {
        let grammar = arrays();
        let generator = SentenceGenerator::new(&grammar);
        // array, two items: a number and an empty array.
        let sentence = generator.generate(&[0, 2, 1, 0, 0]);
        assert_eq!(
            sentence.tokens,
            vec![LSquare, Number, Comma, LSquare, RSquare, RSquare]
        );
        assert!(!sentence.truncated);
        // value > array calls: innermost array ends before the outer ']'.
        let inner = sentence
            .call_sites
            .iter()
            .find(|site| site.key.as_ref().is_some_and(|key| key.rule == "array") && site.end == 5)
            .expect("inner array call recorded");
        assert_eq!(sentence.kind_after(inner), RSquare);
        assert_eq!(sentence.call_sites.last().map(|site| site.end), Some(6));
    }

    #[test]
    fn test_deep_streams_terminate() {
        let grammar = arrays();
        let generator = SentenceGenerator::new(&grammar).max_depth(3);
        // Asks for nested arrays of three items; past the limit only
        // numbers are chosen.
        let sentence = generator.generate(&[0_u32, 3].repeat(32));
        assert!(!sentence.truncated);
        assert_eq!(
            sentence.tokens,
            vec![LSquare, Number, Comma, Number, Comma, Number, RSquare]
        );
    }

    #[test]
    fn test_text_images() {
        let grammar = arrays();
        let sentence = SentenceGenerator::new(&grammar).generate(&[1]);
        let tokens = sentence.to_tokens();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "Number");
        assert!(SentenceGenerator::new(&grammar).generate_from("missing", &[]).is_none());
    }
}
