#![no_main]
use cairn::error::ParseFault;
use cairn::grammar::{AnalyzedGrammar, Branch, GrammarBuilder, Production};
use cairn::lexer::Token;
use cairn::parser::{Parser, ParserConfig, RecognizerPhase};
use cairn::syntax::{TextRange, TextSize, TokenKind};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FuzzKind {
    LCurly,
    RCurly,
    LSquare,
    RSquare,
    Comma,
    Colon,
    StringLit,
    Number,
    Eof,
}

const KINDS: [FuzzKind; 8] = [
    FuzzKind::LCurly,
    FuzzKind::RCurly,
    FuzzKind::LSquare,
    FuzzKind::RSquare,
    FuzzKind::Comma,
    FuzzKind::Colon,
    FuzzKind::StringLit,
    FuzzKind::Number,
];

impl TokenKind for FuzzKind {
    fn eof() -> Self {
        Self::Eof
    }

    fn is_insertable(self) -> bool {
        !matches!(self, Self::StringLit | Self::Number)
    }
}

fn grammar() -> Arc<AnalyzedGrammar<FuzzKind>> {
    static GRAMMAR: OnceLock<Arc<AnalyzedGrammar<FuzzKind>>> = OnceLock::new();
    GRAMMAR
        .get_or_init(|| {
            use FuzzKind::*;
            use Production as P;

            GrammarBuilder::new()
                .rule(
                    "json",
                    [P::choice([
                        Branch::new([P::rule("object")]),
                        Branch::new([P::rule("array")]),
                    ])],
                )
                .rule(
                    "object",
                    [P::token(LCurly), P::star_sep(Comma, [P::rule("objectItem")]), P::token(RCurly)],
                )
                .rule("objectItem", [P::token(StringLit), P::token(Colon), P::rule("value")])
                .rule(
                    "array",
                    [P::token(LSquare), P::star_sep(Comma, [P::rule("value")]), P::token(RSquare)],
                )
                .rule(
                    "value",
                    [P::choice([
                        Branch::new([P::token(StringLit)]),
                        Branch::new([P::token(Number)]),
                        Branch::new([P::rule("object")]),
                        Branch::new([P::rule("array")]),
                    ])],
                )
                .build()
                .expect("fuzz grammar is well formed")
        })
        .clone()
}

fuzz_target!(|data: &[u8]| {
    // One token per byte; the value picks the kind.
    let tokens: Vec<Token<FuzzKind>> = data
        .iter()
        .zip(0_u32..)
        .map(|(&byte, at)| {
            let kind = KINDS[usize::from(byte) % KINDS.len()];
            Token::new(kind, "t", TextRange::at(TextSize::from(at * 2), TextSize::from(1)))
        })
        .collect();

    // Recovery must cope with any token sequence. The only fault allowed
    // is the nesting limit on deeply bracketed input.
    let mut parser = Parser::new(grammar(), ParserConfig::default());
    let output = match parser.parse_tokens(tokens) {
        Ok(output) => output,
        Err(ParseFault::RecursionLimit { .. }) => return,
        Err(fault) => panic!("unexpected fault: {fault}"),
    };
    assert_eq!(parser.phase(), RecognizerPhase::Done);
    assert!(output.metrics.tokens_consumed <= data.len());
});
