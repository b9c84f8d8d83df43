//! Shared fixtures: a JSON token set lexed with logos and the JSON grammar.

#![allow(dead_code)]

use cairn::grammar::{Branch, GrammarBuilder, GrammarDefinition, Production};
use cairn::lexer::Token;
use cairn::syntax::{TextRange, TextSize, TokenKind};
use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Json {
    #[token("{")]
    LCurly,
    #[token("}")]
    RCurly,
    #[token("[")]
    LSquare,
    #[token("]")]
    RSquare,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLit,
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    /// Category of `true`, `false` and `null`.
    Literal,
    /// Text the lexer could not match.
    Unknown,
    Eof,
}

impl TokenKind for Json {
    fn eof() -> Self {
        Self::Eof
    }

    fn parent(self) -> Option<Self> {
        match self {
            Self::True | Self::False | Self::Null => Some(Self::Literal),
            _ => None,
        }
    }

    fn is_insertable(self) -> bool {
        !matches!(self, Self::StringLit | Self::Number | Self::Literal | Self::Unknown)
    }
}

/// Tokenize JSON text. Unmatched text becomes a single `Unknown` token.
pub fn lex(source: &str) -> Vec<Token<Json>> {
    let mut lexer = Json::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let kind = result.unwrap_or(Json::Unknown);
        let span = lexer.span();
        let range = TextRange::new(
            TextSize::from(u32::try_from(span.start).expect("test input fits in u32")),
            TextSize::from(u32::try_from(span.end).expect("test input fits in u32")),
        );
        tokens.push(Token::new(kind, lexer.slice(), range));
    }
    tokens
}

/// Tokens with the given texts, one space apart.
pub fn tokens<K: TokenKind>(input: &[(K, &str)]) -> Vec<Token<K>> {
    let mut offset = 0;
    input
        .iter()
        .map(|&(kind, text)| {
            let len = TextSize::of(text);
            let token = Token::new(kind, text, TextRange::at(TextSize::from(offset), len));
            offset += len.into() + 1;
            token
        })
        .collect()
}

pub struct JsonGrammar;

impl GrammarDefinition for JsonGrammar {
    type Kind = Json;

    fn define() -> GrammarBuilder<Json> {
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
                [
                    P::token(Json::LCurly),
                    P::opt([
                        P::rule("objectItem"),
                        P::star([P::token(Json::Comma), P::rule("objectItem").at(2)]),
                    ]),
                    P::token(Json::RCurly),
                ],
            )
            .rule(
                "objectItem",
                [P::token(Json::StringLit), P::token(Json::Colon), P::rule("value")],
            )
            .rule(
                "array",
                [
                    P::token(Json::LSquare),
                    P::star_sep(Json::Comma, [P::rule("value")]),
                    P::token(Json::RSquare),
                ],
            )
            .rule(
                "value",
                [P::choice([
                    Branch::new([P::token(Json::StringLit)]),
                    Branch::new([P::token(Json::Number)]),
                    Branch::new([P::rule("object")]),
                    Branch::new([P::rule("array")]),
                    Branch::new([P::token(Json::Literal)]),
                ])],
            )
    }
}
