//! Token types produced by the Ayllu lexer.

use ayllu_core::keywords::KeywordId;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(KeywordId),
    Ident(String),
    Int { value: i128, suffix: Option<String> },
    Float(f64),
    Str(String),
    Char(u8),

    // Punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AmpAmp,
    PipePipe,
    Bang,
    Eq,
    Dot,
    DotDot,
    Comma,
    Colon,
    ColonColon,
    Semi,
    Question,
    Hash,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    At,
    AtAt,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
