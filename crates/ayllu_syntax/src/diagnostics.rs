//! Syntax-level diagnostics: lexing and parsing failures.
//!
//! These are `thiserror`-derived, `miette::Diagnostic`-rendered errors: the
//! structural-error tier of spec §7's taxonomy. The semantic core never
//! constructs these; it only sees modules that already lexed and parsed.

use miette::Diagnostic;
use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character {ch:?}")]
    #[diagnostic(code(ayllu::lex::unexpected_char))]
    UnexpectedChar {
        ch: char,
        #[label("not valid here")]
        span: Span,
    },

    #[error("unterminated string literal")]
    #[diagnostic(code(ayllu::lex::unterminated_string))]
    UnterminatedString {
        #[label("string starts here")]
        span: Span,
    },

    #[error("invalid numeric literal {text:?}")]
    #[diagnostic(code(ayllu::lex::invalid_number))]
    InvalidNumber {
        text: String,
        #[label("not a valid number")]
        span: Span,
    },

    #[error("invalid escape sequence \\{ch}")]
    #[diagnostic(code(ayllu::lex::invalid_escape))]
    InvalidEscape {
        ch: char,
        #[label("unknown escape")]
        span: Span,
    },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span, .. }
            | LexError::InvalidNumber { span, .. }
            | LexError::InvalidEscape { span, .. } => *span,
        }
    }
}

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(ayllu::parse::unexpected_token))]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("here")]
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    #[diagnostic(code(ayllu::parse::unexpected_eof))]
    UnexpectedEof { expected: String },

    #[error("invalid array size: {reason}")]
    #[diagnostic(code(ayllu::parse::invalid_array_size))]
    InvalidArraySize {
        reason: String,
        #[label("here")]
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedToken { span, .. } | ParseError::InvalidArraySize { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } => None,
        }
    }
}
