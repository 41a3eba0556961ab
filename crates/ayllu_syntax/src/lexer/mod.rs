//! Hand-written lexer for Ayllu source text.
//!
//! Produces a flat `Vec<Token>` (no significant whitespace/indentation; the
//! surface grammar is brace-delimited). Errors are accumulated rather than
//! aborting on the first bad character, mirroring the semantic core's
//! "collect, don't short-circuit" policy (spec §7).

pub mod tokens;

pub use tokens::{Token, TokenKind};

use ayllu_core::keywords;

use crate::diagnostics::LexError;
use crate::span::Span;

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

/// Lex `source` into a token stream.
///
/// Returns all tokens (including a trailing [`TokenKind::Eof`]) on success,
/// or the accumulated [`LexError`]s if any character could not be tokenized.
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let mut lexer = Lexer::new(source);
    lexer.run();
    if lexer.errors.is_empty() { Ok(lexer.tokens) } else { Err(lexer.errors) }
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, bytes: source.as_bytes(), pos: 0, tokens: Vec::new(), errors: Vec::new() }
    }

    fn run(&mut self) {
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(c) = self.peek() else {
                self.tokens.push(Token { kind: TokenKind::Eof, span: Span::new(start, start) });
                break;
            };
            if c.is_ascii_digit() {
                self.lex_number(start);
            } else if c == '"' {
                self.lex_string(start);
            } else if c == '\'' {
                self.lex_char(start);
            } else if is_ident_start(c) {
                self.lex_ident_or_keyword(start);
            } else {
                self.lex_punct(start);
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.pos += c.len_utf8();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += c.len_utf8();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn lex_number(&mut self, start: usize) {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit() || c == '_') {
                self.bump();
            }
            let digits: String = self.source[start + 2..self.pos].chars().filter(|c| *c != '_').collect();
            let value = match i128::from_str_radix(&digits, 16) {
                Ok(v) => v,
                Err(_) => {
                    self.errors.push(LexError::InvalidNumber {
                        text: self.source[start..self.pos].to_string(),
                        span: Span::new(start, self.pos),
                    });
                    return self.emit(TokenKind::Int { value: 0, suffix: None }, start);
                }
            };
            let suffix = self.lex_suffix();
            return self.emit(TokenKind::Int { value, suffix }, start);
        }

        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
                self.bump();
            }
        }

        let text: String = self.source[start..self.pos].chars().filter(|c| *c != '_').collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => self.emit(TokenKind::Float(v), start),
                Err(_) => self.errors.push(LexError::InvalidNumber { text, span: Span::new(start, self.pos) }),
            }
        } else {
            let value = match text.parse::<i128>() {
                Ok(v) => v,
                Err(_) => {
                    self.errors.push(LexError::InvalidNumber { text, span: Span::new(start, self.pos) });
                    return;
                }
            };
            let suffix = self.lex_suffix();
            self.emit(TokenKind::Int { value, suffix }, start);
        }
    }

    /// Integer literal suffix (e.g. `1i32`, `0x04u8`): an identifier glued
    /// directly onto the digits with no intervening whitespace.
    fn lex_suffix(&mut self) -> Option<String> {
        let start = self.pos;
        if matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
                self.bump();
            }
            Some(self.source[start..self.pos].to_string())
        } else {
            None
        }
    }

    fn lex_string(&mut self, start: usize) {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('0') => value.push('\0'),
                    Some(other) => {
                        self.errors.push(LexError::InvalidEscape { ch: other, span: Span::new(self.pos - 1, self.pos) });
                    }
                    None => {
                        self.errors.push(LexError::UnterminatedString { span: Span::new(start, self.pos) });
                        return;
                    }
                },
                Some(c) => value.push(c),
                None => {
                    self.errors.push(LexError::UnterminatedString { span: Span::new(start, self.pos) });
                    return;
                }
            }
        }
        self.emit(TokenKind::Str(value), start);
    }

    fn lex_char(&mut self, start: usize) {
        self.bump(); // opening quote
        let byte = match self.bump() {
            Some('\\') => match self.bump() {
                Some('n') => b'\n',
                Some('t') => b'\t',
                Some('0') => 0u8,
                Some(c) if c.is_ascii() => c as u8,
                Some(other) => {
                    self.errors.push(LexError::InvalidEscape { ch: other, span: Span::new(start, self.pos) });
                    0
                }
                None => {
                    self.errors.push(LexError::UnterminatedString { span: Span::new(start, self.pos) });
                    return;
                }
            },
            Some(c) if c.is_ascii() => c as u8,
            Some(c) => {
                self.errors.push(LexError::UnexpectedChar { ch: c, span: Span::new(start, self.pos) });
                0
            }
            None => {
                self.errors.push(LexError::UnterminatedString { span: Span::new(start, self.pos) });
                return;
            }
        };
        if self.peek() != Some('\'') {
            self.errors.push(LexError::UnterminatedString { span: Span::new(start, self.pos) });
            return;
        }
        self.bump();
        self.emit(TokenKind::Char(byte), start);
    }

    fn lex_ident_or_keyword(&mut self, start: usize) {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.bump();
        }
        let text = &self.source[start..self.pos];
        let kind = match text {
            "true" => TokenKind::Keyword(keywords::KeywordId::True),
            "false" => TokenKind::Keyword(keywords::KeywordId::False),
            _ => match keywords::from_str(text) {
                Some(id) => TokenKind::Keyword(id),
                None => TokenKind::Ident(text.to_string()),
            },
        };
        self.emit(kind, start);
    }

    fn lex_punct(&mut self, start: usize) {
        let c = self.bump().expect("checked by caller");
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => {
                if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,
            '#' => TokenKind::Hash,
            '.' => {
                if self.peek() == Some('.') {
                    self.bump();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            ',' => TokenKind::Comma,
            ':' => {
                if self.peek() == Some(':') {
                    self.bump();
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            ';' => TokenKind::Semi,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '@' => {
                if self.peek() == Some('@') {
                    self.bump();
                    TokenKind::AtAt
                } else {
                    TokenKind::At
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    TokenKind::PipePipe
                } else {
                    TokenKind::Pipe
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ne
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else if self.peek() == Some('<') {
                    self.bump();
                    TokenKind::Shl
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Shr
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                self.errors.push(LexError::UnexpectedChar { ch: other, span: Span::new(start, self.pos) });
                return;
            }
        };
        self.emit(kind, start);
    }

    fn emit(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token { kind, span: Span::new(start, self.pos) });
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_hex_and_suffixed_int_literals() {
        let ks = kinds("0x01020304u32");
        assert_eq!(ks[0], TokenKind::Int { value: 0x01020304, suffix: Some("u32".to_string()) });
    }

    #[test]
    fn lexes_plain_int_with_suffix() {
        let ks = kinds("42i32");
        assert_eq!(ks[0], TokenKind::Int { value: 42, suffix: Some("i32".to_string()) });
    }

    #[test]
    fn lexes_range_and_double_colon_without_ambiguity() {
        let ks = kinds("a..b T::method");
        assert!(matches!(ks[1], TokenKind::DotDot));
        assert!(matches!(ks[4], TokenKind::ColonColon));
    }

    #[test]
    fn lexes_keywords_distinctly_from_identifiers() {
        let ks = kinds("fn repeat sorted repeated");
        assert!(matches!(ks[0], TokenKind::Keyword(keywords::KeywordId::Fn)));
        assert!(matches!(ks[1], TokenKind::Keyword(keywords::KeywordId::Repeat)));
        assert!(matches!(ks[2], TokenKind::Keyword(keywords::KeywordId::Sorted)));
        assert!(matches!(&ks[3], TokenKind::Ident(s) if s == "repeated"));
    }

    #[test]
    fn skips_line_comments() {
        let ks = kinds("1 // trailing comment\n+ 2");
        assert!(matches!(ks[0], TokenKind::Int { value: 1, .. }));
        assert!(matches!(ks[1], TokenKind::Plus));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("\"abc").is_err());
    }
}
