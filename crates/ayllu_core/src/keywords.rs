//! Reserved keyword vocabulary for the Ayllu surface language.
//!
//! Single source of truth for reserved words: a stable identifier
//! ([`KeywordId`]) plus a const metadata table ([`KEYWORDS`]) consumed by the
//! lexer (`ayllu_syntax::lexer`) so the token table and the keyword registry
//! cannot silently drift apart.
//!
//! ## Notes
//! - Lookup via [`from_str`] is case-sensitive; there are no keyword aliases
//!   in this surface language.
//!
//! ## Examples
//! ```rust
//! use ayllu_core::keywords::{self, KeywordId};
//!
//! assert_eq!(keywords::from_str("fn"), Some(KeywordId::Fn));
//! assert_eq!(keywords::as_str(KeywordId::Fn), "fn");
//! ```

/// Stable identifier for every reserved keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordId {
    // Declarations
    Fn,
    Type,
    Const,
    Let,
    Mut,
    External,
    Export,
    Import,

    // Control flow
    If,
    Else,
    Return,
    Break,
    Continue,
    Repeat,
    Sorted,
    In,

    // Literals
    True,
    False,

    // External collaborators (out of core scope, still reserved words)
    Resource,
    Process,
}

/// High-level grouping for documentation and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordCategory {
    Declaration,
    ControlFlow,
    Literal,
    Collaborator,
}

/// Metadata for a keyword.
#[derive(Debug, Clone, Copy)]
pub struct KeywordInfo {
    pub id: KeywordId,
    pub canonical: &'static str,
    pub category: KeywordCategory,
}

const fn info(id: KeywordId, canonical: &'static str, category: KeywordCategory) -> KeywordInfo {
    KeywordInfo { id, canonical, category }
}

/// Registry of all reserved keywords, in declaration order.
pub const KEYWORDS: &[KeywordInfo] = &[
    info(KeywordId::Fn, "fn", KeywordCategory::Declaration),
    info(KeywordId::Type, "type", KeywordCategory::Declaration),
    info(KeywordId::Const, "const", KeywordCategory::Declaration),
    info(KeywordId::Let, "let", KeywordCategory::Declaration),
    info(KeywordId::Mut, "mut", KeywordCategory::Declaration),
    info(KeywordId::External, "external", KeywordCategory::Declaration),
    info(KeywordId::Export, "export", KeywordCategory::Declaration),
    info(KeywordId::Import, "import", KeywordCategory::Declaration),
    info(KeywordId::If, "if", KeywordCategory::ControlFlow),
    info(KeywordId::Else, "else", KeywordCategory::ControlFlow),
    info(KeywordId::Return, "return", KeywordCategory::ControlFlow),
    info(KeywordId::Break, "break", KeywordCategory::ControlFlow),
    info(KeywordId::Continue, "continue", KeywordCategory::ControlFlow),
    info(KeywordId::Repeat, "repeat", KeywordCategory::ControlFlow),
    info(KeywordId::Sorted, "sorted", KeywordCategory::ControlFlow),
    info(KeywordId::In, "in", KeywordCategory::ControlFlow),
    info(KeywordId::True, "true", KeywordCategory::Literal),
    info(KeywordId::False, "false", KeywordCategory::Literal),
    info(KeywordId::Resource, "resource", KeywordCategory::Collaborator),
    info(KeywordId::Process, "process", KeywordCategory::Collaborator),
];

/// Canonical spelling for a keyword.
pub fn as_str(id: KeywordId) -> &'static str {
    info_for(id).canonical
}

/// Category for a keyword.
pub fn category(id: KeywordId) -> KeywordCategory {
    info_for(id).category
}

/// Full metadata for a keyword.
///
/// ## Panics
/// Never: every [`KeywordId`] variant has a registry entry.
pub fn info_for(id: KeywordId) -> &'static KeywordInfo {
    KEYWORDS.iter().find(|k| k.id == id).expect("INVARIANT: every KeywordId has a registry entry")
}

/// Lookup by spelling.
pub fn from_str(s: &str) -> Option<KeywordId> {
    KEYWORDS.iter().find(|k| k.canonical == s).map(|k| k.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_canonical_names() {
        for k in KEYWORDS {
            assert_eq!(from_str(k.canonical), Some(k.id));
            assert_eq!(as_str(k.id), k.canonical);
        }
    }

    #[test]
    fn unknown_identifier_is_not_a_keyword() {
        assert_eq!(from_str("foo"), None);
        assert_eq!(from_str("Fn"), None); // case-sensitive
    }
}
