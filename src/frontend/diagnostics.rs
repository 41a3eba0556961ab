//! Semantic-core error catalog (spec §7 "Error Handling Design").
//!
//! Unlike `ayllu_syntax::diagnostics` (structural errors, abort-on-first),
//! the semantic passes accumulate `Vec<CompileError>` and keep going until
//! the current top-level statement is finished, matching the donor's
//! `TypeChecker::errors` accumulation style and its doc comment: "Errors are
//! collected (not fatal) so the checker can report as many issues as
//! possible in a single run."

use miette::Diagnostic;
use thiserror::Error;

use ayllu_syntax::span::Span;

/// Which tier of spec §7's taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised by the parser; the semantic core assumes valid input and never
    /// constructs this variant itself (kept for completeness of the taxonomy).
    Structural,
    Semantic,
    /// CTE soft failure: blocked by a non-constexpr input. Never fatal on
    /// its own; only surfaced when the result is consumed in a context that
    /// required a constexpr.
    CteSoft,
    /// CTE hard failure: the expression provably fails at compile time.
    CteHard,
}

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    #[label("{}", label.as_deref().unwrap_or("here"))]
    pub span: Span,
    pub label: Option<String>,
    #[help]
    pub note: Option<String>,
}

impl CompileError {
    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self { kind: ErrorKind::Semantic, message: message.into(), span, label: None, note: None }
    }

    pub fn cte_soft(message: impl Into<String>, span: Span) -> Self {
        Self { kind: ErrorKind::CteSoft, message: message.into(), span, label: None, note: None }
    }

    pub fn cte_hard(message: impl Into<String>, span: Span) -> Self {
        Self { kind: ErrorKind::CteHard, message: message.into(), span, label: None, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
