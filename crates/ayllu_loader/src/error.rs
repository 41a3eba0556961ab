//! Errors raised by the loader boundary.
//!
//! These are plain `thiserror` enums (no `miette::Diagnostic`): the loader
//! runs before any single file's `Span`s are meaningful across the whole
//! project, so rendering is left to the driver, which already knows how to
//! format a per-file `CompileError`.

use ayllu_syntax::diagnostics::{LexError, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lex '{path}'")]
    Lex { path: String, errors: Vec<LexError> },

    #[error("failed to parse '{path}'")]
    Parse { path: String, errors: Vec<ParseError> },

    #[error("import path '{path}' could not be resolved to a file under the project root")]
    UnresolvedImport { path: String },
}
