#![forbid(unsafe_code)]
//! Ayllu compiler frontend and semantic middle-end.
//!
//! The lexer, parser, and AST live in [`ayllu_syntax`]; multi-file project
//! loading and the `resource{}`/`process{}` loaders live in [`ayllu_loader`];
//! primitive-type and keyword vocabulary lives in [`ayllu_core`]. This crate
//! is the semantic core spec §1 scopes in: the type checker +
//! monomorphization, the compile-time evaluator, the optimizer, the
//! residualizer, and the lowerer (see [`frontend`]), plus the
//! [`backend`] registry boundary and a thin [`cli`] driver that wires them
//! together.
//!
//! ## Panic policy
//!
//! Production code returns `Result`/`Option` and propagates with `?`; a
//! panic in non-test code means a compiler-internal invariant broke, not a
//! user-facing error, and should carry an `.expect("INVARIANT: ...")`
//! explaining which one. Test code may `.unwrap()`/`.expect()` freely.

pub mod backend;
pub mod cli;
pub mod frontend;
pub mod version;

pub use frontend::{AnalysisFacts, CompiledModule, compile_module, compile_module_with_caps};
