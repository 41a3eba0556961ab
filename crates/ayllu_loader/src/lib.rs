//! External collaborators named in spec §6: multi-file module loading plus the
//! `resource{}` and `process{}` expression loaders.
//!
//! This crate sits beside `ayllu_syntax` as a thin boundary the semantic core
//! depends on but never reaches back into; it only ever hands the core a
//! parsed [`ayllu_syntax::ast::Module`] (or a string/array of strings for
//! `resource{}`/`process{}`). Grounded on the donor's
//! `frontend::resolver::ModuleResolver` (file discovery, cycle-safe
//! `processed` set, per-file lex+parse).

pub mod error;
pub mod module_loader;
pub mod process;
pub mod resource;

pub use error::LoadError;
pub use module_loader::{LoadedModule, ModuleLoader};
pub use process::{ProcessError, run_process};
pub use resource::{ResourceEntry, ResourceError, load_resource};
