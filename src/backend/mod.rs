//! Backend registry (spec §6 "Backend registry"): the boundary the semantic
//! core hands a fully lowered [`Module`] across. A `Backend` is registered
//! by name, picks up unknown CLI options as they stream by, and is invoked
//! once to `emit`. Real code generation is out of scope (spec §1), so the
//! only backend shipped here (`dump::DumpBackend`) serializes the module's
//! facts rather than compiling anything.

pub mod dump;

use std::path::PathBuf;

use ayllu_syntax::ast::Module;
use thiserror::Error;

use crate::cli::CompilerOptions;
use crate::frontend::optimizer::OptimizationFacts;
use crate::frontend::typechecker::TypeCheckOutput;
use crate::frontend::AnalysisFacts;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no backend registered under the name '{0}'")]
    NotFound(String),
    #[error("backend '{backend}' failed to emit: {message}")]
    Emit { backend: String, message: String },
}

/// Static identification a backend reports for `backends` listing and error
/// messages (spec §6: "`info`: `{name, description, version}`").
#[derive(Debug, Clone)]
pub struct BackendInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
}

/// Where a backend should write its output (spec §6's `OutputPaths`).
#[derive(Debug, Clone, Default)]
pub struct OutputPaths {
    /// Destination file/directory for the backend's primary output. `None`
    /// means "write to stdout", which every reference backend here honors.
    pub out_dir: Option<PathBuf>,
}

/// Outcome of a backend claiming (or declining) one CLI argument (spec §6:
/// "`parse_option(argv, index) -> {owned: bool, error?}`").
pub struct ParsedOption {
    pub owned: bool,
    pub error: Option<String>,
}

impl ParsedOption {
    pub fn unowned() -> Self {
        Self { owned: false, error: None }
    }

    pub fn owned() -> Self {
        Self { owned: true, error: None }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self { owned: true, error: Some(error.into()) }
    }
}

/// Everything `emit` needs, bundled so a backend never has to reach back
/// into the driver for it (spec §6: "a `BackendContext` referencing the
/// Module, the TypeChecker ..., Options, OutputPaths, AnalysisFacts, and
/// OptimizationFacts").
pub struct BackendContext<'a> {
    pub module: &'a Module,
    pub type_info: &'a TypeCheckOutput,
    pub options: &'a CompilerOptions,
    pub output_paths: &'a OutputPaths,
    pub analysis_facts: &'a AnalysisFacts,
    pub optimization_facts: &'a OptimizationFacts,
}

/// A code-generation (or, as here, analysis-dump) target.
pub trait Backend {
    fn info(&self) -> BackendInfo;

    /// Consume the residualized, lowered module. Invoked exactly once, after
    /// every frontend pass has run.
    fn emit(&self, ctx: &BackendContext) -> Result<(), BackendError>;

    /// Offer one unclaimed CLI argument at `argv[index]` to this backend.
    /// Backends with no options of their own can rely on the default, which
    /// always declines.
    fn parse_option(&mut self, argv: &[String], index: usize) -> ParsedOption {
        let _ = (argv, index);
        ParsedOption::unowned()
    }

    fn print_usage(&self, out: &mut dyn std::io::Write) {
        let info = self.info();
        let _ = writeln!(out, "  {} ({}) - {}", info.name, info.version, info.description);
    }
}

/// Looks up and lists registered backends (spec §6: `find_backend(name)`;
/// `list_backends()`).
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self { backends: Vec::new() }
    }

    /// The registry this binary ships: the `dump` reference backend plus
    /// whatever else is registered. A real deployment would register one
    /// backend per target (native, wasm, ...); this workspace only proves
    /// the registry contract end-to-end.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(dump::DumpBackend::new()));
        registry
    }

    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    pub fn find_backend(&self, name: &str) -> Result<&dyn Backend, BackendError> {
        self.backends
            .iter()
            .find(|b| b.info().name == name)
            .map(|b| b.as_ref())
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    pub fn find_backend_mut(&mut self, name: &str) -> Result<&mut Box<dyn Backend>, BackendError> {
        self.backends.iter_mut().find(|b| b.info().name == name).ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    pub fn list_backends(&self) -> Vec<BackendInfo> {
        self.backends.iter().map(|b| b.info()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_finds_the_dump_backend() {
        let registry = BackendRegistry::with_defaults();
        assert!(registry.find_backend("dump").is_ok());
        assert!(matches!(registry.find_backend("nonexistent"), Err(BackendError::NotFound(_))));
    }

    #[test]
    fn listing_reports_every_registered_backend() {
        let registry = BackendRegistry::with_defaults();
        let names: Vec<_> = registry.list_backends().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["dump"]);
    }
}
