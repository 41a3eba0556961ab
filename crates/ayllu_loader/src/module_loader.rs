//! Multi-file project loading.
//!
//! Follows `import` statements starting from an entry file, resolving each
//! logical path against the project root plus the importing file's
//! directory (spec §6, "Module input"). Parsing only: tagging loaded
//! declarations with an importing scope's `instance_id` and splicing them
//! into the importer's arena is the semantic core's job (`frontend::loader`
//! glue in the root crate), since that requires the core's symbol table.
//!
//! Grounded on the donor's `frontend::resolver::ModuleResolver`: same
//! cycle-safe `processed` set, same "pop a work queue of (path, segments)"
//! shape.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ayllu_syntax::ast::{Module, StmtKind};
use ayllu_syntax::lexer;
use ayllu_syntax::parser;

use crate::error::LoadError;

/// A project file, parsed, with the logical path segments it was imported as.
#[derive(Debug)]
pub struct LoadedModule {
    /// Logical import path, e.g. `["collections", "vector"]`. Empty for the entry file.
    pub path_segments: Vec<String>,
    pub filename: String,
    pub source: String,
    pub ast: Module,
}

/// Discovers and parses every file reachable from an entry point via `import`.
#[derive(Debug, Default)]
pub struct ModuleLoader {
    project_root: PathBuf,
    processed: HashSet<PathBuf>,
}

impl ModuleLoader {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self { project_root: project_root.into(), processed: HashSet::new() }
    }

    /// Load the entry file and everything it (transitively) imports.
    ///
    /// The entry module is always first in the returned vector; dependencies
    /// follow in discovery order. A file imported more than once (directly
    /// or via a cycle) is only loaded once.
    pub fn load(&mut self, entry_path: &Path) -> Result<Vec<LoadedModule>, LoadError> {
        self.processed.clear();
        let mut out = Vec::new();
        let mut queue: Vec<(PathBuf, Vec<String>)> = vec![(entry_path.to_path_buf(), Vec::new())];

        while let Some((path, path_segments)) = queue.pop() {
            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !self.processed.insert(canonical) {
                continue;
            }

            let loaded = self.load_one(&path, path_segments)?;
            let base_dir = path.parent().unwrap_or(Path::new("."));
            for stmt in &loaded.ast.top_level {
                if let StmtKind::Import(import) = &loaded.ast.stmt(*stmt).kind {
                    let dep_path = self.resolve_logical_path(&import.path, base_dir)?;
                    queue.push((dep_path, import.path.clone()));
                }
            }
            out.push(loaded);
        }

        Ok(out)
    }

    fn load_one(&self, path: &Path, path_segments: Vec<String>) -> Result<LoadedModule, LoadError> {
        let filename = path.display().to_string();
        let source = fs::read_to_string(path).map_err(|source| LoadError::Io { path: filename.clone(), source })?;

        let tokens =
            lexer::lex(&source).map_err(|errors| LoadError::Lex { path: filename.clone(), errors })?;
        let ast =
            parser::parse(&tokens, filename.clone()).map_err(|errors| LoadError::Parse { path: filename.clone(), errors })?;

        tracing::debug!(file = %filename, top_level = ast.top_level.len(), "loaded module");
        Ok(LoadedModule { path_segments, filename, source, ast })
    }

    /// Resolve a logical `import` path to a source file.
    ///
    /// Tries, in order: `<dir>/<segments joined by />.ayl`,
    /// `<project_root>/<segments joined by />.ayl` (absolute-from-root
    /// fallback), then a directory-with-`mod.ayl` convention.
    fn resolve_logical_path(&self, segments: &[String], current_dir: &Path) -> Result<PathBuf, LoadError> {
        let joined: PathBuf = segments.iter().collect();
        let candidates = [
            current_dir.join(&joined).with_extension("ayl"),
            self.project_root.join(&joined).with_extension("ayl"),
            current_dir.join(&joined).join("mod.ayl"),
            self.project_root.join(&joined).join("mod.ayl"),
        ];
        candidates
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| LoadError::UnresolvedImport { path: segments.join("::") })
    }
}
