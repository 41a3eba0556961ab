//! `resource{ a/b/c }` expression loader (spec §6).
//!
//! Resolves the segment path relative to the project root or the current
//! file's directory (current-file-relative takes precedence, matching
//! `import`'s lookup order). The result shape mirrors what the core turns
//! into AST: a single file becomes a string; a directory becomes a list of
//! `(filename, contents)` pairs (the core wraps these in the synthetic
//! `__Tuple2_#s_#s` type, per spec's "§6 Resource expression"); a missing
//! path is not an error, it yields an empty directory listing.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read resource file '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read resource directory '{path}': {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resource file '{path}' is not valid UTF-8")]
    NotUtf8 { path: String },
}

/// One `(filename, contents)` record for a directory resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub filename: String,
    pub contents: String,
}

/// Resolved shape of a `resource{}` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    /// The path named a regular file; its contents as text.
    File(String),
    /// The path named a directory; its immediate entries, sorted by name for determinism.
    Directory(Vec<ResourceEntry>),
    /// The path does not exist under either root. Callers should treat this
    /// like an empty directory ("an empty array of that type", spec §6),
    /// not an error.
    Missing,
}

/// Load a `resource{}` path. `segments` join with `/`; lookup tries
/// `current_file_dir/segments` first, then `project_root/segments`.
pub fn load_resource(project_root: &Path, current_file_dir: &Path, segments: &[String]) -> Result<ResourceValue, ResourceError> {
    let joined: PathBuf = segments.iter().collect();
    let candidates = [current_file_dir.join(&joined), project_root.join(&joined)];

    for candidate in candidates {
        if candidate.is_file() {
            let path = candidate.display().to_string();
            let bytes = fs::read(&candidate).map_err(|source| ResourceError::ReadFile { path: path.clone(), source })?;
            let text = String::from_utf8(bytes).map_err(|_| ResourceError::NotUtf8 { path })?;
            return Ok(ResourceValue::File(text));
        }
        if candidate.is_dir() {
            let path = candidate.display().to_string();
            let mut entries = Vec::new();
            for entry in fs::read_dir(&candidate).map_err(|source| ResourceError::ReadDir { path: path.clone(), source })? {
                let entry = entry.map_err(|source| ResourceError::ReadDir { path: path.clone(), source })?;
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let filename = entry.file_name().to_string_lossy().into_owned();
                let bytes = fs::read(entry.path()).map_err(|source| ResourceError::ReadFile { path: filename.clone(), source })?;
                let contents = String::from_utf8(bytes).map_err(|_| ResourceError::NotUtf8 { path: filename.clone() })?;
                entries.push(ResourceEntry { filename, contents });
            }
            entries.sort_by(|a, b| a.filename.cmp(&b.filename));
            return Ok(ResourceValue::Directory(entries));
        }
    }

    Ok(ResourceValue::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_missing_not_error() {
        let dir = std::env::temp_dir();
        let result = load_resource(&dir, &dir, &["definitely-does-not-exist-xyz".to_string()]).unwrap();
        assert_eq!(result, ResourceValue::Missing);
    }
}
