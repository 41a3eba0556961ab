//! Layering guardrails (spec §9 "external boundary, intentionally thin").
//!
//! `ayllu_core`, `ayllu_syntax`, and `ayllu_loader` are meant to be usable
//! without the semantic core: lexer/parser/AST/diagnostics and project
//! loading should never need to reach back into the root `ayllu` crate's
//! type checker, CTE, optimizer, or backends. This scans each crate's own
//! `Cargo.toml` and fails if any lists `ayllu` as a dependency.

const MANIFESTS: &[(&str, &str)] = &[
    ("ayllu_core", include_str!("../crates/ayllu_core/Cargo.toml")),
    ("ayllu_syntax", include_str!("../crates/ayllu_syntax/Cargo.toml")),
    ("ayllu_loader", include_str!("../crates/ayllu_loader/Cargo.toml")),
];

#[test]
fn boundary_crates_do_not_depend_on_the_root_crate() {
    for (crate_name, manifest) in MANIFESTS {
        let mut in_dependencies = false;
        for raw_line in manifest.lines() {
            let line = raw_line.trim();
            if line.starts_with('[') {
                in_dependencies = line == "[dependencies]";
                continue;
            }
            if !in_dependencies || line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no_comment = line.split('#').next().unwrap_or("").trim();
            if line_no_comment.starts_with("ayllu ") || line_no_comment.starts_with("ayllu=") || line_no_comment.starts_with("ayllu\t") {
                panic!("{crate_name} must not depend on the root `ayllu` crate, found `{line_no_comment}` in its [dependencies]");
            }
        }
    }
}

/// The layering only goes one direction: `ayllu_loader` may depend on
/// `ayllu_syntax`/`ayllu_core`, `ayllu_syntax` may depend on `ayllu_core`,
/// but `ayllu_core` depends on neither.
#[test]
fn ayllu_core_has_no_path_dependencies() {
    let manifest = include_str!("../crates/ayllu_core/Cargo.toml");
    let mut in_dependencies = false;
    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        assert!(!line.contains("path ="), "ayllu_core should have no path dependencies, found: {line}");
    }
}
