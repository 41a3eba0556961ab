//! `dump` backend: the reference implementation of the `Backend` contract
//! (SPEC_FULL §2 "Backend registry bootstrap"). It performs no code
//! generation; it serializes what the frontend learned about the module
//! (function/tuple-type inventory, which expressions folded, which branches
//! the residualizer dropped) so the registry, option-parsing, and emit
//! plumbing can be exercised end-to-end without a real target.

use std::io::Write;

use serde::Serialize;

use super::{Backend, BackendContext, BackendError, BackendInfo, ParsedOption};
use crate::version::AYLLU_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    /// `{:#?}`-style Rust debug output.
    Debug,
    Json,
}

pub struct DumpBackend {
    format: DumpFormat,
}

impl DumpBackend {
    pub fn new() -> Self {
        Self { format: DumpFormat::Debug }
    }
}

impl Default for DumpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct DumpReport {
    functions: Vec<String>,
    tuple_types: Vec<String>,
    type_decls: Vec<String>,
    constexpr_conditions_resolved: usize,
    constexpr_values_folded: usize,
    foldable_functions: Vec<String>,
    fold_skip_reasons: Vec<(String, String)>,
}

impl Backend for DumpBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo { name: "dump", description: "serializes frontend analysis facts; performs no code generation", version: AYLLU_VERSION }
    }

    fn emit(&self, ctx: &BackendContext) -> Result<(), BackendError> {
        let mut functions: Vec<String> = ctx.type_info.functions.keys().cloned().collect();
        functions.sort();
        let mut tuple_types: Vec<String> = ctx.type_info.tuple_types.keys().cloned().collect();
        tuple_types.sort();
        let mut type_decls: Vec<String> = ctx.type_info.type_decls.keys().cloned().collect();
        type_decls.sort();
        let mut foldable_functions: Vec<String> = ctx.optimization_facts.foldable_functions.iter().cloned().collect();
        foldable_functions.sort();
        let mut fold_skip_reasons: Vec<(String, String)> = ctx.optimization_facts.fold_skip_reasons.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        fold_skip_reasons.sort();

        let report = DumpReport {
            functions,
            tuple_types,
            type_decls,
            constexpr_conditions_resolved: ctx.optimization_facts.constexpr_conditions.len(),
            constexpr_values_folded: ctx.analysis_facts.constexpr_values_folded,
            foldable_functions,
            fold_skip_reasons,
        };

        let rendered = match self.format {
            DumpFormat::Debug => format!("{report:#?}"),
            DumpFormat::Json => serde_json::to_string_pretty(&report).map_err(|e| BackendError::Emit { backend: "dump".into(), message: e.to_string() })?,
        };

        match &ctx.output_paths.out_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| BackendError::Emit { backend: "dump".into(), message: e.to_string() })?;
                let path = dir.join("dump.out");
                std::fs::write(&path, rendered).map_err(|e| BackendError::Emit { backend: "dump".into(), message: e.to_string() })?;
                tracing::info!(path = %path.display(), "wrote dump backend report");
            }
            None => println!("{rendered}"),
        }
        Ok(())
    }

    fn parse_option(&mut self, argv: &[String], index: usize) -> ParsedOption {
        let Some(value) = argv[index].strip_prefix("--dump-format=") else {
            return ParsedOption::unowned();
        };
        match value {
            "debug" => {
                self.format = DumpFormat::Debug;
                ParsedOption::owned()
            }
            "json" => {
                self.format = DumpFormat::Json;
                ParsedOption::owned()
            }
            other => ParsedOption::rejected(format!("unknown --dump-format value '{other}' (expected 'debug' or 'json')")),
        }
    }

    fn print_usage(&self, out: &mut dyn Write) {
        let _ = writeln!(out, "  dump ({}) - {}", self.info().version, self.info().description);
        let _ = writeln!(out, "    --dump-format=debug|json   output format (default: debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_format_option_is_claimed_and_applied() {
        let mut backend = DumpBackend::new();
        let argv = vec!["--dump-format=json".to_string()];
        let result = backend.parse_option(&argv, 0);
        assert!(result.owned);
        assert!(result.error.is_none());
        assert_eq!(backend.format, DumpFormat::Json);
    }

    #[test]
    fn unrelated_option_is_declined() {
        let mut backend = DumpBackend::new();
        let argv = vec!["--allow-process".to_string()];
        let result = backend.parse_option(&argv, 0);
        assert!(!result.owned);
    }

    #[test]
    fn unknown_format_value_is_rejected() {
        let mut backend = DumpBackend::new();
        let argv = vec!["--dump-format=wasm".to_string()];
        let result = backend.parse_option(&argv, 0);
        assert!(result.owned);
        assert!(result.error.is_some());
    }
}
