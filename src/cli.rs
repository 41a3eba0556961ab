//! CLI driver (spec §6: "CLI/driver", named as a thin external collaborator,
//! out of scope for the semantic core itself). This module only ever reaches
//! into the core through the same interfaces a third-party backend author
//! would use: [`crate::frontend::compile_module_with_caps`] and the
//! [`crate::backend::BackendRegistry`].
//!
//! Grounded on the donor's `cli::mod::run` (args-driven dispatch, one
//! subcommand per pipeline stage) but re-cut around this workspace's actual
//! pipeline stages instead of the donor's `build`/`run`/`fmt`/`test`
//! surface: code generation, formatting, and a test runner are all out of
//! scope here (spec §1 "Out of scope").

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use ayllu_loader::ModuleLoader;

use crate::backend::{BackendContext, BackendRegistry, OutputPaths};
use crate::frontend::cte::CteCaps;
use crate::frontend::diagnostics::CompileError;
use crate::frontend::compile_module_with_caps;
use crate::frontend::loader::{merge_project, resolve_external_exprs};
use crate::version::AYLLU_VERSION;

/// Driver-level options a [`crate::backend::Backend`] reads through
/// [`BackendContext::options`] (spec §6's `BackendContext` names an
/// `Options` field alongside `OutputPaths`; this is its shape).
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub allow_process: bool,
    pub caps: CteCaps,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { allow_process: false, caps: CteCaps::default() }
    }
}

/// Top-level CLI surface (spec §1's thin driver). Unrecognized trailing
/// arguments are offered to the selected backend one at a time via
/// [`crate::backend::Backend::parse_option`] (spec §6), matching the
/// registry's per-option contract rather than baking backend flags into
/// this parser.
#[derive(Parser, Debug)]
#[command(name = "ayllu", version = AYLLU_VERSION, about = "Frontend and semantic middle-end for the Ayllu systems language")]
struct Cli {
    /// Entry source file.
    file: PathBuf,

    /// Registered backend to invoke after residualization (spec §6
    /// `find_backend`). Defaults to the `dump` reference backend.
    #[arg(long, default_value = "dump")]
    backend: String,

    /// List every registered backend and exit.
    #[arg(long)]
    list_backends: bool,

    /// Directory the chosen backend should write its output to. Omit to
    /// write to stdout (every reference backend here honors this).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Enable `process{}` expressions (spec §6: "disabled unless the driver
    /// passed --allow-process").
    #[arg(long)]
    allow_process: bool,

    /// Compile-time evaluator recursion cap (spec §4.3 "Scheduling").
    #[arg(long, default_value_t = CteCaps::default().max_recursion_depth)]
    max_recursion_depth: u32,

    /// Compile-time evaluator per-loop iteration cap.
    #[arg(long, default_value_t = CteCaps::default().max_loop_iterations)]
    max_loop_iterations: u64,

    /// Compile-time evaluator total VM-step cap per top-level call.
    #[arg(long, default_value_t = CteCaps::default().max_vm_steps)]
    max_vm_steps: u64,

    /// Options the selected backend claims via `parse_option` (e.g.
    /// `--dump-format=json`). Anything the backend declines is a usage error.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    backend_args: Vec<String>,
}

/// Parse `args`, run the pipeline, and return the process exit code. Split
/// out from [`run`] so tests can drive it without touching `std::env` or
/// calling `std::process::exit`.
pub fn run_with_args<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let mut registry = BackendRegistry::with_defaults();

    if cli.list_backends {
        for info in registry.list_backends() {
            println!("{} ({}) - {}", info.name, info.version, info.description);
        }
        return ExitCode::SUCCESS;
    }

    let Ok(backend) = registry.find_backend_mut(&cli.backend) else {
        eprintln!("error: no backend registered under the name '{}'", cli.backend);
        eprintln!("available backends:");
        for info in registry.list_backends() {
            eprintln!("  {} - {}", info.name, info.description);
        }
        return ExitCode::FAILURE;
    };

    let mut index = 0;
    while index < cli.backend_args.len() {
        let outcome = backend.parse_option(&cli.backend_args, index);
        if !outcome.owned {
            eprintln!("error: unrecognized option '{}' for backend '{}'", cli.backend_args[index], cli.backend);
            return ExitCode::FAILURE;
        }
        if let Some(err) = outcome.error {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
        index += 1;
    }

    let options = CompilerOptions {
        allow_process: cli.allow_process,
        caps: CteCaps {
            max_recursion_depth: cli.max_recursion_depth,
            max_loop_iterations: cli.max_loop_iterations,
            max_vm_steps: cli.max_vm_steps,
        },
    };

    let project_root = cli.file.parent().unwrap_or(Path::new(".")).to_path_buf();
    let entry_source = match std::fs::read_to_string(&cli.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {e}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };

    let mut loader = ModuleLoader::new(project_root.clone());
    let mut loaded = match loader.load(&cli.file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(errors) = resolve_external_exprs(&mut loaded, &project_root, options.allow_process) {
        report_errors(&cli.file.display().to_string(), &entry_source, &errors);
        return ExitCode::FAILURE;
    }

    let mut module = merge_project(loaded);

    let compiled = match compile_module_with_caps(&mut module, options.caps) {
        Ok(compiled) => compiled,
        Err(errors) => {
            report_errors(&cli.file.display().to_string(), &entry_source, &errors);
            return ExitCode::FAILURE;
        }
    };

    let output_paths = OutputPaths { out_dir: cli.out_dir };
    let ctx = BackendContext {
        module: &module,
        type_info: &compiled.type_info,
        options: &options,
        output_paths: &output_paths,
        analysis_facts: &compiled.analysis_facts,
        optimization_facts: &compiled.optimization_facts,
    };

    if let Err(e) = backend.emit(&ctx) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Thin wrapper [`crate::main`] calls; owns the real process exit.
pub fn run() -> ExitCode {
    run_with_args(std::env::args())
}

/// Render accumulated semantic-core errors (spec §7: "the core does not
/// attempt multi-error recovery ... beyond finishing the current top-level
/// statement", so a run can surface several). Best-effort: spans from an
/// imported dependency's source don't line up with `source`, since
/// `merge_project` splices dependency declarations into the entry module's
/// arena without concatenating source text, a limitation of this thin
/// driver, not the semantic core it wraps.
fn report_errors(filename: &str, source: &str, errors: &[CompileError]) {
    for error in errors {
        let report = miette::Report::new(error.clone()).with_source_code(miette::NamedSource::new(filename, source.to_string()));
        eprintln!("{report:?}");
    }
    eprintln!("{} error(s)", errors.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_backends_exits_successfully() {
        let dir = std::env::temp_dir();
        let file = dir.join("ayllu_cli_test_list.ayl");
        std::fs::write(&file, "const X: i32 = 1;").unwrap();
        let code = run_with_args(["ayllu", file.to_str().unwrap(), "--list-backends"]);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn unknown_backend_fails() {
        let dir = std::env::temp_dir();
        let file = dir.join("ayllu_cli_test_unknown.ayl");
        std::fs::write(&file, "const X: i32 = 1;").unwrap();
        let code = run_with_args(["ayllu", file.to_str().unwrap(), "--backend", "nonexistent"]);
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[test]
    fn compiles_a_trivial_file_with_the_dump_backend() {
        let dir = std::env::temp_dir();
        let file = dir.join("ayllu_cli_test_ok.ayl");
        std::fs::write(&file, "const X: i32 = 2 * 3;").unwrap();
        let code = run_with_args(["ayllu", file.to_str().unwrap()]);
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn type_errors_produce_a_failing_exit_code() {
        let dir = std::env::temp_dir();
        let file = dir.join("ayllu_cli_test_bad.ayl");
        std::fs::write(&file, "const X: i32 = undefined_name;").unwrap();
        let code = run_with_args(["ayllu", file.to_str().unwrap()]);
        assert_eq!(code, ExitCode::FAILURE);
    }
}
