//! The semantic middle-end: everything between a parsed [`ayllu_syntax::ast::Module`]
//! and a module ready for a backend to consume.
//!
//! Passes run in this order: [`typechecker`] (predeclare, infer, monomorphize),
//! then [`optimizer`], then [`residualizer`], then [`lowerer`]. [`symbols`] and
//! [`diagnostics`] are shared vocabulary every pass depends on; [`cte`] is the
//! compile-time evaluator both the type checker and the optimizer drive.

pub mod cte;
pub mod diagnostics;
pub mod loader;
pub mod lowerer;
pub mod optimizer;
pub mod residualizer;
pub mod symbols;
pub mod typechecker;

use ayllu_syntax::ast::Module;

use cte::CteCaps;
use diagnostics::CompileError;
use optimizer::OptimizationFacts;
use typechecker::TypeCheckOutput;

/// Lightweight run statistics a backend can report without re-deriving them
/// from the full [`TypeCheckOutput`] (spec §6's `BackendContext` names an
/// `AnalysisFacts` field alongside `OptimizationFacts`; this is its shape).
#[derive(Debug, Clone, Default)]
pub struct AnalysisFacts {
    pub functions_checked: usize,
    pub tuple_types_synthesized: usize,
    pub constexpr_values_folded: usize,
}

/// Everything downstream of the frontend (a backend, or a test) needs: the
/// fully lowered module plus every side table the passes produced.
pub struct CompiledModule {
    pub type_info: TypeCheckOutput,
    pub optimization_facts: OptimizationFacts,
    pub analysis_facts: AnalysisFacts,
}

/// Run the full pipeline (type check, optimize, residualize, lower) over
/// `module` in place, matching spec §1's data-flow diagram. Type errors
/// abort the pipeline before any later pass runs, since they operate on the
/// assumption the module already type-checks.
pub fn compile_module(module: &mut Module) -> Result<CompiledModule, Vec<CompileError>> {
    compile_module_with_caps(module, CteCaps::default())
}

/// Same as [`compile_module`], with CTE resource caps the driver controls
/// via `CompilerOptions` rather than the spec's suggested defaults.
#[tracing::instrument(skip_all, fields(filename = %module.filename))]
pub fn compile_module_with_caps(module: &mut Module, caps: CteCaps) -> Result<CompiledModule, Vec<CompileError>> {
    let type_info = typechecker::check_module_with_caps(module, caps)?;
    let optimization_facts = optimizer::run_with_caps(module, &type_info, caps);
    residualizer::run(module, &optimization_facts, &type_info);
    lowerer::run(module, &type_info);

    let analysis_facts = AnalysisFacts {
        functions_checked: type_info.functions.len(),
        tuple_types_synthesized: type_info.tuple_types.len(),
        constexpr_values_folded: optimization_facts.constexpr_values.len(),
    };
    tracing::info!(
        functions = analysis_facts.functions_checked,
        tuple_types = analysis_facts.tuple_types_synthesized,
        folded = analysis_facts.constexpr_values_folded,
        "module compiled"
    );
    Ok(CompiledModule { type_info, optimization_facts, analysis_facts })
}
