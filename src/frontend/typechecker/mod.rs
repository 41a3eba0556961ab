//! Type checker + monomorphization (spec §4.2).
//!
//! `check_module` type-checks every top-level statement in parse order,
//! iterating by index because monomorphization appends new statements that
//! must also be checked (spec §4.2 "Contract"). Re-entrancy into an
//! already-checked statement is a no-op via the `checked` set keyed by
//! statement identity, matching the donor's `TypeChecker` which tracks
//! "already processed" declarations the same way to tolerate the
//! monomorphization append-and-revisit loop.

mod check_expr;
mod check_stmt;
mod mono;
mod tuple_types;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use ayllu_core::types::PrimitiveId;
use ayllu_syntax::ast::*;

use crate::frontend::cte::{CteCaps, GlobalResolver, TypeFields, Value};
use crate::frontend::diagnostics::CompileError;
use crate::frontend::symbols::{ScopeId, Symbol, SymbolKind, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstState {
    InProgress,
    Done,
}

/// Output of a successful (or partially successful, if the caller ignores
/// `errors`) type-check pass: everything later passes (CTE-at-scale via
/// the optimizer, the residualizer, the lowerer) need read access to it.
pub struct TypeCheckOutput {
    pub symbols: SymbolTable,
    pub resolved_symbols: HashMap<ExprId, SymbolId>,
    pub expr_types: HashMap<ExprId, Type>,
    pub tuple_types: TypeFields,
    pub type_decls: TypeFields,
    /// `qualified_name -> StmtId`, covering every `FuncDecl` including
    /// monomorphized clones appended during checking.
    pub functions: HashMap<String, StmtId>,
    pub global_values: HashMap<SymbolId, Value>,
}

pub struct TypeChecker {
    pub(crate) symbols: SymbolTable,
    pub(crate) resolved_symbols: HashMap<ExprId, SymbolId>,
    pub(crate) expr_types: HashMap<ExprId, Type>,
    pub(crate) errors: Vec<CompileError>,
    checked: HashSet<StmtId>,
    pub(crate) scope_stack: Vec<ScopeId>,
    pub(crate) tuple_types: TypeFields,
    pub(crate) type_decls: TypeFields,
    pub(crate) functions: HashMap<String, StmtId>,
    mono_cache: HashMap<String, String>,
    mono_pending: Vec<StmtId>,
    instance_counter: u32,
    const_state: HashMap<SymbolId, ConstState>,
    pub(crate) global_values: HashMap<SymbolId, Value>,
    pub(crate) caps: CteCaps,
    pub(crate) loop_depth: u32,
    pub(crate) return_types_stack: Vec<Vec<Type>>,
    /// Inside a receiver-bearing function, the receiver parameter names:
    /// assignable inside the body, never from an outer call site (spec
    /// §4.2 "Purity rules"). The CTE enforces the outer-call-site half;
    /// this set only governs what the type checker allows within the body.
    pub(crate) receiver_names: Vec<HashSet<String>>,
    /// Set right before `infer_expr` is entered from `StmtKind::Expr`; consumed
    /// (and reset) by `infer_expr`'s own entry so only that outermost call sees
    /// it, never a nested sub-expression. Lets `Iteration`/`Repeat` detect
    /// whether they were reached directly as a statement or nested inside a
    /// larger expression.
    pub(crate) in_stmt_expr: bool,
}

impl TypeChecker {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let root = symbols.root_scope();
        Self {
            symbols,
            resolved_symbols: HashMap::new(),
            expr_types: HashMap::new(),
            errors: Vec::new(),
            checked: HashSet::new(),
            scope_stack: vec![root],
            tuple_types: HashMap::new(),
            type_decls: HashMap::new(),
            functions: HashMap::new(),
            mono_cache: HashMap::new(),
            mono_pending: Vec::new(),
            instance_counter: 0,
            const_state: HashMap::new(),
            global_values: HashMap::new(),
            caps: CteCaps::default(),
            loop_depth: 0,
            return_types_stack: Vec::new(),
            receiver_names: Vec::new(),
            in_stmt_expr: false,
        }
    }

    pub fn with_caps(mut self, caps: CteCaps) -> Self {
        self.caps = caps;
        self
    }

    pub(crate) fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("INVARIANT: at least the root scope is always pushed")
    }

    pub(crate) fn next_instance_id(&mut self) -> u32 {
        self.instance_counter += 1;
        self.instance_counter
    }

    pub(crate) fn error(&mut self, err: CompileError) {
        self.errors.push(err);
    }

    /// Run the full pass: predeclare, then check every top-level statement
    /// in order, draining monomorphization's pending clones as they appear.
    pub fn check_module(&mut self, module: &mut Module) -> Result<(), ()> {
        self.predeclare(module);

        let mut index = 0;
        loop {
            while index < module.top_level.len() {
                let stmt = module.top_level[index];
                self.check_top_level_stmt(module, stmt);
                index += 1;
            }
            if self.mono_pending.is_empty() {
                break;
            }
            let pending = std::mem::take(&mut self.mono_pending);
            for stmt in pending {
                module.top_level.push(stmt);
            }
        }

        if self.errors.is_empty() { Ok(()) } else { Err(()) }
    }

    fn check_top_level_stmt(&mut self, module: &mut Module, stmt: StmtId) {
        if !self.checked.insert(stmt) {
            return;
        }
        self.check_stmt(module, stmt);
    }

    /// Phase 1 (spec §4.1): pre-declare module-top functions and types
    /// without type-checking their bodies. Constants/variables are resolved
    /// in parse order instead, so a constant observes only earlier
    /// definitions.
    fn predeclare(&mut self, module: &Module) {
        let root = self.symbols.root_scope();
        for &stmt in &module.top_level {
            match &module.stmt(stmt).kind {
                StmtKind::FuncDecl(f) => {
                    let is_generic = mono::is_generic_decl(f);
                    let symbol = Symbol {
                        name: f.qualified_name(),
                        kind: SymbolKind::Function,
                        ty: None,
                        is_mutable: false,
                        is_external: f.is_external,
                        is_exported: f.is_exported,
                        declaration: Some(stmt),
                        scope_instance_id: 0,
                    };
                    if self.symbols.define(root, f.qualified_name(), symbol).is_err() {
                        self.error(CompileError::semantic(format!("'{}' shadows an existing definition", f.qualified_name()), f.span));
                    }
                    self.functions.insert(f.qualified_name(), stmt);
                    if is_generic && (f.is_external || f.is_exported) {
                        self.error(
                            CompileError::semantic(format!("generic function '{}' cannot be external or exported", f.name), f.span)
                                .with_note("generic functions are only realized at monomorphized call sites"),
                        );
                    }
                }
                StmtKind::TypeDecl(t) => {
                    if mono::type_is_directly_recursive(t) {
                        self.error(CompileError::semantic(format!("type '{}' is directly recursive", t.name), t.span));
                    }
                    self.type_decls.insert(t.name.clone(), t.fields.clone());
                    let symbol = Symbol {
                        name: t.name.clone(),
                        kind: SymbolKind::Type,
                        ty: None,
                        is_mutable: false,
                        is_external: false,
                        is_exported: false,
                        declaration: Some(stmt),
                        scope_instance_id: 0,
                    };
                    if self.symbols.define(root, t.name.clone(), symbol).is_err() {
                        self.error(CompileError::semantic(format!("'{}' shadows an existing definition", t.name), t.span));
                    }
                }
                _ => {}
            }
        }
    }

    pub fn into_output(self) -> TypeCheckOutput {
        TypeCheckOutput {
            symbols: self.symbols,
            resolved_symbols: self.resolved_symbols,
            expr_types: self.expr_types,
            tuple_types: self.tuple_types,
            type_decls: self.type_decls,
            functions: self.functions,
            global_values: self.global_values,
        }
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience entry point used by the CLI/driver and by tests.
pub fn check_module(module: &mut Module) -> Result<TypeCheckOutput, Vec<CompileError>> {
    check_module_with_caps(module, CteCaps::default())
}

/// Same as [`check_module`], with CTE resource caps the driver controls via
/// `CompilerOptions` rather than the spec's suggested defaults.
#[tracing::instrument(skip_all, fields(decl_count = module.top_level.len()))]
pub fn check_module_with_caps(module: &mut Module, caps: CteCaps) -> Result<TypeCheckOutput, Vec<CompileError>> {
    let mut checker = TypeChecker::new().with_caps(caps);
    match checker.check_module(module) {
        Ok(()) => Ok(checker.into_output()),
        Err(()) => Err(checker.errors),
    }
}

/// A `GlobalResolver` view over the type checker's so-far-established
/// constant values, for CTE calls the checker itself makes (array sizes,
/// `constexpr_condition`). Does not perform cycle detection on its own;
/// cycle detection happens in [`check_stmt`]'s constant-initializer driver,
/// which populates `global_values` before any read can observe a cycle.
pub(crate) struct CheckerGlobals<'a> {
    pub(crate) values: &'a HashMap<SymbolId, Value>,
}

impl<'a> GlobalResolver for CheckerGlobals<'a> {
    fn resolve_global(&mut self, symbol: SymbolId, name: &str) -> crate::frontend::cte::EvalOutcome {
        match self.values.get(&symbol) {
            Some(v) => crate::frontend::cte::EvalOutcome::Known(v.clone()),
            None => crate::frontend::cte::EvalOutcome::Unknown(format!("'{name}' is not a known compile-time constant here")),
        }
    }
}

/// Smallest-fitting primitive for an integer literal without a suffix,
/// matching spec §4.2's literal-inference rule. Negative literals always
/// pick a signed family member; non-negative literals default to signed too
/// (an explicit `u` suffix is required for unsigned), mirroring systems
/// languages where bare integer literals are signed by default.
pub(crate) fn infer_literal_type(value: i128) -> PrimitiveId {
    if let Ok(v) = i64::try_from(value) {
        ayllu_core::types::smallest_signed_fitting(v)
    } else {
        PrimitiveId::I64
    }
}
