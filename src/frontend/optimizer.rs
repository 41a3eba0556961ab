//! Optimizer (spec §4.4): walks a checked module, driving the compile-time
//! evaluator over every reachable expression and recording what folds to a
//! known value. The residualizer consumes [`OptimizationFacts`] without
//! re-running any evaluation itself.
//!
//! **Reachability.** Every top-level constant initializer and every
//! top-level function body (including monomorphized clones) is walked
//! directly, parameters unbound (a reference to one simply resolves
//! `Unknown` and the walk stops recording past that point, the same way any
//! other non-constexpr value would). This is what lets an entry point like
//! `main`, which no call in the module ever targets, still get its
//! constexpr conditions and literal folds recorded. A function body nested
//! inside another call (constant initializer or another already-foldable
//! call) is additionally folded in that context too, with the caller's
//! concrete arguments bound; every sub-expression either walk visits is
//! captured through the same observer, so facts accumulate rather than
//! overwrite. `foldable_functions` is derived from which call sites the
//! walk actually observed folding cleanly.

use std::collections::{HashMap, HashSet};

use ayllu_syntax::ast::*;

use super::cte::{self, CteCaps, Env, EvalContext, EvalOutcome, GlobalResolver, Observers, TypeFields, Value};
use super::typechecker::TypeCheckOutput;

/// Everything the residualizer needs, produced by one pass over the module
/// (spec §4.4 "Contract").
#[derive(Default)]
pub struct OptimizationFacts {
    pub constexpr_values: HashMap<ExprId, Value>,
    pub constexpr_inits: HashSet<StmtId>,
    pub foldable_functions: HashSet<String>,
    pub constexpr_conditions: HashMap<ExprId, bool>,
    pub fold_skip_reasons: HashMap<String, String>,
}

/// Two-state lattice per function (SPEC_FULL §2 "foldable_functions
/// fixpoint"): every function starts `Foldable` and flips to `NotFoldable`
/// on the first call observation that isn't Known, never back. A function
/// never observed being called at all stays out of `foldable_functions`
/// entirely; absence isn't a claim either way.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FoldState {
    Foldable,
    NotFoldable,
}

struct GlobalsView<'a> {
    values: &'a HashMap<SymbolId, Value>,
}

impl<'a> GlobalResolver for GlobalsView<'a> {
    fn resolve_global(&mut self, symbol: SymbolId, name: &str) -> EvalOutcome {
        match self.values.get(&symbol) {
            Some(v) => EvalOutcome::Known(v.clone()),
            None => EvalOutcome::Unknown(format!("'{name}' is not a known compile-time constant here")),
        }
    }
}

struct Optimizer<'a> {
    ctx: EvalContext<'a>,
    type_decls: &'a TypeFields,
    tuple_types: &'a TypeFields,
    global_values: HashMap<SymbolId, Value>,
    facts: OptimizationFacts,
    fold_state: HashMap<String, FoldState>,
}

/// Run the optimizer over a type-checked module, producing the facts the
/// residualizer rewrites against.
pub fn run(module: &Module, output: &TypeCheckOutput) -> OptimizationFacts {
    run_with_caps(module, output, CteCaps::default())
}

/// Same as [`run`], with CTE resource caps the driver controls via
/// `CompilerOptions` rather than the spec's suggested defaults.
#[tracing::instrument(skip_all, fields(decl_count = module.top_level.len()))]
pub fn run_with_caps(module: &Module, output: &TypeCheckOutput, caps: CteCaps) -> OptimizationFacts {
    let mut type_fields = output.type_decls.clone();
    type_fields.extend(output.tuple_types.clone());
    let ctx = EvalContext {
        module,
        expr_types: &output.expr_types,
        resolved_symbols: &output.resolved_symbols,
        functions: &output.functions,
        type_fields,
        caps,
    };
    let mut opt = Optimizer {
        ctx,
        type_decls: &output.type_decls,
        tuple_types: &output.tuple_types,
        global_values: output.global_values.clone(),
        facts: OptimizationFacts::default(),
        fold_state: HashMap::new(),
    };

    let root = output.symbols.root_scope();
    for &stmt in &module.top_level {
        match module.stmt(stmt).kind.clone() {
            StmtKind::VarDecl(v) => opt.fold_top_level_const(module, &output.symbols, root, stmt, &v),
            StmtKind::FuncDecl(f) => opt.fold_top_level_function(module, &f),
            _ => {}
        }
    }
    opt.classify_observed_calls(module);
    opt.facts
}

impl<'a> Optimizer<'a> {
    /// Evaluate `expr` with fresh observation, merging every `(expr, value)`
    /// pair the evaluator visits along the way into `constexpr_values`.
    fn eval_entry(&mut self, expr: ExprId, env: &mut Env) -> EvalOutcome {
        let mut recorded: Vec<(ExprId, Value)> = Vec::new();
        let outcome = {
            let mut on_eval = |id: ExprId, value: &Value| recorded.push((id, value.clone()));
            let mut observers = Observers { on_eval: Some(&mut on_eval), on_global_read: None };
            let mut globals = GlobalsView { values: &self.global_values };
            cte::eval_observed(&self.ctx, expr, env, &mut globals, &mut observers)
        };
        for (id, value) in recorded {
            self.facts.constexpr_values.insert(id, value);
        }
        outcome
    }

    fn fold_top_level_const(&mut self, module: &Module, symbols: &super::symbols::SymbolTable, root: super::symbols::ScopeId, stmt: StmtId, v: &VarDecl) {
        let mut env = Env::new();
        match self.eval_entry(v.initializer, &mut env) {
            EvalOutcome::Known(value) => {
                if let Some(symbol_id) = symbols.lookup(root, &v.name) {
                    self.global_values.insert(symbol_id, value);
                }
                self.facts.constexpr_inits.insert(stmt);
            }
            // Not every global has to be constexpr (spec §4.4 only folds
            // what it can); an `Unknown`/`Error` initializer simply never
            // enters `global_values`, so later reads of it stay `Unknown`
            // too rather than tripping an optimizer-level error.
            EvalOutcome::Unknown(_) | EvalOutcome::Error(_) => {}
        }

        // A condition reachable from top-level constant-folding (e.g. a
        // ternary inside another constant's initializer) already recorded
        // its boolean through `eval_entry`'s observer; promote it from
        // `constexpr_values` into the dedicated `constexpr_conditions` fact
        // wherever the AST shape says an expression is used as a condition.
        self.harvest_conditions(module, v.initializer);
    }

    /// Walk a top-level function's own body directly (not just through a
    /// call site), so an entry point like `main` (which no call in the
    /// module ever targets) still gets its constexpr conditions and
    /// literal folds recorded. Generic (unspecialized) declarations are
    /// walked too; an unbound type-parameter use simply resolves `Unknown`
    /// on first reference and the walk stops recording past that point,
    /// same as any other non-constexpr value would.
    fn fold_top_level_function(&mut self, module: &Module, f: &FuncDecl) {
        let mut recorded: Vec<(ExprId, Value)> = Vec::new();
        {
            let mut on_eval = |id: ExprId, value: &Value| recorded.push((id, value.clone()));
            let mut observers = Observers { on_eval: Some(&mut on_eval), on_global_read: None };
            let mut globals = GlobalsView { values: &self.global_values };
            cte::eval_function_body_observed(&self.ctx, &f.body, &mut globals, &mut observers);
        }
        for (id, value) in recorded {
            self.facts.constexpr_values.insert(id, value);
        }
        self.harvest_stmt_conditions(module, &f.body);
    }

    /// Recurse through a statement list promoting every `ConditionalStmt`
    /// whose condition already folded (via [`Self::fold_top_level_function`]
    /// or a call-driven walk) into `constexpr_conditions`, and delegate into
    /// each statement's own expressions via [`Self::harvest_conditions`] for
    /// nested ternaries.
    fn harvest_stmt_conditions(&mut self, module: &Module, stmts: &[StmtId]) {
        for &stmt in stmts {
            match module.stmt(stmt).kind.clone() {
                StmtKind::ConditionalStmt { condition, then_branch, else_branch } => {
                    if let Some(Value::Bool(b)) = self.facts.constexpr_values.get(&condition).cloned() {
                        self.facts.constexpr_conditions.insert(condition, b);
                    }
                    self.harvest_conditions(module, condition);
                    self.harvest_stmt_conditions(module, &then_branch);
                    if let Some(branch) = &else_branch {
                        self.harvest_stmt_conditions(module, branch);
                    }
                }
                StmtKind::VarDecl(v) => self.harvest_conditions(module, v.initializer),
                StmtKind::Expr(e) => self.harvest_conditions(module, e),
                StmtKind::Return(Some(e)) => self.harvest_conditions(module, e),
                StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::FuncDecl(_) | StmtKind::TypeDecl(_) | StmtKind::Import(_) => {}
            }
        }
    }

    /// Recurses through `expr`'s AST shape (not CTE's evaluation order) to
    /// find every `Conditional`/nested condition position and promote an
    /// already-captured boolean fold into `constexpr_conditions`.
    fn harvest_conditions(&mut self, module: &Module, expr: ExprId) {
        match &module.expr(expr).kind {
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                let (condition, true_expr, false_expr) = (*condition, *true_expr, *false_expr);
                if let Some(Value::Bool(b)) = self.facts.constexpr_values.get(&condition).cloned() {
                    self.facts.constexpr_conditions.insert(condition, b);
                }
                self.harvest_conditions(module, condition);
                self.harvest_conditions(module, true_expr);
                self.harvest_conditions(module, false_expr);
            }
            ExprKind::Binary { left, right, .. } => {
                let (left, right) = (*left, *right);
                self.harvest_conditions(module, left);
                self.harvest_conditions(module, right);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } | ExprKind::Length(operand) => {
                let operand = *operand;
                self.harvest_conditions(module, operand);
            }
            ExprKind::Call { args, receivers, .. } => {
                for &a in args.clone().iter().chain(receivers.clone().iter()) {
                    self.harvest_conditions(module, a);
                }
            }
            ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => {
                for &item in items.clone().iter() {
                    self.harvest_conditions(module, item);
                }
            }
            ExprKind::Index { operand, index } => {
                let (operand, index) = (*operand, *index);
                self.harvest_conditions(module, operand);
                self.harvest_conditions(module, index);
            }
            ExprKind::Member { operand, .. } => {
                let operand = *operand;
                self.harvest_conditions(module, operand);
            }
            ExprKind::Range { left, right } => {
                let (left, right) = (*left, *right);
                self.harvest_conditions(module, left);
                self.harvest_conditions(module, right);
            }
            ExprKind::Assignment { value, .. } => {
                let value = *value;
                self.harvest_conditions(module, value);
            }
            _ => {}
        }
    }

    /// After folding every top-level constant, scan the whole arena for
    /// `Call` nodes and classify the callee: a call the constant-folding
    /// walk already observed succeeding promotes it directly; any other
    /// call site is retried here in isolation so a genuinely unfoldable
    /// function gets a real, call-site-grounded skip reason rather than
    /// silently staying undecided.
    fn classify_observed_calls(&mut self, module: &Module) {
        for id in 0..module.expr_count() as ExprId {
            let ExprKind::Call { operand, receivers, .. } = module.expr(id).kind.clone() else { continue };
            let Some(name) = self.call_target_name(module, operand, &receivers) else { continue };
            if self.type_decls.contains_key(&name) || self.tuple_types.contains_key(&name) {
                continue; // a type constructor, not a function
            }
            if self.facts.constexpr_values.contains_key(&id) {
                self.promote(name);
                continue;
            }
            let mut env = Env::new();
            match self.eval_entry(id, &mut env) {
                EvalOutcome::Known(_) => self.promote(name),
                EvalOutcome::Unknown(reason) | EvalOutcome::Error(reason) => self.demote(name, reason),
            }
        }
    }

    fn call_target_name(&self, module: &Module, operand: ExprId, receivers: &[ExprId]) -> Option<String> {
        let ExprKind::Identifier(name) = &module.expr(operand).kind else { return None };
        let qualified = match receivers.first() {
            Some(&recv) => match self.ctx.expr_types.get(&recv) {
                Some(Type::Named { name: type_name, .. }) => format!("{type_name}::{name}"),
                _ => name.clone(),
            },
            None => name.clone(),
        };
        Some(qualified)
    }

    fn promote(&mut self, name: String) {
        let state = self.fold_state.entry(name.clone()).or_insert(FoldState::Foldable);
        if *state == FoldState::Foldable {
            self.facts.foldable_functions.insert(name);
        }
    }

    /// Mark `name` as no longer foldable; once `NotFoldable`, a later Known
    /// observation at a different call site must not re-promote it (spec
    /// §4.4: foldable iff *every* reachable call folds).
    fn demote(&mut self, name: String, reason: String) {
        self.fold_state.insert(name.clone(), FoldState::NotFoldable);
        self.facts.foldable_functions.remove(&name);
        self.facts.fold_skip_reasons.insert(name, reason);
    }
}

#[cfg(test)]
mod tests {
    use ayllu_syntax::lexer::lex;
    use ayllu_syntax::parser::parse;

    use crate::frontend::typechecker::check_module;

    use super::*;

    fn parse_src(src: &str) -> Module {
        let tokens = lex(src).unwrap_or_else(|errs| panic!("lex error in test source: {errs:?}"));
        parse(&tokens, "test.ayl").unwrap_or_else(|errs| panic!("parse error in test source: {errs:?}"))
    }

    #[test]
    fn top_level_constant_initializer_folds_to_a_known_value() {
        let mut module = parse_src("const LIMIT: u8 = 10 + 5;");
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = run(&module, &output);
        assert_eq!(facts.constexpr_values.len(), 1);
        assert!(facts.constexpr_inits.len() == 1);
    }

    #[test]
    fn constant_referencing_an_earlier_constant_also_folds() {
        let mut module = parse_src(
            r#"
            const BASE: u8 = 4;
            const DOUBLE: u8 = BASE * 2;
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = run(&module, &output);
        assert_eq!(facts.constexpr_inits.len(), 2);
    }

    #[test]
    fn ternary_condition_inside_a_constant_initializer_is_recorded() {
        let mut module = parse_src("const X: u8 = true ? 1 : 2;");
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = run(&module, &output);
        assert!(facts.constexpr_conditions.values().any(|&b| b));
    }
}
