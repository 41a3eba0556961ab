//! Statement checking: function bodies, declarations, control flow (spec
//! §4.2, continued). Expression inference lives in [`super::check_expr`];
//! this module drives the statement-level scaffolding around it: scope
//! push/pop for blocks, loop-depth/return-type bookkeeping, and the
//! compile-time constant cycle check.

use std::collections::HashSet;

use ayllu_core::types::PrimitiveId;
use ayllu_syntax::ast::*;
use ayllu_syntax::span::Span;

use crate::frontend::cte::{self, Env, EvalOutcome, GlobalResolver};
use crate::frontend::diagnostics::CompileError;
use crate::frontend::symbols::{ScopeId, Symbol, SymbolKind};

use super::check_expr::types_compatible;
use super::{ConstState, TypeChecker};

impl TypeChecker {
    pub(crate) fn check_stmt(&mut self, module: &mut Module, stmt: StmtId) {
        let kind = module.stmt(stmt).kind.clone();
        let span = module.stmt(stmt).span;
        match kind {
            StmtKind::FuncDecl(f) => self.check_func_decl(module, &f),
            // Recursion and the symbol table entry are both handled in
            // `predeclare`; nothing left to check per-body here.
            StmtKind::TypeDecl(_) => {}
            StmtKind::VarDecl(v) => self.check_var_decl(module, stmt, v),
            // Cross-file resolution is `ayllu_loader`'s job, run before this
            // module ever reaches the checker; an `import` that survives to
            // here has already been satisfied.
            StmtKind::Import(_) => {}
            StmtKind::Expr(e) => {
                self.in_stmt_expr = true;
                self.infer_expr(module, e);
            }
            StmtKind::Return(value) => self.check_return(module, value, span),
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.error(CompileError::semantic("'break' outside of a loop", span));
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(CompileError::semantic("'continue' outside of a loop", span));
                }
            }
            StmtKind::ConditionalStmt { condition, then_branch, else_branch } => {
                self.check_conditional_stmt(module, condition, then_branch, else_branch, span);
            }
        }
    }

    fn check_func_decl(&mut self, module: &mut Module, f: &FuncDecl) {
        if super::mono::is_generic_decl(f) {
            // Un-instantiated template: only its monomorphized clones get a
            // body check, each with concrete types substituted in.
            return;
        }
        if f.is_external {
            if !f.body.is_empty() {
                self.error(CompileError::semantic(format!("external function '{}' may not have a body", f.name), f.span));
            }
            for param in f.params.iter().chain(f.receivers.iter()) {
                if !matches!(param.ty, Some(Type::Primitive(_))) {
                    self.error(CompileError::semantic(format!("external function '{}' parameters must be primitive types", f.name), f.span));
                }
            }
            return;
        }

        let root = self.symbols.root_scope();
        let scope = self.symbols.push_scope(Some(root));
        self.scope_stack.push(scope);

        let mut receiver_set = HashSet::new();
        for receiver in &f.receivers {
            receiver_set.insert(receiver.name.clone());
            self.define_param(scope, receiver, true);
        }
        for param in &f.params {
            self.define_param(scope, param, false);
        }
        self.receiver_names.push(receiver_set);
        self.return_types_stack.push(f.return_types.clone());

        for &s in &f.body {
            self.check_stmt(module, s);
            if matches!(module.stmt(s).kind, StmtKind::Return(_)) {
                break;
            }
        }

        self.return_types_stack.pop();
        self.receiver_names.pop();
        self.scope_stack.pop();
    }

    fn define_param(&mut self, scope: ScopeId, param: &Param, is_receiver: bool) {
        let symbol = Symbol {
            name: param.name.clone(),
            kind: SymbolKind::Variable,
            // A generic template's params never reach here (filtered out
            // above), so `ty` is always concrete by this point.
            ty: param.ty.clone(),
            is_mutable: is_receiver,
            is_external: false,
            is_exported: false,
            declaration: None,
            scope_instance_id: 0,
        };
        if self.symbols.define(scope, param.name.clone(), symbol).is_err() && param.name != "_" {
            self.error(CompileError::semantic(format!("parameter '{}' shadows an existing definition", param.name), param.span));
        }
    }

    fn check_return(&mut self, module: &mut Module, value: Option<ExprId>, span: Span) {
        let expected = self.return_types_stack.last().cloned().unwrap_or_default();
        match (value, expected.len()) {
            (None, 0) => {}
            (None, n) => {
                self.error(CompileError::semantic(format!("expected {n} return value(s), found none"), span));
            }
            (Some(e), 0) => {
                self.infer_expr(module, e);
                self.error(CompileError::semantic("function declares no return value", span));
            }
            (Some(e), _) => {
                let actual = self.infer_expr(module, e);
                let expected_ty = self.tuple_return_type(&expected);
                if !types_compatible(&actual, &expected_ty) && !self.literal_assignable_to(module, e, &expected_ty) {
                    self.error(CompileError::semantic(format!("return type mismatch: expected {expected_ty}, found {actual}"), span));
                }
            }
        }
    }

    fn check_conditional_stmt(&mut self, module: &mut Module, condition: ExprId, then_branch: Vec<StmtId>, else_branch: Option<Vec<StmtId>>, span: Span) {
        let cond_ty = self.infer_expr(module, condition);
        if cond_ty != Type::Primitive(PrimitiveId::Bool) {
            self.error(CompileError::semantic("'if' condition must be bool", span));
        }
        // I6: a statically known condition only checks the branch taken.
        match self.fold_now(module, condition).known_value().and_then(|v| v.as_bool()) {
            Some(true) => self.check_branch(module, &then_branch),
            Some(false) => {
                if let Some(branch) = &else_branch {
                    self.check_branch(module, branch);
                }
            }
            None => {
                self.check_branch(module, &then_branch);
                if let Some(branch) = &else_branch {
                    self.check_branch(module, branch);
                }
            }
        }
    }

    fn check_branch(&mut self, module: &mut Module, stmts: &[StmtId]) {
        let scope = self.symbols.push_scope(Some(self.current_scope()));
        self.scope_stack.push(scope);
        for &s in stmts {
            self.check_stmt(module, s);
            if matches!(module.stmt(s).kind, StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue) {
                break;
            }
        }
        self.scope_stack.pop();
    }

    fn check_var_decl(&mut self, module: &mut Module, stmt: StmtId, v: VarDecl) {
        let is_top_level_const = v.kind == BindingKind::Const && self.scope_stack.len() == 1;

        let symbol = Symbol {
            name: v.name.clone(),
            kind: if v.kind == BindingKind::Const { SymbolKind::Constant } else { SymbolKind::Variable },
            ty: v.declared_type.clone(),
            is_mutable: v.is_mutable,
            is_external: false,
            is_exported: v.is_exported,
            declaration: Some(stmt),
            scope_instance_id: 0,
        };
        let symbol_id = match self.symbols.define(self.current_scope(), v.name.clone(), symbol) {
            Ok(id) => id,
            Err(_) => {
                self.error(CompileError::semantic(format!("'{}' shadows an existing definition in this scope", v.name), v.span));
                self.infer_expr(module, v.initializer);
                return;
            }
        };

        if is_top_level_const {
            self.const_state.insert(symbol_id, ConstState::InProgress);
        }

        let initializer_ty = self.infer_expr(module, v.initializer);
        let declared_ty = v.declared_type.clone().unwrap_or_else(|| initializer_ty.clone());
        if v.declared_type.is_some()
            && !types_compatible(&declared_ty, &initializer_ty)
            && !self.literal_assignable_to(module, v.initializer, &declared_ty)
        {
            self.error(CompileError::semantic(format!("'{}' declared as {declared_ty}, initialized with {initializer_ty}", v.name), v.span));
        }
        self.symbols.symbol_mut(symbol_id).ty = Some(declared_ty.clone());

        if !is_top_level_const {
            return;
        }

        let mut globals = CycleGuard { state: &self.const_state, values: &self.global_values };
        let ctx = self.eval_context(module);
        let mut env = Env::new();
        match cte::eval(&ctx, v.initializer, &mut env, &mut globals) {
            EvalOutcome::Known(value) => {
                self.global_values.insert(symbol_id, value);
            }
            EvalOutcome::Error(reason) => {
                self.error(CompileError::cte_hard(reason, v.span));
            }
            // A constant initializer that isn't (yet) foldable is not itself
            // an error: only a later constexpr-required context that tries
            // to consume it would surface one.
            EvalOutcome::Unknown(_) => {}
        }
        self.const_state.insert(symbol_id, ConstState::Done);
    }
}

/// [`GlobalResolver`] used while folding a top-level constant's own
/// initializer. Resolves earlier, already-folded constants from
/// `global_values`; a read that lands back on the symbol currently being
/// folded means the initializer depends on itself (spec concrete scenario
/// 5's cycle detection). Parse-order resolution (only functions/types are
/// predeclared ahead of their use; constants are defined as they're reached)
/// means a cycle can only ever be this kind of self-reference, never a
/// forward-and-back cycle between two distinct top-level constants.
struct CycleGuard<'a> {
    state: &'a std::collections::HashMap<ayllu_syntax::ast::SymbolId, ConstState>,
    values: &'a std::collections::HashMap<ayllu_syntax::ast::SymbolId, cte::Value>,
}

impl<'a> GlobalResolver for CycleGuard<'a> {
    fn resolve_global(&mut self, symbol: SymbolId, name: &str) -> EvalOutcome {
        match self.state.get(&symbol) {
            Some(ConstState::InProgress) => EvalOutcome::Error(format!("Compile-time dependency cycle detected at symbol: {name}")),
            Some(ConstState::Done) => match self.values.get(&symbol) {
                Some(v) => EvalOutcome::Known(v.clone()),
                None => EvalOutcome::Unknown(format!("'{name}' did not fold to a compile-time value")),
            },
            None => EvalOutcome::Unknown(format!("'{name}' is not a known compile-time constant here")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayllu_syntax::ast::Module;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn self_referential_constant_is_rejected() {
        let mut module = Module::new("cycle.ayl");
        let ident = module.alloc_expr(ExprKind::Identifier("A".into()), span());
        let plus_one = module.alloc_expr(ExprKind::IntLiteral { value: 1, suffix: None }, span());
        let add = module.alloc_expr(ExprKind::Binary { op: BinaryOp::Add, left: ident, right: plus_one }, span());
        let decl = VarDecl { kind: BindingKind::Const, name: "A".into(), declared_type: None, is_mutable: false, is_exported: false, initializer: add, span: span() };
        let stmt = module.alloc_stmt(StmtKind::VarDecl(decl), span());
        module.top_level.push(stmt);

        let mut checker = TypeChecker::new();
        let _ = checker.check_module(&mut module);
        assert!(checker.errors.iter().any(|e| e.message.contains("Compile-time dependency cycle detected at symbol: A")));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let mut module = Module::new("break.ayl");
        let stmt = module.alloc_stmt(StmtKind::Break, span());
        let body = vec![stmt];
        let decl = FuncDecl { name: "f".into(), receivers: vec![], params: vec![], return_types: vec![], body, is_external: false, is_exported: false, span: span() };
        let func_stmt = module.alloc_stmt(StmtKind::FuncDecl(decl), span());
        module.top_level.push(func_stmt);

        let mut checker = TypeChecker::new();
        let _ = checker.check_module(&mut module);
        assert!(checker.errors.iter().any(|e| e.message.contains("'break' outside of a loop")));
    }
}
