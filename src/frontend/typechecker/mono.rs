//! Monomorphization (spec §4.2 "Monomorphization", §9 "Generic instantiation
//! cache").
//!
//! A generic function's body lives in the same arena as every other
//! statement, so "clone the function declaration" means deep-cloning every
//! expression/statement it reaches into fresh arena slots. Reusing the
//! original's `ExprId`/`StmtId`s would let two instantiations' type slots
//! (e.g. `id_G_i32`'s vs. `id_G_bool`'s) collide in the shared `expr_types`
//! side table.

use std::collections::HashMap;

use ayllu_syntax::ast::*;
use ayllu_syntax::span::Span;

use crate::frontend::diagnostics::CompileError;
use crate::frontend::symbols::{Symbol, SymbolKind};

use super::TypeChecker;

/// A function is generic if any non-expression parameter has no declared
/// type or a `TypeVar` type, or if any declared return is a `TypeVar`.
/// Expression parameters are exempt: they carry no type of their own to
/// instantiate (spec §4.2).
pub(crate) fn is_generic_decl(f: &FuncDecl) -> bool {
    let param_is_generic = f.params.iter().any(|p| !p.is_expr_param && matches!(p.ty, None | Some(Type::TypeVar(_))));
    let return_is_generic = f.return_types.iter().any(Type::is_type_var);
    param_is_generic || return_is_generic
}

/// Direct self-reference in any field, one level, not a transitive cycle
/// (spec §4.2 "recursive type declarations are rejected").
pub(crate) fn type_is_directly_recursive(t: &TypeDecl) -> bool {
    t.fields.iter().any(|(_, ty)| references_type_name(ty, &t.name))
}

fn references_type_name(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Named { name: n, .. } => n == name,
        Type::Array { element, .. } => references_type_name(element, name),
        _ => false,
    }
}

/// A stable per-type tag used both for mangled instantiation names
/// (`base_G_i32_bool`) and for synthetic tuple-type names (`__Tuple2_i32_i32`).
pub(crate) fn mangle_type(ty: &Type) -> String {
    match ty {
        Type::Primitive(id) => ayllu_core::types::as_str(*id).to_string(),
        Type::Named { name, .. } => name.clone(),
        Type::TypeVar(name) => name.clone(),
        Type::Array { element, .. } => format!("array_{}", mangle_type(element)),
    }
}

impl TypeChecker {
    /// Instantiate (or reuse a cached instantiation of) the generic function
    /// `qualified_name` declared at `decl_stmt`, for this call site's
    /// concrete `arg_types`, then rebind `operand` (the call's callee
    /// expression) to the mangled clone and return its return type.
    pub(crate) fn monomorphize_call(
        &mut self,
        module: &mut Module,
        qualified_name: &str,
        decl_stmt: StmtId,
        operand: ExprId,
        arg_types: &[Type],
        span: Span,
    ) -> Type {
        let root = self.symbols.root_scope();
        let instance_id = self.symbols.lookup(root, qualified_name).map(|id| self.symbols.symbol(id).scope_instance_id).unwrap_or(0);
        let signature: Vec<String> = arg_types.iter().map(mangle_type).collect();
        let cache_key = format!("{qualified_name}#{instance_id}#{}", signature.join("_"));

        if let Some(mangled) = self.mono_cache.get(&cache_key).cloned() {
            return self.bind_call_to_mangled(module, operand, &mangled, span);
        }

        let StmtKind::FuncDecl(decl) = module.stmt(decl_stmt).kind.clone() else {
            self.error(CompileError::semantic(format!("'{qualified_name}' is not callable"), span));
            return super::check_expr::unit_type();
        };

        let mangled_name = format!("{}_G_{}", decl.name, signature.join("_"));
        let mangled_qualified = match decl.receivers.first().and_then(|r| r.ty.as_ref()) {
            Some(Type::Named { name: type_name, .. }) => format!("{type_name}::{mangled_name}"),
            _ => mangled_name.clone(),
        };
        self.mono_cache.insert(cache_key, mangled_qualified.clone());

        let clone_decl = substitute_generic(module, &decl, arg_types, mangled_name);
        let clone_span = clone_decl.span;
        let clone_stmt = module.alloc_stmt(StmtKind::FuncDecl(clone_decl), clone_span);
        self.functions.insert(mangled_qualified.clone(), clone_stmt);

        let symbol = Symbol {
            name: mangled_qualified.clone(),
            kind: SymbolKind::Function,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            declaration: Some(clone_stmt),
            scope_instance_id: instance_id,
        };
        // A second call site reaching the same signature before this pending
        // clone drains would hit the cache above and never get here, so this
        // define() call is expected to always succeed.
        let _ = self.symbols.define(root, mangled_qualified.clone(), symbol);

        self.mono_pending.push(clone_stmt);
        self.bind_call_to_mangled(module, operand, &mangled_qualified, span)
    }

    /// Point a call's callee expression at the already-instantiated
    /// `mangled_qualified` symbol, type-checking the clone first if this is
    /// its first call site (needed so its return type is known immediately).
    fn bind_call_to_mangled(&mut self, module: &mut Module, operand: ExprId, mangled_qualified: &str, span: Span) -> Type {
        let bare_name = mangled_qualified.rsplit("::").next().unwrap_or(mangled_qualified).to_string();
        module.expr_mut(operand).kind = ExprKind::Identifier(bare_name);
        let root = self.symbols.root_scope();
        if let Some(symbol_id) = self.symbols.lookup(root, mangled_qualified) {
            self.resolved_symbols.insert(operand, symbol_id);
        }
        let Some(&stmt) = self.functions.get(mangled_qualified) else {
            self.error(CompileError::semantic(format!("monomorphized symbol '{mangled_qualified}' vanished before its call site was bound"), span));
            return super::check_expr::unit_type();
        };
        self.check_top_level_stmt(module, stmt);
        let StmtKind::FuncDecl(decl) = module.stmt(stmt).kind.clone() else {
            return super::check_expr::unit_type();
        };
        self.tuple_return_type(&decl.return_types)
    }
}

/// Deep-clone `decl`'s body into fresh arena slots, substituting every
/// generic parameter/return type with its concrete counterpart from
/// `arg_types`.
fn substitute_generic(module: &mut Module, decl: &FuncDecl, arg_types: &[Type], mangled_name: String) -> FuncDecl {
    let mut subst: HashMap<String, Type> = HashMap::new();
    for (param, arg_ty) in decl.params.iter().zip(arg_types.iter()) {
        if let Some(Type::TypeVar(name)) = &param.ty {
            subst.entry(name.clone()).or_insert_with(|| arg_ty.clone());
        }
    }

    let params: Vec<Param> = decl
        .params
        .iter()
        .zip(arg_types.iter())
        .map(|(p, arg_ty)| {
            let ty = if p.is_expr_param {
                p.ty.clone()
            } else {
                match &p.ty {
                    None => Some(arg_ty.clone()),
                    Some(t) => Some(substitute_type(t, &subst)),
                }
            };
            Param { ty, ..p.clone() }
        })
        .collect();

    let return_types = decl.return_types.iter().map(|t| substitute_type(t, &subst)).collect();
    let body: Vec<StmtId> = decl.body.iter().map(|&s| clone_stmt(module, s)).collect();

    FuncDecl { name: mangled_name, receivers: decl.receivers.clone(), params, return_types, body, is_external: false, is_exported: false, span: decl.span }
}

fn substitute_type(ty: &Type, subst: &HashMap<String, Type>) -> Type {
    match ty {
        Type::TypeVar(name) => subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Array { element, size } => Type::Array { element: Box::new(substitute_type(element, subst)), size: *size },
        other => other.clone(),
    }
}

fn clone_expr(module: &mut Module, id: ExprId) -> ExprId {
    let node = module.expr(id).clone();
    let kind = clone_expr_kind(module, node.kind);
    module.alloc_expr(kind, node.span)
}

fn clone_expr_kind(module: &mut Module, kind: ExprKind) -> ExprKind {
    match kind {
        ExprKind::IntLiteral { .. }
        | ExprKind::FloatLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::Identifier(_)
        | ExprKind::Resource { .. } => kind,
        ExprKind::Binary { op, left, right } => ExprKind::Binary { op, left: clone_expr(module, left), right: clone_expr(module, right) },
        ExprKind::Unary { op, operand } => ExprKind::Unary { op, operand: clone_expr(module, operand) },
        ExprKind::Cast { operand, target_type } => ExprKind::Cast { operand: clone_expr(module, operand), target_type },
        ExprKind::Call { operand, receivers, args } => ExprKind::Call {
            operand: clone_expr(module, operand),
            receivers: receivers.into_iter().map(|r| clone_expr(module, r)).collect(),
            args: args.into_iter().map(|a| clone_expr(module, a)).collect(),
        },
        ExprKind::Index { operand, index } => ExprKind::Index { operand: clone_expr(module, operand), index: clone_expr(module, index) },
        ExprKind::Member { operand, name } => ExprKind::Member { operand: clone_expr(module, operand), name },
        ExprKind::ArrayLiteral(items) => ExprKind::ArrayLiteral(items.into_iter().map(|i| clone_expr(module, i)).collect()),
        ExprKind::TupleLiteral(items) => ExprKind::TupleLiteral(items.into_iter().map(|i| clone_expr(module, i)).collect()),
        ExprKind::Range { left, right } => ExprKind::Range { left: clone_expr(module, left), right: clone_expr(module, right) },
        ExprKind::Length(e) => ExprKind::Length(clone_expr(module, e)),
        ExprKind::Conditional { condition, true_expr, false_expr } => ExprKind::Conditional {
            condition: clone_expr(module, condition),
            true_expr: clone_expr(module, true_expr),
            false_expr: clone_expr(module, false_expr),
        },
        ExprKind::Assignment { target, value, creates_new_variable } => {
            ExprKind::Assignment { target: clone_expr(module, target), value: clone_expr(module, value), creates_new_variable }
        }
        ExprKind::Block { statements, result_expr } => ExprKind::Block {
            statements: statements.into_iter().map(|s| clone_stmt(module, s)).collect(),
            result_expr: result_expr.map(|e| clone_expr(module, e)),
        },
        ExprKind::Iteration { iterable, body, is_sorted } => {
            ExprKind::Iteration { iterable: clone_expr(module, iterable), body: clone_expr(module, body), is_sorted }
        }
        ExprKind::Repeat { condition, body } => ExprKind::Repeat { condition: clone_expr(module, condition), body: clone_expr(module, body) },
        ExprKind::Process { command } => ExprKind::Process { command: clone_expr(module, command) },
    }
}

fn clone_stmt(module: &mut Module, id: StmtId) -> StmtId {
    let node = module.stmt(id).clone();
    let kind = clone_stmt_kind(module, node.kind);
    module.alloc_stmt(kind, node.span)
}

fn clone_stmt_kind(module: &mut Module, kind: StmtKind) -> StmtKind {
    match kind {
        // Nested declarations do not occur inside a function body in this
        // language; kept as-is defensively rather than deep-cloned.
        StmtKind::FuncDecl(_) | StmtKind::TypeDecl(_) | StmtKind::Import(_) => kind,
        StmtKind::VarDecl(v) => StmtKind::VarDecl(VarDecl { initializer: clone_expr(module, v.initializer), ..v }),
        StmtKind::Expr(e) => StmtKind::Expr(clone_expr(module, e)),
        StmtKind::Return(e) => StmtKind::Return(e.map(|e| clone_expr(module, e))),
        StmtKind::Break => StmtKind::Break,
        StmtKind::Continue => StmtKind::Continue,
        StmtKind::ConditionalStmt { condition, then_branch, else_branch } => StmtKind::ConditionalStmt {
            condition: clone_expr(module, condition),
            then_branch: then_branch.into_iter().map(|s| clone_stmt(module, s)).collect(),
            else_branch: else_branch.map(|b| b.into_iter().map(|s| clone_stmt(module, s)).collect()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayllu_core::types::PrimitiveId;

    fn param(name: &str, ty: Option<Type>) -> Param {
        Param { name: name.into(), ty, is_expr_param: false, span: Span::default() }
    }

    #[test]
    fn untyped_param_marks_a_function_generic() {
        let f = FuncDecl {
            name: "id".into(),
            receivers: vec![],
            params: vec![param("x", None)],
            return_types: vec![],
            body: vec![],
            is_external: false,
            is_exported: false,
            span: Span::default(),
        };
        assert!(is_generic_decl(&f));
    }

    #[test]
    fn fully_typed_function_is_not_generic() {
        let f = FuncDecl {
            name: "add".into(),
            receivers: vec![],
            params: vec![param("a", Some(Type::Primitive(PrimitiveId::I32)))],
            return_types: vec![Type::Primitive(PrimitiveId::I32)],
            body: vec![],
            is_external: false,
            is_exported: false,
            span: Span::default(),
        };
        assert!(!is_generic_decl(&f));
    }

    #[test]
    fn direct_self_reference_is_recursive() {
        let t = TypeDecl { name: "Node".into(), fields: vec![("next".into(), Type::named("Node"))], span: Span::default() };
        assert!(type_is_directly_recursive(&t));
    }

    #[test]
    fn mangle_type_uses_canonical_primitive_names() {
        assert_eq!(mangle_type(&Type::Primitive(PrimitiveId::I32)), "i32");
        assert_eq!(mangle_type(&Type::named("Vector")), "Vector");
    }
}
