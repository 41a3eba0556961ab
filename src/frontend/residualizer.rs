//! Residualizer (spec §4.5): rewrites the checked module in place using the
//! facts the optimizer recorded, without re-running any compile-time
//! evaluation of its own.
//!
//! Rewrites run in the order spec §4.5 lists them: (1) literal substitution
//! across the whole arena, (2) dead-branch pruning for known conditions
//! (both `ConditionalStmt` and ternary `Conditional` expressions), (3)
//! dropping pure dead expression statements, (4) stopping at terminal
//! statements so unreachable code after them is left untouched rather than
//! rewritten.

use std::collections::HashMap;

use ayllu_syntax::ast::*;
use ayllu_syntax::span::Span;

use super::cte::{TypeFields, Value};
use super::optimizer::OptimizationFacts;
use super::typechecker::TypeCheckOutput;

struct ResCtx<'a> {
    facts: &'a OptimizationFacts,
    expr_types: &'a HashMap<ExprId, Type>,
    type_decls: &'a TypeFields,
    tuple_types: &'a TypeFields,
}

impl<'a> ResCtx<'a> {
    /// An expression has no observable effect beyond producing its value:
    /// no assignment, no resource/process use anywhere in its subtree, and
    /// any call it makes targets a function the optimizer already proved
    /// foldable (spec §4.5 rewrite 3's "pure" definition).
    fn is_pure(&self, module: &Module, expr: ExprId) -> bool {
        match &module.expr(expr).kind {
            ExprKind::Assignment { .. } | ExprKind::Resource { .. } | ExprKind::Process { .. } => false,
            ExprKind::Iteration { .. } | ExprKind::Repeat { .. } => false,
            ExprKind::Call { operand, receivers, args } => {
                let Some(name) = call_target_name(module, *operand, receivers, self.expr_types) else {
                    return false;
                };
                // A type constructor call (including a tuple literal the
                // lowerer has already rewritten into one) is pure iff its
                // field arguments are, same as a bare tuple/array literal;
                // it never reaches `foldable_functions`, which only tracks
                // ordinary functions (see optimizer's `classify_observed_calls`).
                let is_constructor = self.type_decls.contains_key(&name) || self.tuple_types.contains_key(&name);
                if !is_constructor && !self.facts.foldable_functions.contains(&name) {
                    return false;
                }
                receivers.iter().chain(args.iter()).all(|&a| self.is_pure(module, a))
            }
            ExprKind::Binary { left, right, .. } => self.is_pure(module, *left) && self.is_pure(module, *right),
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } | ExprKind::Length(operand) => self.is_pure(module, *operand),
            ExprKind::Index { operand, index } => self.is_pure(module, *operand) && self.is_pure(module, *index),
            ExprKind::Member { operand, .. } => self.is_pure(module, *operand),
            ExprKind::Range { left, right } => self.is_pure(module, *left) && self.is_pure(module, *right),
            ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => items.iter().all(|&i| self.is_pure(module, i)),
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                self.is_pure(module, *condition) && self.is_pure(module, *true_expr) && self.is_pure(module, *false_expr)
            }
            ExprKind::Block { statements, result_expr } => statements.is_empty() && result_expr.map_or(true, |r| self.is_pure(module, r)),
            ExprKind::IntLiteral { .. }
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::Identifier(_) => true,
        }
    }
}

fn call_target_name(module: &Module, operand: ExprId, receivers: &[ExprId], expr_types: &HashMap<ExprId, Type>) -> Option<String> {
    let ExprKind::Identifier(name) = &module.expr(operand).kind else { return None };
    let qualified = match receivers.first() {
        Some(&recv) => match expr_types.get(&recv) {
            Some(Type::Named { name: type_name, .. }) => format!("{type_name}::{name}"),
            _ => name.clone(),
        },
        None => name.clone(),
    };
    Some(qualified)
}

/// Run the residualizer pass, returning whether it changed anything.
#[tracing::instrument(skip_all, fields(decl_count = module.top_level.len()))]
pub fn run(module: &mut Module, facts: &OptimizationFacts, output: &TypeCheckOutput) -> bool {
    let ctx = ResCtx { facts, expr_types: &output.expr_types, type_decls: &output.type_decls, tuple_types: &output.tuple_types };
    let mut changed = false;
    substitute_literals(module, &ctx, &mut changed);
    prune_conditional_exprs(module, &ctx, &mut changed);
    let top_level = module.top_level.clone();
    let new_top_level = residualize_stmt_list(module, &top_level, &ctx, &mut changed);
    if new_top_level != module.top_level {
        changed = true;
        module.top_level = new_top_level;
    }
    changed
}

/// Rewrite 1: replace every expression the optimizer folded to a known
/// value with a literal AST node, as long as nothing in its subtree has a
/// side effect that discarding it would silently drop.
fn substitute_literals(module: &mut Module, ctx: &ResCtx, changed: &mut bool) {
    for id in 0..module.expr_count() as ExprId {
        let Some(value) = ctx.facts.constexpr_values.get(&id).cloned() else { continue };
        if !ctx.is_pure(module, id) {
            continue;
        }
        let Some(ty) = ctx.expr_types.get(&id).cloned() else {
            // Void-position expressions (I1's Iteration/Repeat/value-less
            // Call) carry no type slot and aren't reconstructable here.
            continue;
        };
        let span = module.expr(id).span;
        let current = module.expr(id).kind.clone();
        let Some(new_kind) = value_to_expr_kind(module, &value, &ty, ctx.type_decls, ctx.tuple_types, span) else {
            continue;
        };
        if new_kind != current {
            module.expr_mut(id).kind = new_kind;
            *changed = true;
        }
    }
}

/// Reconstruct a known compile-time value as a literal AST node of `ty`,
/// consulting the type registries for field order on composites (spec
/// §4.5 "Literal reconstruction"). Returns `None` when the value can't be
/// represented as source-level literal syntax (e.g. `Uninitialized`).
fn value_to_expr_kind(module: &mut Module, value: &Value, ty: &Type, type_decls: &TypeFields, tuple_types: &TypeFields, span: Span) -> Option<ExprKind> {
    match (value, ty) {
        (Value::Bool(b), _) => Some(ExprKind::BoolLiteral(*b)),
        (Value::Int64(i), Type::Primitive(p)) => Some(ExprKind::IntLiteral { value: *i as i128, suffix: Some(*p) }),
        (Value::UInt64(u), Type::Primitive(p)) => Some(ExprKind::IntLiteral { value: *u as i128, suffix: Some(*p) }),
        (Value::Float64(f), Type::Primitive(_)) => Some(ExprKind::FloatLiteral(*f)),
        (Value::Str(s), _) => Some(ExprKind::StringLiteral((**s).clone())),
        (Value::Array(items), Type::Array { element, .. }) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items.iter() {
                let kind = value_to_expr_kind(module, item, element, type_decls, tuple_types, span)?;
                ids.push(module.alloc_expr(kind, span));
            }
            Some(ExprKind::ArrayLiteral(ids))
        }
        (Value::Composite(c), Type::Named { name, .. }) if name.starts_with("__Tuple") => {
            let field_types = tuple_types.get(name)?;
            let mut ids = Vec::with_capacity(c.fields.len());
            for ((_, v), (_, field_ty)) in c.fields.iter().zip(field_types.iter()) {
                let kind = value_to_expr_kind(module, v, field_ty, type_decls, tuple_types, span)?;
                ids.push(module.alloc_expr(kind, span));
            }
            Some(ExprKind::TupleLiteral(ids))
        }
        (Value::Composite(c), Type::Named { name, .. }) => {
            let field_types = type_decls.get(name)?;
            let operand = module.alloc_expr(ExprKind::Identifier(name.clone()), span);
            let mut args = Vec::with_capacity(c.fields.len());
            for ((_, v), (_, field_ty)) in c.fields.iter().zip(field_types.iter()) {
                let kind = value_to_expr_kind(module, v, field_ty, type_decls, tuple_types, span)?;
                args.push(module.alloc_expr(kind, span));
            }
            Some(ExprKind::Call { operand, receivers: vec![], args })
        }
        _ => None,
    }
}

/// Rewrite 2's other half: a ternary `Conditional` whose condition is known
/// (`constexpr_conditions`) but whose taken branch doesn't itself fold to a
/// single known value (it calls something non-foldable, say) never gets a
/// `constexpr_values` entry, so `substitute_literals` leaves it alone. This
/// replaces the whole node with the taken branch's own (already-substituted)
/// kind regardless, pruning the branch never taken the same way a statement-
/// level `if` is pruned above.
fn prune_conditional_exprs(module: &mut Module, ctx: &ResCtx, changed: &mut bool) {
    for id in 0..module.expr_count() as ExprId {
        let ExprKind::Conditional { condition, true_expr, false_expr } = module.expr(id).kind.clone() else { continue };
        let Some(&take_true) = ctx.facts.constexpr_conditions.get(&condition) else { continue };
        let taken = if take_true { true_expr } else { false_expr };
        let new_kind = module.expr(taken).kind.clone();
        if new_kind != module.expr(id).kind {
            module.expr_mut(id).kind = new_kind;
            *changed = true;
        }
    }
}

/// Rewrites 2-4 over one statement list, returning the rewritten list. Does
/// not mutate `stmts` itself; the caller splices the result back via
/// `stmt_mut` (for a function body) or `module.top_level` (at the root).
fn residualize_stmt_list(module: &mut Module, stmts: &[StmtId], ctx: &ResCtx, changed: &mut bool) -> Vec<StmtId> {
    let mut out = Vec::with_capacity(stmts.len());
    for (i, &stmt) in stmts.iter().enumerate() {
        let kind = module.stmt(stmt).kind.clone();
        match kind {
            StmtKind::ConditionalStmt { condition, then_branch, else_branch } => match ctx.facts.constexpr_conditions.get(&condition) {
                Some(true) => {
                    *changed = true;
                    out.extend(residualize_stmt_list(module, &then_branch, ctx, changed));
                }
                Some(false) => {
                    *changed = true;
                    if let Some(branch) = &else_branch {
                        out.extend(residualize_stmt_list(module, branch, ctx, changed));
                    }
                    // No else: the whole statement is dropped (I6).
                }
                None => {
                    let new_then = residualize_stmt_list(module, &then_branch, ctx, changed);
                    let new_else = else_branch.as_ref().map(|b| residualize_stmt_list(module, b, ctx, changed));
                    if new_then != then_branch || new_else != else_branch {
                        *changed = true;
                    }
                    let span = module.stmt(stmt).span;
                    *module.stmt_mut(stmt) = StmtNode { kind: StmtKind::ConditionalStmt { condition, then_branch: new_then, else_branch: new_else }, span };
                    out.push(stmt);
                }
            },
            StmtKind::FuncDecl(mut f) => {
                let new_body = residualize_stmt_list(module, &f.body, ctx, changed);
                if new_body != f.body {
                    *changed = true;
                }
                f.body = new_body;
                let span = module.stmt(stmt).span;
                *module.stmt_mut(stmt) = StmtNode { kind: StmtKind::FuncDecl(f), span };
                out.push(stmt);
            }
            StmtKind::Expr(e) => {
                if ctx.is_pure(module, e) {
                    *changed = true;
                } else {
                    out.push(stmt);
                }
            }
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => {
                out.push(stmt);
                // Rewrite 4: stop rewriting past a terminal statement; the
                // remainder is unreachable and is carried through untouched
                // rather than deleted outright.
                out.extend_from_slice(&stmts[i + 1..]);
                return out;
            }
            _ => out.push(stmt),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use ayllu_syntax::lexer::lex;
    use ayllu_syntax::parser::parse;

    use crate::frontend::optimizer;
    use crate::frontend::typechecker::check_module;

    use super::*;

    fn parse_src(src: &str) -> Module {
        let tokens = lex(src).unwrap_or_else(|errs| panic!("lex error in test source: {errs:?}"));
        parse(&tokens, "test.ayl").unwrap_or_else(|errs| panic!("parse error in test source: {errs:?}"))
    }

    #[test]
    fn foldable_constant_initializer_becomes_a_literal() {
        let mut module = parse_src("const LIMIT: u8 = 10 + 5;");
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = optimizer::run(&module, &output);
        let changed = run(&mut module, &facts, &output);
        assert!(changed);

        let StmtKind::VarDecl(v) = module.stmt(module.top_level[0]).kind.clone() else {
            panic!("expected a var decl");
        };
        assert!(matches!(module.expr(v.initializer).kind, ExprKind::IntLiteral { value: 15, .. }));
    }

    #[test]
    fn statically_false_branch_with_no_else_is_dropped() {
        let mut module = parse_src(
            r#"
            fn main() -> i32 {
                if false {
                    let y: i32 = 1;
                }
                return 0;
            }
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = optimizer::run(&module, &output);
        run(&mut module, &facts, &output);

        let StmtKind::FuncDecl(f) = module.stmt(module.top_level[0]).kind.clone() else {
            panic!("expected a func decl");
        };
        assert!(f.body.iter().all(|&s| !matches!(module.stmt(s).kind, StmtKind::ConditionalStmt { .. })));
    }

    /// Exercises all three rewrites in one function body: the known
    /// `DEBUG` condition prunes its `if`, the pure `1 + 2;` statement is
    /// dropped, and `k`'s initializer folds to a literal.
    #[test]
    fn literal_substitution_dead_branch_and_pure_drop_compose_in_one_body() {
        let mut module = parse_src(
            r#"
            const DEBUG: bool = false;
            fn main() -> i32 {
                let k: i32 = 2 * 3;
                1 + 2;
                if DEBUG {
                    return 1;
                } else {
                    return k;
                }
            }
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = optimizer::run(&module, &output);
        run(&mut module, &facts, &output);

        let StmtKind::FuncDecl(f) = module.stmt(module.top_level[1]).kind.clone() else {
            panic!("expected a func decl");
        };
        assert_eq!(f.body.len(), 2, "the pure `1 + 2;` statement and the dead `if` branch should both be gone, leaving `let k` and `return k`");
        let StmtKind::VarDecl(k) = module.stmt(f.body[0]).kind.clone() else { panic!("expected `let k`") };
        assert!(matches!(module.expr(k.initializer).kind, ExprKind::IntLiteral { value: 6, .. }));
        assert!(!f.body.iter().any(|&s| matches!(module.stmt(s).kind, StmtKind::ConditionalStmt { .. })));
    }

    /// A ternary whose condition is known but whose taken branch itself
    /// doesn't fold (it calls an external function) never gets a
    /// `constexpr_values` entry for the whole node, so `substitute_literals`
    /// alone can't prune it; `prune_conditional_exprs` must still drop the
    /// branch never taken.
    #[test]
    fn known_condition_prunes_a_ternary_whose_taken_branch_is_not_foldable() {
        let mut module = parse_src(
            r#"
            external fn side_effect_read() -> i32;
            const DEBUG: bool = true;
            fn main() -> i32 {
                return DEBUG ? side_effect_read() : 0;
            }
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = optimizer::run(&module, &output);
        run(&mut module, &facts, &output);

        let StmtKind::FuncDecl(f) = module.stmt(module.top_level[2]).kind.clone() else {
            panic!("expected a func decl");
        };
        let StmtKind::Return(Some(ret)) = module.stmt(f.body[0]).kind.clone() else {
            panic!("expected a return statement");
        };
        assert!(!matches!(module.expr(ret).kind, ExprKind::Conditional { .. }), "the ternary should have been rewritten to its taken branch");
        assert!(matches!(module.expr(ret).kind, ExprKind::Call { .. }), "the taken branch calls side_effect_read");
    }

    #[test]
    fn statements_after_a_return_are_left_untouched() {
        let mut module = parse_src(
            r#"
            fn main() -> i32 {
                return 0;
                let y: i32 = 1;
            }
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        let facts = optimizer::run(&module, &output);
        run(&mut module, &facts, &output);

        let StmtKind::FuncDecl(f) = module.stmt(module.top_level[0]).kind.clone() else {
            panic!("expected a func decl");
        };
        assert_eq!(f.body.len(), 2, "the unreachable let must survive, not be deleted");
    }
}
