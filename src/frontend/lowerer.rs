//! Lowerer (spec §4.6): the last frontend pass before a backend sees the
//! module. Two rewrites, both aimed at giving the backend one canonical
//! shape to consume instead of two:
//!
//! 1. Every tuple literal (whether written directly or synthesized by a
//!    multi-return function's `return` value) becomes an explicit
//!    constructor call against its synthetic `__TupleN_…` type (I5), the
//!    same shape the residualizer already reconstructs composites as
//!    (`value_to_expr_kind`'s `Call { operand: Identifier(name), .. }`
//!    branch). A backend that knows how to call a type constructor never
//!    needs a separate "tuple literal" code path.
//! 2. A tuple-destructuring assignment (`(a, b) = f();`, parsed as an
//!    `Assignment` whose target is itself a `TupleLiteral`) is normalized
//!    into a temporary holding the right-hand side evaluated once, followed
//!    by one ordinary per-field assignment per target, so every later pass
//!    only ever has to handle single-target assignment.

use ayllu_syntax::ast::*;

use super::typechecker::TypeCheckOutput;

struct Lowerer<'a> {
    output: &'a TypeCheckOutput,
    temp_counter: u32,
}

/// Run both rewrites over `module`, returning whether anything changed.
#[tracing::instrument(skip_all, fields(decl_count = module.top_level.len()))]
pub fn run(module: &mut Module, output: &TypeCheckOutput) -> bool {
    let mut lowerer = Lowerer { output, temp_counter: 0 };
    let mut changed = lowerer.desugar_tuple_constructions(module);
    let top_level = module.top_level.clone();
    let new_top_level = lowerer.lower_stmt_list(module, &top_level);
    if new_top_level != module.top_level {
        changed = true;
        module.top_level = new_top_level;
    }
    changed
}

impl<'a> Lowerer<'a> {
    fn fresh_temp_name(&mut self) -> String {
        self.temp_counter += 1;
        format!("__destructure{}", self.temp_counter)
    }

    /// Rewrite 1: every `TupleLiteral` node in the arena becomes a
    /// constructor call against its own recorded synthetic type. Reuses the
    /// node's `ExprId`, so nothing downstream that already keyed facts off
    /// this id (its type in `expr_types`, say) needs to be touched.
    fn desugar_tuple_constructions(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for id in 0..module.expr_count() as ExprId {
            let ExprKind::TupleLiteral(items) = module.expr(id).kind.clone() else { continue };
            let Some(Type::Named { name, .. }) = self.output.expr_types.get(&id).cloned() else { continue };
            let span = module.expr(id).span;
            let operand = module.alloc_expr(ExprKind::Identifier(name), span);
            module.expr_mut(id).kind = ExprKind::Call { operand, receivers: Vec::new(), args: items };
            changed = true;
        }
        changed
    }

    /// Rewrite 2, applied over one statement list; recurses into function
    /// bodies and conditional branches the same way the residualizer does.
    fn lower_stmt_list(&mut self, module: &mut Module, stmts: &[StmtId]) -> Vec<StmtId> {
        let mut out = Vec::with_capacity(stmts.len());
        for &stmt in stmts {
            let kind = module.stmt(stmt).kind.clone();
            match kind {
                StmtKind::FuncDecl(mut f) => {
                    let new_body = self.lower_stmt_list(module, &f.body);
                    f.body = new_body;
                    let span = module.stmt(stmt).span;
                    *module.stmt_mut(stmt) = StmtNode { kind: StmtKind::FuncDecl(f), span };
                    out.push(stmt);
                }
                StmtKind::ConditionalStmt { condition, then_branch, else_branch } => {
                    let new_then = self.lower_stmt_list(module, &then_branch);
                    let new_else = else_branch.as_ref().map(|b| self.lower_stmt_list(module, b));
                    let span = module.stmt(stmt).span;
                    *module.stmt_mut(stmt) = StmtNode { kind: StmtKind::ConditionalStmt { condition, then_branch: new_then, else_branch: new_else }, span };
                    out.push(stmt);
                }
                StmtKind::Expr(e) => match self.lower_destructuring_assignment(module, stmt, e) {
                    Some(replacement) => {
                        out.extend(replacement);
                    }
                    None => out.push(stmt),
                },
                _ => out.push(stmt),
            }
        }
        out
    }

    /// If `expr` is an `Assignment` whose target is a `TupleLiteral`,
    /// returns the statements that should replace `stmt` in its parent list:
    /// a `let` binding the right-hand side once, followed by one assignment
    /// per target reading the matching `"__N"` field back off it. Returns
    /// `None` for every other expression statement, leaving it untouched.
    fn lower_destructuring_assignment(&mut self, module: &mut Module, stmt: StmtId, expr: ExprId) -> Option<Vec<StmtId>> {
        let ExprKind::Assignment { target, value, .. } = module.expr(expr).kind.clone() else { return None };
        let ExprKind::TupleLiteral(items) = module.expr(target).kind.clone() else { return None };
        if items.is_empty() {
            return None;
        }
        let ty = self.output.expr_types.get(&target).cloned().unwrap_or_else(|| {
            self.output.expr_types.get(&value).cloned().expect("INVARIANT: a type-checked destructuring assignment has a recorded value type")
        });
        let span = module.stmt(stmt).span;
        let temp_name = self.fresh_temp_name();

        let temp_decl = module.alloc_stmt(
            StmtKind::VarDecl(VarDecl {
                kind: BindingKind::Let,
                name: temp_name.clone(),
                declared_type: Some(ty),
                is_mutable: false,
                is_exported: false,
                initializer: value,
                span,
            }),
            span,
        );

        let mut out = vec![temp_decl];
        for (i, item) in items.into_iter().enumerate() {
            let temp_ref = module.alloc_expr(ExprKind::Identifier(temp_name.clone()), span);
            let field = module.alloc_expr(ExprKind::Member { operand: temp_ref, name: format!("__{i}") }, span);
            let assign = module.alloc_expr(ExprKind::Assignment { target: item, value: field, creates_new_variable: false }, span);
            out.push(module.alloc_stmt(StmtKind::Expr(assign), span));
        }
        Some(out)
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
    fn tuple_literal_becomes_a_constructor_call() {
        let mut module = parse_src("const PAIR = (1, 2);");
        let output = check_module(&mut module).expect("unexpected type errors");
        assert!(run(&mut module, &output));

        let StmtKind::VarDecl(v) = module.stmt(module.top_level[0]).kind.clone() else {
            panic!("expected a var decl");
        };
        let ExprKind::Call { operand, args, .. } = module.expr(v.initializer).kind.clone() else {
            panic!("expected the tuple literal to become a constructor call");
        };
        assert!(matches!(module.expr(operand).kind, ExprKind::Identifier(ref n) if n == "__Tuple2_i32_i32"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn destructuring_assignment_expands_into_a_temp_and_field_reads() {
        let mut module = parse_src(
            r#"
            fn pair() -> (i32, i32) {
                return (1, 2);
            }
            fn main() -> i32 {
                let mut a: i32 = 0;
                let mut b: i32 = 0;
                (a, b) = pair();
                return a;
            }
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        assert!(run(&mut module, &output));

        let StmtKind::FuncDecl(f) = module.stmt(module.top_level[1]).kind.clone() else {
            panic!("expected a func decl");
        };
        // let a; let b; let __destructureN; a = ...; b = ...; return a;
        assert_eq!(f.body.len(), 6);
        let StmtKind::VarDecl(temp) = module.stmt(f.body[2]).kind.clone() else {
            panic!("expected the synthesized temp binding");
        };
        assert_eq!(temp.name, "__destructure1");
        for &assign_stmt in &f.body[3..5] {
            let StmtKind::Expr(e) = module.stmt(assign_stmt).kind.clone() else {
                panic!("expected an assignment statement");
            };
            let ExprKind::Assignment { value, .. } = module.expr(e).kind.clone() else {
                panic!("expected an assignment expression");
            };
            assert!(matches!(module.expr(value).kind, ExprKind::Member { .. }));
        }
    }

    #[test]
    fn ordinary_assignment_is_left_untouched() {
        let mut module = parse_src(
            r#"
            fn main() -> i32 {
                let mut a: i32 = 0;
                a = 5;
                return a;
            }
            "#,
        );
        let output = check_module(&mut module).expect("unexpected type errors");
        assert!(!run(&mut module, &output));
    }
}
