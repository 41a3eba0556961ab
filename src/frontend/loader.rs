//! Multi-file project glue (spec §6 "Module input"): splices every
//! dependency `ayllu_loader` parsed into the entry module's own arena, and
//! resolves `resource{}`/`process{}` expressions before the checker ever
//! sees the module.
//!
//! `ayllu_loader::ModuleLoader` only discovers and parses files; each
//! dependency comes back as its own freestanding [`Module`] with its own
//! expression/statement arena. Before the checker can see any of it, a
//! dependency's exported top-level declarations have to be deep-cloned into
//! the entry module's arena (an `ExprId`/`StmtId` is only ever valid inside
//! the arena that allocated it), the same "clone into fresh slots" shape
//! [`super::typechecker::mono`] already uses for monomorphized clones
//! within a single module.

use std::path::Path;

use ayllu_loader::{LoadedModule, process, resource};
use ayllu_syntax::ast::*;

use super::diagnostics::CompileError;

/// Resolve every `resource{}`/`process{}` expression in each loaded module,
/// in place, before [`merge_project`] splices anything together. Each
/// module still knows its own file's directory here, which `resource{}`'s
/// current-file-relative lookup needs (spec §6: "current_file_dir takes
/// precedence"). A node that resolves successfully is rewritten into the
/// literal expression its value denotes; one that fails is left alone and
/// reported as a [`CompileError`] instead of aborting the whole batch.
pub fn resolve_external_exprs(loaded: &mut [LoadedModule], project_root: &Path, allow_process: bool) -> Result<(), Vec<CompileError>> {
    let mut errors = Vec::new();
    for module in loaded.iter_mut() {
        let file_dir = Path::new(&module.filename).parent().unwrap_or(Path::new(".")).to_path_buf();
        let ids: Vec<ExprId> = (0..module.ast.expr_count() as ExprId).collect();
        for id in ids {
            resolve_one_expr(&mut module.ast, id, project_root, &file_dir, allow_process, &mut errors);
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn resolve_one_expr(module: &mut Module, id: ExprId, project_root: &Path, file_dir: &Path, allow_process: bool, errors: &mut Vec<CompileError>) {
    let span = module.expr(id).span;
    match module.expr(id).kind.clone() {
        ExprKind::Resource { segments } => match resource::load_resource(project_root, file_dir, &segments) {
            Ok(resource::ResourceValue::File(text)) => {
                module.expr_mut(id).kind = ExprKind::StringLiteral(text);
            }
            Ok(resource::ResourceValue::Missing) => {
                module.expr_mut(id).kind = ExprKind::ArrayLiteral(Vec::new());
            }
            Ok(resource::ResourceValue::Directory(entries)) => {
                let items = entries
                    .into_iter()
                    .map(|entry| {
                        let filename = module.alloc_expr(ExprKind::StringLiteral(entry.filename), span);
                        let contents = module.alloc_expr(ExprKind::StringLiteral(entry.contents), span);
                        module.alloc_expr(ExprKind::TupleLiteral(vec![filename, contents]), span)
                    })
                    .collect();
                module.expr_mut(id).kind = ExprKind::ArrayLiteral(items);
            }
            Err(e) => errors.push(CompileError::semantic(format!("resource{{}} expression failed: {e}"), span)),
        },
        ExprKind::Process { command } => {
            let ExprKind::StringLiteral(cmd) = module.expr(command).kind.clone() else {
                errors.push(CompileError::semantic("process{} command must be a string literal", span));
                return;
            };
            match process::run_process(&cmd, allow_process) {
                Ok(stdout) => {
                    module.expr_mut(id).kind = ExprKind::StringLiteral(stdout);
                }
                Err(e) => errors.push(CompileError::semantic(format!("process{{}} expression failed: {e}"), span)),
            }
        }
        _ => {}
    }
}

/// Merge an entry module plus its transitively-imported dependencies (in the
/// shape [`ayllu_loader::ModuleLoader::load`] returns, entry first) into a
/// single [`Module`] the checker can run over unmodified.
///
/// Only a dependency's exported functions/constants and its type
/// declarations (always visible; the grammar has no type-level visibility
/// modifier) are spliced in; a dependency's private helpers stay invisible
/// to importers, matching `is_exported`'s purpose elsewhere in the checker.
pub fn merge_project(mut loaded: Vec<LoadedModule>) -> Module {
    if loaded.is_empty() {
        return Module::new("<empty project>");
    }
    let entry = loaded.remove(0);
    let mut module = entry.ast;

    for dep in &loaded {
        for &stmt in &dep.ast.top_level {
            if !is_importable(&dep.ast, stmt) {
                continue;
            }
            let cloned = clone_top_level_stmt(&dep.ast, stmt, &mut module);
            module.top_level.push(cloned);
        }
    }

    module
}

fn is_importable(module: &Module, stmt: StmtId) -> bool {
    match &module.stmt(stmt).kind {
        StmtKind::TypeDecl(_) => true,
        StmtKind::FuncDecl(f) => f.is_exported,
        StmtKind::VarDecl(v) => v.is_exported,
        StmtKind::Import(_) => false,
        // Only declarations ever appear at module top level past the parser.
        _ => false,
    }
}

fn clone_top_level_stmt(src: &Module, id: StmtId, dst: &mut Module) -> StmtId {
    let node = src.stmt(id);
    let kind = match node.kind.clone() {
        StmtKind::TypeDecl(t) => StmtKind::TypeDecl(t),
        StmtKind::FuncDecl(f) => StmtKind::FuncDecl(FuncDecl { body: f.body.iter().map(|&s| clone_stmt(src, s, dst)).collect(), ..f }),
        StmtKind::VarDecl(v) => StmtKind::VarDecl(VarDecl { initializer: clone_expr(src, v.initializer, dst), ..v }),
        other => other,
    };
    dst.alloc_stmt(kind, node.span)
}

fn clone_expr(src: &Module, id: ExprId, dst: &mut Module) -> ExprId {
    let node = src.expr(id).clone();
    let kind = clone_expr_kind(src, node.kind, dst);
    dst.alloc_expr(kind, node.span)
}

fn clone_expr_kind(src: &Module, kind: ExprKind, dst: &mut Module) -> ExprKind {
    match kind {
        ExprKind::IntLiteral { .. }
        | ExprKind::FloatLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::Identifier(_)
        | ExprKind::Resource { .. } => kind,
        ExprKind::Binary { op, left, right } => ExprKind::Binary { op, left: clone_expr(src, left, dst), right: clone_expr(src, right, dst) },
        ExprKind::Unary { op, operand } => ExprKind::Unary { op, operand: clone_expr(src, operand, dst) },
        ExprKind::Cast { operand, target_type } => ExprKind::Cast { operand: clone_expr(src, operand, dst), target_type },
        ExprKind::Call { operand, receivers, args } => ExprKind::Call {
            operand: clone_expr(src, operand, dst),
            receivers: receivers.into_iter().map(|r| clone_expr(src, r, dst)).collect(),
            args: args.into_iter().map(|a| clone_expr(src, a, dst)).collect(),
        },
        ExprKind::Index { operand, index } => ExprKind::Index { operand: clone_expr(src, operand, dst), index: clone_expr(src, index, dst) },
        ExprKind::Member { operand, name } => ExprKind::Member { operand: clone_expr(src, operand, dst), name },
        ExprKind::ArrayLiteral(items) => ExprKind::ArrayLiteral(items.into_iter().map(|i| clone_expr(src, i, dst)).collect()),
        ExprKind::TupleLiteral(items) => ExprKind::TupleLiteral(items.into_iter().map(|i| clone_expr(src, i, dst)).collect()),
        ExprKind::Range { left, right } => ExprKind::Range { left: clone_expr(src, left, dst), right: clone_expr(src, right, dst) },
        ExprKind::Length(e) => ExprKind::Length(clone_expr(src, e, dst)),
        ExprKind::Conditional { condition, true_expr, false_expr } => ExprKind::Conditional {
            condition: clone_expr(src, condition, dst),
            true_expr: clone_expr(src, true_expr, dst),
            false_expr: clone_expr(src, false_expr, dst),
        },
        ExprKind::Assignment { target, value, creates_new_variable } => {
            ExprKind::Assignment { target: clone_expr(src, target, dst), value: clone_expr(src, value, dst), creates_new_variable }
        }
        ExprKind::Block { statements, result_expr } => {
            ExprKind::Block { statements: statements.into_iter().map(|s| clone_stmt(src, s, dst)).collect(), result_expr: result_expr.map(|e| clone_expr(src, e, dst)) }
        }
        ExprKind::Iteration { iterable, body, is_sorted } => {
            ExprKind::Iteration { iterable: clone_expr(src, iterable, dst), body: clone_expr(src, body, dst), is_sorted }
        }
        ExprKind::Repeat { condition, body } => ExprKind::Repeat { condition: clone_expr(src, condition, dst), body: clone_expr(src, body, dst) },
        ExprKind::Process { command } => ExprKind::Process { command: clone_expr(src, command, dst) },
    }
}

fn clone_stmt(src: &Module, id: StmtId, dst: &mut Module) -> StmtId {
    let node = src.stmt(id).clone();
    let kind = clone_stmt_kind(src, node.kind, dst);
    dst.alloc_stmt(kind, node.span)
}

fn clone_stmt_kind(src: &Module, kind: StmtKind, dst: &mut Module) -> StmtKind {
    match kind {
        // A nested function/type declaration does not occur inside a body in
        // this language (mirroring `typechecker::mono`'s same assumption).
        StmtKind::FuncDecl(_) | StmtKind::TypeDecl(_) | StmtKind::Import(_) => kind,
        StmtKind::VarDecl(v) => StmtKind::VarDecl(VarDecl { initializer: clone_expr(src, v.initializer, dst), ..v }),
        StmtKind::Expr(e) => StmtKind::Expr(clone_expr(src, e, dst)),
        StmtKind::Return(e) => StmtKind::Return(e.map(|e| clone_expr(src, e, dst))),
        StmtKind::Break => StmtKind::Break,
        StmtKind::Continue => StmtKind::Continue,
        StmtKind::ConditionalStmt { condition, then_branch, else_branch } => StmtKind::ConditionalStmt {
            condition: clone_expr(src, condition, dst),
            then_branch: then_branch.into_iter().map(|s| clone_stmt(src, s, dst)).collect(),
            else_branch: else_branch.map(|b| b.into_iter().map(|s| clone_stmt(src, s, dst)).collect()),
        },
    }
}

#[cfg(test)]
mod tests {
    use ayllu_syntax::lexer::lex;
    use ayllu_syntax::parser::parse;

    use super::*;

    fn loaded(filename: &str, src: &str) -> LoadedModule {
        let tokens = lex(src).unwrap_or_else(|errs| panic!("lex error in test source: {errs:?}"));
        let ast = parse(&tokens, filename).unwrap_or_else(|errs| panic!("parse error in test source: {errs:?}"));
        LoadedModule { path_segments: Vec::new(), filename: filename.to_string(), source: src.to_string(), ast }
    }

    #[test]
    fn exported_dependency_function_is_spliced_into_the_entry_module() {
        let entry = loaded("entry.ayl", "fn main() -> i32 { return helper(); }");
        let dep = loaded("dep.ayl", "export fn helper() -> i32 { return 1; }");
        let merged = merge_project(vec![entry, dep]);
        assert_eq!(merged.top_level.len(), 2);
    }

    #[test]
    fn private_dependency_function_is_not_spliced() {
        let entry = loaded("entry.ayl", "fn main() -> i32 { return 0; }");
        let dep = loaded("dep.ayl", "fn private_helper() -> i32 { return 1; }");
        let merged = merge_project(vec![entry, dep]);
        assert_eq!(merged.top_level.len(), 1);
    }

    fn const_initializer(module: &Module) -> ExprId {
        module
            .top_level
            .iter()
            .find_map(|&s| match &module.stmt(s).kind {
                StmtKind::VarDecl(v) if v.name == "X" => Some(v.initializer),
                _ => None,
            })
            .expect("const X not found")
    }

    #[test]
    fn resource_file_expression_resolves_to_a_string_literal() {
        let dir = std::env::temp_dir();
        let file = dir.join("ayllu_loader_test_resource.txt");
        std::fs::write(&file, "hello from disk").unwrap();

        let filename = dir.join("entry.ayl");
        let mut entry = loaded(filename.to_str().unwrap(), "const X: str = resource { ayllu_loader_test_resource };");
        resolve_external_exprs(std::slice::from_mut(&mut entry), &dir, false).expect("resource read should succeed");

        let init = const_initializer(&entry.ast);
        assert_eq!(entry.ast.expr(init).kind, ExprKind::StringLiteral("hello from disk".to_string()));
    }

    #[test]
    fn missing_resource_expression_resolves_to_an_empty_array() {
        let dir = std::env::temp_dir();
        let filename = dir.join("entry.ayl");
        let mut entry = loaded(filename.to_str().unwrap(), "const X: str = resource { definitely_does_not_exist_xyz };");
        resolve_external_exprs(std::slice::from_mut(&mut entry), &dir, false).expect("a missing resource is not an error");

        let init = const_initializer(&entry.ast);
        assert_eq!(entry.ast.expr(init).kind, ExprKind::ArrayLiteral(Vec::new()));
    }

    #[test]
    fn process_expression_is_disabled_without_allow_process() {
        let dir = std::env::temp_dir();
        let filename = dir.join("entry.ayl");
        let mut entry = loaded(filename.to_str().unwrap(), r#"const X: str = process { "echo hi" };"#);
        let result = resolve_external_exprs(std::slice::from_mut(&mut entry), &dir, false);
        assert!(result.is_err());
    }

    #[test]
    fn process_expression_captures_stdout_when_allowed() {
        let dir = std::env::temp_dir();
        let filename = dir.join("entry.ayl");
        let mut entry = loaded(filename.to_str().unwrap(), r#"const X: str = process { "echo hi" };"#);
        resolve_external_exprs(std::slice::from_mut(&mut entry), &dir, true).expect("allowed process should succeed");

        let init = const_initializer(&entry.ast);
        assert_eq!(entry.ast.expr(init).kind, ExprKind::StringLiteral("hi\n".to_string()));
    }
}
