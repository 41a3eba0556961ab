//! Diagnostics-focused tests for the semantic error taxonomy (spec §4.2
//! "Errors" / §7 "Error Handling Design"). These are intentionally
//! "frontend only": they run lex → parse → check and assert the specific
//! error that surfaces, not a downstream panic or silent acceptance.

use ayllu::frontend::typechecker::check_module;
use ayllu_syntax::ast::Module;
use ayllu_syntax::lexer::lex;
use ayllu_syntax::parser::parse;

fn typecheck_err_messages(src: &str) -> Vec<String> {
    let tokens = lex(src).unwrap_or_else(|errs| panic!("lexer failed: {errs:?}"));
    let ast: Module = parse(&tokens, "test.ayl").unwrap_or_else(|errs| panic!("parser failed: {errs:?}"));
    let mut module = ast;
    match check_module(&mut module) {
        Ok(_) => vec![],
        Err(errs) => errs.into_iter().map(|e| e.message).collect(),
    }
}

fn assert_contains(messages: &[String], needle: &str) {
    assert!(messages.iter().any(|m| m.contains(needle)), "expected an error containing {needle:?}, got {messages:?}");
}

#[test]
fn undefined_identifier_is_reported() {
    let errs = typecheck_err_messages("const X: i32 = missing_name;");
    assert_contains(&errs, "undefined identifier");
}

#[test]
fn assignment_to_immutable_constant_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        const LIMIT: i32 = 1;
        fn main() -> i32 {
            LIMIT = 2;
            return 0;
        }
        "#,
    );
    assert_contains(&errs, "immutable binding");
}

#[test]
fn break_outside_a_loop_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        fn main() -> i32 {
            break;
            return 0;
        }
        "#,
    );
    assert_contains(&errs, "'break' outside of a loop");
}

#[test]
fn continue_outside_a_loop_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        fn main() -> i32 {
            continue;
            return 0;
        }
        "#,
    );
    assert_contains(&errs, "'continue' outside of a loop");
}

#[test]
fn call_arity_mismatch_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        fn add(a: i32, b: i32) -> i32 { return a + b; }
        fn main() -> i32 {
            return add(1);
        }
        "#,
    );
    assert_contains(&errs, "expects");
}

#[test]
fn type_constructor_with_missing_field_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        type Point { x: i32, y: i32 }
        fn main() -> i32 {
            let p = Point(1);
            return p.x;
        }
        "#,
    );
    assert_contains(&errs, "field(s)");
}

#[test]
fn type_constructor_with_unknown_field_access_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        type Point { x: i32, y: i32 }
        fn main() -> i32 {
            let p = Point(1, 2);
            return p.z;
        }
        "#,
    );
    assert_contains(&errs, "no field");
}

#[test]
fn modulo_requires_unsigned_operands() {
    let errs = typecheck_err_messages("const X: i32 = -5 % 2;");
    assert_contains(&errs, "unsigned");
}

#[test]
fn logical_operator_requires_bool_operands() {
    let errs = typecheck_err_messages("const X: bool = 1 && 2;");
    assert_contains(&errs, "bool");
}

#[test]
fn name_shadowing_a_prior_definition_is_reported() {
    let errs = typecheck_err_messages(
        r#"
        const X: i32 = 1;
        const X: i32 = 2;
        "#,
    );
    assert!(!errs.is_empty());
}

#[test]
fn underscore_may_shadow_repeatedly() {
    let errs = typecheck_err_messages(
        r#"
        fn main() -> i32 {
            let _ = 1;
            let _ = 2;
            return 0;
        }
        "#,
    );
    assert!(errs.is_empty(), "'_' should be exempt from shadowing rejection: {errs:?}");
}

#[test]
fn recursive_type_declaration_is_rejected() {
    let errs = typecheck_err_messages("type Node { next: Node }");
    assert_contains(&errs, "directly recursive");
}

#[test]
fn generic_function_cannot_be_external() {
    let errs = typecheck_err_messages("external fn id(x);");
    assert_contains(&errs, "generic function");
}

#[test]
fn well_typed_module_reports_no_errors() {
    let errs = typecheck_err_messages(
        r#"
        const LIMIT: u8 = 10;
        fn clamp(x: u8) -> u8 {
            if x > LIMIT {
                return LIMIT;
            }
            return x;
        }
        "#,
    );
    assert!(errs.is_empty(), "expected no errors, got {errs:?}");
}
