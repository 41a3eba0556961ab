//! Integration tests for the type checker + monomorphization pass, driven
//! through the real lexer/parser rather than hand-built ASTs (those live
//! next to the pieces they exercise: `check_stmt::tests`, `mono::tests`,
//! `tuple_types::tests`.

use ayllu_syntax::ast::Module;
use ayllu_syntax::lexer::lex;
use ayllu_syntax::parser::parse;

use super::{TypeChecker, check_module};

fn parse_src(src: &str) -> Module {
    let tokens = lex(src).unwrap_or_else(|errs| panic!("lex error in test source: {errs:?}"));
    parse(&tokens, "test.ayl").unwrap_or_else(|errs| panic!("parse error in test source: {errs:?}"))
}

fn mangled_count(checker: &TypeChecker, base: &str) -> usize {
    let prefix = format!("{base}_G_");
    checker.functions.keys().filter(|name| name.starts_with(&prefix)).count()
}

#[test]
fn repeated_calls_with_the_same_argument_type_share_one_instantiation() {
    let mut module = parse_src(
        r#"
        fn twice(x) {
            let y = x;
        }

        fn main() -> i32 {
            twice(1);
            twice(2);
            return 0;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_ok(), "unexpected errors: {:?}", checker.errors);
    assert_eq!(mangled_count(&checker, "twice"), 1);
}

#[test]
fn calls_with_distinct_argument_types_get_distinct_instantiations() {
    let mut module = parse_src(
        r#"
        fn identity(x) {
            let y = x;
        }

        fn main() -> i32 {
            identity(1);
            identity(true);
            return 0;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_ok(), "unexpected errors: {:?}", checker.errors);
    assert_eq!(mangled_count(&checker, "identity"), 2);
    assert!(checker.functions.contains_key("identity_G_i8"));
    assert!(checker.functions.contains_key("identity_G_bool"));
}

#[test]
fn monomorphized_clone_is_checked_as_its_own_independent_body() {
    // Each instantiation must type-check `x` against its own argument type,
    // not whatever the first call site happened to bind.
    let mut module = parse_src(
        r#"
        fn describe(x) -> string {
            let y = x;
            return "ok";
        }

        fn main() -> i32 {
            describe(1);
            describe(true);
            return 0;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_ok(), "unexpected errors: {:?}", checker.errors);
    assert_eq!(mangled_count(&checker, "describe"), 2);
}

#[test]
fn tuple_return_type_is_registered_under_its_synthetic_name() {
    let mut module = parse_src(
        r#"
        fn pair() -> (i32, i32) {
            return (1i32, 2i32);
        }
        "#,
    );
    let output = check_module(&mut module).expect("unexpected type errors");
    assert!(output.tuple_types.contains_key("__Tuple2_i32_i32"));
}

#[test]
fn statically_false_condition_skips_checking_the_taken_then_branch() {
    // I6: the `then` branch references an undefined name, but since the
    // condition provably folds to `false` at compile time, only the `else`
    // branch is actually type-checked.
    let mut module = parse_src(
        r#"
        fn main() -> i32 {
            if false {
                let y = nonexistent_identifier;
            } else {
                return 0;
            }
            return 1;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_ok(), "unexpected errors: {:?}", checker.errors);
}

#[test]
fn statically_true_condition_still_flags_errors_in_the_taken_branch() {
    let mut module = parse_src(
        r#"
        fn main() -> i32 {
            if true {
                let y = nonexistent_identifier;
            }
            return 0;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_err());
    assert!(checker.errors.iter().any(|e| e.message.contains("undefined identifier")));
}

#[test]
fn literal_within_range_is_assignable_to_a_narrower_declared_type() {
    let mut module = parse_src(
        r#"
        fn main() -> i32 {
            let x: u8 = 200;
            return 0;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_ok(), "unexpected errors: {:?}", checker.errors);
}

#[test]
fn literal_out_of_range_for_declared_type_is_rejected() {
    let mut module = parse_src(
        r#"
        fn main() -> i32 {
            let x: u8 = 1000;
            return 0;
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_err());
}

#[test]
fn external_function_without_a_body_is_accepted() {
    let mut module = parse_src(
        r#"
        external fn syscall_write(fd: i32, len: u64) -> i32;
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_ok(), "unexpected errors: {:?}", checker.errors);
}

#[test]
fn directly_recursive_type_is_rejected() {
    let mut module = parse_src(
        r#"
        type Node {
            value: i32,
            next: Node,
        }
        "#,
    );
    let mut checker = TypeChecker::new();
    let result = checker.check_module(&mut module);
    assert!(result.is_err());
    assert!(checker.errors.iter().any(|e| e.message.contains("directly recursive")));
}
