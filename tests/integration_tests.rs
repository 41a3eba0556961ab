//! End-to-end pipeline tests driven through the public API
//! (`ayllu::compile_module`), exercising the concrete scenarios spec §8
//! calls out explicitly rather than re-testing any single pass in
//! isolation (those live next to the pass: `frontend::typechecker::tests`,
//! `frontend::optimizer::tests`, `frontend::residualizer::tests`).

use ayllu::compile_module;
use ayllu::compile_module_with_caps;
use ayllu::frontend::cte::{CteCaps, Value};
use ayllu_syntax::ast::{ExprId, ExprKind, Module, StmtKind};
use ayllu_syntax::lexer::lex;
use ayllu_syntax::parser::parse;

fn parse_src(src: &str) -> Module {
    let tokens = lex(src).unwrap_or_else(|errs| panic!("lex error: {errs:?}"));
    parse(&tokens, "test.ayl").unwrap_or_else(|errs| panic!("parse error: {errs:?}"))
}

/// Scenario 1 (spec §8): monomorphization idempotence. Two calls with the
/// same concrete argument type share one instantiation; a third call with a
/// distinct type gets its own.
#[test]
fn monomorphization_idempotence() {
    let mut module = parse_src(
        r#"
        fn id(x) {
            let y = x;
        }

        fn main() -> i32 {
            id(1i32);
            id(2i32);
            id(true);
            return 0;
        }
        "#,
    );
    let compiled = compile_module(&mut module).expect("unexpected type errors");
    let mono_clones: Vec<_> = compiled.type_info.functions.keys().filter(|n| n.starts_with("id_G_")).collect();
    assert_eq!(mono_clones.len(), 2, "expected exactly two mono clones, got {mono_clones:?}");
    assert!(compiled.type_info.functions.contains_key("id_G_i32"));
}

/// Scenario 2: constexpr folding. `K*K` residualizes to the literal `100`.
#[test]
fn constexpr_folding_residualizes_to_a_literal() {
    let mut module = parse_src(
        r#"
        const K: i32 = 2 * 3 + 4;
        const X: i32 = K * K;
        "#,
    );
    let compiled = compile_module(&mut module).expect("unexpected type errors");
    assert!(compiled.optimization_facts.constexpr_values.values().any(|v| matches!(v, Value::Int64(100))));

    let x_init = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::VarDecl(v) if v.name == "X" => Some(v.initializer),
        _ => None,
    });
    let x_init = x_init.expect("X not found");
    assert!(matches!(module.expr(x_init).kind, ExprKind::IntLiteral { value: 100, .. }));
}

/// Scenario 3: dead-branch pruning. The conditional statement itself is
/// replaced by its taken branch.
#[test]
fn dead_branch_pruning_drops_the_untaken_arm() {
    let mut module = parse_src(
        r#"
        const DEBUG: bool = false;

        fn panic_branch() -> i32 { return 1; }
        fn ok_branch() -> i32 { return 0; }

        fn main() -> i32 {
            if DEBUG {
                return panic_branch();
            } else {
                return ok_branch();
            }
            return 2;
        }
        "#,
    );
    let compiled = compile_module(&mut module).expect("unexpected type errors");
    assert!(!compiled.optimization_facts.constexpr_conditions.is_empty());

    let main_body = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::FuncDecl(f) if f.name == "main" => Some(f.body.clone()),
        _ => None,
    });
    let body = main_body.expect("main not found");
    let has_if = body.iter().any(|&s| matches!(module.stmt(s).kind, StmtKind::ConditionalStmt { .. }));
    assert!(!has_if, "the conditional should have been replaced by its taken branch");
}

/// Scenario 4: byte-array cast round-trips through big-endian byte order.
#[test]
fn byte_array_cast_round_trips() {
    let mut module = parse_src(
        r#"
        const BYTES: array<u8, 4> = 0x01020304u32 as array<u8, 4>;
        const BACK: u32 = BYTES as u32;
        "#,
    );
    let compiled = compile_module(&mut module).expect("unexpected type errors");
    let bytes_init = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::VarDecl(v) if v.name == "BYTES" => Some(v.initializer),
        _ => None,
    });
    let value = compiled.optimization_facts.constexpr_values.get(&bytes_init.unwrap()).cloned();
    match value {
        Some(Value::Array(items)) => {
            let bytes: Vec<u64> = items
                .iter()
                .map(|v| match v {
                    Value::UInt64(u) => *u,
                    other => panic!("expected uint byte, got {other:?}"),
                })
                .collect();
            assert_eq!(bytes, vec![0x01, 0x02, 0x03, 0x04]);
        }
        other => panic!("expected a known byte array, got {other:?}"),
    }

    let back_init = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::VarDecl(v) if v.name == "BACK" => Some(v.initializer),
        _ => None,
    });
    assert_eq!(compiled.optimization_facts.constexpr_values.get(&back_init.unwrap()), Some(&Value::UInt64(0x01020304)));
}

/// Scenario 5: a cycle between two constant initializers is a compile-time
/// error, not an infinite loop.
#[test]
fn cycle_in_constant_initializers_is_an_error() {
    let mut module = parse_src(
        r#"
        const A: i32 = B;
        const B: i32 = A;
        "#,
    );
    let result = compile_module(&mut module);
    assert!(result.is_err(), "a cyclic constant initializer must fail to compile");
}

/// Scenario 6: a multi-return function produces a synthetic `__Tuple2_…`
/// type and destructuring assigns each field by position.
#[test]
fn tuple_return_produces_a_synthetic_type() {
    let mut module = parse_src(
        r#"
        fn pair() -> (i32, i32) {
            return (1, 2);
        }

        fn main() -> i32 {
            let (a, b) = pair();
            return a + b;
        }
        "#,
    );
    let compiled = compile_module(&mut module).expect("unexpected type errors");
    assert!(compiled.type_info.tuple_types.contains_key("__Tuple2_i32_i32"));
}

/// Boundary B1: `a..a` is rejected at type-check time, not silently folded.
#[test]
fn range_with_equal_bounds_is_rejected() {
    let mut module = parse_src("const R: array<i32, 0> = 3..3;");
    assert!(compile_module(&mut module).is_err());
}

/// A pure dead statement (no observable effect, result unused) is dropped by
/// the residualizer (spec §4.5 rewrite 3).
#[test]
fn pure_dead_expression_statement_is_dropped() {
    let mut module = parse_src(
        r#"
        fn main() -> i32 {
            1 + 2;
            return 0;
        }
        "#,
    );
    compile_module(&mut module).expect("unexpected type errors");
    let main_body = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::FuncDecl(f) if f.name == "main" => Some(f.body.clone()),
        _ => None,
    });
    let body = main_body.expect("main not found");
    assert_eq!(body.len(), 1, "the pure `1 + 2;` statement should have been dropped, leaving only `return`");
}

/// An undefined identifier is a semantic error surfaced through the public
/// `compile_module` entry point, not a panic.
#[test]
fn undefined_identifier_is_a_semantic_error_not_a_panic() {
    let mut module = parse_src("const X: i32 = does_not_exist;");
    let errors = compile_module(&mut module).expect_err("expected a semantic error");
    assert!(!errors.is_empty());
}

/// Generic functions never survive as their own call targets past type
/// checking (spec P4): every reachable `Call` to a generic name should have
/// already been rebound to a monomorphized clone.
#[test]
fn no_generic_function_is_ever_directly_called_after_checking() {
    let mut module = parse_src(
        r#"
        fn wrap(x) { let y = x; }
        fn main() -> i32 {
            wrap(1i32);
            return 0;
        }
        "#,
    );
    let compiled = compile_module(&mut module).expect("unexpected type errors");
    for id in 0..module.expr_count() as ExprId {
        if let ExprKind::Call { operand, .. } = &module.expr(id).kind {
            if let ExprKind::Identifier(name) = &module.expr(*operand).kind {
                assert_ne!(name, "wrap", "a call site still targets the generic function directly");
            }
        }
    }
    assert!(compiled.type_info.functions.contains_key("wrap_G_i32"));
}

/// An external function's signature must be primitive-only; a non-primitive
/// parameter is rejected at type-check time.
#[test]
fn external_function_with_named_type_parameter_is_rejected() {
    let mut module = parse_src(
        r#"
        type Point { x: i32, y: i32 }
        external fn touches(p: Point) -> bool;
        "#,
    );
    assert!(compile_module(&mut module).is_err());
}

/// A recursive type declaration (direct self-reference in a field) is
/// rejected rather than accepted and left to blow the stack later.
#[test]
fn directly_recursive_type_is_rejected() {
    let mut module = parse_src(
        r#"
        type Node { next: Node }
        "#,
    );
    assert!(compile_module(&mut module).is_err());
}

/// Boundary B3: a compile-time call chain exactly as deep as the recursion
/// cap folds; one call deeper is a hard error instead of a stack overflow.
/// `deep(3)` calls `deep(2)`, `deep(1)`, `deep(0)`: four nested calls.
#[test]
fn recursion_depth_at_the_cap_succeeds_one_past_it_errors() {
    let src = r#"
        fn deep(n: i32) -> i32 {
            if n <= 0 {
                return 0;
            }
            return deep(n - 1);
        }

        const RESULT: i32 = deep(3);
    "#;

    let mut module = parse_src(src);
    let caps = CteCaps { max_recursion_depth: 4, ..CteCaps::default() };
    let compiled = compile_module_with_caps(&mut module, caps).expect("four nested calls must fit a cap of four");
    let result_init = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::VarDecl(v) if v.name == "RESULT" => Some(v.initializer),
        _ => None,
    });
    assert_eq!(compiled.optimization_facts.constexpr_values.get(&result_init.unwrap()), Some(&Value::Int64(0)));

    let mut module = parse_src(src);
    let caps = CteCaps { max_recursion_depth: 3, ..CteCaps::default() };
    let errors = compile_module_with_caps(&mut module, caps).expect_err("three nested calls is one short of the four this chain needs");
    assert!(errors.iter().any(|e| e.message.contains("recursion-depth cap")));
}

/// Boundary B4: a compile-time `repeat` loop that runs exactly as many
/// iterations as the loop cap folds; one iteration more is a hard error
/// instead of spinning forever.
#[test]
fn loop_iteration_count_at_the_cap_succeeds_one_past_it_errors() {
    let src = r#"
        fn count_to(n: i32) -> i32 {
            let mut i: i32 = 0;
            let mut total: i32 = 0;
            repeat i < n {
                total = total + 1;
                i = i + 1;
            }
            return total;
        }

        const RESULT: i32 = count_to(5);
    "#;

    let mut module = parse_src(src);
    let caps = CteCaps { max_loop_iterations: 5, ..CteCaps::default() };
    let compiled = compile_module_with_caps(&mut module, caps).expect("five iterations must fit a cap of five");
    let result_init = module.top_level.iter().find_map(|&s| match &module.stmt(s).kind {
        StmtKind::VarDecl(v) if v.name == "RESULT" => Some(v.initializer),
        _ => None,
    });
    assert_eq!(compiled.optimization_facts.constexpr_values.get(&result_init.unwrap()), Some(&Value::Int64(5)));

    let mut module = parse_src(src);
    let caps = CteCaps { max_loop_iterations: 4, ..CteCaps::default() };
    let errors = compile_module_with_caps(&mut module, caps).expect_err("four iterations is one short of the five this loop needs");
    assert!(errors.iter().any(|e| e.message.contains("loop cap")));
}
