//! Property-based tests for the two properties spec §8 states in terms a
//! generator can exercise directly: P5 (CTE determinism) and P6 (literal
//! range fit matches two's-complement/bitwidth semantics). Everything else
//! in the testable-properties list is either an invariant over internal
//! side tables (covered in `frontend::typechecker::tests` /
//! `frontend::optimizer::tests`) or already exercised end-to-end in
//! `tests/integration_tests.rs`.

use ayllu::compile_module;
use ayllu_core::types::{self, PrimitiveId};
use ayllu_syntax::ast::Module;
use ayllu_syntax::lexer::lex;
use ayllu_syntax::parser::parse;
use proptest::prelude::*;

fn parse_src(src: &str) -> Module {
    let tokens = lex(src).unwrap_or_else(|errs| panic!("lex error: {errs:?}"));
    parse(&tokens, "test.ayl").unwrap_or_else(|errs| panic!("parse error: {errs:?}"))
}

fn arithmetic_expr_strategy() -> impl Strategy<Value = String> {
    let leaf = (-1000i64..1000).prop_map(|n| n.to_string());
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a} + {b})")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a} - {b})")),
            (inner.clone(), inner).prop_map(|(a, b)| format!("({a} * {b})")),
        ]
    })
}

proptest! {
    /// P5: CTE is deterministic. Compiling the same constant initializer
    /// twice (independent parses, independent runs) folds to the same
    /// value every time.
    #[test]
    fn constexpr_folding_is_deterministic(expr in arithmetic_expr_strategy()) {
        let src = format!("const X: i64 = {expr};");

        let mut a = parse_src(&src);
        let mut b = parse_src(&src);

        let compiled_a = compile_module(&mut a);
        let compiled_b = compile_module(&mut b);

        match (compiled_a, compiled_b) {
            (Ok(ca), Ok(cb)) => {
                let va: Vec<_> = ca.optimization_facts.constexpr_values.values().cloned().collect();
                let vb: Vec<_> = cb.optimization_facts.constexpr_values.values().cloned().collect();
                prop_assert_eq!(va, vb);
            }
            (Err(ea), Err(eb)) => {
                prop_assert_eq!(ea.len(), eb.len());
            }
            (ra, rb) => prop_assert!(false, "non-deterministic compile outcome: {:?} vs {:?}", ra.is_ok(), rb.is_ok()),
        }
    }

    /// P6: `literal_assignable_to(T, L)` holds iff L's value fits T's range
    /// per two's-complement/bitwidth semantics. Check the underlying
    /// `literal_fits` directly against hand-computed signed/unsigned bounds.
    #[test]
    fn literal_fits_matches_bitwidth_semantics(value in any::<i64>(), bits in prop_oneof![Just(8u32), Just(16u32), Just(32u32), Just(64u32)]) {
        let signed_id = match bits {
            8 => PrimitiveId::I8,
            16 => PrimitiveId::I16,
            32 => PrimitiveId::I32,
            _ => PrimitiveId::I64,
        };
        let unsigned_id = match bits {
            8 => PrimitiveId::U8,
            16 => PrimitiveId::U16,
            32 => PrimitiveId::U32,
            _ => PrimitiveId::U64,
        };

        let (lo, hi) = types::signed_range(bits);
        prop_assert_eq!(types::literal_fits(signed_id, value as i128), value >= lo as i128 && value <= hi as i128);

        let max = types::unsigned_max(bits);
        prop_assert_eq!(types::literal_fits(unsigned_id, value as i128), value >= 0 && (value as i128) <= max as i128);
    }
}

/// A narrower, deterministic companion to the proptest above: the specific
/// boundary values (a literal at exactly a primitive's min/max) rather than
/// a random sample.
#[test]
fn literal_fits_exact_boundaries() {
    assert!(types::literal_fits(PrimitiveId::I8, 127));
    assert!(!types::literal_fits(PrimitiveId::I8, 128));
    assert!(types::literal_fits(PrimitiveId::I8, -128));
    assert!(!types::literal_fits(PrimitiveId::I8, -129));
    assert!(types::literal_fits(PrimitiveId::U16, 65535));
    assert!(!types::literal_fits(PrimitiveId::U16, 65536));
    assert!(!types::literal_fits(PrimitiveId::U16, -1));
}
