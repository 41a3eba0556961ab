//! Synthetic tuple type naming and registration (spec invariant I5).
//!
//! `"__TupleN_T1_T2_…"` is the canonical name spec §3's I5 specifies for an
//! N-ary multi-return/tuple-literal type. Deriving the name from the element
//! types (rather than minting a fresh name per call site) means two call
//! sites that both return `(i32, i32)` share one entry in the tuple-type
//! registry (spec's concrete scenario 6 checks exactly this: "synthetic
//! type name matches `__Tuple2_i32_i32`").

use ayllu_syntax::ast::Type;

use super::mono::mangle_type;

/// The canonical synthetic name for a tuple of `element_types`.
pub(crate) fn tuple_type_name(element_types: &[Type]) -> String {
    let tags: Vec<String> = element_types.iter().map(mangle_type).collect();
    format!("__Tuple{}_{}", element_types.len(), tags.join("_"))
}

/// Field list for a synthetic tuple type, in declaration order, named
/// `"__0", "__1", …` per spec I5.
pub(crate) fn tuple_fields(element_types: &[Type]) -> Vec<(String, Type)> {
    element_types.iter().enumerate().map(|(i, t)| (format!("__{i}"), t.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayllu_core::types::PrimitiveId;

    #[test]
    fn name_encodes_element_types() {
        let types = vec![Type::Primitive(PrimitiveId::I32), Type::Primitive(PrimitiveId::I32)];
        assert_eq!(tuple_type_name(&types), "__Tuple2_i32_i32");
    }

    #[test]
    fn fields_use_positional_dunder_names() {
        let types = vec![Type::Primitive(PrimitiveId::I32), Type::Primitive(PrimitiveId::Bool)];
        let fields = tuple_fields(&types);
        assert_eq!(fields[0].0, "__0");
        assert_eq!(fields[1].0, "__1");
    }
}
