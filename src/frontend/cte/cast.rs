//! Compile-time cast semantics (spec §4.3 "Casts").
//!
//! Primitive↔primitive casts follow mask-and-sign-extend semantics by bit
//! width. Two structural conversions are also supported at compile time:
//! integer → fixed-size `array<u8,N>` big-endian byte split (N matching the
//! operand's bit width), and `array<bool,N>` → unsigned integer of exactly N
//! bits, MSB first.

use ayllu_core::types::{Family, PrimitiveId, info};
use ayllu_syntax::ast::Type;

use super::value::{Value, bits_of, mask_signed, mask_unsigned};

pub enum CastOutcome {
    Value(Value),
    Error(String),
}

/// `value as target`, where `value`'s static type is `source_ty` (needed to
/// know the operand's bit width for the byte-split direction) and `target`
/// is the cast's declared target type.
pub fn eval_cast(value: &Value, source_ty: Option<&Type>, target: &Type) -> CastOutcome {
    match target {
        Type::Primitive(target_id) => cast_to_primitive(value, *target_id),
        Type::Array { element, size } => cast_to_array(value, element, *size, source_ty),
        other => CastOutcome::Error(format!("cannot cast to non-primitive, non-array type {other}")),
    }
}

fn cast_to_primitive(value: &Value, target_id: PrimitiveId) -> CastOutcome {
    let target = info(target_id);

    if let Value::Array(items) = value {
        // array<bool,N> -> unsigned integer of exactly N bits, MSB first.
        if items.iter().all(|v| matches!(v, Value::Bool(_))) {
            if target.family != Family::Unsigned || items.len() as u32 != target.bits {
                return CastOutcome::Error(format!(
                    "boolean array cast requires exactly {} elements for {}, found {}",
                    target.bits,
                    target.canonical,
                    items.len()
                ));
            }
            let mut acc: u64 = 0;
            for item in items.iter() {
                let Value::Bool(b) = item else { unreachable!("checked above") };
                acc = (acc << 1) | (*b as u64);
            }
            return CastOutcome::Value(Value::UInt64(mask_unsigned(acc, target.bits)));
        }

        // array<u8,N> -> integer of exactly N*8 bits, MSB first. The
        // reverse of the integer -> array<u8,N> byte split below (spec
        // boundary B2: casting back must reproduce the original value).
        if items.iter().all(|v| matches!(v, Value::UInt64(b) if *b <= 0xFF)) {
            if items.len() as u32 * 8 != target.bits {
                return CastOutcome::Error(format!(
                    "byte array cast requires exactly {} bytes for {}, found {}",
                    target.bits / 8,
                    target.canonical,
                    items.len()
                ));
            }
            let mut acc: u64 = 0;
            for item in items.iter() {
                let Value::UInt64(b) = item else { unreachable!("checked above") };
                acc = (acc << 8) | b;
            }
            return CastOutcome::Value(match target.family {
                Family::Signed => Value::Int64(mask_signed(acc as i64, target.bits)),
                Family::Unsigned => Value::UInt64(mask_unsigned(acc, target.bits)),
                _ => return CastOutcome::Error(format!("cannot cast a byte array to {}", target.canonical)),
            });
        }

        return CastOutcome::Error("array-to-integer cast requires a bool array or a byte (array<u8,N>) array".into());
    }

    let numeric = match value {
        Value::Int64(v) => Numeric::Signed(*v),
        Value::UInt64(v) => Numeric::Unsigned(*v),
        Value::Float64(v) => Numeric::Float(*v),
        Value::Bool(b) => Numeric::Unsigned(*b as u64),
        _ => return CastOutcome::Error(format!("cannot cast {} to {}", value.kind_name(), target.canonical)),
    };

    let out = match (target.family, numeric) {
        (Family::Signed, Numeric::Signed(v)) => Value::Int64(mask_signed(v, target.bits)),
        (Family::Signed, Numeric::Unsigned(v)) => Value::Int64(mask_signed(v as i64, target.bits)),
        (Family::Signed, Numeric::Float(v)) => Value::Int64(mask_signed(v as i64, target.bits)),
        (Family::Unsigned, Numeric::Signed(v)) => Value::UInt64(mask_unsigned(v as u64, target.bits)),
        (Family::Unsigned, Numeric::Unsigned(v)) => Value::UInt64(mask_unsigned(v, target.bits)),
        (Family::Unsigned, Numeric::Float(v)) => Value::UInt64(mask_unsigned(v as u64, target.bits)),
        (Family::Float, Numeric::Signed(v)) => Value::Float64(narrow_float(v as f64, target.bits)),
        (Family::Float, Numeric::Unsigned(v)) => Value::Float64(narrow_float(v as f64, target.bits)),
        (Family::Float, Numeric::Float(v)) => Value::Float64(narrow_float(v, target.bits)),
        (Family::NonNumeric, _) if target_id == PrimitiveId::Bool => match numeric {
            Numeric::Unsigned(v) => Value::Bool(v != 0),
            Numeric::Signed(v) => Value::Bool(v != 0),
            Numeric::Float(v) => Value::Bool(v != 0.0),
        },
        (Family::NonNumeric, _) => return CastOutcome::Error(format!("cannot cast to {}", target.canonical)),
    };
    CastOutcome::Value(out)
}

enum Numeric {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn narrow_float(v: f64, bits: u32) -> f64 {
    if bits <= 32 { v as f32 as f64 } else { v }
}

fn cast_to_array(value: &Value, element: &Type, size_expr: ayllu_syntax::ast::ExprId, source_ty: Option<&Type>) -> CastOutcome {
    let _ = size_expr;
    let Type::Primitive(elem_id) = element else {
        return CastOutcome::Error("only integer -> array<u8,N> byte-split casts are supported at compile time".into());
    };
    if *elem_id != PrimitiveId::U8 {
        return CastOutcome::Error("integer byte-split casts must target array<u8,N>".into());
    }

    let source_bits = match source_ty {
        Some(Type::Primitive(id)) => bits_of(*id),
        _ => 64,
    };

    let raw: u64 = match value {
        Value::Int64(v) => *v as u64,
        Value::UInt64(v) => *v,
        _ => return CastOutcome::Error("integer -> array<u8,N> cast requires an integer operand".into()),
    };

    let n_bytes = (source_bits / 8).max(1);
    let mut bytes = Vec::with_capacity(n_bytes as usize);
    for i in (0..n_bytes).rev() {
        let byte = (raw >> (i * 8)) & 0xFF;
        bytes.push(Value::UInt64(byte));
    }
    CastOutcome::Value(Value::array(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayllu_core::types::PrimitiveId::*;

    #[test]
    fn byte_split_is_big_endian() {
        let v = Value::UInt64(0x01020304);
        let result = cast_to_array(&v, &Type::Primitive(U8), 0, Some(&Type::Primitive(U32)));
        let CastOutcome::Value(Value::Array(items)) = result else { panic!("expected array") };
        let bytes: Vec<u64> = items.iter().map(|v| if let Value::UInt64(b) = v { *b } else { panic!() }).collect();
        assert_eq!(bytes, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn bool_array_packs_msb_first() {
        let bits = vec![Value::Bool(true), Value::Bool(false), Value::Bool(true), Value::Bool(false)];
        let result = cast_to_primitive(&Value::array(bits), U8);
        assert!(matches!(result, CastOutcome::Error(_))); // u8 needs exactly 8 bits
    }

    #[test]
    fn signed_narrowing_masks_to_bit_width() {
        let result = cast_to_primitive(&Value::Int64(300), PrimitiveId::I8);
        assert!(matches!(result, CastOutcome::Value(Value::Int64(v)) if v == 300i64.wrapping_shl(56).wrapping_shr(56)));
    }

    #[test]
    fn byte_array_reassembles_big_endian_back_to_the_integer() {
        let bytes = vec![Value::UInt64(0x01), Value::UInt64(0x02), Value::UInt64(0x03), Value::UInt64(0x04)];
        let result = cast_to_primitive(&Value::array(bytes), U32);
        assert!(matches!(result, CastOutcome::Value(Value::UInt64(0x01020304))));
    }

    #[test]
    fn byte_array_wrong_length_for_target_width_is_an_error() {
        let bytes = vec![Value::UInt64(0x01), Value::UInt64(0x02)];
        let result = cast_to_primitive(&Value::array(bytes), U32);
        assert!(matches!(result, CastOutcome::Error(_)));
    }
}
