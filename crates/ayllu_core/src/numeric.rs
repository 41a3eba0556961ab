//! Numeric policy: single source of truth for Ayllu's arithmetic promotion rules.
//!
//! Both the type checker (`frontend::typechecker`, static unification) and the
//! compile-time evaluator (`frontend::cte`, saturating folds) call into this
//! module so the two passes cannot silently diverge on how `i32 + i64`, or
//! `u8 << u8`, resolve.
//!
//! ## Rules
//! - `{+,-,*,/}`: both operands must be the same [`NumericFamily`]; the result
//!   is the wider of the two bit widths. Cross-family combinations are a type
//!   error unless the caller has already inserted an explicit cast.
//! - `{%,&,|,^,<<,>>}`: both operands must be [`NumericFamily::Unsigned`];
//!   shift results take the left operand's type, the rest take the wider
//!   width as above.
//! - Comparisons and logical operators are handled by the caller; this module
//!   only decides the *operand* unification, not the (always-`bool`) result.

use crate::types::{Family, PrimitiveId, PrimitiveInfo, info};

/// Which numeric family a primitive belongs to, for promotion purposes.
///
/// This mirrors [`crate::types::Family`] but excludes [`Family::NonNumeric`]
/// since non-numeric primitives never reach `unify_numeric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFamily {
    Signed,
    Unsigned,
    Float,
}

impl NumericFamily {
    /// Classify a primitive's numeric family.
    ///
    /// Returns `None` for `bool`/`string`, which are not numeric.
    pub fn of(id: PrimitiveId) -> Option<NumericFamily> {
        match info(id).family {
            Family::Signed => Some(NumericFamily::Signed),
            Family::Unsigned => Some(NumericFamily::Unsigned),
            Family::Float => Some(NumericFamily::Float),
            Family::NonNumeric => None,
        }
    }
}

/// Binary operators whose operand types this module governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    /// `+ - * /`
    Arith,
    /// `%`
    Modulo,
    /// `& | ^`
    Bitwise,
    /// `<< >>`
    Shift,
}

/// Why two operand types failed to unify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyError {
    /// Operands belong to different numeric families (e.g. `i32` and `f64`)
    /// and no explicit cast bridges them.
    CrossFamily { left: PrimitiveId, right: PrimitiveId },
    /// `%`, `&`, `|`, `^`, `<<`, `>>` require both operands unsigned.
    RequiresUnsigned { offender: PrimitiveId },
}

/// Unify two operand primitive types for a numeric binary operator.
///
/// ## Returns
/// The result primitive type: for `Arith`, the wider of the two widths
/// within the shared family; for `Shift`, always the left operand's type;
/// for `Modulo`/`Bitwise`, the wider of the two unsigned widths.
pub fn unify_numeric(op: NumericOp, left: PrimitiveId, right: PrimitiveId) -> Result<PrimitiveId, UnifyError> {
    match op {
        NumericOp::Arith => unify_same_family(left, right),
        NumericOp::Modulo | NumericOp::Bitwise => {
            require_unsigned(left)?;
            require_unsigned(right)?;
            unify_same_family(left, right)
        }
        NumericOp::Shift => {
            require_unsigned(left)?;
            require_unsigned(right)?;
            Ok(left)
        }
    }
}

fn require_unsigned(id: PrimitiveId) -> Result<(), UnifyError> {
    match NumericFamily::of(id) {
        Some(NumericFamily::Unsigned) => Ok(()),
        _ => Err(UnifyError::RequiresUnsigned { offender: id }),
    }
}

fn unify_same_family(left: PrimitiveId, right: PrimitiveId) -> Result<PrimitiveId, UnifyError> {
    let (lf, rf) = match (NumericFamily::of(left), NumericFamily::of(right)) {
        (Some(lf), Some(rf)) => (lf, rf),
        _ => return Err(UnifyError::CrossFamily { left, right }),
    };
    if lf != rf {
        return Err(UnifyError::CrossFamily { left, right });
    }
    Ok(wider(info(left), info(right)))
}

fn wider(left: PrimitiveInfo, right: PrimitiveInfo) -> PrimitiveId {
    if left.bits >= right.bits { left.id } else { right.id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveId::*;

    #[test]
    fn arith_promotes_within_signed_family() {
        assert_eq!(unify_numeric(NumericOp::Arith, I8, I32), Ok(I32));
        assert_eq!(unify_numeric(NumericOp::Arith, I64, I8), Ok(I64));
    }

    #[test]
    fn arith_promotes_within_float_family() {
        assert_eq!(unify_numeric(NumericOp::Arith, F32, F64), Ok(F64));
    }

    #[test]
    fn arith_rejects_cross_family() {
        assert_eq!(unify_numeric(NumericOp::Arith, I32, U32), Err(UnifyError::CrossFamily { left: I32, right: U32 }));
        assert_eq!(unify_numeric(NumericOp::Arith, I32, F32), Err(UnifyError::CrossFamily { left: I32, right: F32 }));
    }

    #[test]
    fn modulo_and_bitwise_require_unsigned() {
        assert_eq!(unify_numeric(NumericOp::Modulo, U8, U16), Ok(U16));
        assert_eq!(
            unify_numeric(NumericOp::Modulo, I8, I16),
            Err(UnifyError::RequiresUnsigned { offender: I8 })
        );
        assert_eq!(unify_numeric(NumericOp::Bitwise, U32, U32), Ok(U32));
    }

    #[test]
    fn shift_result_takes_lhs_type() {
        assert_eq!(unify_numeric(NumericOp::Shift, U8, U64), Ok(U8));
        assert_eq!(unify_numeric(NumericOp::Shift, U64, U8), Ok(U64));
        assert_eq!(
            unify_numeric(NumericOp::Shift, I32, U32),
            Err(UnifyError::RequiresUnsigned { offender: I32 })
        );
    }
}
