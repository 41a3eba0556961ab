//! Primitive builtin type vocabulary.
//!
//! This registry covers the builtin scalar type names and their bit-width
//! metadata. Lookup is exact (no case-folding): the surface language spells
//! these names in lowercase and nothing else is accepted.
//!
//! ## Examples
//! ```rust
//! use ayllu_core::types::{self, PrimitiveId};
//!
//! assert_eq!(types::from_str("i32"), Some(PrimitiveId::I32));
//! assert_eq!(types::as_str(PrimitiveId::U8), "u8");
//! assert_eq!(types::info(PrimitiveId::I32).bits, 32);
//! ```

/// Stable identifier for a primitive scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveId {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Str,
}

/// Which numeric family a primitive belongs to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Signed,
    Unsigned,
    Float,
    /// Not a numeric type (`bool`, `string`).
    NonNumeric,
}

/// Metadata for a primitive type.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveInfo {
    pub id: PrimitiveId,
    pub canonical: &'static str,
    pub bits: u32,
    pub family: Family,
}

const fn info(id: PrimitiveId, canonical: &'static str, bits: u32, family: Family) -> PrimitiveInfo {
    PrimitiveInfo {
        id,
        canonical,
        bits,
        family,
    }
}

/// Registry of primitive builtin types, in declaration order.
pub const PRIMITIVES: &[PrimitiveInfo] = &[
    info(PrimitiveId::I8, "i8", 8, Family::Signed),
    info(PrimitiveId::I16, "i16", 16, Family::Signed),
    info(PrimitiveId::I32, "i32", 32, Family::Signed),
    info(PrimitiveId::I64, "i64", 64, Family::Signed),
    info(PrimitiveId::U8, "u8", 8, Family::Unsigned),
    info(PrimitiveId::U16, "u16", 16, Family::Unsigned),
    info(PrimitiveId::U32, "u32", 32, Family::Unsigned),
    info(PrimitiveId::U64, "u64", 64, Family::Unsigned),
    info(PrimitiveId::F32, "f32", 32, Family::Float),
    info(PrimitiveId::F64, "f64", 64, Family::Float),
    info(PrimitiveId::Bool, "bool", 1, Family::NonNumeric),
    info(PrimitiveId::Str, "string", 0, Family::NonNumeric),
];

/// Resolve a type name to a [`PrimitiveId`].
pub fn from_str(name: &str) -> Option<PrimitiveId> {
    PRIMITIVES.iter().find(|t| t.canonical == name).map(|t| t.id)
}

/// Return the canonical spelling for a primitive type.
pub fn as_str(id: PrimitiveId) -> &'static str {
    info(id).canonical
}

/// Return the full metadata entry for a primitive type.
///
/// ## Panics
/// Never: every [`PrimitiveId`] variant has a registry entry.
pub fn info(id: PrimitiveId) -> PrimitiveInfo {
    *PRIMITIVES.iter().find(|t| t.id == id).expect("INVARIANT: every PrimitiveId has a registry entry")
}

/// Signed integer family, widest to narrowest is not assumed; ordered by bit width ascending.
pub const SIGNED_INTS: &[PrimitiveId] = &[PrimitiveId::I8, PrimitiveId::I16, PrimitiveId::I32, PrimitiveId::I64];
pub const UNSIGNED_INTS: &[PrimitiveId] = &[PrimitiveId::U8, PrimitiveId::U16, PrimitiveId::U32, PrimitiveId::U64];
pub const FLOATS: &[PrimitiveId] = &[PrimitiveId::F32, PrimitiveId::F64];

/// Smallest signed integer primitive whose range contains `value`.
pub fn smallest_signed_fitting(value: i64) -> PrimitiveId {
    for &id in SIGNED_INTS {
        let bits = info(id).bits;
        let (lo, hi) = signed_range(bits);
        if value >= lo && value <= hi {
            return id;
        }
    }
    PrimitiveId::I64
}

/// Smallest unsigned integer primitive whose range contains `value`.
pub fn smallest_unsigned_fitting(value: u64) -> PrimitiveId {
    for &id in UNSIGNED_INTS {
        let bits = info(id).bits;
        if bits == 64 || value <= unsigned_max(bits) {
            return id;
        }
    }
    PrimitiveId::U64
}

/// Inclusive range representable by a two's-complement signed integer of `bits` width.
pub fn signed_range(bits: u32) -> (i64, i64) {
    if bits >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        let hi = (1i64 << (bits - 1)) - 1;
        let lo = -(1i64 << (bits - 1));
        (lo, hi)
    }
}

/// Maximum value representable by an unsigned integer of `bits` width.
pub fn unsigned_max(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Whether an integer literal value fits within the named primitive's range.
///
/// Signed targets accept values in `[-2^(bits-1), 2^(bits-1)-1]`; unsigned
/// targets accept `[0, 2^bits-1]`. Float targets always accept (an integer
/// literal is representable, possibly with precision loss, as a float).
pub fn literal_fits(id: PrimitiveId, value: i128) -> bool {
    let i = info(id);
    match i.family {
        Family::Signed => {
            let (lo, hi) = signed_range(i.bits);
            value >= lo as i128 && value <= hi as i128
        }
        Family::Unsigned => value >= 0 && value <= unsigned_max(i.bits) as i128,
        Family::Float => true,
        Family::NonNumeric => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_canonical_names() {
        for &p in PRIMITIVES {
            assert_eq!(from_str(p.canonical), Some(p.id));
            assert_eq!(as_str(p.id), p.canonical);
        }
    }

    #[test]
    fn smallest_signed_fitting_picks_narrowest() {
        assert_eq!(smallest_signed_fitting(0), PrimitiveId::I8);
        assert_eq!(smallest_signed_fitting(127), PrimitiveId::I8);
        assert_eq!(smallest_signed_fitting(128), PrimitiveId::I16);
        assert_eq!(smallest_signed_fitting(-129), PrimitiveId::I16);
        assert_eq!(smallest_signed_fitting(i64::MAX), PrimitiveId::I64);
    }

    #[test]
    fn literal_fits_respects_family() {
        assert!(literal_fits(PrimitiveId::U8, 255));
        assert!(!literal_fits(PrimitiveId::U8, 256));
        assert!(!literal_fits(PrimitiveId::U8, -1));
        assert!(literal_fits(PrimitiveId::I8, -128));
        assert!(!literal_fits(PrimitiveId::I8, -129));
        assert!(!literal_fits(PrimitiveId::Bool, 0));
    }
}
