//! Shared, pure semantic vocabulary for the Ayllu compiler.
//!
//! This crate is intentionally small and dependency-light: no IO, no global
//! state, no compiler-specific types. It holds the spellings and promotion
//! rules that the type checker and the compile-time evaluator must agree on
//! bit-for-bit, so the two passes cannot silently diverge.
//!
//! ## Notes
//!
//! - `types`: the primitive type registry (bit widths, signedness, canonical
//!   spellings and aliases).
//! - `keywords`: the reserved-word table used by the lexer.
//! - `numeric`: numeric-family unification policy shared by the type checker
//!   (`unify_types`) and the compile-time evaluator (saturating folds).

pub mod keywords;
pub mod numeric;
pub mod types;

pub use numeric::{NumericFamily, unify_numeric};
pub use types::{PrimitiveId, PrimitiveInfo, PRIMITIVES};
