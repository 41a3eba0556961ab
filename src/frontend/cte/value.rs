//! The CTE value domain (spec §4.3 "Value domain").
//!
//! Arrays and composites use `Rc` so cloning a `Value` during evaluation
//! (passing it into a callee's environment, storing it in a local) is O(1);
//! mutation clones-on-write via `Rc::make_mut`, matching spec §5's "arrays
//! and composites created in one CTE invocation must not be aliased into
//! another invocation's store". Every top-level `eval` call gets its own
//! environment, so an `Rc` never escapes across invocations even though it
//! may be shared widely within one.

use std::rc::Rc;

use ayllu_core::types::PrimitiveId;

/// A compile-time value, tagged by runtime shape (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Bool(bool),
    Str(Rc<String>),
    Array(Rc<Vec<Value>>),
    /// `(type_name, fields in declaration order)`.
    Composite(Rc<CompositeValue>),
    Uninitialized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeValue {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Value {
    pub fn array_get_mut(arr: &mut Rc<Vec<Value>>) -> &mut Vec<Value> {
        Rc::make_mut(arr)
    }

    pub fn composite_get_mut(c: &mut Rc<CompositeValue>) -> &mut CompositeValue {
        Rc::make_mut(c)
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    pub fn composite(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Value {
        Value::Composite(Rc::new(CompositeValue { type_name: type_name.into(), fields }))
    }

    /// Truthiness for conditions; only `Bool` is accepted by the type
    /// checker, but the evaluator is defensive here too.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int64(_) => "int",
            Value::UInt64(_) => "uint",
            Value::Float64(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Composite(_) => "composite",
            Value::Uninitialized => "uninitialized",
        }
    }
}

/// Saturating-integer semantics' narrow/widen helper: mask a signed value to
/// `bits` width (two's complement), used by both integer folds and casts.
pub fn mask_signed(value: i64, bits: u32) -> i64 {
    if bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// Mask an unsigned value to `bits` width.
pub fn mask_unsigned(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        return value;
    }
    value & ((1u64 << bits) - 1)
}

pub fn bits_of(id: PrimitiveId) -> u32 {
    ayllu_core::types::info(id).bits
}
