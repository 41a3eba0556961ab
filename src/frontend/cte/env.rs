//! CTE binding environment: lexical local scoping with save/restore (spec §4.3
//! "Control flow" / "Block").
//!
//! A block's *declarations* (new `let`/receiver/param bindings) do not leak
//! past the block; *assignments* to a variable declared in an outer scope
//! persist (spec §9 resolves this ambiguity explicitly). Modeled as a stack
//! of scopes: `lookup`/`assign` walk outward from the innermost scope,
//! `declare` always writes to the innermost scope.

use std::collections::HashMap;
use std::rc::Rc;

use ayllu_syntax::ast::ExprId;

use super::value::Value;

/// A local binding: an ordinary value, an unevaluated "expression
/// parameter" thunk (spec §4.3 Call, the caller's argument expression plus
/// the environment it should be re-evaluated in at each use), or a receiver
/// parameter. Receivers read like an ordinary value but `Env::assign`
/// refuses to update one: spec §4.3/§7 reject assignment to a receiver
/// unconditionally, even though the type checker allows it at compile-check
/// time, so this is the only place that rule is enforced.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Receiver(Value),
    ExprThunk { expr: ExprId, env: Rc<Env> },
}

#[derive(Debug, Clone, Default)]
pub struct Env {
    scopes: Vec<HashMap<String, Binding>>,
}

impl Env {
    pub fn new() -> Self {
        Self { scopes: vec![HashMap::new()] }
    }

    pub fn push_block(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_block(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "INVARIANT: root scope is never popped");
    }

    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) {
        self.scopes.last_mut().expect("INVARIANT: at least one scope").insert(name.into(), binding);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Assign to an existing binding, walking outward; returns `false` if
    /// `name` is not bound in any enclosing scope (caller should declare
    /// instead, per spec's `creates_new_variable` rule).
    ///
    /// A binding found as [`Binding::Receiver`] is left untouched and this
    /// still returns `false`, the same signal `store_lvalue` uses for a
    /// rejected global, since a receiver is never a valid assignment target.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                if matches!(slot, Binding::Receiver(_)) {
                    return false;
                }
                *slot = Binding::Value(value);
                return true;
            }
        }
        false
    }

    /// `true` if `name` resolves (in any enclosing scope) to a receiver
    /// binding specifically, distinct from an ordinary local or global.
    pub fn is_receiver(&self, name: &str) -> bool {
        matches!(self.lookup(name), Some(Binding::Receiver(_)))
    }
}
