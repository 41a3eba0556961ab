//! Lexical scopes and the symbol table (spec §3 "Symbol", §4.1 "Resolver").
//!
//! Scopes are keyed by a monotone [`ScopeId`] rather than nested by pointer,
//! so a scope chain survives monomorphization's function cloning (a clone
//! gets its own child scope of the same parent, never a copy of the
//! parent's storage). Symbols are tagged with `scope_instance_id` (the
//! GLOSSARY's "instance id"): distinct imports/instantiations of otherwise
//! identical declarations get distinct ids so fact tables keyed by
//! `(instance_id, expr)` in the optimizer don't collide.

use std::collections::HashMap;

use ayllu_syntax::ast::{StmtId, SymbolId, Type};

/// Monotone identifier for a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// What kind of thing a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Type,
    Constant,
    Variable,
}

/// A named, scoped entity (spec §3 "Symbol").
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// `None` until the type checker fills it in; constants/variables/
    /// functions (return type) all use this slot.
    pub ty: Option<Type>,
    pub is_mutable: bool,
    pub is_external: bool,
    pub is_exported: bool,
    /// The declaring statement, when one exists (always for Function/Type/
    /// top-level Constant/Variable; `None` for synthetic/builtin symbols).
    pub declaration: Option<StmtId>,
    /// Distinguishes otherwise-identical declarations pulled in from
    /// different imports or monomorphization instantiations.
    pub scope_instance_id: u32,
}

#[derive(Debug)]
struct Scope {
    id: ScopeId,
    parent: Option<ScopeId>,
    bindings: HashMap<String, SymbolId>,
}

/// Error from [`SymbolTable::define`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowError {
    pub name: String,
}

/// Scope tree plus the flat symbol arena it indexes into.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self { scopes: Vec::new(), symbols: Vec::new() };
        table.push_scope(None);
        table
    }

    /// The module-level (root) scope, always `ScopeId(0)`.
    pub fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { id, parent, bindings: HashMap::new() });
        id
    }

    /// Define `name` in `scope`. Rejects redefinition in the *same* scope
    /// (shadowing an outer scope's binding is allowed) unless `name == "_"`,
    /// which may always shadow (spec §4.1 "Errors").
    pub fn define(&mut self, scope: ScopeId, name: impl Into<String>, symbol: Symbol) -> Result<SymbolId, ShadowError> {
        let name = name.into();
        let scope_idx = scope.0 as usize;
        if name != "_" && self.scopes[scope_idx].bindings.contains_key(&name) {
            return Err(ShadowError { name });
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        self.scopes[scope_idx].bindings.insert(name, id);
        Ok(id)
    }

    /// Resolve `name` starting at `scope`, walking outward through parents.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            let s_idx = s.0 as usize;
            if let Some(&id) = self.scopes[s_idx].bindings.get(name) {
                return Some(id);
            }
            current = self.scopes[s_idx].parent;
        }
        None
    }

    /// Resolve `name` only within `scope` itself, no parent walk.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope.0 as usize].bindings.get(name).copied()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_symbol(name: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind,
            ty: None,
            is_mutable: false,
            is_external: false,
            is_exported: false,
            declaration: None,
            scope_instance_id: 0,
        }
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut table = SymbolTable::new();
        let root = table.root_scope();
        let child = table.push_scope(Some(root));
        let outer = table.define(root, "x", dummy_symbol("x", SymbolKind::Constant)).unwrap();
        assert_eq!(table.lookup(child, "x"), Some(outer));
        assert_eq!(table.lookup(root, "y"), None);
    }

    #[test]
    fn redefinition_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        let root = table.root_scope();
        table.define(root, "x", dummy_symbol("x", SymbolKind::Variable)).unwrap();
        assert!(table.define(root, "x", dummy_symbol("x", SymbolKind::Variable)).is_err());
    }

    #[test]
    fn underscore_may_always_shadow() {
        let mut table = SymbolTable::new();
        let root = table.root_scope();
        table.define(root, "_", dummy_symbol("_", SymbolKind::Variable)).unwrap();
        assert!(table.define(root, "_", dummy_symbol("_", SymbolKind::Variable)).is_ok());
    }

    #[test]
    fn shadowing_an_outer_scope_is_allowed() {
        let mut table = SymbolTable::new();
        let root = table.root_scope();
        let child = table.push_scope(Some(root));
        table.define(root, "x", dummy_symbol("x", SymbolKind::Constant)).unwrap();
        assert!(table.define(child, "x", dummy_symbol("x", SymbolKind::Variable)).is_ok());
    }
}
