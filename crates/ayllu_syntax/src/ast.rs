//! Abstract syntax tree for Ayllu, per spec §3 ("DATA MODEL").
//!
//! Expressions and statements live in an arena owned by [`Module`]: `ExprId`/
//! `StmtId` are stable indices, never reused, so side tables the semantic
//! core keeps elsewhere (symbol bindings, inferred types, constexpr facts)
//! can key on them safely across passes, including across the
//! residualizer's in-place rewrites, which change a node's *content* but
//! never its id (see `DESIGN.md`).

use std::fmt;

use ayllu_core::types::PrimitiveId;

use crate::span::Span;

pub type ExprId = u32;
pub type StmtId = u32;

/// Opaque handle into the semantic core's symbol table.
///
/// `ayllu_syntax` never interprets this value; it exists so `Type::Named`
/// can carry a resolved binding without this crate depending on
/// `frontend::symbols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// A type expression, per spec §3.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(PrimitiveId),
    Array {
        element: Box<Type>,
        /// Expression computing the array length; required to be a
        /// compile-time-constant non-negative integer (invariant I4).
        size: ExprId,
    },
    Named {
        name: String,
        resolved_symbol: Option<SymbolId>,
    },
    TypeVar(String),
}

impl Type {
    pub fn named(name: impl Into<String>) -> Type {
        Type::Named { name: name.into(), resolved_symbol: None }
    }

    pub fn is_type_var(&self) -> bool {
        matches!(self, Type::TypeVar(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", ayllu_core::types::as_str(*p)),
            Type::Array { element, .. } => write!(f, "array<{}, _>", element),
            Type::Named { name, .. } => write!(f, "{}", name),
            Type::TypeVar(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

/// Expression node kinds, per spec §3.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral { value: i128, suffix: Option<PrimitiveId> },
    FloatLiteral(f64),
    StringLiteral(String),
    CharLiteral(u8),
    BoolLiteral(bool),
    /// Bare name; binding is attached by the resolver in a side table keyed
    /// by this node's `ExprId` (not embedded here, see `DESIGN.md`).
    Identifier(String),
    Binary { op: BinaryOp, left: ExprId, right: ExprId },
    Unary { op: UnaryOp, operand: ExprId },
    Cast { operand: ExprId, target_type: Type },
    Call { operand: ExprId, receivers: Vec<ExprId>, args: Vec<ExprId> },
    Index { operand: ExprId, index: ExprId },
    Member { operand: ExprId, name: String },
    ArrayLiteral(Vec<ExprId>),
    TupleLiteral(Vec<ExprId>),
    Range { left: ExprId, right: ExprId },
    Length(ExprId),
    /// Ternary conditional expression (`cond ? a : b`), distinct from the
    /// `if`/`else` statement ([`StmtKind::ConditionalStmt`]).
    Conditional { condition: ExprId, true_expr: ExprId, false_expr: ExprId },
    Assignment { target: ExprId, value: ExprId, creates_new_variable: bool },
    Block { statements: Vec<StmtId>, result_expr: Option<ExprId> },
    /// `for _ in <iterable> { <body> }` (`is_sorted` for `for _ in sorted <iterable>`).
    Iteration { iterable: ExprId, body: ExprId, is_sorted: bool },
    /// `repeat <condition> { <body> }`
    Repeat { condition: ExprId, body: ExprId },
    /// `resource { a/b/c }`: path segments relative to project root / current file.
    Resource { segments: Vec<String> },
    /// `process { <string-literal-command> }`
    Process { command: ExprId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub span: Span,
}

/// A function parameter or receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// `None` (or a [`Type::TypeVar`]) marks this parameter, and thus the
    /// enclosing function, generic.
    pub ty: Option<Type>,
    /// "Expression parameter": uses inside the callee re-evaluate the
    /// caller's unevaluated argument expression (spec §4.3, CTE `Call`).
    pub is_expr_param: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    /// Receiver parameters (e.g. the `self` of `TypeName::method`). Mutable
    /// inside the body, not assignable at call sites from outside (spec
    /// §4.2 purity rules).
    pub receivers: Vec<Param>,
    pub params: Vec<Param>,
    pub return_types: Vec<Type>,
    pub body: Vec<StmtId>,
    pub is_external: bool,
    pub is_exported: bool,
    pub span: Span,
}

impl FuncDecl {
    /// The qualified lookup name (`TypeName::method`) when this function has
    /// a receiver, else its bare name.
    pub fn qualified_name(&self) -> String {
        match self.receivers.first().and_then(|r| r.ty.as_ref()) {
            Some(Type::Named { name, .. }) => format!("{}::{}", name, self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Const,
    Let,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: BindingKind,
    pub name: String,
    pub declared_type: Option<Type>,
    pub is_mutable: bool,
    pub is_exported: bool,
    pub initializer: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    /// Logical module path, e.g. `["collections", "vector"]` for `import collections::vector;`.
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub span: Span,
}

/// Statement node kinds, per spec §3.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FuncDecl(FuncDecl),
    TypeDecl(TypeDecl),
    VarDecl(VarDecl),
    Import(ImportStmt),
    Expr(ExprId),
    Return(Option<ExprId>),
    Break,
    Continue,
    ConditionalStmt {
        condition: ExprId,
        then_branch: Vec<StmtId>,
        else_branch: Option<Vec<StmtId>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtNode {
    pub kind: StmtKind,
    pub span: Span,
}

/// A single source module: an arena of expressions/statements plus the
/// top-level statement list.
///
/// Ownership (spec §3 "Lifecycle"): the Module exclusively owns top-level
/// statements; every other node is owned by its parent in the tree with one
/// exception: monomorphization inserts cloned function declarations back
/// into `top_level`.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub filename: String,
    pub top_level: Vec<StmtId>,
    exprs: Vec<ExprNode>,
    stmts: Vec<StmtNode>,
}

impl Module {
    pub fn new(filename: impl Into<String>) -> Self {
        Self { filename: filename.into(), top_level: Vec::new(), exprs: Vec::new(), stmts: Vec::new() }
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = self.exprs.len() as ExprId;
        self.exprs.push(ExprNode { kind, span });
        id
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = self.stmts.len() as StmtId;
        self.stmts.push(StmtNode { kind, span });
        id
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.exprs[id as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id as usize]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.stmts[id as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_stable_across_allocation() {
        let mut module = Module::new("test.ayl");
        let a = module.alloc_expr(ExprKind::IntLiteral { value: 1, suffix: None }, Span::default());
        let b = module.alloc_expr(ExprKind::IntLiteral { value: 2, suffix: None }, Span::default());
        assert_ne!(a, b);
        assert_eq!(module.expr(a).kind, ExprKind::IntLiteral { value: 1, suffix: None });
        *module.expr_mut(a) = ExprNode { kind: ExprKind::IntLiteral { value: 99, suffix: None }, span: Span::default() };
        assert_eq!(module.expr(a).kind, ExprKind::IntLiteral { value: 99, suffix: None });
        assert_eq!(module.expr(b).kind, ExprKind::IntLiteral { value: 2, suffix: None });
    }

    #[test]
    fn qualified_name_uses_receiver_type() {
        let f = FuncDecl {
            name: "add".into(),
            receivers: vec![Param {
                name: "self".into(),
                ty: Some(Type::named("Vector")),
                is_expr_param: false,
                span: Span::default(),
            }],
            params: vec![],
            return_types: vec![],
            body: vec![],
            is_external: false,
            is_exported: false,
            span: Span::default(),
        };
        assert_eq!(f.qualified_name(), "Vector::add");
    }
}
