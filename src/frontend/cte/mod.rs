//! Compile-Time Evaluator (spec §4.3).
//!
//! A tree-walking interpreter over the *typed* AST (every node it visits is
//! expected to already carry a `type` slot; see spec invariant I1 and
//! SPEC_FULL's ordering note: the type checker type-checks a node before
//! ever asking CTE to evaluate it). Returns one of [`EvalOutcome::Known`],
//! [`EvalOutcome::Unknown`] (soft failure, a non-constexpr input blocked
//! evaluation, callers must not abort compilation) or
//! [`EvalOutcome::Error`] (hard failure, the expression provably fails at
//! compile time).
//!
//! Control flow (`break`/`continue`/`return`) is modeled as an explicit
//! [`ControlFlow`] sum per spec §9's design note, rather than host-language
//! exceptions.

pub mod cast;
pub mod env;
pub mod value;

use std::collections::HashMap;
use std::rc::Rc;

use ayllu_core::types::{Family, PrimitiveId, info};
use ayllu_syntax::ast::*;

pub use env::{Binding, Env};
pub use value::{CompositeValue, Value};

/// Resource/compute limits for one top-level `eval` call (spec §4.3
/// "Scheduling"; configurable per SPEC_FULL §1, not hardcoded).
#[derive(Debug, Clone, Copy)]
pub struct CteCaps {
    pub max_recursion_depth: u32,
    pub max_loop_iterations: u64,
    pub max_vm_steps: u64,
}

impl Default for CteCaps {
    fn default() -> Self {
        Self { max_recursion_depth: 1000, max_loop_iterations: 65536, max_vm_steps: 1_000_000 }
    }
}

/// The CTE's top-level verdict for one expression (spec §4.3 "Contract").
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    Known(Value),
    Unknown(String),
    Error(String),
}

impl EvalOutcome {
    pub fn known_value(&self) -> Option<&Value> {
        match self {
            EvalOutcome::Known(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Fail {
    Unknown(String),
    Error(String),
}

type EResult<T> = Result<T, Fail>;

enum Flow {
    Value(Value),
    Break,
    Continue,
    Return(Value),
}

/// How the caller's global identifiers resolve. The optimizer implements
/// this with a map of previously-established facts; a dedicated
/// const-initializer driver implements it with cycle detection (spec §7
/// "cycle in constant initializer").
pub trait GlobalResolver {
    fn resolve_global(&mut self, symbol: SymbolId, name: &str) -> EvalOutcome;
}

/// A resolver with no known globals: every global read is `Unknown`.
pub struct NoGlobals;
impl GlobalResolver for NoGlobals {
    fn resolve_global(&mut self, _symbol: SymbolId, name: &str) -> EvalOutcome {
        EvalOutcome::Unknown(format!("global '{name}' is not constexpr in this context"))
    }
}

/// Declared field order/types for a named or synthetic-tuple type, used for
/// type-constructor calls and coercion.
pub type TypeFields = HashMap<String, Vec<(String, Type)>>;

pub struct EvalContext<'a> {
    pub module: &'a Module,
    pub expr_types: &'a HashMap<ExprId, Type>,
    pub resolved_symbols: &'a HashMap<ExprId, SymbolId>,
    /// `qualified_name -> StmtId` for every `FuncDecl` reachable (including
    /// monomorphized clones already appended to the module).
    pub functions: &'a HashMap<String, StmtId>,
    /// Declared field order/types for every type a constructor call might
    /// target (both ordinary `TypeDecl`s and synthetic tuple types), merged
    /// by the caller since a call site can't tell which table a name lives
    /// in ahead of the lookup.
    pub type_fields: TypeFields,
    pub caps: CteCaps,
}

/// Optional hooks the optimizer installs (spec §4.3 "Observers").
pub struct Observers<'a> {
    pub on_eval: Option<&'a mut dyn FnMut(ExprId, &Value)>,
    pub on_global_read: Option<&'a mut dyn FnMut(SymbolId)>,
}

impl<'a> Default for Observers<'a> {
    fn default() -> Self {
        Self { on_eval: None, on_global_read: None }
    }
}

struct Evaluator<'a, 'o> {
    ctx: &'a EvalContext<'a>,
    globals: &'a mut dyn GlobalResolver,
    observers: &'a mut Observers<'o>,
    steps: u64,
    recursion_depth: u32,
    return_depth: u32,
}

/// Evaluate a single expression. Entry point matching spec §4.3's contract.
pub fn eval(ctx: &EvalContext, expr: ExprId, env: &mut Env, globals: &mut dyn GlobalResolver) -> EvalOutcome {
    let mut observers = Observers::default();
    eval_observed(ctx, expr, env, globals, &mut observers)
}

#[tracing::instrument(skip_all, fields(expr))]
pub fn eval_observed(
    ctx: &EvalContext,
    expr: ExprId,
    env: &mut Env,
    globals: &mut dyn GlobalResolver,
    observers: &mut Observers,
) -> EvalOutcome {
    let mut ev = Evaluator { ctx, globals, observers, steps: 0, recursion_depth: 0, return_depth: 0 };
    match ev.eval_expr(expr, env) {
        Ok(v) => EvalOutcome::Known(v),
        Err(Fail::Unknown(reason)) => EvalOutcome::Unknown(reason),
        Err(Fail::Error(reason)) => EvalOutcome::Error(reason),
    }
}

/// Walk a function body directly, outside of any `Call` expression. Used
/// by the optimizer to fold top-level functions (e.g. `main`) that are
/// never called from anywhere else in the module and would otherwise never
/// be walked at all (spec §4.4: "run CTE ... for each expression" over the
/// whole module, not only call-reachable bodies). Parameters are left
/// unbound in the fresh environment: a reference to one falls through to
/// the ordinary global-read path, which reports `Unknown` rather than
/// erroring, so the walk simply stops recording facts at that point
/// instead of failing the caller. Every `(expr, value)` pair observed along
/// the way before that point is still reported through `observers`.
pub fn eval_function_body_observed(ctx: &EvalContext, body: &[StmtId], globals: &mut dyn GlobalResolver, observers: &mut Observers) {
    let mut ev = Evaluator { ctx, globals, observers, steps: 0, recursion_depth: 0, return_depth: 1 };
    let mut env = Env::new();
    let _ = ev.eval_stmt_list(body, &mut env);
}

impl<'a, 'o> Evaluator<'a, 'o> {
    fn tick(&mut self) -> EResult<()> {
        self.steps += 1;
        if self.steps > self.ctx.caps.max_vm_steps {
            return Err(Fail::Error("compile-time evaluation exceeded the VM step budget".into()));
        }
        Ok(())
    }

    fn expr_kind(&self, id: ExprId) -> &ExprKind {
        &self.ctx.module.expr(id).kind
    }

    fn expr_type(&self, id: ExprId) -> Option<&Type> {
        self.ctx.expr_types.get(&id)
    }

    fn observe(&mut self, id: ExprId, value: &Value) {
        if let Some(cb) = self.observers.on_eval.as_mut() {
            cb(id, value);
        }
    }

    // ---- expressions --------------------------------------------------

    fn eval_expr(&mut self, id: ExprId, env: &mut Env) -> EResult<Value> {
        self.tick()?;
        let value = self.eval_expr_inner(id, env)?;
        self.observe(id, &value);
        Ok(value)
    }

    fn eval_expr_inner(&mut self, id: ExprId, env: &mut Env) -> EResult<Value> {
        match self.expr_kind(id).clone() {
            ExprKind::IntLiteral { value, suffix } => Ok(self.coerce_int_literal(id, value, suffix)),
            ExprKind::FloatLiteral(v) => Ok(Value::Float64(v)),
            ExprKind::StringLiteral(s) => Ok(Value::string(s)),
            ExprKind::CharLiteral(b) => Ok(Value::UInt64(b as u64)),
            ExprKind::BoolLiteral(b) => Ok(Value::Bool(b)),
            ExprKind::Identifier(name) => self.eval_identifier(id, &name, env),
            ExprKind::Binary { op, left, right } => self.eval_binary(id, op, left, right, env),
            ExprKind::Unary { op, operand } => self.eval_unary(op, operand, env),
            ExprKind::Cast { operand, target_type } => self.eval_cast(operand, &target_type, env),
            ExprKind::Call { operand, receivers, args } => self.eval_call(operand, &receivers, &args, env),
            ExprKind::Index { operand, index } => self.eval_index(operand, index, env),
            ExprKind::Member { operand, name } => self.eval_member(operand, &name, env),
            ExprKind::ArrayLiteral(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, env)?);
                }
                Ok(Value::array(out))
            }
            ExprKind::TupleLiteral(items) => self.eval_tuple_literal(id, &items, env),
            ExprKind::Range { left, right } => self.eval_range(left, right, env),
            ExprKind::Length(operand) => self.eval_length(operand, env),
            ExprKind::Conditional { condition, true_expr, false_expr } => {
                let cond = self.eval_expr(condition, env)?;
                let Some(b) = cond.as_bool() else {
                    return Err(Fail::Error("conditional expression's condition did not evaluate to bool".into()));
                };
                if b { self.eval_expr(true_expr, env) } else { self.eval_expr(false_expr, env) }
            }
            ExprKind::Assignment { target, value, creates_new_variable } => {
                self.eval_assignment(target, value, creates_new_variable, env)
            }
            ExprKind::Block { statements, result_expr } => match self.eval_block(&statements, result_expr, env)? {
                Flow::Value(v) => Ok(v),
                Flow::Break => Err(Fail::Error("break used outside of a loop".into())),
                Flow::Continue => Err(Fail::Error("continue used outside of a loop".into())),
                Flow::Return(v) => Ok(v),
            },
            ExprKind::Iteration { iterable, body, is_sorted } => self.eval_iteration(iterable, body, is_sorted, env),
            ExprKind::Repeat { condition, body } => self.eval_repeat(condition, body, env),
            ExprKind::Resource { .. } => Err(Fail::Unknown("resource{} is resolved by the loader, not the compile-time evaluator".into())),
            ExprKind::Process { .. } => Err(Fail::Unknown("process{} is resolved by the loader, not the compile-time evaluator".into())),
        }
    }

    fn coerce_int_literal(&self, id: ExprId, value: i128, suffix: Option<PrimitiveId>) -> Value {
        let target = suffix.or_else(|| match self.expr_type(id) {
            Some(Type::Primitive(p)) => Some(*p),
            _ => None,
        });
        match target.map(info) {
            Some(i) if i.family == Family::Unsigned => Value::UInt64(value as u64),
            Some(i) if i.family == Family::Float => Value::Float64(value as f64),
            _ => Value::Int64(value as i64),
        }
    }

    fn eval_identifier(&mut self, id: ExprId, name: &str, env: &mut Env) -> EResult<Value> {
        if let Some(binding) = env.lookup(name) {
            return match binding.clone() {
                Binding::Value(v) | Binding::Receiver(v) => Ok(v),
                Binding::ExprThunk { expr, env: captured } => {
                    let mut captured_env = (*captured).clone();
                    self.eval_expr(expr, &mut captured_env)
                }
            };
        }
        let Some(&symbol) = self.ctx.resolved_symbols.get(&id) else {
            return Err(Fail::Unknown(format!("identifier '{name}' has no resolved binding")));
        };
        if let Some(cb) = self.observers.on_global_read.as_mut() {
            cb(symbol);
        }
        match self.globals.resolve_global(symbol, name) {
            EvalOutcome::Known(v) => Ok(v),
            EvalOutcome::Unknown(reason) => Err(Fail::Unknown(reason)),
            EvalOutcome::Error(reason) => Err(Fail::Error(reason)),
        }
    }

    fn eval_binary(&mut self, id: ExprId, op: BinaryOp, left: ExprId, right: ExprId, env: &mut Env) -> EResult<Value> {
        // Short-circuit logical operators: avoid evaluating (and potentially
        // erroring on) the right operand when the left alone decides the result.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.eval_expr(left, env)?;
            let Some(lb) = l.as_bool() else { return Err(Fail::Error("logical operator requires bool operands".into())) };
            if op == BinaryOp::And && !lb {
                return Ok(Value::Bool(false));
            }
            if op == BinaryOp::Or && lb {
                return Ok(Value::Bool(true));
            }
            let r = self.eval_expr(right, env)?;
            let Some(rb) = r.as_bool() else { return Err(Fail::Error("logical operator requires bool operands".into())) };
            return Ok(Value::Bool(rb));
        }

        let l = self.eval_expr(left, env)?;
        let r = self.eval_expr(right, env)?;
        let result_ty = self.expr_type(id).cloned();
        fold_binary(op, &l, &r, result_ty.as_ref())
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: ExprId, env: &mut Env) -> EResult<Value> {
        let v = self.eval_expr(operand, env)?;
        match (op, &v) {
            (UnaryOp::Neg, Value::Int64(n)) => Ok(Value::Int64(n.saturating_neg())),
            (UnaryOp::Neg, Value::Float64(f)) => Ok(Value::Float64(-f)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::BitNot, Value::UInt64(u)) => Ok(Value::UInt64(!u)),
            _ => Err(Fail::Error(format!("unary operator not defined for {}", v.kind_name()))),
        }
    }

    fn eval_cast(&mut self, operand: ExprId, target_type: &Type, env: &mut Env) -> EResult<Value> {
        let v = self.eval_expr(operand, env)?;
        let source_ty = self.expr_type(operand).cloned();
        match cast::eval_cast(&v, source_ty.as_ref(), target_type) {
            cast::CastOutcome::Value(v) => Ok(v),
            cast::CastOutcome::Error(msg) => Err(Fail::Error(msg)),
        }
    }

    fn eval_index(&mut self, operand: ExprId, index: ExprId, env: &mut Env) -> EResult<Value> {
        let base = self.eval_expr(operand, env)?;
        let idx = self.eval_expr(index, env)?;
        index_value(&base, &idx)
    }

    fn eval_member(&mut self, operand: ExprId, name: &str, env: &mut Env) -> EResult<Value> {
        let base = self.eval_expr(operand, env)?;
        match base {
            Value::Composite(c) => {
                if let Some(n) = name.strip_prefix("__") {
                    if let Ok(i) = n.parse::<usize>() {
                        return c.fields.get(i).map(|(_, v)| v.clone()).ok_or_else(|| {
                            Fail::Error(format!("tuple field __{i} out of range for {}", c.type_name))
                        }).and_then(reject_uninitialized);
                    }
                }
                c.fields
                    .iter()
                    .find(|(f, _)| f == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Fail::Error(format!("no field '{name}' on {}", c.type_name)))
                    .and_then(reject_uninitialized)
            }
            Value::Uninitialized => Err(Fail::Error(format!("member access on uninitialized value '.{name}'"))),
            other => Err(Fail::Error(format!("member access '.{name}' on non-composite value {}", other.kind_name()))),
        }
    }

    fn eval_tuple_literal(&mut self, id: ExprId, items: &[ExprId], env: &mut Env) -> EResult<Value> {
        let mut fields = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            fields.push((format!("__{i}"), self.eval_expr(*item, env)?));
        }
        let type_name = match self.expr_type(id) {
            Some(Type::Named { name, .. }) => name.clone(),
            _ => format!("__Tuple{}_anon", items.len()),
        };
        Ok(Value::composite(type_name, fields))
    }

    fn eval_range(&mut self, left: ExprId, right: ExprId, env: &mut Env) -> EResult<Value> {
        let l = self.eval_expr(left, env)?;
        let r = self.eval_expr(right, env)?;
        let (a, b) = match (as_i64(&l), as_i64(&r)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(Fail::Error("range bounds must be integers".into())),
        };
        if a == b {
            return Err(Fail::Error("range with equal bounds is rejected".into()));
        }
        let items = if a < b { (a..b).map(Value::Int64).collect() } else { (b + 1..=a).rev().map(Value::Int64).collect() };
        Ok(Value::array(items))
    }

    fn eval_length(&mut self, operand: ExprId, env: &mut Env) -> EResult<Value> {
        let v = self.eval_expr(operand, env)?;
        match v {
            Value::Array(items) => Ok(Value::UInt64(items.len() as u64)),
            Value::Str(s) => Ok(Value::UInt64(s.len() as u64)),
            other => Err(Fail::Error(format!("length of non-sized value {}", other.kind_name()))),
        }
    }

    fn eval_assignment(&mut self, target: ExprId, value: ExprId, creates_new_variable: bool, env: &mut Env) -> EResult<Value> {
        let rhs = self.eval_expr(value, env)?;
        if creates_new_variable {
            let ExprKind::Identifier(name) = self.expr_kind(target).clone() else {
                return Err(Fail::Error("declaration-assignment target must be a bare identifier".into()));
            };
            env.declare(name, Binding::Value(rhs.clone()));
            return Ok(rhs);
        }
        self.store_lvalue(target, rhs.clone(), env)?;
        Ok(rhs)
    }

    fn store_lvalue(&mut self, target: ExprId, value: Value, env: &mut Env) -> EResult<()> {
        match self.expr_kind(target).clone() {
            ExprKind::Identifier(name) => {
                if env.is_receiver(&name) {
                    return Err(Fail::Error(format!("assignment to mutable global or receiver '{name}' is rejected by the compile-time evaluator")));
                }
                if let Some(&symbol) = self.ctx.resolved_symbols.get(&target) {
                    if env.lookup(&name).is_none() {
                        let _ = symbol;
                        return Err(Fail::Error(format!("assignment to mutable global or receiver '{name}' is rejected by the compile-time evaluator")));
                    }
                }
                if !env.assign(&name, value) {
                    return Err(Fail::Error(format!("assignment to undeclared variable '{name}'")));
                }
                Ok(())
            }
            ExprKind::Member { operand, name } => {
                let mut base = self.eval_expr(operand, env)?;
                let Value::Composite(c) = &mut base else {
                    return Err(Fail::Error(format!("cannot assign to field '.{name}' of non-composite value")));
                };
                let composite = Value::composite_get_mut(c);
                let Some(slot) = composite.fields.iter_mut().find(|(f, _)| *f == name) else {
                    return Err(Fail::Error(format!("no field '{name}' on {}", composite.type_name)));
                };
                slot.1 = value;
                self.store_lvalue(operand, base, env)
            }
            ExprKind::Index { operand, index } => {
                let idx = self.eval_expr(index, env)?;
                let mut base = self.eval_expr(operand, env)?;
                let Value::Array(arr) = &mut base else {
                    return Err(Fail::Error("cannot index-assign into a non-array value".into()));
                };
                let i = as_i64(&idx).ok_or_else(|| Fail::Error("array index must be an integer".into()))?;
                if i < 0 {
                    return Err(Fail::Error("negative array index".into()));
                }
                let items = Value::array_get_mut(arr);
                let i = i as usize;
                if i >= items.len() {
                    return Err(Fail::Error(format!("index {i} out of bounds for array of length {}", items.len())));
                }
                items[i] = value;
                self.store_lvalue(operand, base, env)
            }
            _ => Err(Fail::Error("invalid assignment target".into())),
        }
    }

    fn eval_block(&mut self, statements: &[StmtId], result_expr: Option<ExprId>, env: &mut Env) -> EResult<Flow> {
        env.push_block();
        let outcome = self.eval_stmt_list(statements, env);
        let result = match outcome {
            Ok(Flow::Value(_)) => match result_expr {
                Some(e) => self.eval_expr(e, env).map(Flow::Value),
                None => Ok(Flow::Value(Value::Int64(0))),
            },
            other => other,
        };
        env.pop_block();
        result
    }

    fn eval_stmt_list(&mut self, stmts: &[StmtId], env: &mut Env) -> EResult<Flow> {
        for stmt in stmts {
            match self.eval_stmt(*stmt, env)? {
                Flow::Value(_) => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Value(Value::Int64(0)))
    }

    fn eval_stmt(&mut self, id: StmtId, env: &mut Env) -> EResult<Flow> {
        self.tick()?;
        let kind = self.ctx.module.stmt(id).kind.clone();
        match kind {
            StmtKind::Expr(e) => {
                self.eval_expr(e, env)?;
                Ok(Flow::Value(Value::Int64(0)))
            }
            StmtKind::VarDecl(decl) => {
                let v = self.eval_expr(decl.initializer, env)?;
                env.declare(decl.name, Binding::Value(v));
                Ok(Flow::Value(Value::Int64(0)))
            }
            StmtKind::Return(e) => {
                if self.return_depth == 0 {
                    return Err(Fail::Error("return used outside of a function body".into()));
                }
                let v = match e {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Int64(0),
                };
                Ok(Flow::Return(v))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::ConditionalStmt { condition, then_branch, else_branch } => {
                let cond = self.eval_expr(condition, env)?;
                let Some(b) = cond.as_bool() else { return Err(Fail::Error("if condition did not evaluate to bool".into())) };
                if b {
                    env.push_block();
                    let r = self.eval_stmt_list(&then_branch, env);
                    env.pop_block();
                    r
                } else if let Some(else_branch) = else_branch {
                    env.push_block();
                    let r = self.eval_stmt_list(&else_branch, env);
                    env.pop_block();
                    r
                } else {
                    Ok(Flow::Value(Value::Int64(0)))
                }
            }
            StmtKind::FuncDecl(_) | StmtKind::TypeDecl(_) | StmtKind::Import(_) => Ok(Flow::Value(Value::Int64(0))),
        }
    }

    fn eval_iteration(&mut self, iterable: ExprId, body: ExprId, is_sorted: bool, env: &mut Env) -> EResult<Value> {
        let iter_val = self.eval_expr(iterable, env)?;
        let Value::Array(items) = iter_val else {
            return Err(Fail::Error("iteration requires an array value".into()));
        };
        let mut items: Vec<Value> = (*items).clone();
        if is_sorted {
            if items.iter().any(|v| matches!(v, Value::Composite(_))) {
                return Err(Fail::Error("sorted iteration over composite element types is rejected".into()));
            }
            sort_values(&mut items)?;
        }
        let ExprKind::Block { statements, result_expr } = self.expr_kind(body).clone() else {
            return Err(Fail::Error("iteration body must be a block".into()));
        };
        let mut iterations: u64 = 0;
        for item in items {
            iterations += 1;
            if iterations > self.ctx.caps.max_loop_iterations {
                return Err(Fail::Error("compile-time iteration exceeded the loop cap".into()));
            }
            env.push_block();
            env.declare("_", Binding::Value(item));
            let flow = self.eval_stmt_list(&statements, env);
            let flow = match flow {
                Ok(Flow::Value(_)) => match result_expr {
                    Some(e) => self.eval_expr(e, env).map(Flow::Value),
                    None => Ok(Flow::Value(Value::Int64(0))),
                },
                other => other,
            };
            env.pop_block();
            match flow? {
                Flow::Break => break,
                Flow::Continue | Flow::Value(_) => continue,
                Flow::Return(v) => return Ok(v),
            }
        }
        Ok(Value::Int64(0))
    }

    fn eval_repeat(&mut self, condition: ExprId, body: ExprId, env: &mut Env) -> EResult<Value> {
        let ExprKind::Block { statements, result_expr } = self.expr_kind(body).clone() else {
            return Err(Fail::Error("repeat body must be a block".into()));
        };
        let mut iterations: u64 = 0;
        loop {
            let cond = self.eval_expr(condition, env)?;
            let Some(b) = cond.as_bool() else { return Err(Fail::Error("repeat condition did not evaluate to bool".into())) };
            if !b {
                break;
            }
            iterations += 1;
            if iterations > self.ctx.caps.max_loop_iterations {
                return Err(Fail::Error("compile-time repeat exceeded the loop cap".into()));
            }
            env.push_block();
            let flow = self.eval_stmt_list(&statements, env);
            let flow = match flow {
                Ok(Flow::Value(_)) => match result_expr {
                    Some(e) => self.eval_expr(e, env).map(Flow::Value),
                    None => Ok(Flow::Value(Value::Int64(0))),
                },
                other => other,
            };
            env.pop_block();
            match flow? {
                Flow::Break => break,
                Flow::Continue | Flow::Value(_) => continue,
                Flow::Return(v) => return Ok(v),
            }
        }
        Ok(Value::Int64(0))
    }

    fn eval_call(&mut self, operand: ExprId, receivers: &[ExprId], args: &[ExprId], env: &mut Env) -> EResult<Value> {
        let ExprKind::Identifier(name) = self.expr_kind(operand).clone() else {
            return Err(Fail::Unknown("call operand is not a simple named function or type".into()));
        };

        // Type constructor: all field args must be Known; produces a Composite.
        if let Some(fields) = self.ctx.type_fields.get(&name).cloned() {
            if receivers.is_empty() {
                let mut values = Vec::with_capacity(args.len());
                for (arg, (field_name, _)) in args.iter().zip(fields.iter()) {
                    values.push((field_name.clone(), self.eval_expr(*arg, env)?));
                }
                return Ok(Value::composite(name, values));
            }
        }

        let qualified = if let Some(&recv) = receivers.first() {
            match self.expr_type(recv) {
                Some(Type::Named { name: type_name, .. }) => format!("{type_name}::{name}"),
                _ => name.clone(),
            }
        } else {
            name.clone()
        };
        let Some(func_stmt) = self.ctx.functions.get(&qualified).copied() else {
            return Err(Fail::Unknown(format!("call to '{qualified}' has no statically-known constexpr body")));
        };
        let StmtKind::FuncDecl(func) = self.ctx.module.stmt(func_stmt).kind.clone() else {
            return Err(Fail::Error(format!("symbol '{name}' is not a function")));
        };
        if func.is_external {
            return Err(Fail::Unknown(format!("external function '{name}' has no compile-time body")));
        }

        self.recursion_depth += 1;
        if self.recursion_depth > self.ctx.caps.max_recursion_depth {
            self.recursion_depth -= 1;
            return Err(Fail::Error("compile-time recursion exceeded the recursion-depth cap".into()));
        }

        let mut callee_env = Env::new();
        for (recv_param, recv_arg) in func.receivers.iter().zip(receivers.iter()) {
            let v = self.eval_expr(*recv_arg, env)?;
            callee_env.declare(recv_param.name.clone(), Binding::Receiver(v));
        }
        for (param, arg) in func.params.iter().zip(args.iter()) {
            if param.is_expr_param {
                callee_env.declare(param.name.clone(), Binding::ExprThunk { expr: *arg, env: Rc::new(env.clone()) });
            } else {
                let v = self.eval_expr(*arg, env)?;
                callee_env.declare(param.name.clone(), Binding::Value(v));
            }
        }

        self.return_depth += 1;
        let result = self.eval_stmt_list(&func.body, &mut callee_env);
        self.return_depth -= 1;
        self.recursion_depth -= 1;

        match result? {
            Flow::Value(v) | Flow::Return(v) => Ok(v),
            Flow::Break => Err(Fail::Error(format!("'{name}' breaks out of a non-existent loop"))),
            Flow::Continue => Err(Fail::Error(format!("'{name}' continues a non-existent loop"))),
        }
    }
}

fn reject_uninitialized(v: Value) -> EResult<Value> {
    if matches!(v, Value::Uninitialized) {
        Err(Fail::Error("access to uninitialized field".into()))
    } else {
        Ok(v)
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int64(n) => Some(*n),
        Value::UInt64(n) => i64::try_from(*n).ok(),
        _ => None,
    }
}

fn index_value(base: &Value, idx: &Value) -> EResult<Value> {
    let i = as_i64(idx).ok_or_else(|| Fail::Error("index must be an integer".into()))?;
    if i < 0 {
        return Err(Fail::Error("negative index".into()));
    }
    let i = i as usize;
    match base {
        Value::Array(items) => items.get(i).cloned().ok_or_else(|| Fail::Error(format!("index {i} out of bounds for array of length {}", items.len()))),
        Value::Str(s) => s.as_bytes().get(i).map(|b| Value::UInt64(*b as u64)).ok_or_else(|| Fail::Error(format!("index {i} out of bounds for string of length {}", s.len()))),
        other => Err(Fail::Error(format!("cannot index into {}", other.kind_name()))),
    }
}

fn sort_values(items: &mut [Value]) -> EResult<()> {
    for w in items.windows(2) {
        if compare_values(&w[0], &w[1]).is_none() {
            return Err(Fail::Error("sorted iteration requires comparable element values".into()));
        }
    }
    items.sort_by(|a, b| compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(())
}

fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => x.partial_cmp(y),
        (Value::UInt64(x), Value::UInt64(y)) => x.partial_cmp(y),
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => x.partial_cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.partial_cmp(y),
        _ => None,
    }
}

/// Fold a binary operator over two known values, saturating to `result_ty`'s
/// bit width when it names a primitive (spec §4.3 "saturating integer
/// semantics").
fn fold_binary(op: BinaryOp, l: &Value, r: &Value, result_ty: Option<&Type>) -> EResult<Value> {
    use BinaryOp::*;
    let bits = match result_ty {
        Some(Type::Primitive(p)) => Some(info(*p)),
        _ => None,
    };

    match op {
        Eq => return Ok(Value::Bool(values_equal(l, r))),
        Ne => return Ok(Value::Bool(!values_equal(l, r))),
        Lt | Le | Gt | Ge => {
            let ord = compare_values(l, r).ok_or_else(|| Fail::Error("values are not comparable".into()))?;
            let b = match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                Ge => ord.is_ge(),
                _ => unreachable!(),
            };
            return Ok(Value::Bool(b));
        }
        _ => {}
    }

    match (l, r) {
        (Value::Float64(a), Value::Float64(b)) => fold_float(op, *a, *b),
        (Value::Int64(a), Value::Int64(b)) => fold_signed(op, *a, *b, bits.map(|i| i.bits).unwrap_or(64)),
        (Value::UInt64(a), Value::UInt64(b)) => fold_unsigned(op, *a, *b, bits.map(|i| i.bits).unwrap_or(64)),
        _ => Err(Fail::Error(format!("binary operator not defined between {} and {}", l.kind_name(), r.kind_name()))),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int64(a), Value::Int64(b)) => a == b,
        (Value::UInt64(a), Value::UInt64(b)) => a == b,
        (Value::Float64(a), Value::Float64(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y)),
        _ => false,
    }
}

fn fold_float(op: BinaryOp, a: f64, b: f64) -> EResult<Value> {
    use BinaryOp::*;
    let v = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => {
            if b == 0.0 {
                return Err(Fail::Error("division by zero".into()));
            }
            a / b
        }
        _ => return Err(Fail::Error("operator not defined on float operands".into())),
    };
    Ok(Value::Float64(v))
}

fn fold_signed(op: BinaryOp, a: i64, b: i64, bits: u32) -> EResult<Value> {
    use BinaryOp::*;
    let (lo, hi) = ayllu_core::types::signed_range(bits);
    let v = match op {
        Add => a.saturating_add(b).clamp(lo, hi),
        Sub => a.saturating_sub(b).clamp(lo, hi),
        Mul => a.saturating_mul(b).clamp(lo, hi),
        Div => {
            if b == 0 {
                return Err(Fail::Error("division by zero".into()));
            }
            if a == i64::MIN && b == -1 {
                hi
            } else {
                (a / b).clamp(lo, hi)
            }
        }
        _ => return Err(Fail::Error("operator requires unsigned operands".into())),
    };
    Ok(Value::Int64(v))
}

fn fold_unsigned(op: BinaryOp, a: u64, b: u64, bits: u32) -> EResult<Value> {
    use BinaryOp::*;
    let max = ayllu_core::types::unsigned_max(bits);
    let v = match op {
        Add => a.saturating_add(b).min(max),
        Sub => a.saturating_sub(b),
        Mul => a.saturating_mul(b).min(max),
        Div => {
            if b == 0 {
                return Err(Fail::Error("division by zero".into()));
            }
            a / b
        }
        Mod => {
            if b == 0 {
                return Err(Fail::Error("modulo by zero".into()));
            }
            a % b
        }
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        Shl => (a.checked_shl(b as u32).unwrap_or(0)) & max,
        Shr => a.checked_shr(b as u32).unwrap_or(0),
        _ => return Err(Fail::Error("operator not defined on unsigned operands".into())),
    };
    Ok(Value::UInt64(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_by_zero_is_hard_error() {
        let r = fold_unsigned(BinaryOp::Div, 4, 0, 32);
        assert!(matches!(r, Err(Fail::Error(_))));
    }

    #[test]
    fn signed_add_saturates_at_bit_width() {
        let r = fold_signed(BinaryOp::Add, i64::from(i8::MAX), 1, 8).unwrap();
        assert_eq!(r, Value::Int64(i8::MAX as i64));
    }

    #[test]
    fn unsigned_sub_saturates_at_zero() {
        let r = fold_unsigned(BinaryOp::Sub, 1, 5, 8).unwrap();
        assert_eq!(r, Value::UInt64(0));
    }
}
