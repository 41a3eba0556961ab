//! Expression inference (spec §4.2 "Inference rules").

use ayllu_core::numeric::{NumericFamily, NumericOp, UnifyError, unify_numeric};
use ayllu_core::types::{self, PrimitiveId};
use ayllu_syntax::ast::*;
use ayllu_syntax::span::Span;

use crate::frontend::cte::{self, Env, EvalContext, EvalOutcome};
use crate::frontend::diagnostics::CompileError;
use crate::frontend::symbols::{Symbol, SymbolKind};

use super::{CheckerGlobals, TypeChecker, infer_literal_type};

/// A type both sides of a branch/assignment can agree on without a cast:
/// structurally equal, or (for primitives) the same numeric family.
pub(crate) fn types_compatible(a: &Type, b: &Type) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Type::Primitive(x), Type::Primitive(y)) => NumericFamily::of(*x).is_some() && NumericFamily::of(*x) == NumericFamily::of(*y),
        _ => false,
    }
}

/// Unit: the value of a block with no trailing result expression, or of a
/// statement position used as an expression.
pub(crate) fn unit_type() -> Type {
    Type::named("__Unit")
}

impl TypeChecker {
    /// Build a read-only [`EvalContext`] over the module as type-checked so
    /// far, used for array-size / range-bound / constexpr-condition folds
    /// that must run *during* checking, not after it.
    pub(crate) fn eval_context<'a>(&'a self, module: &'a Module) -> EvalContext<'a> {
        // Constructor calls can target either an ordinary declared type or a
        // synthetic tuple type; merge both tables so the evaluator doesn't
        // need to know which one a given name came from.
        let mut type_fields = self.type_decls.clone();
        type_fields.extend(self.tuple_types.clone());
        EvalContext {
            module,
            expr_types: &self.expr_types,
            resolved_symbols: &self.resolved_symbols,
            functions: &self.functions,
            type_fields,
            caps: self.caps,
        }
    }

    pub(crate) fn fold_now(&self, module: &Module, expr: ExprId) -> EvalOutcome {
        let ctx = self.eval_context(module);
        let mut env = Env::new();
        let mut globals = CheckerGlobals { values: &self.global_values };
        cte::eval(&ctx, expr, &mut env, &mut globals)
    }

    pub(crate) fn record_type(&mut self, id: ExprId, ty: Type) -> Type {
        self.expr_types.insert(id, ty.clone());
        ty
    }

    /// Infer and record the type of `expr`, recursing into subexpressions.
    pub(crate) fn infer_expr(&mut self, module: &mut Module, expr: ExprId) -> Type {
        let span = module.expr(expr).span;
        let kind = module.expr(expr).kind.clone();
        let in_stmt_position = std::mem::take(&mut self.in_stmt_expr);
        if matches!(kind, ExprKind::Iteration { .. }) && !in_stmt_position {
            self.error(CompileError::semantic("Iteration expression used inside a larger expression without parentheses", span));
        }
        if matches!(kind, ExprKind::Repeat { .. }) && !in_stmt_position {
            self.error(CompileError::semantic("Repeat expression used inside a larger expression without parentheses", span));
        }
        let ty = match kind {
            ExprKind::IntLiteral { value, suffix } => {
                let id = suffix.unwrap_or_else(|| infer_literal_type(value));
                if !types::literal_fits(id, value) {
                    self.error(CompileError::semantic(format!("integer literal {value} does not fit in {}", types::as_str(id)), span));
                }
                Type::Primitive(id)
            }
            ExprKind::FloatLiteral(_) => Type::Primitive(PrimitiveId::F64),
            ExprKind::StringLiteral(_) => Type::Primitive(PrimitiveId::Str),
            ExprKind::CharLiteral(_) => Type::Primitive(PrimitiveId::U8),
            ExprKind::BoolLiteral(_) => Type::Primitive(PrimitiveId::Bool),
            ExprKind::Identifier(name) => self.infer_identifier(expr, &name, span),
            ExprKind::Binary { op, left, right } => self.infer_binary(module, expr, op, left, right, span),
            ExprKind::Unary { op, operand } => self.infer_unary(module, op, operand, span),
            ExprKind::Cast { operand, target_type } => {
                self.infer_expr(module, operand);
                target_type
            }
            ExprKind::Call { operand, receivers, args } => self.infer_call(module, expr, operand, &receivers, &args, span),
            ExprKind::Index { operand, index } => self.infer_index(module, operand, index, span),
            ExprKind::Member { operand, name } => self.infer_member(module, operand, &name, span),
            ExprKind::ArrayLiteral(items) => self.infer_array_literal(module, expr, &items, span),
            ExprKind::TupleLiteral(items) => self.infer_tuple_literal(module, expr, &items, span),
            ExprKind::Range { left, right } => self.infer_range(module, expr, left, right, span),
            ExprKind::Length(operand) => {
                self.infer_expr(module, operand);
                Type::Primitive(PrimitiveId::U64)
            }
            ExprKind::Conditional { condition, true_expr, false_expr } => self.infer_conditional(module, condition, true_expr, false_expr, span),
            ExprKind::Assignment { target, value, .. } => self.infer_assignment(module, expr, target, value, span),
            ExprKind::Block { statements, result_expr } => self.infer_block(module, &statements, result_expr),
            ExprKind::Iteration { iterable, body, is_sorted } => self.infer_iteration(module, expr, iterable, body, is_sorted, span),
            ExprKind::Repeat { condition, body } => self.infer_repeat(module, condition, body, span),
            ExprKind::Resource { .. } => Type::named("__Resource"),
            ExprKind::Process { command } => {
                self.infer_expr(module, command);
                Type::Primitive(PrimitiveId::Str)
            }
        };
        self.record_type(expr, ty)
    }

    fn infer_identifier(&mut self, expr: ExprId, name: &str, span: Span) -> Type {
        match self.symbols.lookup(self.current_scope(), name) {
            Some(symbol_id) => {
                self.resolved_symbols.insert(expr, symbol_id);
                self.symbols.symbol(symbol_id).ty.clone().unwrap_or_else(unit_type)
            }
            None => {
                self.error(CompileError::semantic(format!("undefined identifier '{name}'"), span));
                unit_type()
            }
        }
    }

    fn infer_binary(&mut self, module: &mut Module, _expr: ExprId, op: BinaryOp, left: ExprId, right: ExprId, span: Span) -> Type {
        let lt = self.infer_expr(module, left);
        let rt = self.infer_expr(module, right);
        use BinaryOp::*;
        match op {
            And | Or => {
                if lt != Type::Primitive(PrimitiveId::Bool) || rt != Type::Primitive(PrimitiveId::Bool) {
                    self.error(CompileError::semantic("logical operator requires bool operands", span));
                }
                Type::Primitive(PrimitiveId::Bool)
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                if !types_compatible(&lt, &rt) {
                    self.error(CompileError::semantic(format!("cannot compare {lt} with {rt}"), span));
                }
                Type::Primitive(PrimitiveId::Bool)
            }
            Add | Sub | Mul | Div => self.numeric_result(NumericOp::Arith, &lt, &rt, span),
            Mod | BitAnd | BitOr | BitXor => self.numeric_result(NumericOp::Modulo, &lt, &rt, span),
            Shl | Shr => self.numeric_result(NumericOp::Shift, &lt, &rt, span),
        }
    }

    fn numeric_result(&mut self, op: NumericOp, lt: &Type, rt: &Type, span: Span) -> Type {
        let (Type::Primitive(lid), Type::Primitive(rid)) = (lt, rt) else {
            self.error(CompileError::semantic(format!("operator requires primitive numeric operands, found {lt} and {rt}"), span));
            return unit_type();
        };
        match unify_numeric(op, *lid, *rid) {
            Ok(result) => Type::Primitive(result),
            Err(UnifyError::CrossFamily { left, right }) => {
                self.error(CompileError::semantic(
                    format!("'{}' and '{}' belong to different numeric families; an explicit cast is required", types::as_str(left), types::as_str(right)),
                    span,
                ));
                Type::Primitive(*lid)
            }
            Err(UnifyError::RequiresUnsigned { offender }) => {
                self.error(CompileError::semantic(format!("operator requires unsigned operands, found '{}'", types::as_str(offender)), span));
                Type::Primitive(*lid)
            }
        }
    }

    fn infer_unary(&mut self, module: &mut Module, op: UnaryOp, operand: ExprId, span: Span) -> Type {
        let ty = self.infer_expr(module, operand);
        let Type::Primitive(id) = ty else {
            self.error(CompileError::semantic(format!("unary operator not defined for {ty}"), span));
            return ty;
        };
        let family = ayllu_core::types::info(id).family;
        use ayllu_core::types::Family;
        match (op, family) {
            (UnaryOp::Neg, Family::Signed | Family::Float) => Type::Primitive(id),
            (UnaryOp::Not, Family::NonNumeric) if id == PrimitiveId::Bool => Type::Primitive(id),
            (UnaryOp::BitNot, Family::Unsigned) => Type::Primitive(id),
            _ => {
                self.error(CompileError::semantic(format!("unary operator not defined for '{}'", types::as_str(id)), span));
                Type::Primitive(id)
            }
        }
    }

    fn infer_index(&mut self, module: &mut Module, operand: ExprId, index: ExprId, span: Span) -> Type {
        let base = self.infer_expr(module, operand);
        let idx = self.infer_expr(module, index);
        if !matches!(idx, Type::Primitive(p) if NumericFamily::of(p).is_some()) {
            self.error(CompileError::semantic("index must be a numeric value", span));
        }
        match base {
            Type::Array { element, .. } => *element,
            Type::Primitive(PrimitiveId::Str) => Type::Primitive(PrimitiveId::U8),
            other => {
                self.error(CompileError::semantic(format!("cannot index into {other}"), span));
                unit_type()
            }
        }
    }

    fn infer_member(&mut self, module: &mut Module, operand: ExprId, name: &str, span: Span) -> Type {
        let base = self.infer_expr(module, operand);
        let Type::Named { name: type_name, .. } = &base else {
            self.error(CompileError::semantic(format!("member access '.{name}' on non-composite type {base}"), span));
            return unit_type();
        };
        if let Some(index_str) = name.strip_prefix("__") {
            if let Ok(index) = index_str.parse::<usize>() {
                if let Some(fields) = self.tuple_types.get(type_name) {
                    return fields.get(index).map(|(_, t)| t.clone()).unwrap_or_else(|| {
                        self.error(CompileError::semantic(format!("tuple field __{index} out of range for {type_name}"), span));
                        unit_type()
                    });
                }
            }
        }
        let fields = self.type_decls.get(type_name).cloned();
        match fields.and_then(|fs| fs.into_iter().find(|(f, _)| f == name)) {
            Some((_, ty)) => ty,
            None => {
                self.error(CompileError::semantic(format!("no field '{name}' on type '{type_name}'"), span));
                unit_type()
            }
        }
    }

    fn infer_array_literal(&mut self, module: &mut Module, expr: ExprId, items: &[ExprId], span: Span) -> Type {
        let mut elem_ty = None;
        for &item in items {
            let ty = self.infer_expr(module, item);
            match &elem_ty {
                None => elem_ty = Some(ty),
                Some(prev) if !types_compatible(prev, &ty) => {
                    self.error(CompileError::semantic(format!("array literal mixes incompatible element types {prev} and {ty}"), span));
                }
                _ => {}
            }
        }
        let element = elem_ty.unwrap_or_else(unit_type);
        let size_expr = module.alloc_expr(ExprKind::IntLiteral { value: items.len() as i128, suffix: Some(PrimitiveId::U64) }, span);
        self.record_type(size_expr, Type::Primitive(PrimitiveId::U64));
        let _ = expr;
        Type::Array { element: Box::new(element), size: size_expr }
    }

    fn infer_tuple_literal(&mut self, module: &mut Module, expr: ExprId, items: &[ExprId], span: Span) -> Type {
        let element_types: Vec<Type> = items.iter().map(|&item| self.infer_expr(module, item)).collect();
        let name = super::tuple_types::tuple_type_name(&element_types);
        self.tuple_types.entry(name.clone()).or_insert_with(|| super::tuple_types::tuple_fields(&element_types));
        let _ = (expr, span);
        Type::named(name)
    }

    fn infer_range(&mut self, module: &mut Module, expr: ExprId, left: ExprId, right: ExprId, span: Span) -> Type {
        let lt = self.infer_expr(module, left);
        let rt = self.infer_expr(module, right);
        if !matches!((&lt, &rt), (Type::Primitive(a), Type::Primitive(b)) if NumericFamily::of(*a) == Some(NumericFamily::Signed) && NumericFamily::of(*b) == Some(NumericFamily::Signed))
        {
            self.error(CompileError::semantic("range bounds must be integer values", span));
        }
        let (Some(a), Some(b)) = (self.fold_now(module, left).known_value().and_then(as_i64), self.fold_now(module, right).known_value().and_then(as_i64)) else {
            self.error(CompileError::semantic("range bounds must be compile-time constants", span));
            let size_expr = module.alloc_expr(ExprKind::IntLiteral { value: 0, suffix: Some(PrimitiveId::U64) }, span);
            self.record_type(size_expr, Type::Primitive(PrimitiveId::U64));
            return Type::Array { element: Box::new(lt), size: size_expr };
        };
        if a == b {
            self.error(CompileError::semantic("range with equal bounds is rejected", span));
        }
        let len = (a - b).unsigned_abs();
        let size_expr = module.alloc_expr(ExprKind::IntLiteral { value: len as i128, suffix: Some(PrimitiveId::U64) }, span);
        self.record_type(size_expr, Type::Primitive(PrimitiveId::U64));
        let _ = expr;
        Type::Array { element: Box::new(lt), size: size_expr }
    }

    fn infer_conditional(&mut self, module: &mut Module, condition: ExprId, true_expr: ExprId, false_expr: ExprId, span: Span) -> Type {
        let cond_ty = self.infer_expr(module, condition);
        if cond_ty != Type::Primitive(PrimitiveId::Bool) {
            self.error(CompileError::semantic("conditional expression's condition must be bool", span));
        }
        // I6: a statically known condition only type-checks the taken branch.
        match self.fold_now(module, condition).known_value().and_then(|v| v.as_bool()) {
            Some(true) => self.infer_expr(module, true_expr),
            Some(false) => self.infer_expr(module, false_expr),
            None => {
                let tt = self.infer_expr(module, true_expr);
                let ft = self.infer_expr(module, false_expr);
                if !types_compatible(&tt, &ft) {
                    self.error(CompileError::semantic(format!("conditional branches disagree: {tt} vs {ft}"), span));
                }
                tt
            }
        }
    }

    /// Decides spec §3's `creates_new_variable` flag for `expr` (the
    /// `Assignment` node itself): a bare identifier with no existing binding
    /// in scope is a walrus-style declaration, per spec §4.2's Assignment
    /// inference rule ("if LHS is a fresh identifier, define a new mutable
    /// local with RHS type"). The flag is written back onto the node
    /// (invariant I3) so the CTE and residualizer, which run after type
    /// checking, see the same decision without re-deriving it.
    fn infer_assignment(&mut self, module: &mut Module, expr: ExprId, target: ExprId, value: ExprId, span: Span) -> Type {
        let value_ty = self.infer_expr(module, value);
        let bare_name = match &module.expr(target).kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            _ => None,
        };
        let is_declaration = match &bare_name {
            Some(name) => self.symbols.lookup(self.current_scope(), name).is_none(),
            None => false,
        };

        if is_declaration {
            let name = bare_name.expect("INVARIANT: is_declaration only true for a bare identifier");
            let declared_ty = value_ty.clone();
            let symbol = Symbol {
                name: name.clone(),
                kind: SymbolKind::Variable,
                ty: Some(declared_ty.clone()),
                is_mutable: true,
                is_external: false,
                is_exported: false,
                declaration: None,
                scope_instance_id: 0,
            };
            match self.symbols.define(self.current_scope(), name.clone(), symbol) {
                Ok(symbol_id) => {
                    self.resolved_symbols.insert(target, symbol_id);
                }
                Err(_) => self.error(CompileError::semantic(format!("'{name}' shadows an existing definition in this scope"), span)),
            }
            // I3: the LHS identifier's own `type` slot stays null at the
            // declaration site; the value type lives on the Assignment node,
            // which `infer_expr`'s caller records for us.
            if let ExprKind::Assignment { creates_new_variable, .. } = &mut module.expr_mut(expr).kind {
                *creates_new_variable = true;
            }
            return declared_ty;
        }

        let target_ty = self.infer_lvalue(module, target, span);
        if !types_compatible(&target_ty, &value_ty) && !self.literal_assignable_to(module, value, &target_ty) {
            self.error(CompileError::semantic(format!("cannot assign {value_ty} to a binding of type {target_ty}"), span));
        }
        target_ty
    }

    fn infer_lvalue(&mut self, module: &mut Module, target: ExprId, span: Span) -> Type {
        match module.expr(target).kind.clone() {
            ExprKind::Identifier(name) => match self.symbols.lookup(self.current_scope(), &name) {
                Some(symbol_id) => {
                    self.resolved_symbols.insert(target, symbol_id);
                    let symbol = self.symbols.symbol(symbol_id);
                    if !symbol.is_mutable {
                        self.error(CompileError::semantic(format!("cannot assign to immutable binding '{name}'"), span));
                    }
                    if self.receiver_names.last().is_some_and(|r| r.contains(&name)) {
                        // Receivers are mutable inside the body, allowed here;
                        // the CTE is what rejects assignment to them (spec §4.3/§7).
                    }
                    let ty = symbol.ty.clone().unwrap_or_else(unit_type);
                    self.record_type(target, ty.clone());
                    ty
                }
                None => {
                    self.error(CompileError::semantic(format!("undefined identifier '{name}'"), span));
                    unit_type()
                }
            },
            _ => self.infer_expr(module, target),
        }
    }

    /// Whether `expr` is an integer literal whose value fits `target`
    /// (spec §4.2 "literal_assignable_to"). Only literals get this leniency;
    /// already-typed expressions must unify exactly.
    pub(crate) fn literal_assignable_to(&self, module: &Module, expr: ExprId, target: &Type) -> bool {
        let Type::Primitive(id) = target else { return false };
        matches!(module.expr(expr).kind, ExprKind::IntLiteral { value, .. } if types::literal_fits(*id, value))
    }

    fn infer_block(&mut self, module: &mut Module, statements: &[StmtId], result_expr: Option<ExprId>) -> Type {
        let scope = self.symbols.push_scope(Some(self.current_scope()));
        self.scope_stack.push(scope);
        for &stmt in statements {
            self.check_stmt(module, stmt);
            if matches!(module.stmt(stmt).kind, StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue) {
                break;
            }
        }
        let ty = match result_expr {
            Some(e) => self.infer_expr(module, e),
            None => unit_type(),
        };
        self.scope_stack.pop();
        ty
    }

    fn infer_iteration(&mut self, module: &mut Module, _expr: ExprId, iterable: ExprId, body: ExprId, is_sorted: bool, span: Span) -> Type {
        let iterable_ty = self.infer_expr(module, iterable);
        let hook = if is_sorted { "@@" } else { "@" };
        if let Type::Named { name: type_name, .. } = &iterable_ty {
            let qualified = format!("{type_name}::{hook}");
            if self.functions.contains_key(&qualified) {
                // Custom iteration protocol: `body` (a Block expr) becomes an
                // expression-parameter thunk re-evaluated by the hook method
                // once per element it produces; `_` is bound by the hook's own
                // body, not by this evaluator.
                self.infer_expr(module, body);
                return unit_type();
            }
        }
        let Type::Array { element, .. } = iterable_ty else {
            self.error(CompileError::semantic(format!("iteration requires an array or a type with a '{hook}' method, found {iterable_ty}"), span));
            return unit_type();
        };
        let scope = self.symbols.push_scope(Some(self.current_scope()));
        self.scope_stack.push(scope);
        let underscore = Symbol {
            name: "_".into(),
            kind: SymbolKind::Variable,
            ty: Some(*element),
            is_mutable: false,
            is_external: false,
            is_exported: false,
            declaration: None,
            scope_instance_id: 0,
        };
        let _ = self.symbols.define(scope, "_", underscore);
        self.loop_depth += 1;
        self.infer_expr(module, body);
        self.loop_depth -= 1;
        self.scope_stack.pop();
        unit_type()
    }

    fn infer_repeat(&mut self, module: &mut Module, condition: ExprId, body: ExprId, span: Span) -> Type {
        let cond_ty = self.infer_expr(module, condition);
        if cond_ty != Type::Primitive(PrimitiveId::Bool) {
            self.error(CompileError::semantic("repeat condition must be bool", span));
        }
        self.loop_depth += 1;
        self.infer_expr(module, body);
        self.loop_depth -= 1;
        unit_type()
    }

    fn infer_call(&mut self, module: &mut Module, expr: ExprId, operand: ExprId, receivers: &[ExprId], args: &[ExprId], span: Span) -> Type {
        let ExprKind::Identifier(name) = module.expr(operand).kind.clone() else {
            self.error(CompileError::semantic("call operand must be a named function or type", span));
            return unit_type();
        };

        if let Some(fields) = self.type_decls.get(&name).cloned() {
            if receivers.is_empty() {
                if args.len() != fields.len() {
                    self.error(CompileError::semantic(format!("'{name}' expects {} field(s), found {}", fields.len(), args.len()), span));
                }
                for (&arg, (_, field_ty)) in args.iter().zip(fields.iter()) {
                    let arg_ty = self.infer_expr(module, arg);
                    if !types_compatible(&arg_ty, field_ty) && !self.literal_assignable_to(module, arg, field_ty) {
                        self.error(CompileError::semantic(format!("field expects {field_ty}, found {arg_ty}"), span));
                    }
                }
                return Type::named(name);
            }
        }

        let receiver_types: Vec<Type> = receivers.iter().map(|&r| self.infer_expr(module, r)).collect();
        let arg_types: Vec<Type> = args.iter().map(|&a| self.infer_expr(module, a)).collect();

        let qualified = match receiver_types.first() {
            Some(Type::Named { name: type_name, .. }) => format!("{type_name}::{name}"),
            _ => name.clone(),
        };

        let Some(&decl_stmt) = self.functions.get(&qualified) else {
            self.error(CompileError::semantic(format!("call to undefined function '{qualified}'"), span));
            return unit_type();
        };
        let StmtKind::FuncDecl(decl) = module.stmt(decl_stmt).kind.clone() else {
            self.error(CompileError::semantic(format!("'{qualified}' is not callable"), span));
            return unit_type();
        };

        if receivers.len() != decl.receivers.len() || args.len() != decl.params.len() {
            self.error(CompileError::semantic(format!("'{qualified}' expects {} receiver(s) and {} argument(s)", decl.receivers.len(), decl.params.len()), span));
            return self.tuple_return_type(&decl.return_types);
        }

        if super::mono::is_generic_decl(&decl) {
            return self.monomorphize_call(module, &qualified, decl_stmt, operand, &arg_types, span);
        }

        for (&arg, (param, arg_ty)) in args.iter().zip(decl.params.iter().zip(arg_types.iter())) {
            if let Some(declared) = &param.ty {
                if !types_compatible(declared, arg_ty) && !self.literal_assignable_to(module, arg, declared) {
                    self.error(CompileError::semantic(format!("argument expects {declared}, found {arg_ty}"), span));
                }
            }
        }
        self.tuple_return_type(&decl.return_types)
    }

    pub(crate) fn tuple_return_type(&mut self, return_types: &[Type]) -> Type {
        match return_types.len() {
            0 => unit_type(),
            1 => return_types[0].clone(),
            _ => {
                let name = super::tuple_types::tuple_type_name(return_types);
                self.tuple_types.entry(name.clone()).or_insert_with(|| super::tuple_types::tuple_fields(return_types));
                Type::named(name)
            }
        }
    }
}

fn as_i64(v: &cte::Value) -> Option<i64> {
    match v {
        cte::Value::Int64(n) => Some(*n),
        cte::Value::UInt64(n) => i64::try_from(*n).ok(),
        _ => None,
    }
}
