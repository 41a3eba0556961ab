//! Recursive-descent parser for Ayllu.
//!
//! Produces a [`Module`] directly into its arena, no separate "parse tree"
//! stage. Errors are accumulated (not short-circuited) so a single `parse`
//! call can report more than one syntax problem, mirroring the semantic
//! core's error-collection policy (spec §7).

use ayllu_core::keywords::KeywordId;
use ayllu_core::types;

use crate::ast::*;
use crate::diagnostics::ParseError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub fn parse(tokens: &[Token], filename: impl Into<String>) -> Result<Module, Vec<ParseError>> {
    let mut parser = Parser::new(tokens, filename.into());
    parser.parse_module();
    if parser.errors.is_empty() { Ok(parser.module) } else { Err(parser.errors) }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    module: Module,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], filename: String) -> Self {
        Self { tokens, pos: 0, module: Module::new(filename), errors: Vec::new() }
    }

    // ---- token stream helpers -------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        let i = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Span {
        let span = self.peek_span();
        if !self.eat(kind) {
            self.errors.push(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: format!("{:?}", self.peek()),
                span,
            });
        }
        span
    }

    fn expect_ident(&mut self, what: &str) -> String {
        let span = self.peek_span();
        if let TokenKind::Ident(name) = self.peek().clone() {
            self.bump();
            name
        } else {
            self.errors.push(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: format!("{:?}", self.peek()),
                span,
            });
            String::new()
        }
    }

    fn keyword(&self, id: KeywordId) -> TokenKind {
        TokenKind::Keyword(id)
    }

    // ---- top level --------------------------------------------------------

    fn parse_module(&mut self) {
        while !self.at_eof() {
            if let Some(id) = self.parse_top_level_stmt() {
                self.module.top_level.push(id);
            } else if !self.at_eof() {
                // Avoid an infinite loop on unrecoverable input.
                self.bump();
            }
        }
    }

    fn parse_top_level_stmt(&mut self) -> Option<StmtId> {
        let is_exported = self.eat(&self.keyword(KeywordId::Export).clone());
        let is_external = self.eat(&self.keyword(KeywordId::External).clone());

        match self.peek().clone() {
            TokenKind::Keyword(KeywordId::Fn) => Some(self.parse_func_decl(is_exported, is_external)),
            TokenKind::Keyword(KeywordId::Type) => Some(self.parse_type_decl()),
            TokenKind::Keyword(KeywordId::Const) | TokenKind::Keyword(KeywordId::Let) => {
                Some(self.parse_var_decl(is_exported))
            }
            TokenKind::Keyword(KeywordId::Import) => Some(self.parse_import()),
            _ => {
                let span = self.peek_span();
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "a top-level declaration (fn/type/const/let/import)".to_string(),
                    found: format!("{:?}", self.peek()),
                    span,
                });
                None
            }
        }
    }

    fn parse_func_decl(&mut self, is_exported: bool, is_external: bool) -> StmtId {
        let start = self.peek_span();
        self.expect(&self.keyword(KeywordId::Fn).clone(), "'fn'");
        let mut name = self.expect_ident("a function name");
        let mut receiver_type: Option<String> = None;
        if self.eat(&TokenKind::ColonColon) {
            receiver_type = Some(name.clone());
            name = match self.peek().clone() {
                TokenKind::Ident(n) => {
                    self.bump();
                    n
                }
                TokenKind::At => {
                    self.bump();
                    "@".to_string()
                }
                TokenKind::AtAt => {
                    self.bump();
                    "@@".to_string()
                }
                _ => self.expect_ident("a method name, 'op', '@', or '@@'"),
            };
        }

        self.expect(&TokenKind::LParen, "'('");
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_eof() {
            params.push(self.parse_param());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'");

        let mut receivers = Vec::new();
        if receiver_type.is_some() && !params.is_empty() && params[0].name == "self" {
            let mut recv = params.remove(0);
            if recv.ty.is_none() {
                recv.ty = receiver_type.map(Type::named);
            }
            receivers.push(recv);
        }

        let mut return_types = Vec::new();
        if self.eat(&TokenKind::Arrow) {
            if self.eat(&TokenKind::LParen) {
                while !self.check(&TokenKind::RParen) && !self.at_eof() {
                    return_types.push(self.parse_type());
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen, "')'");
            } else {
                return_types.push(self.parse_type());
            }
        }

        let body = if is_external {
            self.expect(&TokenKind::Semi, "';' after an external function declaration");
            Vec::new()
        } else {
            self.parse_block()
        };
        let span = start.merge(self.peek_span());
        self.module.alloc_stmt(
            StmtKind::FuncDecl(FuncDecl { name, receivers, params, return_types, body, is_external, is_exported, span }),
            span,
        )
    }

    fn parse_param(&mut self) -> Param {
        let start = self.peek_span();
        let is_expr_param = matches!(self.peek(), TokenKind::Ident(n) if n == "expr")
            && matches!(self.peek_at(1), TokenKind::Ident(_));
        if is_expr_param {
            self.bump();
        }
        let name = self.expect_ident("a parameter name");
        let ty = if self.eat(&TokenKind::Colon) { Some(self.parse_type()) } else { None };
        Param { name, ty, is_expr_param, span: start.merge(self.peek_span()) }
    }

    fn parse_type_decl(&mut self) -> StmtId {
        let start = self.peek_span();
        self.expect(&self.keyword(KeywordId::Type).clone(), "'type'");
        let name = self.expect_ident("a type name");
        self.expect(&TokenKind::LBrace, "'{'");
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let field_name = self.expect_ident("a field name");
            self.expect(&TokenKind::Colon, "':'");
            let ty = self.parse_type();
            fields.push((field_name, ty));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}'");
        let span = start.merge(self.peek_span());
        self.module.alloc_stmt(StmtKind::TypeDecl(TypeDecl { name, fields, span }), span)
    }

    fn parse_var_decl(&mut self, is_exported: bool) -> StmtId {
        let start = self.peek_span();
        let kind = if self.eat(&self.keyword(KeywordId::Const).clone()) {
            BindingKind::Const
        } else {
            self.expect(&self.keyword(KeywordId::Let).clone(), "'let' or 'const'");
            BindingKind::Let
        };
        let is_mutable = kind == BindingKind::Let && self.eat(&self.keyword(KeywordId::Mut).clone());
        let name = self.expect_ident("a binding name");
        let declared_type = if self.eat(&TokenKind::Colon) { Some(self.parse_type()) } else { None };
        self.expect(&TokenKind::Eq, "'='");
        let initializer = self.parse_expr();
        self.expect(&TokenKind::Semi, "';'");
        let span = start.merge(self.peek_span());
        self.module.alloc_stmt(
            StmtKind::VarDecl(VarDecl { kind, name, declared_type, is_mutable, is_exported, initializer, span }),
            span,
        )
    }

    fn parse_import(&mut self) -> StmtId {
        let start = self.peek_span();
        self.expect(&self.keyword(KeywordId::Import).clone(), "'import'");
        let mut path = vec![self.expect_ident("a module path segment")];
        while self.eat(&TokenKind::ColonColon) {
            path.push(self.expect_ident("a module path segment"));
        }
        let alias = None;
        self.expect(&TokenKind::Semi, "';'");
        let span = start.merge(self.peek_span());
        self.module.alloc_stmt(StmtKind::Import(ImportStmt { path, alias, span }), span)
    }

    // ---- types --------------------------------------------------------------

    fn parse_type(&mut self) -> Type {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                if name == "array" {
                    self.expect(&TokenKind::Lt, "'<'");
                    let element = Box::new(self.parse_type());
                    self.expect(&TokenKind::Comma, "','");
                    let size = self.parse_expr();
                    self.expect(&TokenKind::Gt, "'>'");
                    Type::Array { element, size }
                } else if let Some(prim) = types::from_str(&name) {
                    Type::Primitive(prim)
                } else {
                    Type::named(name)
                }
            }
            _ => {
                let span = self.peek_span();
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "a type".to_string(),
                    found: format!("{:?}", self.peek()),
                    span,
                });
                Type::named("<error>")
            }
        }
    }

    // ---- statements -----------------------------------------------------------

    fn parse_block(&mut self) -> Vec<StmtId> {
        self.expect(&TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.parse_stmt());
        }
        self.expect(&TokenKind::RBrace, "'}'");
        stmts
    }

    fn parse_stmt(&mut self) -> StmtId {
        let start = self.peek_span();
        match self.peek().clone() {
            TokenKind::Keyword(KeywordId::Const) | TokenKind::Keyword(KeywordId::Let) => self.parse_var_decl(false),
            TokenKind::Keyword(KeywordId::Return) => {
                self.bump();
                let value = if self.check(&TokenKind::Semi) { None } else { Some(self.parse_expr()) };
                self.expect(&TokenKind::Semi, "';'");
                let span = start.merge(self.peek_span());
                self.module.alloc_stmt(StmtKind::Return(value), span)
            }
            TokenKind::Keyword(KeywordId::Break) => {
                self.bump();
                self.expect(&TokenKind::Semi, "';'");
                self.module.alloc_stmt(StmtKind::Break, start.merge(self.peek_span()))
            }
            TokenKind::Keyword(KeywordId::Continue) => {
                self.bump();
                self.expect(&TokenKind::Semi, "';'");
                self.module.alloc_stmt(StmtKind::Continue, start.merge(self.peek_span()))
            }
            TokenKind::Keyword(KeywordId::If) => self.parse_conditional_stmt(),
            _ => {
                let expr = self.parse_expr();
                self.expect(&TokenKind::Semi, "';'");
                let span = start.merge(self.peek_span());
                self.module.alloc_stmt(StmtKind::Expr(expr), span)
            }
        }
    }

    fn parse_conditional_stmt(&mut self) -> StmtId {
        let start = self.peek_span();
        self.expect(&self.keyword(KeywordId::If).clone(), "'if'");
        let condition = self.parse_expr();
        let then_branch = self.parse_block();
        let else_branch = if self.eat(&self.keyword(KeywordId::Else).clone()) {
            if self.check(&self.keyword(KeywordId::If).clone()) {
                let nested = self.parse_conditional_stmt();
                Some(vec![nested])
            } else {
                Some(self.parse_block())
            }
        } else {
            None
        };
        let span = start.merge(self.peek_span());
        self.module.alloc_stmt(StmtKind::ConditionalStmt { condition, then_branch, else_branch }, span)
    }

    // ---- expressions (precedence climbing) -------------------------------------

    fn parse_expr(&mut self) -> ExprId {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ExprId {
        let start = self.peek_span();
        let target = self.parse_ternary();
        if self.eat(&TokenKind::Eq) {
            let value = self.parse_assignment();
            let span = start.merge(self.peek_span());
            // Whether this creates a new variable is resolved later, once the
            // checker can see whether `target` was already bound in scope.
            return self.module.alloc_expr(ExprKind::Assignment { target, value, creates_new_variable: false }, span);
        }
        target
    }

    fn parse_ternary(&mut self) -> ExprId {
        let start = self.peek_span();
        let condition = self.parse_range();
        if self.eat(&TokenKind::Question) {
            let true_expr = self.parse_ternary();
            self.expect(&TokenKind::Colon, "':'");
            let false_expr = self.parse_ternary();
            let span = start.merge(self.peek_span());
            return self.module.alloc_expr(ExprKind::Conditional { condition, true_expr, false_expr }, span);
        }
        condition
    }

    fn parse_range(&mut self) -> ExprId {
        let start = self.peek_span();
        let left = self.parse_logical_or();
        if self.eat(&TokenKind::DotDot) {
            let right = self.parse_logical_or();
            let span = start.merge(self.peek_span());
            return self.module.alloc_expr(ExprKind::Range { left, right }, span);
        }
        left
    }

    fn parse_logical_or(&mut self) -> ExprId {
        self.parse_binary_left(Self::parse_logical_and, &[(TokenKind::PipePipe, BinaryOp::Or)])
    }

    fn parse_logical_and(&mut self) -> ExprId {
        self.parse_binary_left(Self::parse_equality, &[(TokenKind::AmpAmp, BinaryOp::And)])
    }

    fn parse_equality(&mut self) -> ExprId {
        self.parse_binary_left(
            Self::parse_relational,
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne)],
        )
    }

    fn parse_relational(&mut self) -> ExprId {
        self.parse_binary_left(
            Self::parse_bit_or,
            &[
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Ge, BinaryOp::Ge),
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Gt, BinaryOp::Gt),
            ],
        )
    }

    fn parse_bit_or(&mut self) -> ExprId {
        self.parse_binary_left(Self::parse_bit_xor, &[(TokenKind::Pipe, BinaryOp::BitOr)])
    }

    fn parse_bit_xor(&mut self) -> ExprId {
        self.parse_binary_left(Self::parse_bit_and, &[(TokenKind::Caret, BinaryOp::BitXor)])
    }

    fn parse_bit_and(&mut self) -> ExprId {
        self.parse_binary_left(Self::parse_shift, &[(TokenKind::Amp, BinaryOp::BitAnd)])
    }

    fn parse_shift(&mut self) -> ExprId {
        self.parse_binary_left(
            Self::parse_additive,
            &[(TokenKind::Shl, BinaryOp::Shl), (TokenKind::Shr, BinaryOp::Shr)],
        )
    }

    fn parse_additive(&mut self) -> ExprId {
        self.parse_binary_left(
            Self::parse_multiplicative,
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
        )
    }

    fn parse_multiplicative(&mut self) -> ExprId {
        self.parse_binary_left(
            Self::parse_cast,
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
        )
    }

    fn parse_binary_left(
        &mut self,
        mut next: impl FnMut(&mut Self) -> ExprId,
        ops: &[(TokenKind, BinaryOp)],
    ) -> ExprId {
        let start = self.peek_span();
        let mut left = next(self);
        loop {
            let Some((_, op)) = ops.iter().find(|(tok, _)| self.check(tok)) else { break };
            self.bump();
            let right = next(self);
            let span = start.merge(self.peek_span());
            left = self.module.alloc_expr(ExprKind::Binary { op: *op, left, right }, span);
        }
        left
    }

    fn parse_cast(&mut self) -> ExprId {
        let start = self.peek_span();
        let mut expr = self.parse_unary();
        while matches!(self.peek(), TokenKind::Ident(n) if n == "as") {
            self.bump();
            let target_type = self.parse_type();
            let span = start.merge(self.peek_span());
            expr = self.module.alloc_expr(ExprKind::Cast { operand: expr, target_type }, span);
        }
        expr
    }

    fn parse_unary(&mut self) -> ExprId {
        let start = self.peek_span();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary();
            let span = start.merge(self.peek_span());
            return self.module.alloc_expr(ExprKind::Unary { op, operand }, span);
        }
        if self.eat(&TokenKind::Hash) {
            let operand = self.parse_unary();
            let span = start.merge(self.peek_span());
            return self.module.alloc_expr(ExprKind::Length(operand), span);
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ExprId {
        let start = self.peek_span();
        let mut expr = self.parse_primary();
        loop {
            if self.eat(&TokenKind::Dot) {
                let name = self.expect_ident("a field or method name");
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_call_args();
                    let span = start.merge(self.peek_span());
                    let method_name = self.module.alloc_expr(ExprKind::Identifier(name), span);
                    expr = self.module.alloc_expr(ExprKind::Call { operand: method_name, receivers: vec![expr], args }, span);
                } else {
                    let span = start.merge(self.peek_span());
                    expr = self.module.alloc_expr(ExprKind::Member { operand: expr, name }, span);
                }
            } else if self.check(&TokenKind::LParen) {
                let args = self.parse_call_args();
                let span = start.merge(self.peek_span());
                expr = self.module.alloc_expr(ExprKind::Call { operand: expr, receivers: Vec::new(), args }, span);
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expr();
                self.expect(&TokenKind::RBracket, "']'");
                let span = start.merge(self.peek_span());
                expr = self.module.alloc_expr(ExprKind::Index { operand: expr, index }, span);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_call_args(&mut self) -> Vec<ExprId> {
        self.expect(&TokenKind::LParen, "'('");
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_eof() {
            args.push(self.parse_expr());
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'");
        args
    }

    fn parse_primary(&mut self) -> ExprId {
        let start = self.peek_span();
        match self.peek().clone() {
            TokenKind::Int { value, suffix } => {
                self.bump();
                let suffix = suffix.and_then(|s| types::from_str(&s));
                self.module.alloc_expr(ExprKind::IntLiteral { value, suffix }, start.merge(self.peek_span()))
            }
            TokenKind::Float(v) => {
                self.bump();
                self.module.alloc_expr(ExprKind::FloatLiteral(v), start.merge(self.peek_span()))
            }
            TokenKind::Str(s) => {
                self.bump();
                self.module.alloc_expr(ExprKind::StringLiteral(s), start.merge(self.peek_span()))
            }
            TokenKind::Char(c) => {
                self.bump();
                self.module.alloc_expr(ExprKind::CharLiteral(c), start.merge(self.peek_span()))
            }
            TokenKind::Keyword(KeywordId::True) => {
                self.bump();
                self.module.alloc_expr(ExprKind::BoolLiteral(true), start.merge(self.peek_span()))
            }
            TokenKind::Keyword(KeywordId::False) => {
                self.bump();
                self.module.alloc_expr(ExprKind::BoolLiteral(false), start.merge(self.peek_span()))
            }
            TokenKind::Keyword(KeywordId::Repeat) => self.parse_repeat(),
            TokenKind::Keyword(KeywordId::External) => {
                // `for _ in sorted <x>` handled below; `external`/`export` are only
                // valid at declaration position and never reach here.
                let span = self.peek_span();
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "an expression".to_string(),
                    found: format!("{:?}", self.peek()),
                    span,
                });
                self.bump();
                self.module.alloc_expr(ExprKind::BoolLiteral(false), span)
            }
            TokenKind::Keyword(KeywordId::Resource) => self.parse_resource(),
            TokenKind::Keyword(KeywordId::Process) => self.parse_process(),
            TokenKind::Ident(name) if name == "for" => self.parse_iteration(),
            TokenKind::Ident(name) => {
                self.bump();
                self.module.alloc_expr(ExprKind::Identifier(name), start.merge(self.peek_span()))
            }
            TokenKind::LParen => {
                self.bump();
                let mut items = Vec::new();
                let mut is_tuple = false;
                if !self.check(&TokenKind::RParen) {
                    items.push(self.parse_expr());
                    while self.eat(&TokenKind::Comma) {
                        is_tuple = true;
                        if self.check(&TokenKind::RParen) {
                            break;
                        }
                        items.push(self.parse_expr());
                    }
                }
                self.expect(&TokenKind::RParen, "')'");
                let span = start.merge(self.peek_span());
                if is_tuple {
                    self.module.alloc_expr(ExprKind::TupleLiteral(items), span)
                } else if let Some(only) = items.into_iter().next() {
                    only
                } else {
                    self.module.alloc_expr(ExprKind::TupleLiteral(Vec::new()), span)
                }
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) && !self.at_eof() {
                    items.push(self.parse_expr());
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "']'");
                self.module.alloc_expr(ExprKind::ArrayLiteral(items), start.merge(self.peek_span()))
            }
            TokenKind::LBrace => {
                let statements = self.parse_block();
                let result_expr = self.trailing_result_expr(&statements);
                self.module.alloc_expr(ExprKind::Block { statements, result_expr }, start.merge(self.peek_span()))
            }
            _ => {
                let span = self.peek_span();
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "an expression".to_string(),
                    found: format!("{:?}", self.peek()),
                    span,
                });
                self.bump();
                self.module.alloc_expr(ExprKind::TupleLiteral(Vec::new()), span)
            }
        }
    }

    /// If a block's final statement is a bare expression statement, treat it
    /// as the block's result (matching statement-less "last expression is
    /// the value" blocks), without requiring the parser to backtrack.
    fn trailing_result_expr(&mut self, statements: &[StmtId]) -> Option<ExprId> {
        let last_id = *statements.last()?;
        if let StmtKind::Expr(e) = self.module.stmt(last_id).kind {
            Some(e)
        } else {
            None
        }
    }

    fn parse_repeat(&mut self) -> ExprId {
        let start = self.peek_span();
        self.bump(); // 'repeat'
        let condition = self.parse_expr();
        let body_stmts = self.parse_block();
        let body_span = start.merge(self.peek_span());
        let body = self.module.alloc_expr(ExprKind::Block { statements: body_stmts, result_expr: None }, body_span);
        self.module.alloc_expr(ExprKind::Repeat { condition, body }, body_span)
    }

    fn parse_iteration(&mut self) -> ExprId {
        let start = self.peek_span();
        self.bump(); // 'for'
        let _ = self.expect_ident("'_'"); // binding is always `_` per spec §4.2
        self.expect(&TokenKind::Keyword(KeywordId::In), "'in'");
        let is_sorted = matches!(self.peek(), TokenKind::Keyword(KeywordId::Sorted));
        if is_sorted {
            self.bump();
        }
        let iterable = self.parse_expr();
        let body_stmts = self.parse_block();
        let span = start.merge(self.peek_span());
        let body = self.module.alloc_expr(ExprKind::Block { statements: body_stmts, result_expr: None }, span);
        self.module.alloc_expr(ExprKind::Iteration { iterable, body, is_sorted }, span)
    }

    fn parse_resource(&mut self) -> ExprId {
        let start = self.peek_span();
        self.bump(); // 'resource'
        self.expect(&TokenKind::LBrace, "'{'");
        let mut segments = vec![self.expect_ident("a path segment")];
        while self.eat(&TokenKind::Slash) {
            segments.push(self.expect_ident("a path segment"));
        }
        self.expect(&TokenKind::RBrace, "'}'");
        self.module.alloc_expr(ExprKind::Resource { segments }, start.merge(self.peek_span()))
    }

    fn parse_process(&mut self) -> ExprId {
        let start = self.peek_span();
        self.bump(); // 'process'
        self.expect(&TokenKind::LBrace, "'{'");
        let command = self.parse_expr();
        self.expect(&TokenKind::RBrace, "'}'");
        self.module.alloc_expr(ExprKind::Process { command }, start.merge(self.peek_span()))
    }
}
