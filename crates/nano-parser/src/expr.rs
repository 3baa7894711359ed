//! Expression parsing and typed node construction.
//!
//! Precedence, lowest first: `or`, `and`, equality, relational, `&`
//! concatenation, additive, multiplicative, then unary and postfix forms.
//! Each constructor checks operand types and wraps implicitly converted
//! operands in `Cast` nodes.

use nano_syntax::ast::*;
use nano_syntax::error::{error_at, Error, Result};
use nano_syntax::token::TokenKind;
use nano_syntax::types::ValueType;
use nano_syntax::Builtin;

use crate::parser::Parser;

fn node(kind: ExprKind, ty: ValueType, constant: bool, line: usize, col: usize) -> Expr {
    Expr {
        kind,
        ty,
        constant,
        line,
        col,
    }
}

fn mismatch(op: BinaryOp, lhs: &Expr, rhs: &Expr, line: usize, col: usize) -> Error {
    Error::with_span(
        format!(
            "type mismatch: cannot apply '{}' to {} and {}",
            op.symbol(),
            lhs.ty,
            rhs.ty
        ),
        line,
        col,
    )
}

impl Parser {
    /// Parses one expression.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    /// Wraps `expr` in a cast to `to` when the conversion is implicit.
    pub(crate) fn implicit(expr: Expr, to: &ValueType) -> Option<Expr> {
        if expr.ty == *to {
            Some(expr)
        } else if expr.ty.can_implicitly_cast_to(to) {
            let (line, col, constant) = (expr.line, expr.col, expr.constant);
            Some(node(ExprKind::Cast(Box::new(expr)), to.clone(), constant, line, col))
        } else {
            None
        }
    }

    pub(crate) fn index_operand(index: Expr) -> Result<Expr> {
        let (line, col, found) = (index.line, index.col, index.ty.clone());
        Self::implicit(index, &ValueType::Number).ok_or_else(|| {
            Error::with_span(
                format!("type mismatch: index must be a number, found {}", found),
                line,
                col,
            )
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while let Some(tok) = self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = Self::binary(BinaryOp::Or, lhs, rhs, tok.line, tok.col)?;
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while let Some(tok) = self.eat(&TokenKind::And) {
            let rhs = self.parse_equality()?;
            lhs = Self::binary(BinaryOp::And, lhs, rhs, tok.line, tok.col)?;
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            let tok = self.advance();
            let rhs = self.parse_relational()?;
            lhs = Self::binary(op, lhs, rhs, tok.line, tok.col)?;
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::LessEq => BinaryOp::Le,
                TokenKind::GreaterEq => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            let tok = self.advance();
            let rhs = self.parse_concat()?;
            lhs = Self::binary(op, lhs, rhs, tok.line, tok.col)?;
        }
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        while let Some(tok) = self.eat(&TokenKind::Amp) {
            let rhs = self.parse_additive()?;
            lhs = Self::binary(BinaryOp::Concat, lhs, rhs, tok.line, tok.col)?;
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let tok = self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Self::binary(op, lhs, rhs, tok.line, tok.col)?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            let tok = self.advance();
            let rhs = self.parse_unary()?;
            lhs = Self::binary(op, lhs, rhs, tok.line, tok.col)?;
        }
    }

    /// Builds a binary node, enforcing the operand rules of each operator family.
    pub(crate) fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, line: usize, col: usize) -> Result<Expr> {
        let constant = lhs.constant && rhs.constant;
        let (lhs, rhs, ty) = match op {
            BinaryOp::Or | BinaryOp::And | BinaryOp::Concat => {
                let to = if op == BinaryOp::Concat {
                    ValueType::String
                } else {
                    ValueType::Bool
                };
                let err = mismatch(op, &lhs, &rhs, line, col);
                match (Self::implicit(lhs, &to), Self::implicit(rhs, &to)) {
                    (Some(l), Some(r)) => (l, r, to),
                    _ => return Err(err),
                }
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                let ordered = !matches!(op, BinaryOp::Eq | BinaryOp::Ne);
                let comparable = match lhs.ty {
                    ValueType::Void => false,
                    ValueType::Bool => !ordered,
                    _ => true,
                };
                let err = mismatch(op, &lhs, &rhs, line, col);
                if !comparable {
                    return Err(err);
                }
                // the right operand is coerced to the left operand's type, never the reverse
                let to = lhs.ty.clone();
                match Self::implicit(rhs, &to) {
                    Some(r) => (lhs, r, ValueType::Bool),
                    None => return Err(err),
                }
            }
            BinaryOp::Add => match (&lhs.ty, &rhs.ty) {
                (ValueType::Number, ValueType::Number) => (lhs, rhs, ValueType::Number),
                (ValueType::Pointer(_), ValueType::Number) => {
                    let ty = lhs.ty.clone();
                    (lhs, rhs, ty)
                }
                (ValueType::Number, ValueType::Pointer(_)) => {
                    let ty = rhs.ty.clone();
                    (lhs, rhs, ty)
                }
                _ => return Err(mismatch(op, &lhs, &rhs, line, col)),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if lhs.ty != ValueType::Number || rhs.ty != ValueType::Number {
                    return Err(mismatch(op, &lhs, &rhs, line, col));
                }
                (lhs, rhs, ValueType::Number)
            }
        };
        Ok(node(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            constant,
            line,
            col,
        ))
    }

    pub(crate) fn parse_unary(&mut self) -> Result<Expr> {
        let tok = self.peek_token().clone();
        match tok.kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                if operand.ty != ValueType::Number {
                    return error_at(tok.line, tok.col, format!("type mismatch: cannot negate a {} value", operand.ty));
                }
                let constant = operand.constant;
                Ok(node(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    ValueType::Number,
                    constant,
                    tok.line,
                    tok.col,
                ))
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                let found = operand.ty.clone();
                let operand = Self::implicit(operand, &ValueType::Bool).ok_or_else(|| {
                    Error::with_span(format!("type mismatch: 'not' needs a bool, found {}", found), tok.line, tok.col)
                })?;
                let constant = operand.constant;
                Ok(node(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    ValueType::Bool,
                    constant,
                    tok.line,
                    tok.col,
                ))
            }
            TokenKind::Amp => {
                self.advance();
                let operand = self.parse_unary()?;
                self.address_of(operand, tok.line, tok.col)
            }
            TokenKind::Star => {
                self.advance();
                let operand = self.parse_unary()?;
                let ty = match operand.ty.pointee() {
                    Some(base) if !base.is_void() => base.clone(),
                    _ => {
                        return error_at(
                            tok.line,
                            tok.col,
                            format!("type mismatch: cannot dereference a value of type {}", operand.ty),
                        );
                    }
                };
                Ok(node(ExprKind::Indirect(Box::new(operand)), ty, false, tok.line, tok.col))
            }
            _ => self.parse_postfix(),
        }
    }

    /// Builds `&operand`, recording address-taken locals and statics.
    pub(crate) fn address_of(&mut self, operand: Expr, line: usize, col: usize) -> Result<Expr> {
        if !operand.is_addressable() {
            return error_at(line, col, "cannot take the address of this expression");
        }
        if let ExprKind::Variable { name, binding } = &operand.kind {
            match binding {
                Binding::Local(id) => {
                    if let Some(local) = self.func.as_mut().and_then(|ctx| ctx.locals.get_mut(*id)) {
                        local.address_taken = true;
                    }
                }
                Binding::Static => {
                    self.addressed_statics.insert(name.clone());
                }
                Binding::Param(_) => {}
            }
        }
        let ty = ValueType::pointer_to(operand.ty.clone());
        Ok(node(ExprKind::AddressOf(Box::new(operand)), ty, false, line, col))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while let Some(tok) = self.eat(&TokenKind::LBracket) {
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            let ty = match expr.ty.pointee() {
                Some(base) if !base.is_void() => base.clone(),
                _ => {
                    return error_at(tok.line, tok.col, format!("type mismatch: cannot index a value of type {}", expr.ty));
                }
            };
            let index = Self::index_operand(index)?;
            let (line, col) = (expr.line, expr.col);
            expr = node(
                ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                ty,
                false,
                line,
                col,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let tok = self.peek_token().clone();
        let (line, col) = (tok.line, tok.col);
        let literal = |lit: Literal| {
            let ty = lit.value_type();
            node(ExprKind::Constant(lit), ty, true, line, col)
        };
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(literal(Literal::String(s)))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(literal(Literal::Bool(tok.kind == TokenKind::True)))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Void | TokenKind::NumberType | TokenKind::StringType | TokenKind::BoolType => {
                let to = self.parse_type()?;
                self.expect(TokenKind::LParen)?;
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                if !inner.ty.can_cast_to(&to) {
                    return error_at(line, col, format!("type mismatch: cannot cast {} to {}", inner.ty, to));
                }
                if inner.ty == to {
                    return Ok(inner);
                }
                let constant = inner.constant;
                Ok(node(ExprKind::Cast(Box::new(inner)), to, constant, line, col))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.finish_call(name, line, col)
                } else {
                    self.variable(&name, line, col)
                }
            }
            _ => self.unexpected("an expression"),
        }
    }

    /// Resolves `name` through the scope chain, then the unit's statics.
    pub(crate) fn variable(&self, name: &str, line: usize, col: usize) -> Result<Expr> {
        let resolved = self
            .func
            .as_ref()
            .and_then(|ctx| ctx.scopes.lookup(ctx.current, name));
        let (ty, binding) = match resolved {
            Some(r) => (r.ty, r.binding),
            None => match self.globals.iter().find(|s| s.name == name) {
                Some(s) => (s.ty.clone(), Binding::Static),
                None => return error_at(line, col, format!("undeclared identifier '{}'", name)),
            },
        };
        Ok(node(
            ExprKind::Variable {
                name: name.to_string(),
                binding,
            },
            ty,
            false,
            line,
            col,
        ))
    }

    /// Parses the argument list of a call to `name` and checks it against the signature.
    pub(crate) fn finish_call(&mut self, name: String, line: usize, col: usize) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let (params, return_type, callee) = if let Some(sig) = self.signatures.get(&name) {
            (sig.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>(), sig.return_type.clone(), Callee::User)
        } else if let Some(b) = Builtin::lookup(&name) {
            (b.params(), b.return_type(), Callee::Builtin(b))
        } else {
            return error_at(line, col, format!("undeclared function '{}'", name));
        };
        if args.len() != params.len() {
            return error_at(
                line,
                col,
                format!("function '{}' expects {} argument(s), found {}", name, params.len(), args.len()),
            );
        }
        let mut typed = Vec::with_capacity(args.len());
        for (i, (arg, param)) in args.into_iter().zip(params.iter()).enumerate() {
            let (aline, acol, found) = (arg.line, arg.col, arg.ty.clone());
            let arg = Self::implicit(arg, param).ok_or_else(|| {
                Error::with_span(
                    format!(
                        "type mismatch: argument {} of '{}' expects {}, found {}",
                        i + 1,
                        name,
                        param,
                        found
                    ),
                    aline,
                    acol,
                )
            })?;
            typed.push(arg);
        }
        Ok(node(
            ExprKind::Call {
                name,
                callee,
                args: typed,
            },
            return_type,
            false,
            line,
            col,
        ))
    }
}
