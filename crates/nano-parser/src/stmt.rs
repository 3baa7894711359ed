//! Statement and block parsing.

use nano_syntax::ast::*;
use nano_syntax::error::{error_at, internal, Result};
use nano_syntax::token::TokenKind;
use nano_syntax::types::ValueType;

use crate::consteval;
use crate::parser::Parser;

impl Parser {
    /// Parses statements in a fresh scope until one of `terminators` (not consumed).
    pub(crate) fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<Block> {
        self.push_scope();
        let mut stmts = Vec::new();
        let mut unescapable = false;
        while !terminators.contains(self.peek()) {
            if self.check(&TokenKind::Eof) {
                let wanted: Vec<String> = terminators.iter().map(|t| t.describe()).collect();
                return self.unexpected(&wanted.join(" or "));
            }
            let stmt = self.parse_statement()?;
            unescapable |= stmt.is_unescapable();
            stmts.push(stmt);
        }
        self.pop_scope();
        Ok(Block { stmts, unescapable })
    }

    /// Parses `: stmt` on one line, or `:` followed by a block on the next lines.
    /// A block branch is left before its terminator.
    fn parse_branch(&mut self, terminators: &[TokenKind]) -> Result<Branch> {
        let colon = self.expect(TokenKind::Colon)?;
        let next = self.peek_token();
        if next.line == colon.line && next.kind != TokenKind::Eof {
            self.push_scope();
            let stmt = self.parse_statement()?;
            self.pop_scope();
            Ok(Branch::Single(Box::new(stmt)))
        } else {
            Ok(Branch::Block(self.parse_block(terminators)?))
        }
    }

    /// A loop or `else` body; block form consumes its `end`.
    fn parse_body(&mut self) -> Result<Branch> {
        let body = self.parse_branch(&[TokenKind::End])?;
        if let Branch::Block(_) = body {
            self.expect(TokenKind::End)?;
        }
        Ok(body)
    }

    pub(crate) fn parse_statement(&mut self) -> Result<Stmt> {
        let tok = self.peek_token().clone();
        match tok.kind {
            TokenKind::Var => self.parse_var_declare(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => {
                self.advance();
                self.parse_if()
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_condition()?;
                let body = self.parse_body()?;
                if consteval::is_always_true(&cond) {
                    Ok(Stmt::Forever { body })
                } else {
                    Ok(Stmt::While { cond, body })
                }
            }
            TokenKind::Repeat => {
                self.advance();
                let count = self.parse_expr()?;
                if count.ty != ValueType::Number {
                    return error_at(
                        count.line,
                        count.col,
                        format!("type mismatch: repeat count must be a number, found {}", count.ty),
                    );
                }
                let body = self.parse_body()?;
                Ok(Stmt::Repeat { count, body })
            }
            TokenKind::Forever => {
                self.advance();
                let body = self.parse_body()?;
                Ok(Stmt::Forever { body })
            }
            TokenKind::Drop => {
                self.advance();
                Ok(Stmt::DeleteInstance)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let call = self.finish_call(name, tok.line, tok.col)?;
                    Ok(Stmt::Call(call))
                } else {
                    self.parse_assignment(name, tok.line, tok.col)
                }
            }
            _ => self.unexpected("a statement"),
        }
    }

    fn parse_condition(&mut self) -> Result<Expr> {
        let cond = self.parse_expr()?;
        let (line, col, found) = (cond.line, cond.col, cond.ty.clone());
        Self::implicit(cond, &ValueType::Bool).ok_or_else(|| {
            nano_syntax::Error::with_span(
                format!("type mismatch: condition must be a bool, found {}", found),
                line,
                col,
            )
        })
    }

    /// Parses the rest of an if-chain after `if` or `elseif`.
    fn parse_if(&mut self) -> Result<Stmt> {
        let cond = self.parse_condition()?;
        let then = self.parse_branch(&[TokenKind::Elseif, TokenKind::Else, TokenKind::End])?;
        let block_form = matches!(then, Branch::Block(_));
        let otherwise = match self.peek() {
            TokenKind::Elseif => {
                self.advance();
                Some(Branch::Single(Box::new(self.parse_if()?)))
            }
            TokenKind::Else => {
                self.advance();
                Some(self.parse_body()?)
            }
            TokenKind::End if block_form => {
                self.advance();
                None
            }
            _ => None,
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn parse_var_declare(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Var)?;
        let (name, line, col) = self.expect_ident()?;
        let declared = if self.eat(&TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(&TokenKind::Equal).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let ty = match (declared, &init) {
            (Some(ty), Some(e)) if ty != e.ty => {
                return error_at(
                    e.line,
                    e.col,
                    format!("type mismatch: cannot initialize '{}' of type {} with a {} value", name, ty, e.ty),
                );
            }
            (Some(ty), _) => ty,
            (None, Some(e)) => e.ty.clone(),
            (None, None) => {
                return error_at(line, col, format!("variable '{}' needs a type or an initializer", name));
            }
        };
        if ty.is_void() {
            return error_at(line, col, format!("variable '{}' cannot have type void", name));
        }
        let Some(ctx) = self.func.as_mut() else {
            return internal("local declaration outside of a body");
        };
        let local = ctx.locals.len();
        if !ctx.scopes.declare(ctx.current, &name, ty.clone(), local) {
            return error_at(line, col, format!("variable '{}' is already declared in this scope", name));
        }
        ctx.locals.push(LocalVar {
            name: name.clone(),
            ty: ty.clone(),
            address_taken: false,
        });
        Ok(Stmt::VarDeclare { local, name, ty, init })
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        let tok = self.expect(TokenKind::Return)?;
        let Some(ctx) = self.func.as_ref() else {
            return internal("return outside of a body");
        };
        let return_type = ctx.scopes.return_type(ctx.current).clone();
        let next = self.peek_token();
        let has_value = next.line == tok.line
            && !matches!(
                next.kind,
                TokenKind::End | TokenKind::Else | TokenKind::Elseif | TokenKind::Eof
            );
        if return_type.is_void() {
            if has_value {
                return error_at(next.line, next.col, "cannot return a value from a void function");
            }
            return Ok(Stmt::Return(None));
        }
        if !has_value {
            return error_at(tok.line, tok.col, format!("missing return value of type {}", return_type));
        }
        let value = self.parse_expr()?;
        let (line, col, found) = (value.line, value.col, value.ty.clone());
        let value = Self::implicit(value, &return_type).ok_or_else(|| {
            nano_syntax::Error::with_span(
                format!("type mismatch: cannot return {} from a function returning {}", found, return_type),
                line,
                col,
            )
        })?;
        Ok(Stmt::Return(Some(value)))
    }

    fn parse_assignment(&mut self, name: String, line: usize, col: usize) -> Result<Stmt> {
        let var = self.variable(&name, line, col)?;
        let ExprKind::Variable { binding, .. } = var.kind else {
            return internal("variable lookup produced a non-variable");
        };
        let (target, value) = self.parse_assign_target(&name, &var.ty)?;
        Ok(Stmt::VarAssign {
            name,
            binding,
            ty: var.ty,
            target,
            value,
        })
    }

    fn parse_assign_target(&mut self, name: &str, ty: &ValueType) -> Result<(AssignTarget, Expr)> {
        let tok = self.peek_token().clone();
        match tok.kind {
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                let element = match ty.pointee() {
                    Some(base) if !base.is_void() => base.clone(),
                    _ => {
                        return error_at(tok.line, tok.col, format!("type mismatch: cannot index a value of type {}", ty));
                    }
                };
                let index = Self::index_operand(index)?;
                let (then, value) = self.parse_assign_target(name, &element)?;
                Ok((
                    AssignTarget::Index {
                        index,
                        then: Box::new(then),
                    },
                    value,
                ))
            }
            TokenKind::Equal => {
                self.advance();
                let value = self.parse_expr()?;
                if value.ty != *ty {
                    return error_at(
                        value.line,
                        value.col,
                        format!("type mismatch: cannot assign {} to '{}' of type {}", value.ty, name, ty),
                    );
                }
                Ok((AssignTarget::Set, value))
            }
            TokenKind::PlusEqual => {
                self.advance();
                let value = self.parse_expr()?;
                let ok = value.ty == ValueType::Number && (*ty == ValueType::Number || ty.is_pointer());
                if !ok {
                    return error_at(
                        value.line,
                        value.col,
                        format!("type mismatch: cannot increment '{}' of type {} by {}", name, ty, value.ty),
                    );
                }
                Ok((AssignTarget::Increment, value))
            }
            _ => self.unexpected(&format!("'=', '+=' or '[' after '{}'", name)),
        }
    }
}
