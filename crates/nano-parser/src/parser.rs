//! Recursive-descent AST builder: declarations and shared token plumbing.
//!
//! Statements live in `stmt.rs` and expressions in `expr.rs`; both are
//! further `impl Parser` blocks over the state defined here.

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, PathBuf};

use nano_syntax::ast::*;
use nano_syntax::error::{error_at, Error, Result};
use nano_syntax::token::{Token, TokenKind};
use nano_syntax::types::ValueType;
use nano_syntax::Builtin;

use crate::consteval;
use crate::scope::{ScopeId, ScopeTree};

/// Signature of a user function, collected before any body is built.
#[derive(Debug, Clone)]
pub(crate) struct Signature {
    pub(crate) params: Vec<Param>,
    pub(crate) return_type: ValueType,
}

/// State of the function or event body currently being built.
pub(crate) struct FnCtx {
    pub(crate) scopes: ScopeTree,
    pub(crate) current: ScopeId,
    pub(crate) locals: Vec<LocalVar>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    stage: bool,
    asset_root: PathBuf,
    /// Statics visible to this unit: inherited from the stage or declared so far.
    pub(crate) globals: Vec<StaticVar>,
    pub(crate) signatures: HashMap<String, Signature>,
    pub(crate) func: Option<FnCtx>,
    pub(crate) addressed_statics: BTreeSet<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            stage: false,
            asset_root: PathBuf::from("."),
            globals: Vec::new(),
            signatures: HashMap::new(),
            func: None,
            addressed_statics: BTreeSet::new(),
        }
    }

    /// Marks this unit as the stage, the only unit allowed to declare statics.
    pub fn as_stage(mut self) -> Self {
        self.stage = true;
        self
    }

    /// Makes the stage's statics visible to this unit.
    pub fn with_statics(mut self, statics: &[StaticVar]) -> Self {
        self.globals = statics.to_vec();
        self
    }

    /// Directory asset paths are resolved against.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    // ---- token plumbing ----

    pub(crate) fn peek(&self) -> &TokenKind {
        &self.peek_token().kind
    }

    pub(crate) fn peek_token(&self) -> &Token {
        // tokenize() always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek_token().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            self.unexpected(&kind.describe())
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(String, usize, usize)> {
        let tok = self.peek_token().clone();
        match tok.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, tok.line, tok.col))
            }
            _ => self.unexpected("an identifier"),
        }
    }

    pub(crate) fn unexpected<T>(&self, wanted: &str) -> Result<T> {
        let tok = self.peek_token();
        error_at(
            tok.line,
            tok.col,
            format!("expected {}, found {}", wanted, tok.kind.describe()),
        )
    }

    // ---- scopes ----

    pub(crate) fn begin_body(&mut self, params: &[Param], return_type: ValueType, line: usize, col: usize) -> Result<()> {
        let mut scopes = ScopeTree::new();
        let current = scopes.root(params, return_type).map_err(|name| {
            Error::with_span(format!("parameter '{}' is declared twice", name), line, col)
        })?;
        self.func = Some(FnCtx {
            scopes,
            current,
            locals: Vec::new(),
        });
        Ok(())
    }

    pub(crate) fn push_scope(&mut self) {
        if let Some(ctx) = self.func.as_mut() {
            ctx.current = ctx.scopes.child(ctx.current);
        }
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(ctx) = self.func.as_mut() {
            if let Some(parent) = ctx.scopes.parent(ctx.current) {
                ctx.current = parent;
            }
        }
    }

    // ---- declarations ----

    /// Parses a whole source unit.
    pub fn parse_program(&mut self) -> Result<Program> {
        self.collect_signatures()?;
        let mut program = Program::default();
        let mut attributes: Option<(Attributes, usize, usize)> = None;
        loop {
            let tok = self.peek_token().clone();
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::At => {
                    self.advance();
                    let (name, line, col) = self.expect_ident()?;
                    let attrs = attributes.get_or_insert((Attributes::default(), tok.line, tok.col));
                    match name.as_str() {
                        "warp" => attrs.0.warp = true,
                        _ => return error_at(line, col, format!("unknown attribute '{}'", name)),
                    }
                }
                TokenKind::Func => {
                    let attrs = attributes.take().map(|a| a.0).unwrap_or_default();
                    let function = self.parse_function(attrs)?;
                    program.functions.insert(function.name.clone(), function);
                }
                TokenKind::On => {
                    let attrs = attributes.take().map(|a| a.0).unwrap_or_default();
                    let event = self.parse_event(attrs)?;
                    program.events.push(event);
                }
                TokenKind::Costume | TokenKind::Sound | TokenKind::Var if attributes.is_some() => {
                    return error_at(
                        tok.line,
                        tok.col,
                        "attributes may only precede a function or an event",
                    );
                }
                TokenKind::Costume => {
                    self.advance();
                    let path = self.expect_string()?;
                    program.costumes.push(self.asset_path(&path));
                }
                TokenKind::Sound => {
                    self.advance();
                    let path = self.expect_string()?;
                    program.sounds.push(self.asset_path(&path));
                }
                TokenKind::Var => {
                    let var = self.parse_static()?;
                    self.globals.push(var.clone());
                    program.statics.push(var);
                }
                _ => return self.unexpected("a declaration"),
            }
        }
        if let Some((_, line, col)) = attributes {
            return error_at(line, col, "attribute is not followed by a function or an event");
        }
        program.addressed_statics = std::mem::take(&mut self.addressed_statics);
        Ok(program)
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            _ => self.unexpected("a string"),
        }
    }

    /// Resolves `path` against the asset root, folding `.` and `..` lexically.
    fn asset_path(&self, path: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        for comp in self.asset_root.join(path).components() {
            match comp {
                Component::CurDir => {}
                Component::ParentDir => match parts.last() {
                    Some(last) if last != ".." && !last.is_empty() => {
                        parts.pop();
                    }
                    _ => parts.push("..".to_string()),
                },
                Component::RootDir => parts.push(String::new()),
                Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
                Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            }
        }
        parts.join("/")
    }

    /// Records every function signature so bodies may call functions declared later.
    /// `func` only ever starts a top-level declaration, so no body needs skipping.
    fn collect_signatures(&mut self) -> Result<()> {
        let saved = self.pos;
        let mut i = 0;
        while i < self.tokens.len() {
            if self.tokens[i].kind != TokenKind::Func {
                i += 1;
                continue;
            }
            self.pos = i;
            let (name, signature, line, col) = self.parse_signature()?;
            if Builtin::lookup(&name).is_some() {
                return error_at(line, col, format!("'{}' is a built-in function and cannot be redefined", name));
            }
            if self.signatures.insert(name.clone(), signature).is_some() {
                return error_at(line, col, format!("function '{}' is already defined", name));
            }
            i = self.pos;
        }
        self.pos = saved;
        Ok(())
    }

    fn parse_signature(&mut self) -> Result<(String, Signature, usize, usize)> {
        self.expect(TokenKind::Func)?;
        let (name, line, col) = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (pname, pline, pcol) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                if ty.is_void() {
                    return error_at(pline, pcol, format!("parameter '{}' cannot have type void", pname));
                }
                params.push(Param { name: pname, ty });
                if self.eat(&TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let return_type = if self.eat(&TokenKind::Colon).is_some() {
            self.parse_type()?
        } else {
            ValueType::Void
        };
        Ok((name, Signature { params, return_type }, line, col))
    }

    pub(crate) fn parse_type(&mut self) -> Result<ValueType> {
        let mut ty = match self.peek() {
            TokenKind::Void => ValueType::Void,
            TokenKind::NumberType => ValueType::Number,
            TokenKind::StringType => ValueType::String,
            TokenKind::BoolType => ValueType::Bool,
            _ => return self.unexpected("a type"),
        };
        self.advance();
        while self.eat(&TokenKind::Star).is_some() {
            ty = ValueType::pointer_to(ty);
        }
        Ok(ty)
    }

    fn parse_function(&mut self, attributes: Attributes) -> Result<Function> {
        let (name, signature, line, col) = self.parse_signature()?;
        self.begin_body(&signature.params, signature.return_type.clone(), line, col)?;
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        let ctx = self.func.take();
        if !signature.return_type.is_void() && !body.unescapable {
            return error_at(
                line,
                col,
                format!("function '{}' can finish without returning a {} value", name, signature.return_type),
            );
        }
        Ok(Function {
            name,
            params: signature.params,
            return_type: signature.return_type,
            attributes,
            body,
            locals: ctx.map(|c| c.locals).unwrap_or_default(),
            line,
            col,
        })
    }

    fn parse_event(&mut self, attributes: Attributes) -> Result<Event> {
        self.expect(TokenKind::On)?;
        let (name, line, col) = self.expect_ident()?;
        let kind = EventKind::lookup(&name)
            .ok_or_else(|| Error::with_span(format!("unknown event '{}'", name), line, col))?;
        let param = match kind.param_type() {
            Some(expected) => {
                let expr = self.parse_unary()?;
                if expr.ty != expected {
                    return error_at(
                        expr.line,
                        expr.col,
                        format!("type mismatch: event '{}' expects a {} parameter, found {}", name, expected, expr.ty),
                    );
                }
                let value = consteval::evaluate(&expr).ok_or_else(|| {
                    Error::with_span("event parameter must be a compile-time constant", expr.line, expr.col)
                })?;
                Some(value)
            }
            None => None,
        };
        self.begin_body(&[], ValueType::Void, line, col)?;
        let body = self.parse_block(&[TokenKind::End])?;
        self.expect(TokenKind::End)?;
        let locals = self.func.take().map(|c| c.locals).unwrap_or_default();
        Ok(Event {
            kind,
            param,
            attributes,
            body,
            locals,
        })
    }

    fn parse_static(&mut self) -> Result<StaticVar> {
        let var = self.expect(TokenKind::Var)?;
        if !self.stage {
            return error_at(var.line, var.col, "static variables may only be declared in the stage");
        }
        let (name, line, col) = self.expect_ident()?;
        if self.globals.iter().any(|s| s.name == name) {
            return error_at(line, col, format!("static variable '{}' is already declared", name));
        }
        let declared = if self.eat(&TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Equal)?;
        let init = self.parse_expr()?;
        let ty = declared.unwrap_or_else(|| init.ty.clone());
        if ty != init.ty {
            return error_at(
                init.line,
                init.col,
                format!("type mismatch: cannot initialize '{}' of type {} with a {} value", name, ty, init.ty),
            );
        }
        if ty.is_void() {
            return error_at(line, col, format!("static variable '{}' cannot have type void", name));
        }
        let value = consteval::evaluate(&init).ok_or_else(|| {
            Error::with_span(
                format!("initializer of static variable '{}' must be a compile-time constant", name),
                init.line,
                init.col,
            )
        })?;
        Ok(StaticVar { name, ty, init: value })
    }
}
