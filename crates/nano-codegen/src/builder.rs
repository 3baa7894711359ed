//! Procedure builder: frames, expression sessions and statement emission.
//!
//! Frame layout of a user function with `n` parameters, relative to the
//! frame base `fb` (the cell holding the caller's frame base):
//!
//! ```text
//! fb - n - 1   return value (only for non-void functions)
//! fb - n ..    parameters, left to right
//! fb           saved frame base
//! fb + 1 ..    stack-placed locals and hidden loop cells
//! ```
//!
//! Event procedures own their thread, so their frame base is the first cell
//! of the stack region and they have no prologue.
//!
//! Every statement evaluates its expressions in one session. Values that
//! need statements of their own (user calls, `ask`, `alloc`) are pushed
//! onto the stack and referenced as `Expr::Pending(n)`, the n-th push of
//! the session. A pending reference is resolved against the session's push
//! count when the statement using it is emitted; the session's pushes are
//! dropped once the statement is done. Operands are evaluated left to
//! right: an operand followed by one that emits statements is pushed before
//! those statements run.
//!
//! A released slot halts the thread. Every call site checks for it after
//! the callee returns, so a `drop` or a stack overflow deep in a call chain
//! stops each frame up to the event procedure.

use std::collections::HashMap;

use nano_syntax::ast::{self, AssignTarget, Binding, Branch, ExprKind, LocalId, UnaryOp};
use nano_syntax::builtin::Builtin;
use nano_syntax::error::{internal, Result};
use nano_syntax::types::ValueType;
use nano_target::{BinOp, Expr, Stmt};

use crate::analysis::Placement;
use crate::compiler::Compiler;
use crate::runtime::{self, frame_base, mem, pop, stack_top, Place};
use crate::statics::literal_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Function { params: usize },
    Event,
}

pub(crate) struct FuncBuilder {
    kind: Kind,
    placement: Vec<Placement>,
    /// Frame offset of each live stack-placed local.
    offsets: HashMap<LocalId, usize>,
    /// Statement buffers; the innermost receives emitted code.
    out: Vec<Vec<Stmt>>,
    /// Cells pushed during the current statement.
    temps: usize,
    /// Cells held above the frame base by live locals and loop cells.
    height: usize,
    /// Stack cells owned by each open block.
    blocks: Vec<usize>,
    /// Most cells ever held above the frame base at once.
    peak: usize,
}

pub(crate) fn binary_op(op: ast::BinaryOp) -> BinOp {
    match op {
        ast::BinaryOp::Or => BinOp::Or,
        ast::BinaryOp::And => BinOp::And,
        ast::BinaryOp::Eq => BinOp::Eq,
        ast::BinaryOp::Ne => BinOp::Ne,
        ast::BinaryOp::Lt => BinOp::Lt,
        ast::BinaryOp::Gt => BinOp::Gt,
        ast::BinaryOp::Le => BinOp::Le,
        ast::BinaryOp::Ge => BinOp::Ge,
        ast::BinaryOp::Concat => BinOp::Join,
        ast::BinaryOp::Add => BinOp::Add,
        ast::BinaryOp::Sub => BinOp::Sub,
        ast::BinaryOp::Mul => BinOp::Mul,
        ast::BinaryOp::Div => BinOp::Div,
        ast::BinaryOp::Mod => BinOp::Mod,
    }
}

/// Converts `x` from `from` to `to` with target operators.
pub(crate) fn cast(x: Expr, from: &ValueType, to: &ValueType) -> Expr {
    if from == to {
        return x;
    }
    match (x, to) {
        (Expr::Lit(v), ValueType::String) => Expr::str(v.to_string()),
        (Expr::Lit(v), ValueType::Bool) if from.is_pointer() || *from == ValueType::Number => {
            Expr::bool(v.to_num() != 0.0)
        }
        (x, ValueType::String) => Expr::binary(BinOp::Join, Expr::str(""), x),
        (x, ValueType::Number) if from.is_pointer() => x,
        (x, ValueType::Number) => Expr::binary(BinOp::Add, x, Expr::num(0.0)),
        (x, ValueType::Bool) => Expr::not(Expr::binary(BinOp::Eq, x, Expr::num(0.0))),
        (x, ValueType::Pointer(_) | ValueType::Void) => x,
    }
}

/// Whether lowering `e` emits statements before its value can be used.
pub(crate) fn emits_statements(e: &ast::Expr) -> bool {
    match &e.kind {
        ExprKind::Constant(_) | ExprKind::Variable { .. } => false,
        ExprKind::Binary { lhs, rhs, .. } => emits_statements(lhs) || emits_statements(rhs),
        ExprKind::Index { base, index } => emits_statements(base) || emits_statements(index),
        ExprKind::Unary { operand: inner, .. }
        | ExprKind::AddressOf(inner)
        | ExprKind::Indirect(inner)
        | ExprKind::Cast(inner) => emits_statements(inner),
        ExprKind::Call { callee, args, .. } => match callee {
            ast::Callee::User => true,
            ast::Callee::Builtin(b) => {
                let pure = matches!(
                    b,
                    Builtin::Answer | Builtin::Timer | Builtin::Random | Builtin::Abs | Builtin::Floor | Builtin::Sqrt
                );
                !pure || args.iter().any(emits_statements)
            }
        },
    }
}

pub(crate) fn zero_value(ty: &ValueType) -> Expr {
    match ty {
        ValueType::String => Expr::str(""),
        ValueType::Bool => Expr::bool(false),
        _ => Expr::num(0.0),
    }
}

impl FuncBuilder {
    pub(crate) fn new(kind: Kind, placement: Vec<Placement>) -> Self {
        Self {
            kind,
            placement,
            offsets: HashMap::new(),
            out: vec![Vec::new()],
            temps: 0,
            height: 0,
            blocks: vec![0],
            peak: 0,
        }
    }

    pub(crate) fn finish(mut self) -> Vec<Stmt> {
        self.out.pop().unwrap_or_default()
    }

    pub(crate) fn emit(&mut self, stmt: Stmt) {
        if let Some(buf) = self.out.last_mut() {
            buf.push(stmt);
        }
    }

    fn emit_all(&mut self, stmts: Vec<Stmt>) {
        for s in stmts {
            self.emit(s);
        }
    }

    /// Runs `f` with a fresh output buffer and returns what it emitted.
    fn capture(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<Vec<Stmt>> {
        self.out.push(Vec::new());
        let result = f(self);
        let stmts = self.out.pop().unwrap_or_default();
        result.map(|_| stmts)
    }

    // ---- frames ----

    /// Saves the caller's frame base and starts a new frame at the stack top.
    pub(crate) fn prologue(&mut self) {
        self.emit_all(runtime::push(frame_base()));
        self.emit(Stmt::replace(
            runtime::MEMORY,
            Expr::item(runtime::STACK_BASE, Expr::arg(runtime::SLOT)),
            stack_top(),
        ));
    }

    /// Drops the frame and restores the caller's frame base.
    pub(crate) fn epilogue(&mut self) {
        self.emit(Stmt::replace(runtime::STACK_TOP, Expr::arg(runtime::SLOT), frame_base()));
        self.emit(Stmt::replace(
            runtime::MEMORY,
            Expr::item(runtime::STACK_BASE, Expr::arg(runtime::SLOT)),
            mem(stack_top()),
        ));
        self.emit(pop(1));
    }

    pub(crate) fn release_thread(&mut self) {
        self.emit(Stmt::call(runtime::RELEASE_THREAD, vec![Expr::arg(runtime::SLOT)]));
    }

    /// Stops the thread when the frame's deepest use of the stack would run
    /// past the end of the `stack_size` cells of its region.
    pub(crate) fn stack_guard(&self, stack_size: usize) -> Stmt {
        let own = match self.kind {
            Kind::Function { .. } => 1,
            Kind::Event => 0,
        };
        let need = (self.peak + own) as i64;
        let limit = Expr::item(runtime::STACK_BASE, Expr::arg(runtime::SLOT)).offset(stack_size as i64 - 1);
        Stmt::If {
            cond: Expr::binary(BinOp::Gt, stack_top().offset(need), limit),
            then: vec![
                Stmt::Say(Expr::str("stack overflow")),
                Stmt::call(runtime::RELEASE_THREAD, vec![Expr::arg(runtime::SLOT)]),
                Stmt::DeleteThisClone,
                Stmt::StopThisScript,
            ],
            otherwise: Vec::new(),
        }
    }

    /// Whether anything in the body pushes onto the stack.
    pub(crate) fn uses_stack(&self) -> bool {
        self.peak > 0
    }

    // ---- sessions ----

    /// Pushes `value` as the next temporary of the session.
    pub(crate) fn push_temp(&mut self, value: Expr) -> usize {
        let value = self.resolve(value);
        self.emit_all(runtime::push(value));
        self.temps += 1;
        self.peak = self.peak.max(self.height + self.temps);
        self.temps - 1
    }

    /// Pushes `value` when a later operand emits statements that could
    /// change what it reads.
    fn hold(&mut self, value: Expr, later_statements: bool) -> Expr {
        match value {
            Expr::Lit(_) | Expr::Pending(_) => value,
            value if later_statements => Expr::Pending(self.push_temp(value)),
            value => value,
        }
    }

    /// Lowers `es` left to right.
    pub(crate) fn operands(&mut self, c: &Compiler, es: &[ast::Expr]) -> Result<Vec<Expr>> {
        let mut values = Vec::with_capacity(es.len());
        for (i, e) in es.iter().enumerate() {
            let v = self.expr(c, e)?;
            let later = es[i + 1..].iter().any(emits_statements);
            values.push(self.hold(v, later));
        }
        Ok(values)
    }

    fn pair(&mut self, c: &Compiler, a: &ast::Expr, b: &ast::Expr) -> Result<(Expr, Expr)> {
        let first = self.expr(c, a)?;
        let first = self.hold(first, emits_statements(b));
        let second = self.expr(c, b)?;
        Ok((first, second))
    }

    /// Replaces pending references with reads relative to the stack top.
    pub(crate) fn resolve(&self, e: Expr) -> Expr {
        if !e.has_pending() {
            return e;
        }
        let height = self.temps as i64;
        e.map_pending(&|n| mem(stack_top().offset(n as i64 + 1 - height)))
    }

    fn end_session(&mut self) {
        if self.temps > 0 {
            self.emit(pop(self.temps));
            self.temps = 0;
        }
    }

    /// Ends the session, moving `value` into the scratch cell first if it
    /// reads session temporaries.
    fn settle(&mut self, value: Expr) -> Expr {
        let value = if value.has_pending() {
            let resolved = self.resolve(value);
            self.emit(Stmt::set(runtime::TMP, resolved));
            runtime::var(runtime::TMP)
        } else {
            value
        };
        self.end_session();
        value
    }

    // ---- places ----

    fn variable_place(&self, c: &Compiler, name: &str, binding: &Binding) -> Result<Place> {
        match binding {
            Binding::Local(id) => match self.placement.get(*id) {
                Some(Placement::Global(cell)) => Ok(Place::Cell(cell.clone())),
                Some(Placement::Stack) => match self.offsets.get(id) {
                    Some(offset) => Ok(Place::Mem(frame_base().offset(*offset as i64))),
                    None => internal(format!("local '{}' used outside of its frame", name)),
                },
                None => internal(format!("local '{}' has no placement", name)),
            },
            Binding::Param(i) => match self.kind {
                Kind::Function { params } => Ok(Place::Mem(frame_base().offset(*i as i64 - params as i64))),
                Kind::Event => internal(format!("parameter '{}' in an event body", name)),
            },
            Binding::Static => c.statics().place(name),
        }
    }

    fn return_place(&self) -> Result<Place> {
        match self.kind {
            Kind::Function { params } => Ok(Place::Mem(frame_base().offset(-(params as i64) - 1))),
            Kind::Event => internal("return value in an event body"),
        }
    }

    // ---- expressions ----

    pub(crate) fn expr(&mut self, c: &Compiler, e: &ast::Expr) -> Result<Expr> {
        match &e.kind {
            ExprKind::Constant(lit) => Ok(Expr::Lit(literal_value(lit))),
            ExprKind::Binary { op, lhs, rhs } => {
                let (l, r) = self.pair(c, lhs, rhs)?;
                Ok(Expr::binary(binary_op(*op), l, r))
            }
            ExprKind::Unary { op, operand } => {
                let x = self.expr(c, operand)?;
                Ok(match op {
                    UnaryOp::Neg => Expr::binary(BinOp::Sub, Expr::num(0.0), x),
                    UnaryOp::Not => Expr::not(x),
                })
            }
            ExprKind::Variable { name, binding } => Ok(self.variable_place(c, name, binding)?.read()),
            ExprKind::Call { name, callee, args } => match callee {
                ast::Callee::User => self.call_user(c, name, args, &e.ty),
                ast::Callee::Builtin(b) => self.call_builtin(c, *b, args),
            },
            ExprKind::Index { base, index } => {
                let (b, i) = self.pair(c, base, index)?;
                Ok(mem(Expr::add(b, i)))
            }
            ExprKind::AddressOf(inner) => self.address(c, inner),
            ExprKind::Indirect(inner) => Ok(mem(self.expr(c, inner)?)),
            ExprKind::Cast(inner) => {
                let x = self.expr(c, inner)?;
                Ok(cast(x, &inner.ty, &e.ty))
            }
        }
    }

    fn address(&mut self, c: &Compiler, e: &ast::Expr) -> Result<Expr> {
        match &e.kind {
            ExprKind::Variable {
                name,
                binding: Binding::Static,
            } => c.statics().address(name),
            ExprKind::Variable { name, binding } => match self.variable_place(c, name, binding)? {
                Place::Mem(addr) => Ok(addr),
                Place::Cell(cell) => internal(format!("'{}' is address-taken but lives in cell '{}'", name, cell)),
            },
            ExprKind::Index { base, index } => {
                let (b, i) = self.pair(c, base, index)?;
                Ok(Expr::add(b, i))
            }
            ExprKind::Indirect(inner) => self.expr(c, inner),
            _ => internal("address of a non-addressable expression"),
        }
    }

    /// Reserves the return cell, pushes the arguments, calls, then drops the
    /// arguments. The return value stays on the stack as a temporary.
    fn call_user(&mut self, c: &Compiler, name: &str, args: &[ast::Expr], ty: &ValueType) -> Result<Expr> {
        let values = self.operands(c, args)?;
        let ret = if ty.is_void() {
            None
        } else {
            Some(self.push_temp(Expr::num(0.0)))
        };
        let count = values.len();
        for v in values {
            self.push_temp(v);
        }
        self.emit(Stmt::call(format!("fn_{}", name), vec![Expr::arg(runtime::SLOT)]));
        self.emit(Stmt::If {
            cond: runtime::halted(),
            then: vec![Stmt::StopThisScript],
            otherwise: Vec::new(),
        });
        if count > 0 {
            self.emit(pop(count));
            self.temps -= count;
        }
        Ok(match ret {
            Some(n) => Expr::Pending(n),
            None => Expr::str(""),
        })
    }

    // ---- statements ----

    pub(crate) fn emit_stmts(&mut self, c: &Compiler, stmts: &[ast::Stmt]) -> Result<()> {
        for s in stmts {
            self.emit_stmt(c, s)?;
        }
        Ok(())
    }

    /// Emits a branch in its own scope, dropping its stack locals on a
    /// normal exit.
    fn branch(&mut self, c: &Compiler, branch: &Branch) -> Result<Vec<Stmt>> {
        self.capture(|b| {
            b.blocks.push(0);
            match branch {
                Branch::Single(stmt) => b.emit_stmt(c, stmt)?,
                Branch::Block(block) => b.emit_stmts(c, &block.stmts)?,
            }
            let owned = b.blocks.pop().unwrap_or(0);
            if owned > 0 && !branch.is_unescapable() {
                b.emit(pop(owned));
            }
            b.height -= owned;
            Ok(())
        })
    }

    /// Pushes `value` as a new stack cell owned by the innermost block.
    fn push_local(&mut self, value: Expr) -> usize {
        self.emit_all(runtime::push(value));
        self.height += 1;
        self.peak = self.peak.max(self.height + self.temps);
        self.height
    }

    pub(crate) fn emit_stmt(&mut self, c: &Compiler, s: &ast::Stmt) -> Result<()> {
        match s {
            ast::Stmt::VarDeclare { local, name, ty, init } => {
                let value = match init {
                    Some(e) => self.expr(c, e)?,
                    None => zero_value(ty),
                };
                match self.placement.get(*local).cloned() {
                    Some(Placement::Global(cell)) => {
                        let value = self.resolve(value);
                        self.emit(Stmt::set(cell, value));
                        self.end_session();
                    }
                    Some(Placement::Stack) => {
                        let value = self.settle(value);
                        let offset = self.push_local(value);
                        self.offsets.insert(*local, offset);
                        if let Some(owned) = self.blocks.last_mut() {
                            *owned += 1;
                        }
                    }
                    None => return internal(format!("local '{}' has no placement", name)),
                }
            }
            ast::Stmt::VarAssign {
                name,
                binding,
                target,
                value,
                ..
            } => {
                let mut place = self.variable_place(c, name, binding)?;
                let mut target = target;
                let mut indexed = false;
                let stmt = loop {
                    match target {
                        AssignTarget::Index { index, then } => {
                            let base = self.hold(place.read(), emits_statements(index));
                            let i = self.expr(c, index)?;
                            place = Place::Mem(Expr::add(base, i));
                            indexed = true;
                            target = &**then;
                        }
                        AssignTarget::Set | AssignTarget::Increment => {
                            if indexed && emits_statements(value) {
                                place = match place {
                                    Place::Mem(addr) => Place::Mem(self.hold(addr, true)),
                                    cell => cell,
                                };
                            }
                            let v = self.expr(c, value)?;
                            let v = self.resolve(v);
                            let place = place.map(|a| self.resolve(a));
                            break match target {
                                AssignTarget::Increment => place.increment(v),
                                _ => place.write(v),
                            };
                        }
                    }
                };
                self.emit(stmt);
                self.end_session();
            }
            ast::Stmt::Call(e) => {
                self.expr(c, e)?;
                self.end_session();
            }
            ast::Stmt::Return(value) => {
                match self.kind {
                    Kind::Function { .. } => {
                        if let Some(e) = value {
                            let v = self.expr(c, e)?;
                            let v = self.resolve(v);
                            let place = self.return_place()?;
                            self.emit(place.write(v));
                        }
                        // the epilogue drops this session's temporaries too
                        self.epilogue();
                    }
                    Kind::Event => {
                        if value.is_some() {
                            return internal("return value in an event body");
                        }
                        self.release_thread();
                    }
                }
                self.temps = 0;
                self.emit(Stmt::StopThisScript);
            }
            ast::Stmt::If { cond, then, otherwise } => {
                let cond = self.expr(c, cond)?;
                let cond = self.settle(cond);
                let then = self.branch(c, then)?;
                let otherwise = match otherwise {
                    Some(b) => self.branch(c, b)?,
                    None => Vec::new(),
                };
                self.emit(Stmt::If { cond, then, otherwise });
            }
            ast::Stmt::While { cond, body } => self.emit_while(c, cond, body)?,
            ast::Stmt::Repeat { count, body } => {
                let count = self.expr(c, count)?;
                let count = self.settle(count);
                let body = self.branch(c, body)?;
                self.emit(Stmt::Repeat { count, body });
            }
            ast::Stmt::Forever { body } => {
                let body = self.branch(c, body)?;
                self.emit(Stmt::Forever(body));
            }
            ast::Stmt::DeleteInstance => {
                self.release_thread();
                self.emit(Stmt::DeleteThisClone);
                self.emit(Stmt::StopThisScript);
            }
        }
        Ok(())
    }

    /// A condition that needs no statements becomes `until not cond`. Any
    /// other condition is kept in a hidden stack cell of the thread and
    /// re-evaluated at the bottom of the body, since the scratch cell does
    /// not survive the yield at the end of an iteration.
    fn emit_while(&mut self, c: &Compiler, cond: &ast::Expr, body: &Branch) -> Result<()> {
        let mut value = None;
        let setup = self.capture(|b| {
            value = Some(b.expr(c, cond)?);
            Ok(())
        })?;
        let Some(value) = value else {
            return internal("loop condition produced no value");
        };
        if setup.is_empty() && self.temps == 0 {
            let body = self.branch(c, body)?;
            self.emit(Stmt::Until {
                cond: Expr::not(value),
                body,
            });
            return Ok(());
        }

        self.emit_all(setup);
        let value = self.settle(value);
        let offset = self.push_local(value);
        let cell = Place::Mem(frame_base().offset(offset as i64));
        let mut body = self.branch(c, body)?;
        let recheck = self.capture(|b| {
            let v = b.expr(c, cond)?;
            let v = b.resolve(v);
            b.emit(cell.write(v));
            b.end_session();
            Ok(())
        })?;
        body.extend(recheck);
        self.emit(Stmt::Until {
            cond: Expr::not(cell.read()),
            body,
        });
        self.emit(pop(1));
        self.height -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casts() {
        let x = Expr::var("x");
        assert_eq!(cast(x.clone(), &ValueType::Number, &ValueType::Number), x);
        assert_eq!(cast(x.clone(), &ValueType::Number, &ValueType::String).to_string(), "\"\" & x");
        assert_eq!(cast(x.clone(), &ValueType::Bool, &ValueType::Number).to_string(), "x + 0");
        assert_eq!(cast(x.clone(), &ValueType::Number, &ValueType::Bool).to_string(), "not (x == 0)");
        let ptr = ValueType::pointer_to(ValueType::Number);
        assert_eq!(cast(x.clone(), &ptr, &ValueType::Number), x);
        assert_eq!(cast(x.clone(), &ValueType::Number, &ptr), x);
        assert_eq!(cast(Expr::num(5.0), &ValueType::Number, &ValueType::String), Expr::str("5"));
        assert_eq!(cast(Expr::num(0.0), &ValueType::Number, &ValueType::Bool), Expr::bool(false));
    }

    #[test]
    fn test_hold_pushes_reads_only_before_statements() {
        let mut b = FuncBuilder::new(Kind::Event, Vec::new());
        assert_eq!(b.hold(Expr::num(3.0), true), Expr::num(3.0));
        assert_eq!(b.hold(Expr::var("x"), false), Expr::var("x"));
        assert_eq!(b.hold(Expr::var("x"), true), Expr::Pending(0));
        assert_eq!(b.hold(Expr::Pending(0), true), Expr::Pending(0));
        assert!(b.uses_stack());
        assert_eq!(b.finish().len(), 2);
    }

    #[test]
    fn test_stack_guard_counts_the_saved_frame_base() {
        let mut b = FuncBuilder::new(Kind::Function { params: 0 }, Vec::new());
        b.push_temp(Expr::num(1.0));
        b.push_temp(Expr::num(2.0));
        let Stmt::If { cond, then, .. } = b.stack_guard(16) else {
            panic!("expected a guard");
        };
        assert_eq!(cond.to_string(), "(stack_top[$slot] + 3) > (stack_base[$slot] + 15)");
        assert_eq!(then.last(), Some(&Stmt::StopThisScript));
    }

    #[test]
    fn test_pending_resolves_against_session_height() {
        let mut b = FuncBuilder::new(Kind::Function { params: 0 }, Vec::new());
        let first = b.push_temp(Expr::num(1.0));
        let second = b.push_temp(Expr::Pending(first));
        assert_eq!((first, second), (0, 1));
        let e = b.resolve(Expr::binary(BinOp::Add, Expr::Pending(0), Expr::Pending(1)));
        assert_eq!(e.to_string(), "memory[stack_top[$slot] - 1] + memory[stack_top[$slot]]");
        b.end_session();
        let out = b.finish();
        // two pushes of two statements each, then one pop
        assert_eq!(out.len(), 5);
        // the second push read the first value against the pre-push top
        let Stmt::Replace { value, .. } = &out[2] else {
            panic!("expected a memory write");
        };
        assert_eq!(value.to_string(), "memory[stack_top[$slot]]");
    }
}
