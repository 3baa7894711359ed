//! Lowering of built-in calls.

use nano_syntax::ast;
use nano_syntax::builtin::Builtin;
use nano_syntax::error::{internal, Result};
use nano_target::{Expr, MathOp, Stmt};

use crate::builder::FuncBuilder;
use crate::compiler::Compiler;
use crate::runtime;

impl FuncBuilder {
    /// Statement built-ins are emitted immediately and yield an empty
    /// string. `ask` and `alloc` leave their result on the stack; the
    /// remaining value built-ins map to target expressions.
    pub(crate) fn call_builtin(&mut self, c: &Compiler, builtin: Builtin, args: &[ast::Expr]) -> Result<Expr> {
        let values = self.operands(c, args)?;
        if values.len() != builtin.params().len() {
            return internal(format!(
                "'{}' expects {} arguments, got {}",
                builtin.name(),
                builtin.params().len(),
                values.len()
            ));
        }
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_else(|| Expr::str(""));

        let stmt = match builtin {
            Builtin::Answer => return Ok(Expr::Answer),
            Builtin::Timer => return Ok(Expr::Timer),
            Builtin::Random => {
                let low = next();
                let high = next();
                return Ok(Expr::Random {
                    low: Box::new(low),
                    high: Box::new(high),
                });
            }
            Builtin::Abs => return Ok(math(MathOp::Abs, next())),
            Builtin::Floor => return Ok(math(MathOp::Floor, next())),
            Builtin::Sqrt => return Ok(math(MathOp::Sqrt, next())),
            Builtin::Ask => {
                let question = self.resolve(next());
                self.emit(Stmt::Ask(question));
                let n = self.push_temp(Expr::Answer);
                return Ok(Expr::Pending(n));
            }
            Builtin::Alloc => {
                let size = self.resolve(next());
                self.emit(Stmt::call(runtime::ALLOC, vec![size]));
                let n = self.push_temp(runtime::var(runtime::ALLOC_RET));
                return Ok(Expr::Pending(n));
            }
            Builtin::Free => Stmt::call(runtime::FREE, vec![self.resolve(next())]),
            Builtin::Say => Stmt::Say(self.resolve(next())),
            Builtin::SayFor => {
                let text = self.resolve(next());
                Stmt::SayFor(text, self.resolve(next()))
            }
            Builtin::Think => Stmt::Think(self.resolve(next())),
            Builtin::Wait => Stmt::Wait(self.resolve(next())),
            Builtin::Broadcast => Stmt::Broadcast(self.resolve(next())),
            Builtin::BroadcastWait => Stmt::BroadcastAndWait(self.resolve(next())),
            Builtin::SwitchCostume => Stmt::SwitchCostume(self.resolve(next())),
            Builtin::Clone => Stmt::CreateClone,
            Builtin::ResetTimer => Stmt::ResetTimer,
        };
        self.emit(stmt);
        Ok(Expr::str(""))
    }
}

fn math(op: MathOp, arg: Expr) -> Expr {
    Expr::Math { op, arg: Box::new(arg) }
}
