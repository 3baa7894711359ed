//! Flattening of statement trees into jump-addressed operations.
//!
//! Threads must stop in the middle of a loop and resume later, so nested
//! bodies are laid out in one vector per procedure and a frame only needs
//! an instruction pointer and its loop counters.

use std::rc::Rc;

use nano_target::{Expr, Proc, Script, Stmt};

#[derive(Debug, Clone)]
pub(crate) enum Op {
    /// A statement without nested bodies.
    Do(Stmt),
    /// Jumps when the condition is false.
    JumpUnless(Expr, usize),
    /// Jumps when the condition is true.
    JumpIf(Expr, usize),
    Jump(usize),
    /// Pushes a loop counter.
    RepeatStart(Expr),
    /// Takes one iteration from the innermost counter, or drops the counter
    /// and jumps.
    RepeatNext(usize),
    /// End of a loop iteration: a yield point, then back to the loop head.
    LoopEnd(usize),
    Stop,
}

#[derive(Debug)]
pub(crate) struct Code {
    pub name: String,
    pub params: Vec<String>,
    pub warp: bool,
    pub ops: Vec<Op>,
}

impl Code {
    pub fn proc(proc: &Proc) -> Rc<Code> {
        Rc::new(Code {
            name: proc.name.clone(),
            params: proc.params.clone(),
            warp: proc.warp,
            ops: flatten(&proc.body),
        })
    }

    pub fn script(unit: &str, index: usize, script: &Script) -> Rc<Code> {
        Rc::new(Code {
            name: format!("{}#{}", unit, index),
            params: Vec::new(),
            warp: false,
            ops: flatten(&script.body),
        })
    }
}

pub(crate) fn flatten(stmts: &[Stmt]) -> Vec<Op> {
    let mut ops = Vec::new();
    emit(stmts, &mut ops);
    ops
}

fn emit(stmts: &[Stmt], ops: &mut Vec<Op>) {
    for stmt in stmts {
        match stmt {
            Stmt::If { cond, then, otherwise } => {
                let branch = ops.len();
                ops.push(Op::JumpUnless(cond.clone(), 0));
                emit(then, ops);
                if otherwise.is_empty() {
                    let end = ops.len();
                    patch(ops, branch, end);
                } else {
                    let skip = ops.len();
                    ops.push(Op::Jump(0));
                    let end = ops.len();
                    patch(ops, branch, end);
                    emit(otherwise, ops);
                    let end = ops.len();
                    patch(ops, skip, end);
                }
            }
            Stmt::Repeat { count, body } => {
                ops.push(Op::RepeatStart(count.clone()));
                let head = ops.len();
                ops.push(Op::RepeatNext(0));
                emit(body, ops);
                ops.push(Op::LoopEnd(head));
                let end = ops.len();
                patch(ops, head, end);
            }
            Stmt::Until { cond, body } => {
                let head = ops.len();
                ops.push(Op::JumpIf(cond.clone(), 0));
                emit(body, ops);
                ops.push(Op::LoopEnd(head));
                let end = ops.len();
                patch(ops, head, end);
            }
            Stmt::Forever(body) => {
                let head = ops.len();
                emit(body, ops);
                ops.push(Op::LoopEnd(head));
            }
            Stmt::StopThisScript => ops.push(Op::Stop),
            other => ops.push(Op::Do(other.clone())),
        }
    }
}

fn patch(ops: &mut [Op], at: usize, target: usize) {
    match &mut ops[at] {
        Op::JumpUnless(_, t) | Op::JumpIf(_, t) | Op::Jump(t) | Op::RepeatNext(t) => *t = target,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_else_layout() {
        let ops = flatten(&[Stmt::If {
            cond: Expr::var("c"),
            then: vec![Stmt::ResetTimer],
            otherwise: vec![Stmt::CreateClone, Stmt::CreateClone],
        }]);
        assert_eq!(ops.len(), 5);
        assert!(matches!(ops[0], Op::JumpUnless(_, 3)));
        assert!(matches!(ops[2], Op::Jump(5)));
    }

    #[test]
    fn test_loops_jump_back_to_their_head() {
        let ops = flatten(&[
            Stmt::Repeat {
                count: Expr::num(3.0),
                body: vec![Stmt::ResetTimer],
            },
            Stmt::Forever(vec![Stmt::StopThisScript]),
        ]);
        assert!(matches!(ops[0], Op::RepeatStart(_)));
        assert!(matches!(ops[1], Op::RepeatNext(4)));
        assert!(matches!(ops[3], Op::LoopEnd(1)));
        assert!(matches!(ops[4], Op::Stop));
        assert!(matches!(ops[5], Op::LoopEnd(4)));
    }
}
