//! Target IR for the nano compiler.
//!
//! The target offers named global cells, growable 1-indexed lists and
//! procedures with positional parameters, started by hat scripts. This
//! crate models that surface and renders it as goboscript text; `nano-vm`
//! executes the same structures directly.

pub mod ir;
pub mod program;
pub mod render;
pub mod value;

pub use ir::{BinOp, Expr, MathOp, Stmt};
pub use program::{Hat, Proc, Script, Unit};
pub use render::render;
pub use value::Value;
