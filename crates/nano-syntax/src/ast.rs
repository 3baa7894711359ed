//! Typed AST produced by the nano AST builder.
//!
//! Every expression node carries its resolved [`ValueType`] and whether it is
//! a compile-time constant. Implicit conversions are explicit [`ExprKind::Cast`]
//! nodes, so later stages never need to re-derive coercions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::builtin::Builtin;
use crate::types::ValueType;

/// Index of a local variable within its function or event.
pub type LocalId = usize;

/// A literal or folded constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Number(_) => ValueType::Number,
            Literal::String(_) => ValueType::String,
            Literal::Bool(_) => ValueType::Bool,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", format_number(*n)),
            Literal::String(s) => write!(f, "{}", s),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Formats a number the way block runtimes print it: `3`, `0.5`, `Infinity`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e16 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Concat => "&",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Where a variable reference resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A local of the enclosing function or event.
    Local(LocalId),
    /// The n-th parameter of the enclosing function.
    Param(usize),
    /// A unit-wide static declared in the stage.
    Static,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    User,
    Builtin(Builtin),
}

/// A typed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: ValueType,
    /// True when the value is known at compile time.
    pub constant: bool,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Literal),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Variable {
        name: String,
        binding: Binding,
    },
    Call {
        name: String,
        callee: Callee,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    AddressOf(Box<Expr>),
    Indirect(Box<Expr>),
    Cast(Box<Expr>),
}

impl Expr {
    /// Whether `&expr` is meaningful: variables, indexing and indirection.
    pub fn is_addressable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Variable { .. } | ExprKind::Index { .. } | ExprKind::Indirect(_)
        )
    }
}

/// The tail of an assignment after the variable name.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// `x = value`
    Set,
    /// `x += value`
    Increment,
    /// `x[index] ...`, continuing with the element as the new target
    Index { index: Expr, then: Box<AssignTarget> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    /// Control never reaches the end of the block.
    pub unescapable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    Single(Box<Stmt>),
    Block(Block),
}

impl Branch {
    pub fn is_unescapable(&self) -> bool {
        match self {
            Branch::Single(stmt) => stmt.is_unescapable(),
            Branch::Block(block) => block.unescapable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDeclare {
        local: LocalId,
        name: String,
        ty: ValueType,
        init: Option<Expr>,
    },
    VarAssign {
        name: String,
        binding: Binding,
        /// Type of the variable itself.
        ty: ValueType,
        target: AssignTarget,
        value: Expr,
    },
    Call(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Branch,
        otherwise: Option<Branch>,
    },
    While {
        cond: Expr,
        body: Branch,
    },
    Repeat {
        count: Expr,
        body: Branch,
    },
    Forever {
        body: Branch,
    },
    DeleteInstance,
}

impl Stmt {
    /// True when no statement after this one can run.
    pub fn is_unescapable(&self) -> bool {
        match self {
            Stmt::Return(_) | Stmt::Forever { .. } | Stmt::DeleteInstance => true,
            Stmt::If {
                then,
                otherwise: Some(otherwise),
                ..
            } => then.is_unescapable() && otherwise.is_unescapable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    /// Run without yielding between loop iterations.
    pub warp: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ValueType,
}

/// Per-function bookkeeping for a declared local.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: String,
    pub ty: ValueType,
    pub address_taken: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: ValueType,
    pub attributes: Attributes,
    pub body: Block,
    pub locals: Vec<LocalVar>,
    pub line: usize,
    pub col: usize,
}

impl Function {
    /// Cells the caller pushes for the arguments.
    pub fn params_size(&self) -> usize {
        self.params.iter().map(|p| p.ty.size()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Flag,
    KeyPressed,
    Clicked,
    BackdropSwitched,
    Loudness,
    Timer,
    BroadcastReceived,
    CloneStart,
}

impl EventKind {
    pub fn lookup(name: &str) -> Option<EventKind> {
        let kind = match name {
            "flag" => EventKind::Flag,
            "key" => EventKind::KeyPressed,
            "click" => EventKind::Clicked,
            "backdrop" => EventKind::BackdropSwitched,
            "loudness" => EventKind::Loudness,
            "timer" => EventKind::Timer,
            "broadcast" => EventKind::BroadcastReceived,
            "clone" => EventKind::CloneStart,
            _ => return None,
        };
        Some(kind)
    }

    /// Type of the constant parameter this event requires, if any.
    pub fn param_type(self) -> Option<ValueType> {
        match self {
            EventKind::KeyPressed | EventKind::BackdropSwitched | EventKind::BroadcastReceived => {
                Some(ValueType::String)
            }
            EventKind::Loudness | EventKind::Timer => Some(ValueType::Number),
            EventKind::Flag | EventKind::Clicked | EventKind::CloneStart => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub param: Option<Literal>,
    pub attributes: Attributes,
    pub body: Block,
    pub locals: Vec<LocalVar>,
}

/// A stage-level variable with a constant initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticVar {
    pub name: String,
    pub ty: ValueType,
    pub init: Literal,
}

/// One compiled source unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub costumes: Vec<String>,
    pub sounds: Vec<String>,
    pub statics: Vec<StaticVar>,
    /// Statics whose address is taken anywhere in this unit.
    pub addressed_statics: BTreeSet<String>,
    pub functions: BTreeMap<String, Function>,
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(lit: Literal) -> Expr {
        Expr {
            ty: lit.value_type(),
            kind: ExprKind::Constant(lit),
            constant: true,
            line: 1,
            col: 1,
        }
    }

    #[test]
    fn only_places_are_addressable() {
        let c = constant(Literal::Number(1.0));
        assert!(!c.is_addressable());
        let v = Expr {
            kind: ExprKind::Variable {
                name: "x".into(),
                binding: Binding::Local(0),
            },
            ty: ValueType::Number,
            constant: false,
            line: 1,
            col: 1,
        };
        assert!(v.is_addressable());
    }

    #[test]
    fn if_is_unescapable_only_when_both_branches_are() {
        let cond = constant(Literal::Bool(true));
        let ret = Stmt::Return(None);
        let open = Stmt::If {
            cond: cond.clone(),
            then: Branch::Single(Box::new(ret.clone())),
            otherwise: None,
        };
        assert!(!open.is_unescapable());
        let closed = Stmt::If {
            cond,
            then: Branch::Single(Box::new(ret.clone())),
            otherwise: Some(Branch::Block(Block {
                stmts: vec![ret],
                unescapable: true,
            })),
        };
        assert!(closed.is_unescapable());
    }

    #[test]
    fn numbers_print_like_the_runtime() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(Literal::Bool(true).to_string(), "true");
    }

    #[test]
    fn event_parameter_types() {
        assert_eq!(EventKind::lookup("key").and_then(|k| k.param_type()), Some(ValueType::String));
        assert_eq!(EventKind::Timer.param_type(), Some(ValueType::Number));
        assert_eq!(EventKind::Flag.param_type(), None);
        assert_eq!(EventKind::lookup("tick"), None);
    }
}
