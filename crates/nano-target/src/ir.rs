//! Expressions and statements of the list-and-cell target.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Join,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Join => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Abs,
    Floor,
    Sqrt,
}

impl MathOp {
    pub fn name(self) -> &'static str {
        match self {
            MathOp::Abs => "abs",
            MathOp::Floor => "floor",
            MathOp::Sqrt => "sqrt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Value),
    /// A named global cell.
    Var(String),
    /// A parameter of the enclosing procedure.
    Arg(String),
    Item {
        list: String,
        index: Box<Expr>,
    },
    Length(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Math {
        op: MathOp,
        arg: Box<Expr>,
    },
    Random {
        low: Box<Expr>,
        high: Box<Expr>,
    },
    Answer,
    Timer,
    /// The n-th value pushed onto the thread stack during the current
    /// expression session. Only meaningful until it is resolved against
    /// the session's push count.
    Pending(usize),
}

impl Expr {
    pub fn num(n: f64) -> Self {
        Expr::Lit(Value::Num(n))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::Lit(Value::Str(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Lit(Value::Bool(b))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn arg(name: impl Into<String>) -> Self {
        Expr::Arg(name.into())
    }

    pub fn item(list: impl Into<String>, index: Expr) -> Self {
        Expr::Item {
            list: list.into(),
            index: Box::new(index),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        match (lhs, rhs) {
            (e, Expr::Lit(Value::Num(n))) | (Expr::Lit(Value::Num(n)), e) if n == 0.0 => e,
            (lhs, rhs) => Expr::binary(BinOp::Add, lhs, rhs),
        }
    }

    /// `self + n`, folding a literal zero away.
    pub fn offset(self, n: i64) -> Self {
        match n {
            0 => self,
            n if n < 0 => Expr::binary(BinOp::Sub, self, Expr::num(-n as f64)),
            n => Expr::binary(BinOp::Add, self, Expr::num(n as f64)),
        }
    }

    pub fn not(e: Expr) -> Self {
        Expr::Not(Box::new(e))
    }

    pub fn has_pending(&self) -> bool {
        match self {
            Expr::Pending(_) => true,
            Expr::Item { index, .. } => index.has_pending(),
            Expr::Binary { lhs, rhs, .. } => lhs.has_pending() || rhs.has_pending(),
            Expr::Not(e) | Expr::Math { arg: e, .. } => e.has_pending(),
            Expr::Random { low, high } => low.has_pending() || high.has_pending(),
            Expr::Lit(_) | Expr::Var(_) | Expr::Arg(_) | Expr::Length(_) | Expr::Answer | Expr::Timer => false,
        }
    }

    /// Rebuilds the expression with every `Pending(n)` replaced by `f(n)`.
    pub fn map_pending(&self, f: &impl Fn(usize) -> Expr) -> Expr {
        match self {
            Expr::Pending(n) => f(*n),
            Expr::Item { list, index } => Expr::Item {
                list: list.clone(),
                index: Box::new(index.map_pending(f)),
            },
            Expr::Binary { op, lhs, rhs } => Expr::binary(*op, lhs.map_pending(f), rhs.map_pending(f)),
            Expr::Not(e) => Expr::not(e.map_pending(f)),
            Expr::Math { op, arg } => Expr::Math {
                op: *op,
                arg: Box::new(arg.map_pending(f)),
            },
            Expr::Random { low, high } => Expr::Random {
                low: Box::new(low.map_pending(f)),
                high: Box::new(high.map_pending(f)),
            },
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Set {
        var: String,
        value: Expr,
    },
    Change {
        var: String,
        by: Expr,
    },
    /// Appends to the end of a list.
    Append {
        list: String,
        value: Expr,
    },
    Replace {
        list: String,
        index: Expr,
        value: Expr,
    },
    DeleteAll(String),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Repeat {
        count: Expr,
        body: Vec<Stmt>,
    },
    Until {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Forever(Vec<Stmt>),
    Call {
        proc: String,
        args: Vec<Expr>,
    },
    Say(Expr),
    SayFor(Expr, Expr),
    Think(Expr),
    Ask(Expr),
    Wait(Expr),
    Broadcast(Expr),
    BroadcastAndWait(Expr),
    CreateClone,
    DeleteThisClone,
    ResetTimer,
    SwitchCostume(Expr),
    StopThisScript,
}

impl Stmt {
    pub fn set(var: impl Into<String>, value: Expr) -> Self {
        Stmt::Set {
            var: var.into(),
            value,
        }
    }

    pub fn change(var: impl Into<String>, by: Expr) -> Self {
        Stmt::Change { var: var.into(), by }
    }

    pub fn append(list: impl Into<String>, value: Expr) -> Self {
        Stmt::Append {
            list: list.into(),
            value,
        }
    }

    pub fn replace(list: impl Into<String>, index: Expr, value: Expr) -> Self {
        Stmt::Replace {
            list: list.into(),
            index,
            value,
        }
    }

    pub fn call(proc: impl Into<String>, args: Vec<Expr>) -> Self {
        Stmt::Call {
            proc: proc.into(),
            args,
        }
    }

    /// The expressions this statement evaluates directly, excluding nested bodies.
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Stmt::Set { value: e, .. }
            | Stmt::Change { by: e, .. }
            | Stmt::Append { value: e, .. }
            | Stmt::If { cond: e, .. }
            | Stmt::Repeat { count: e, .. }
            | Stmt::Until { cond: e, .. }
            | Stmt::Say(e)
            | Stmt::Think(e)
            | Stmt::Ask(e)
            | Stmt::Wait(e)
            | Stmt::Broadcast(e)
            | Stmt::BroadcastAndWait(e)
            | Stmt::SwitchCostume(e) => vec![e],
            Stmt::Replace { index, value, .. } => vec![index, value],
            Stmt::SayFor(a, b) => vec![a, b],
            Stmt::Call { args, .. } => args.iter().collect(),
            Stmt::DeleteAll(_)
            | Stmt::Forever(_)
            | Stmt::CreateClone
            | Stmt::DeleteThisClone
            | Stmt::ResetTimer
            | Stmt::StopThisScript => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_folds_zero() {
        assert_eq!(Expr::add(Expr::var("x"), Expr::num(0.0)), Expr::var("x"));
        assert_eq!(Expr::add(Expr::num(0.0), Expr::var("x")), Expr::var("x"));
        assert!(matches!(
            Expr::add(Expr::var("x"), Expr::num(2.0)),
            Expr::Binary { op: BinOp::Add, .. }
        ));
        assert_eq!(Expr::var("x").offset(0), Expr::var("x"));
        assert_eq!(
            Expr::var("x").offset(-2),
            Expr::binary(BinOp::Sub, Expr::var("x"), Expr::num(2.0))
        );
    }

    #[test]
    fn test_map_pending() {
        let e = Expr::binary(
            BinOp::Join,
            Expr::Pending(0),
            Expr::item("memory", Expr::Pending(1)),
        );
        assert!(e.has_pending());
        let resolved = e.map_pending(&|n| Expr::num(n as f64 + 10.0));
        assert!(!resolved.has_pending());
        assert_eq!(
            resolved,
            Expr::binary(BinOp::Join, Expr::num(10.0), Expr::item("memory", Expr::num(11.0)))
        );
    }

    #[test]
    fn test_operands_skip_bodies() {
        let stmt = Stmt::If {
            cond: Expr::var("c"),
            then: vec![Stmt::Say(Expr::Pending(0))],
            otherwise: Vec::new(),
        };
        assert_eq!(stmt.operands(), vec![&Expr::var("c")]);
        let call = Stmt::call("f", vec![Expr::num(1.0), Expr::num(2.0)]);
        assert_eq!(call.operands().len(), 2);
    }
}
