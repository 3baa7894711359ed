//! Compile-time evaluation of constant expressions.
//!
//! Folding follows the runtime's loose semantics (case-insensitive string
//! equality, numeric comparison of numeric strings, floored modulo) so a
//! folded value matches what the emitted code would compute.

use std::cmp::Ordering;

use nano_syntax::ast::{format_number, BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use nano_syntax::types::ValueType;

/// Evaluates a constant expression. Returns `None` for non-constant input.
pub fn evaluate(expr: &Expr) -> Option<Literal> {
    if !expr.constant {
        return None;
    }
    match &expr.kind {
        ExprKind::Constant(lit) => Some(lit.clone()),
        ExprKind::Unary { op, operand } => match (op, evaluate(operand)?) {
            (UnaryOp::Neg, Literal::Number(n)) => Some(Literal::Number(-n)),
            (UnaryOp::Not, Literal::Bool(b)) => Some(Literal::Bool(!b)),
            _ => None,
        },
        ExprKind::Binary { op, lhs, rhs } => binary(*op, evaluate(lhs)?, evaluate(rhs)?),
        ExprKind::Cast(inner) => cast(evaluate(inner)?, &expr.ty),
        _ => None,
    }
}

/// True when `expr` is a constant that folds to boolean true.
pub fn is_always_true(expr: &Expr) -> bool {
    evaluate(expr) == Some(Literal::Bool(true))
}

fn binary(op: BinaryOp, a: Literal, b: Literal) -> Option<Literal> {
    use Literal::*;
    let lit = match (op, a, b) {
        (BinaryOp::Add, Number(x), Number(y)) => Number(x + y),
        (BinaryOp::Sub, Number(x), Number(y)) => Number(x - y),
        (BinaryOp::Mul, Number(x), Number(y)) => Number(x * y),
        (BinaryOp::Div, Number(x), Number(y)) => Number(x / y),
        (BinaryOp::Mod, Number(x), Number(y)) => Number(x - y * (x / y).floor()),
        (BinaryOp::Concat, String(x), String(y)) => String(x + &y),
        (BinaryOp::And, Bool(x), Bool(y)) => Bool(x && y),
        (BinaryOp::Or, Bool(x), Bool(y)) => Bool(x || y),
        (op, x, y) => {
            let ord = compare(&x, &y)?;
            Bool(match op {
                BinaryOp::Eq => ord == Ordering::Equal,
                BinaryOp::Ne => ord != Ordering::Equal,
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Gt => ord == Ordering::Greater,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Ge => ord != Ordering::Less,
                _ => return None,
            })
        }
    };
    Some(lit)
}

fn compare(a: &Literal, b: &Literal) -> Option<Ordering> {
    match (a, b) {
        (Literal::Number(x), Literal::Number(y)) => x.partial_cmp(y),
        (Literal::Bool(x), Literal::Bool(y)) => Some(x.cmp(y)),
        (Literal::String(x), Literal::String(y)) => {
            match (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
                (Ok(p), Ok(q)) if !x.trim().is_empty() && !y.trim().is_empty() => p.partial_cmp(&q),
                _ => Some(x.to_lowercase().cmp(&y.to_lowercase())),
            }
        }
        _ => None,
    }
}

fn cast(lit: Literal, to: &ValueType) -> Option<Literal> {
    let out = match (lit, to) {
        (Literal::Number(n), ValueType::Number | ValueType::Pointer(_)) => Literal::Number(n),
        (Literal::Number(n), ValueType::String) => Literal::String(format_number(n)),
        (Literal::Number(n), ValueType::Bool) => Literal::Bool(n != 0.0),
        (Literal::Bool(b), ValueType::Number) => Literal::Number(if b { 1.0 } else { 0.0 }),
        (Literal::Bool(b), ValueType::String) => Literal::String(b.to_string()),
        (Literal::Bool(b), ValueType::Bool) => Literal::Bool(b),
        (Literal::String(s), ValueType::String) => Literal::String(s),
        (Literal::String(s), ValueType::Number) => Literal::Number(s.trim().parse().unwrap_or(0.0)),
        _ => return None,
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(l: Literal) -> Expr {
        Expr {
            ty: l.value_type(),
            kind: ExprKind::Constant(l),
            constant: true,
            line: 1,
            col: 1,
        }
    }

    fn bin(op: BinaryOp, a: Expr, b: Expr, ty: ValueType) -> Expr {
        Expr {
            constant: a.constant && b.constant,
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(a),
                rhs: Box::new(b),
            },
            ty,
            line: 1,
            col: 1,
        }
    }

    #[test]
    fn folds_arithmetic() {
        let e = bin(
            BinaryOp::Add,
            lit(Literal::Number(1.0)),
            bin(
                BinaryOp::Mul,
                lit(Literal::Number(2.0)),
                lit(Literal::Number(3.0)),
                ValueType::Number,
            ),
            ValueType::Number,
        );
        assert_eq!(evaluate(&e), Some(Literal::Number(7.0)));
    }

    #[test]
    fn modulo_is_floored() {
        let e = bin(
            BinaryOp::Mod,
            lit(Literal::Number(-7.0)),
            lit(Literal::Number(3.0)),
            ValueType::Number,
        );
        assert_eq!(evaluate(&e), Some(Literal::Number(2.0)));
    }

    #[test]
    fn string_equality_ignores_case() {
        let e = bin(
            BinaryOp::Eq,
            lit(Literal::String("Apple".into())),
            lit(Literal::String("apple".into())),
            ValueType::Bool,
        );
        assert!(is_always_true(&e));
    }

    #[test]
    fn casts_fold() {
        let e = Expr {
            kind: ExprKind::Cast(Box::new(lit(Literal::Number(1.0)))),
            ty: ValueType::Bool,
            constant: true,
            line: 1,
            col: 1,
        };
        assert!(is_always_true(&e));
        assert_eq!(cast(Literal::Number(2.5), &ValueType::String), Some(Literal::String("2.5".into())));
        assert_eq!(cast(Literal::String(" 12 ".into()), &ValueType::Number), Some(Literal::Number(12.0)));
    }

    #[test]
    fn non_constant_is_not_folded() {
        let mut e = lit(Literal::Number(1.0));
        e.constant = false;
        assert_eq!(evaluate(&e), None);
    }
}
