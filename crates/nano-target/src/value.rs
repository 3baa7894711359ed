//! Scalar values stored in cells and list items.

use std::cmp::Ordering;
use std::fmt;

use nano_syntax::ast::format_number;

/// A value as the block runtime sees it. Every value converts to every
/// other kind; the conversions below follow the runtime's loose rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn zero() -> Self {
        Value::Num(0.0)
    }

    pub fn to_num(&self) -> f64 {
        match self {
            Value::Num(n) if n.is_nan() => 0.0,
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Str(s) => parse_num(s).unwrap_or(0.0),
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        }
    }

    /// The numeric reading of this value, if it looks like a number.
    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Num(n) if n.is_nan() => None,
            Value::Num(n) => Some(*n),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Str(s) => parse_num(s),
        }
    }

    /// Numeric comparison when both sides look numeric, otherwise a
    /// case-insensitive string comparison.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self
                .to_string()
                .to_lowercase()
                .cmp(&other.to_string().to_lowercase()),
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

fn parse_num(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    match t {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => t.parse::<f64>().ok().filter(|n| n.is_finite()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from(" 12 ").to_num(), 12.0);
        assert_eq!(Value::from("").to_num(), 0.0);
        assert_eq!(Value::from("abc").to_num(), 0.0);
        assert_eq!(Value::from(true).to_num(), 1.0);
        assert_eq!(Value::Num(f64::NAN).to_num(), 0.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from("yes").to_bool());
        assert!(!Value::from("FALSE").to_bool());
        assert!(!Value::from("0").to_bool());
        assert!(!Value::from("").to_bool());
        assert!(Value::from(-1.0).to_bool());
        assert!(!Value::zero().to_bool());
    }

    #[test]
    fn test_comparison() {
        assert!(Value::from("10").loose_eq(&Value::from(10.0)));
        assert!(Value::from("Apple").loose_eq(&Value::from("apple")));
        assert_eq!(Value::from("9").compare(&Value::from("10")), Ordering::Less);
        assert_eq!(Value::from("b").compare(&Value::from("A")), Ordering::Greater);
        assert!(Value::from(true).loose_eq(&Value::from(1.0)));
        assert!(!Value::from("").loose_eq(&Value::from(0.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(0.25).to_string(), "0.25");
        assert_eq!(Value::from(false).to_string(), "false");
    }
}
