//! Value types and cast legality.

use std::fmt;

/// The static type of an expression, variable, parameter or return slot.
///
/// Pointer types nest: `number**` is `Pointer(Pointer(Number))`, and two
/// pointer types are equal exactly when their base types are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    Number,
    String,
    Bool,
    Pointer(Box<ValueType>),
}

impl ValueType {
    pub fn pointer_to(base: ValueType) -> Self {
        ValueType::Pointer(Box::new(base))
    }

    /// The type a pointer refers to, or `None` for non-pointers.
    pub fn pointee(&self) -> Option<&ValueType> {
        match self {
            ValueType::Pointer(base) => Some(base),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ValueType::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, ValueType::Pointer(_))
    }

    /// Number of memory cells a value of this type occupies.
    pub fn size(&self) -> usize {
        if self.is_void() {
            0
        } else {
            1
        }
    }

    /// Whether `to(self_value)` is a legal explicit cast.
    ///
    /// Identity always succeeds. Any non-void value converts to `string` or
    /// `number`; only numbers and pointers convert to `bool` or a pointer.
    pub fn can_cast_to(&self, to: &ValueType) -> bool {
        if self == to {
            return true;
        }
        if self.is_void() {
            return false;
        }
        match to {
            ValueType::Void => false,
            ValueType::String | ValueType::Number => true,
            ValueType::Bool | ValueType::Pointer(_) => {
                matches!(self, ValueType::Number | ValueType::Pointer(_))
            }
        }
    }

    /// Whether the compiler may insert this cast on its own.
    pub fn can_implicitly_cast_to(&self, to: &ValueType) -> bool {
        self == to
            || matches!(
                (self, to),
                (ValueType::Number, ValueType::Bool) | (ValueType::Number, ValueType::String)
            )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Void => write!(f, "void"),
            ValueType::Number => write!(f, "number"),
            ValueType::String => write!(f, "string"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Pointer(base) => write!(f, "{}*", base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr(t: ValueType) -> ValueType {
        ValueType::pointer_to(t)
    }

    #[test]
    fn pointer_equality_is_structural() {
        assert_eq!(ptr(ptr(ValueType::Number)), ptr(ptr(ValueType::Number)));
        assert_ne!(ptr(ValueType::Number), ptr(ValueType::String));
        assert_ne!(ptr(ValueType::Number), ValueType::Number);
    }

    #[test]
    fn explicit_casts() {
        use ValueType::*;
        for scalar in [Number, String, Bool, ptr(Bool)] {
            assert!(scalar.can_cast_to(&String), "{} -> string", scalar);
            assert!(scalar.can_cast_to(&Number), "{} -> number", scalar);
        }
        assert!(Number.can_cast_to(&Bool));
        assert!(ptr(Number).can_cast_to(&Bool));
        assert!(!String.can_cast_to(&Bool));
        assert!(Number.can_cast_to(&ptr(String)));
        assert!(ptr(Number).can_cast_to(&ptr(String)));
        assert!(!Bool.can_cast_to(&ptr(Number)));
        assert!(!String.can_cast_to(&ptr(Number)));
        assert!(Void.can_cast_to(&Void));
        assert!(!Void.can_cast_to(&Number));
        assert!(!Number.can_cast_to(&Void));
    }

    #[test]
    fn implicit_casts_are_narrow() {
        use ValueType::*;
        assert!(Number.can_implicitly_cast_to(&Bool));
        assert!(Number.can_implicitly_cast_to(&String));
        assert!(ptr(Bool).can_implicitly_cast_to(&ptr(Bool)));
        assert!(!Bool.can_implicitly_cast_to(&Number));
        assert!(!String.can_implicitly_cast_to(&Number));
        assert!(!Bool.can_implicitly_cast_to(&String));
        assert!(!ptr(Number).can_implicitly_cast_to(&Number));
    }

    #[test]
    fn display_and_size() {
        assert_eq!(ptr(ptr(ValueType::String)).to_string(), "string**");
        assert_eq!(ValueType::Void.size(), 0);
        assert_eq!(ptr(ValueType::Void).size(), 1);
    }
}
