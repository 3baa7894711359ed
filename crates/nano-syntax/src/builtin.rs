//! Built-in function identifiers and signatures.

use crate::types::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Say,
    SayFor,
    Think,
    Ask,
    Answer,
    Wait,
    Broadcast,
    BroadcastWait,
    Clone,
    Timer,
    ResetTimer,
    Random,
    // Math
    Abs,
    Floor,
    Sqrt,
    SwitchCostume,
    // Heap
    Alloc,
    Free,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        let b = match name {
            "say" => Builtin::Say,
            "say_for" => Builtin::SayFor,
            "think" => Builtin::Think,
            "ask" => Builtin::Ask,
            "answer" => Builtin::Answer,
            "wait" => Builtin::Wait,
            "broadcast" => Builtin::Broadcast,
            "broadcast_wait" => Builtin::BroadcastWait,
            "clone" => Builtin::Clone,
            "timer" => Builtin::Timer,
            "reset_timer" => Builtin::ResetTimer,
            "random" => Builtin::Random,
            "abs" => Builtin::Abs,
            "floor" => Builtin::Floor,
            "sqrt" => Builtin::Sqrt,
            "switch_costume" => Builtin::SwitchCostume,
            "alloc" => Builtin::Alloc,
            "free" => Builtin::Free,
            _ => return None,
        };
        Some(b)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Say => "say",
            Builtin::SayFor => "say_for",
            Builtin::Think => "think",
            Builtin::Ask => "ask",
            Builtin::Answer => "answer",
            Builtin::Wait => "wait",
            Builtin::Broadcast => "broadcast",
            Builtin::BroadcastWait => "broadcast_wait",
            Builtin::Clone => "clone",
            Builtin::Timer => "timer",
            Builtin::ResetTimer => "reset_timer",
            Builtin::Random => "random",
            Builtin::Abs => "abs",
            Builtin::Floor => "floor",
            Builtin::Sqrt => "sqrt",
            Builtin::SwitchCostume => "switch_costume",
            Builtin::Alloc => "alloc",
            Builtin::Free => "free",
        }
    }

    /// Parameter types, in call order.
    pub fn params(self) -> Vec<ValueType> {
        use ValueType::{Number, String};
        match self {
            Builtin::Say | Builtin::Think | Builtin::Ask => vec![String],
            Builtin::SayFor => vec![String, Number],
            Builtin::Broadcast | Builtin::BroadcastWait | Builtin::SwitchCostume => vec![String],
            Builtin::Wait | Builtin::Abs | Builtin::Floor | Builtin::Sqrt => vec![Number],
            Builtin::Random => vec![Number, Number],
            Builtin::Alloc | Builtin::Free => vec![Number],
            Builtin::Answer | Builtin::Clone | Builtin::Timer | Builtin::ResetTimer => Vec::new(),
        }
    }

    pub fn return_type(self) -> ValueType {
        match self {
            Builtin::Ask | Builtin::Answer => ValueType::String,
            Builtin::Timer
            | Builtin::Random
            | Builtin::Abs
            | Builtin::Floor
            | Builtin::Sqrt
            | Builtin::Alloc => ValueType::Number,
            _ => ValueType::Void,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_round_trips_names() {
        for name in ["say", "say_for", "ask", "alloc", "free", "broadcast_wait", "random"] {
            let b = Builtin::lookup(name).expect("known builtin");
            assert_eq!(b.name(), name);
        }
        assert_eq!(Builtin::lookup("print"), None);
    }

    #[test]
    fn signatures() {
        assert_eq!(Builtin::SayFor.params(), vec![ValueType::String, ValueType::Number]);
        assert_eq!(Builtin::Ask.return_type(), ValueType::String);
        assert_eq!(Builtin::Alloc.return_type(), ValueType::Number);
        assert!(Builtin::Free.return_type().is_void());
    }
}
