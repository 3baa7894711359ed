//! Token definitions produced by the nano lexer.
//!
//! Tokens are the smallest meaningful units of a source unit: identifiers,
//! literals, keywords, operators and punctuation. Every token remembers the
//! 1-based line and column where it starts; the AST builder relies on line
//! numbers to tell a single-statement branch (`if x: say("hi")`) from a
//! block branch whose statements begin on the following line.
//!
//! ```rust
//! use nano_syntax::{Token, TokenKind};
//!
//! let keyword = Token { kind: TokenKind::Func, line: 1, col: 1 };
//! let name = Token { kind: TokenKind::Ident("fact".to_string()), line: 1, col: 6 };
//! assert_eq!(keyword.kind.describe(), "'func'");
//! assert_eq!(name.kind.describe(), "identifier 'fact'");
//! ```

/// Token types that can be produced by the nano lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Literals ===
    /// An identifier: variable, function or built-in name
    Ident(String),

    /// A numeric literal; integers and decimals share one representation
    Number(f64),

    /// A string literal with escapes already resolved
    String(String),

    // === Keywords ===
    /// `func` declares a function
    Func,
    /// `var` declares a variable
    Var,
    /// `return` leaves the current function or event
    Return,
    /// `if` opens a conditional chain
    If,
    /// `elseif` continues a conditional chain
    Elseif,
    /// `else` closes a conditional chain
    Else,
    /// `while` loops while a condition holds
    While,
    /// `repeat` loops a fixed number of times
    Repeat,
    /// `forever` loops unconditionally
    Forever,
    /// `end` closes a block
    End,
    /// `drop` deletes the running instance
    Drop,
    /// `on` registers an event handler
    On,
    /// `costume` declares a costume asset
    Costume,
    /// `sound` declares a sound asset
    Sound,
    /// Boolean literal `true`
    True,
    /// Boolean literal `false`
    False,
    /// Logical `and`
    And,
    /// Logical `or`
    Or,
    /// Logical `not`
    Not,
    /// Type keyword `void`
    Void,
    /// Type keyword `number`
    NumberType,
    /// Type keyword `string`
    StringType,
    /// Type keyword `bool`
    BoolType,

    // === Punctuation ===
    Comma,
    /// `:` introduces types and branches
    Colon,
    /// `@` introduces an attribute
    At,
    LParen,
    RParen,
    LBracket,
    RBracket,

    // === Operators ===
    /// Assignment `=`
    Equal,
    /// Increment `+=`
    PlusEqual,
    Plus,
    Minus,
    /// `*` multiplies, declares pointer types and dereferences
    Star,
    Slash,
    Percent,
    /// `&` concatenates strings or takes an address
    Amp,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    /// End-of-file marker
    Eof,
}

impl TokenKind {
    /// Human-readable description used in parser diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::String(s) => format!("string \"{}\"", s),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Func => "func",
            TokenKind::Var => "var",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Elseif => "elseif",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Repeat => "repeat",
            TokenKind::Forever => "forever",
            TokenKind::End => "end",
            TokenKind::Drop => "drop",
            TokenKind::On => "on",
            TokenKind::Costume => "costume",
            TokenKind::Sound => "sound",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Void => "void",
            TokenKind::NumberType => "number",
            TokenKind::StringType => "string",
            TokenKind::BoolType => "bool",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::At => "@",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEq => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEq => ">=",
            TokenKind::Ident(_) | TokenKind::Number(_) | TokenKind::String(_) | TokenKind::Eof => "",
        }
    }

    /// Maps a word to its keyword token, if it is reserved.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "func" => TokenKind::Func,
            "var" => TokenKind::Var,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elseif" => TokenKind::Elseif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "repeat" => TokenKind::Repeat,
            "forever" => TokenKind::Forever,
            "end" => TokenKind::End,
            "drop" => TokenKind::Drop,
            "on" => TokenKind::On,
            "costume" => TokenKind::Costume,
            "sound" => TokenKind::Sound,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "void" => TokenKind::Void,
            "number" => TokenKind::NumberType,
            "string" => TokenKind::StringType,
            "bool" => TokenKind::BoolType,
            _ => return None,
        };
        Some(kind)
    }
}

/// A token with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The type and semantic content of this token
    pub kind: TokenKind,

    /// Line number in the source file (1-based)
    pub line: usize,

    /// Column number in the source file (1-based)
    pub col: usize,
}
