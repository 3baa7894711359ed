pub mod consteval;
mod expr;
pub mod parser;
pub mod scope;
mod stmt;

pub use parser::Parser;
