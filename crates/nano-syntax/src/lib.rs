pub mod ast;
pub mod builtin;
pub mod error;
pub mod token;
pub mod types;

pub use ast::*;
pub use builtin::Builtin;
pub use error::*;
pub use token::*;
pub use types::ValueType;
