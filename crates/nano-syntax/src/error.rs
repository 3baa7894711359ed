//! Error handling types shared by every stage of the nano toolchain.
//!
//! A single [`Error`] type travels from the lexer through the AST builder, the
//! code generator and the VM. Source errors carry a 1-based line and column;
//! internal invariant violations carry neither and are framed with an
//! `internal:` prefix so they are never mistaken for user mistakes.
//!
//! # Examples
//!
//! ```rust
//! use nano_syntax::error::{error_at, Error, ErrorKind, Result};
//!
//! fn expect_number(found: &str, line: usize, col: usize) -> Result<f64> {
//!     found
//!         .parse()
//!         .or_else(|_| error_at(line, col, format!("expected a number, found '{}'", found)))
//! }
//!
//! let err = expect_number("abc", 3, 7).unwrap_err();
//! assert_eq!(err.to_string(), "expected a number, found 'abc' at 3:7");
//! assert_eq!(Error::internal("lost a frame").kind, ErrorKind::Internal);
//! ```

use std::fmt;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A problem with the program being compiled or executed.
    Compile,
    /// A broken invariant inside the toolchain itself.
    Internal,
}

/// An error raised while compiling or executing a nano program.
///
/// # Fields
///
/// - `msg`: human-readable description
/// - `line`: optional 1-based line in the source unit
/// - `col`: optional 1-based column in the source unit
/// - `kind`: whether the fault lies with the program or the toolchain
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// Human-readable error message
    pub msg: String,

    /// Optional line number in source file (1-based)
    pub line: Option<usize>,

    /// Optional column number in source file (1-based)
    pub col: Option<usize>,

    /// Category of the failure
    pub kind: ErrorKind,
}

impl Error {
    /// Creates an unlocated compile error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            line: None,
            col: None,
            kind: ErrorKind::Compile,
        }
    }

    /// Creates a compile error pointing at `line`:`col`.
    ///
    /// ```rust
    /// use nano_syntax::Error;
    ///
    /// let error = Error::with_span("expected 'end'", 5, 12);
    /// assert_eq!(error.to_string(), "expected 'end' at 5:12");
    /// ```
    pub fn with_span(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            msg: msg.into(),
            line: Some(line),
            col: Some(col),
            kind: ErrorKind::Compile,
        }
    }

    /// Creates an internal error. The message is prefixed with `internal: `.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            msg: format!("internal: {}", msg.into()),
            line: None,
            col: None,
            kind: ErrorKind::Internal,
        }
    }

    /// Returns true when this error reports a toolchain bug.
    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(c)) = (self.line, self.col) {
            write!(f, "{} at {}:{}", self.msg, l, c)
        } else {
            write!(f, "{}", self.msg)
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new(s)
    }
}
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::new(s)
    }
}

/// A specialized `Result` type for nano operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for `Err(Error::new(msg))`.
pub fn error<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::new(msg))
}

/// Shorthand for `Err(Error::with_span(msg, line, col))`.
pub fn error_at<T>(line: usize, col: usize, msg: impl Into<String>) -> Result<T> {
    Err(Error::with_span(msg, line, col))
}

/// Shorthand for `Err(Error::internal(msg))`.
pub fn internal<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::internal(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_errors_render_position() {
        let e = Error::with_span("undeclared identifier 'x'", 4, 9);
        assert_eq!(e.to_string(), "undeclared identifier 'x' at 4:9");
        assert!(!e.is_internal());
    }

    #[test]
    fn internal_errors_are_prefixed_and_unlocated() {
        let e = Error::internal("frame height went negative");
        assert_eq!(e.to_string(), "internal: frame height went negative");
        assert_eq!(e.line, None);
        assert!(e.is_internal());
    }

    #[test]
    fn helpers_wrap_in_err() {
        let r: Result<()> = error_at(1, 2, "boom");
        assert_eq!(r.unwrap_err().col, Some(2));
        let r: Result<()> = internal("boom");
        assert!(r.unwrap_err().is_internal());
    }
}
