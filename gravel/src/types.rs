//! Public Type Declarations
//!
//! This module defines the types used throughout Gravel's public API.  The most important
//! are [`GravelResult`], the standard result of evaluating Gravel code, and [`Exception`],
//! the error half of that result.  See also [`Variant`](../value/index.html), the type of
//! all Gravel values, which gets its own module.

use crate::value::{Heap, Variant};
use std::fmt;

/// The integer type used by Gravel `int` values.
pub type GravelInt = i64;

/// The float type used by Gravel `float` values.
pub type GravelFloat = f64;

/// The hasher used by all of Gravel's name-keyed tables.  FNV is a good fit for the
/// short identifier strings the interpreter keys on.
pub type GravelHasher = fnv::FnvBuildHasher;

/// The standard result of evaluating Gravel code: a [`Variant`] on success, an
/// [`Exception`] otherwise.
pub type GravelResult = Result<Variant, Exception>;

/// The signature of a builtin function.
///
/// A builtin receives the heap (so it can read string/array payloads and allocate new
/// ones) and the already-resolved argument values, and produces a value or an
/// exception.  Builtins must never abort the process; every failure is reported as an
/// `Err`.
pub type BuiltinFunc = fn(&mut Heap, &[Variant]) -> GravelResult;

/// The broad classes of error a Gravel program can produce.  Every kind is fatal to
/// the run; the distinction exists for diagnostics and for tests.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A character buffer could not be classified as a keyword, number, or name.
    Lex,

    /// A malformed construct: wrong token count for a keyword form, unbalanced
    /// scopes, an unresolvable function, and so on.
    Syntax,

    /// A semantically rejected operation: assigning to a const, redeclaring a name,
    /// wrong call arity, an unresolvable import path.
    Rejected,

    /// A builtin received the wrong argument types or an out-of-range index.
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lex => write!(f, "lex error"),
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::Rejected => write!(f, "rejected"),
            ErrorKind::Runtime => write!(f, "runtime error"),
        }
    }
}

/// An exceptional return from Gravel code.
///
/// An `Exception` is an ordinary error; the interpreter has no catch mechanism, so
/// any exception propagates to the top-level driver and terminates the run.  Control
/// flow signals (early return from a function, the if/elif skip states) are *not*
/// exceptions; they travel in [`Flow`] and in the executor's behavior frames, so an
/// error can never be mistaken for control flow or vice versa.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Exception {
    kind: ErrorKind,
    message: String,
}

impl Exception {
    /// Creates an exception of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The error class.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable diagnostic, including the offending token text or scope
    /// name where the thrower had one.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Exception {}

/// The control signal produced by executing a single instruction.
///
/// `Flow` is consumed only by the scope-level driver loop: `Return` stops the owning
/// scope's instruction loop immediately (the call site resumes normally afterwards),
/// while `Normal` continues with the next instruction.  Keeping this separate from
/// [`Exception`] means ordinary errors and control flow cannot be confused.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Continue with the next instruction.
    Normal,

    /// A `return` instruction ran; stop executing the current scope.
    Return,
}

/// Checks a builtin's argument list against its arity, producing the standard
/// error message on mismatch.
///
/// `min` and `max` are inclusive bounds on `args.len()`; a `max` of 0 means "no upper
/// bound".  `argsig` is the signature text used in the error message.
///
/// # Example
///
/// ```
/// use gravel::check_args;
/// use gravel::value::Variant;
///
/// let args = [Variant::int(1), Variant::int(2)];
/// assert!(check_args("Add", &args, 2, 2, "a, b").is_ok());
/// assert!(check_args("Add", &args[..1], 2, 2, "a, b").is_err());
/// ```
pub fn check_args(
    name: &str,
    args: &[Variant],
    min: usize,
    max: usize,
    argsig: &str,
) -> Result<(), Exception> {
    if args.len() < min || (max > 0 && args.len() > max) {
        Err(Exception::new(
            ErrorKind::Runtime,
            format!("wrong # args: should be \"{} {}\"", name, argsig),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args() {
        let args = vec![Variant::int(1), Variant::int(2)];

        assert!(check_args("Add", &args, 2, 2, "a, b").is_ok());
        assert!(check_args("Print", &args, 1, 1, "text").is_err());
        assert!(check_args("List", &args, 1, 0, "value ...").is_ok());

        let err = check_args("Print", &args, 1, 1, "text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.message(), "wrong # args: should be \"Print text\"");
    }

    #[test]
    fn test_exception_display() {
        let e = Exception::new(ErrorKind::Syntax, "could not find function: Foo");
        assert_eq!(e.to_string(), "syntax error: could not find function: Foo");
    }
}
