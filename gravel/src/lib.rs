//! Gravel: a small dynamically-typed scripting language, interpreted.
//!
//! This crate is the embeddable core of the Gravel interpreter: the lexer, the
//! parser that builds a nested scope tree, the executor that runs instructions
//! against that tree, the tagged-value/heap model, and the builtin function
//! registry.  The `gravel-shell` crate layers a REPL and a script runner on top,
//! and `gravel-app` provides the `gvs` command-line tool.
//!
//! The primary API is [`Interp`]:
//!
//! ```
//! use gravel::Interp;
//!
//! let mut interp = Interp::new();
//! interp
//!     .eval_source(
//!         "func Main; fetch x, Add, 2, 3; return x; end;",
//!         "<demo>",
//!     )
//!     .expect("script runs");
//! let result = interp.take_ret_val();
//! assert_eq!(interp.render(&result), "5");
//! ```
//!
//! See the [`interp`] module documentation for the execution model: global
//! statements first, then one pass over every namespace, then `Main`.

pub mod builtins;
pub mod interp;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod scope;
pub mod token;
pub mod types;
pub mod value;

pub use crate::interp::Interp;
pub use crate::types::{check_args, Exception, GravelResult};
pub use crate::value::Variant;
