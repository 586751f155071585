//! Gravel Application Frameworks
//!
//! This crate layers two application conveniences over the [`gravel`] interpreter
//! core: an interactive [`repl`] with rustyline line editing, and a [`script`]
//! runner with command-line-friendly error reporting.  See the `gravel-app` crate
//! for the `gvs` binary that uses both.

mod shell;

pub use shell::{repl, script};
