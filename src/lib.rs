//! An embeddable shell-like command toolkit.
//!
//! Commands describe their options and arguments with a [`schema::CommandSchema`].
//! A raw line is lexed into words, split into clauses on `;`, `&&`, `||` and `|`
//! (with `<`, `>` and `>>` redirections attached), matched against each command's
//! schema into a [`parsed::ParsedCommand`], bound into a typed command through
//! [`command::Binder`], and run with short-circuit and pipe semantics.
//!
//! The main entry point is [`Interpreter`]. The lower layers ([`lexer`],
//! [`matcher`], [`clause`], [`execution`], [`runner`]) are public for embedders
//! that need only part of the pipeline.

mod builtin;
pub mod clause;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod execution;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod matcher;
pub mod parsed;
pub mod runner;
pub mod schema;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
