//! moocode - MOO verb bytecode compiler and decompiler
//!
//! # Overview
//!
//! This crate turns a parsed MOO verb body into the compact, relocatable
//! bytecode a MOO server executes, and turns that bytecode back into a
//! syntax tree. The decompiler doubles as the server's line-number oracle:
//! given a pc it reports which source line is executing.
//!
//! # Quick Start
//!
//! ```
//! use moocode::{CompilationOptions, Program, UnparseOptions};
//! use moocode::ast::{Expr, Names, ParsedVerb, Stmt};
//!
//! let mut names = Names::new();
//! let x = names.find_or_add("x");
//! let verb = ParsedVerb::new(
//!     names,
//!     vec![
//!         Stmt::Expr(Expr::assign(Expr::var(x), Expr::int(41))),
//!         Stmt::Return(Some(Expr::var(x))),
//!     ],
//! );
//!
//! let program: Program = moocode::compile(&verb, &CompilationOptions::default());
//! let source = moocode::unparse_program(&program, &["length"], &UnparseOptions::default());
//! assert_eq!(source, vec!["x = 41;", "return x;"]);
//! assert_eq!(program.line_for(moocode::VectorId::Main, 0), 1);
//! ```
//!
//! # Persistence
//!
//! Programs serialize with [`Program::to_bytes`] and come back with
//! [`Program::from_bytes`]. The only recoverable errors in this crate are
//! the [`FormatError`]s raised there; everything else is an internal
//! invariant and aborts.

pub use moocode_core::api::{CompilationOptions, UnparseOptions};
pub use moocode_core::compiler::generate as compile;
pub use moocode_core::decompiler::{
    Decompiled, HotNode, Position, Step, decompile_program, find_line_number, line_count,
};
pub use moocode_core::errors::FormatError;
pub use moocode_core::program::{FormatVersion, Program, VectorId};
pub use moocode_core::unparse::{BuiltinNames, unparse, unparse_program};

pub use moocode_core::{ast, disasm, values};
