//! Bytecode to AST reconstruction.
//!
//! The decompiler walks a vector once, rebuilding expressions on a value
//! stack and statements from the control-flow opcodes and their label
//! operands. Code generation is deterministic, so every construct has exactly
//! one layout and the walk can insist on it: anything else is a corrupt
//! program and aborts.
//!
//! Given a target pc, the walk also reports the *hot node*, the innermost
//! statement (or statement part) whose code contains that pc. The line
//! resolver in [`lines`] turns that into a source line.

mod decompile;
mod lines;

#[cfg(test)]
mod decompile_test;
#[cfg(test)]
mod lines_test;

use serde::{Deserialize, Serialize};

use crate::Vec;
use crate::ast::Stmt;

pub use decompile::{decompile, decompile_program};
pub use lines::{find_line_number, line_count};

/// One step from a statement list into a nested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// The n-th statement of the current list.
    Stmt(usize),
    /// Arm `k` of an `if`. As the last step, the header of an `elseif`.
    Arm(usize),
    /// The `else` body.
    Otherwise,
    /// The body of a loop, `fork`, or `try`.
    Body,
    /// Handler `k` of a `try`. As the last step, its `except` header.
    Except(usize),
    /// The `finally` handler.
    Finally,
}

/// Where inside the located node the pc falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// The node's own header or expression.
    Top,
    /// The code closing a `try` body, before its handlers.
    EndBody,
    /// The code closing a compound statement.
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotNode {
    pub path: Vec<Step>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decompiled {
    pub body: Vec<Stmt>,
    pub hot: Option<HotNode>,
}
