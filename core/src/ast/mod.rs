//! Abstract syntax tree for verb bodies.
//!
//! The tree is produced by an external parser and consumed by the code
//! generator; the decompiler produces the same shapes back from bytecode.
//! Nodes own their children, so a tree can never contain a cycle.

mod expr;
mod names;
mod stmt;

pub use expr::{Arg, BinaryOp, BuiltinId, CatchCodes, Expr, ScatterItem, ScatterKind, UnaryOp};
pub use names::{Names, VarId};
pub use stmt::{CondArm, ExceptArm, Stmt};

use serde::{Deserialize, Serialize};

use crate::Vec;

/// Parser output for one verb: its variable table and statement list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedVerb {
    pub names: Names,
    pub body: Vec<Stmt>,
}

impl ParsedVerb {
    pub fn new(names: Names, body: Vec<Stmt>) -> Self {
        Self { names, body }
    }
}
