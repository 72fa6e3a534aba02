use serde::{Deserialize, Serialize};

use super::{CatchCodes, Expr, VarId};
use crate::Vec;

/// One `if`/`elseif` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondArm {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// One `except` arm of a `try`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptArm {
    /// Variable receiving the exception tuple, if named.
    pub id: Option<VarId>,
    pub codes: CatchCodes,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `if`, zero or more `elseif`, optional `else`. `arms` is never empty.
    Cond {
        arms: Vec<CondArm>,
        otherwise: Option<Vec<Stmt>>,
    },
    /// `for id in (expr)`
    ForList {
        id: VarId,
        expr: Expr,
        body: Vec<Stmt>,
    },
    /// `for id in [from..to]`
    ForRange {
        id: VarId,
        from: Expr,
        to: Expr,
        body: Vec<Stmt>,
    },
    While {
        id: Option<VarId>,
        condition: Expr,
        body: Vec<Stmt>,
    },
    Fork {
        id: Option<VarId>,
        delay: Expr,
        body: Vec<Stmt>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    TryExcept {
        body: Vec<Stmt>,
        excepts: Vec<ExceptArm>,
    },
    TryFinally {
        body: Vec<Stmt>,
        handler: Vec<Stmt>,
    },
    /// Exits the innermost loop, or the loop named by the id.
    Break(Option<VarId>),
    Continue(Option<VarId>),
}
