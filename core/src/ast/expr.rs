use serde::{Deserialize, Serialize};

use super::VarId;
use crate::values::Value;
use crate::{Box, Vec};

/// Index into the host's built-in function registry.
pub type BuiltinId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
        }
    }
}

/// One call argument or list element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    Normal(Expr),
    /// `@expr`
    Splice(Expr),
}

/// Error codes an `except` arm or catch expression intercepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatchCodes {
    Any,
    Codes(Vec<Arg>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScatterKind {
    Required,
    /// `?name` or `?name = default`
    Optional,
    /// `@name`
    Rest,
}

/// One formal in a scatter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterItem {
    pub kind: ScatterKind,
    pub id: VarId,
    /// Only ever set for [`ScatterKind::Optional`].
    pub default: Option<Expr>,
}

impl ScatterItem {
    pub fn required(id: VarId) -> Self {
        Self { kind: ScatterKind::Required, id, default: None }
    }

    pub fn optional(id: VarId, default: Option<Expr>) -> Self {
        Self { kind: ScatterKind::Optional, id, default }
    }

    pub fn rest(id: VarId) -> Self {
        Self { kind: ScatterKind::Rest, id, default: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Var(VarId),
    Literal(Value),
    Prop {
        obj: Box<Expr>,
        name: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Range {
        base: Box<Expr>,
        from: Box<Expr>,
        to: Box<Expr>,
    },
    /// `$` inside an index or range: the length of the collection being indexed.
    Length,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call {
        func: BuiltinId,
        args: Vec<Arg>,
    },
    Verb {
        obj: Box<Expr>,
        verb: Box<Expr>,
        args: Vec<Arg>,
    },
    List(Vec<Arg>),
    Map(Vec<(Expr, Expr)>),
    /// `condition ? consequence | alternative`
    Cond {
        condition: Box<Expr>,
        consequence: Box<Expr>,
        alternative: Box<Expr>,
    },
    /// `` `expr ! codes => handler' ``
    Catch {
        expr: Box<Expr>,
        codes: CatchCodes,
        handler: Option<Box<Expr>>,
    },
    Assign {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Left-hand side of a scatter assignment; only valid as `Assign::left`.
    Scatter(Vec<ScatterItem>),
}

impl Expr {
    pub fn var(id: VarId) -> Self {
        Expr::Var(id)
    }

    pub fn int(i: i64) -> Self {
        Expr::Literal(Value::Int(i))
    }

    pub fn str(s: &str) -> Self {
        Expr::Literal(Value::str(s))
    }

    pub fn obj(o: i64) -> Self {
        Expr::Literal(Value::Obj(o))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn prop(obj: Expr, name: Expr) -> Self {
        Expr::Prop { obj: Box::new(obj), name: Box::new(name) }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index { base: Box::new(base), index: Box::new(index) }
    }

    pub fn range(base: Expr, from: Expr, to: Expr) -> Self {
        Expr::Range { base: Box::new(base), from: Box::new(from), to: Box::new(to) }
    }

    pub fn verb(obj: Expr, verb: Expr, args: Vec<Arg>) -> Self {
        Expr::Verb { obj: Box::new(obj), verb: Box::new(verb), args }
    }

    pub fn assign(left: Expr, right: Expr) -> Self {
        Expr::Assign { left: Box::new(left), right: Box::new(right) }
    }

    pub fn cond(condition: Expr, consequence: Expr, alternative: Expr) -> Self {
        Expr::Cond {
            condition: Box::new(condition),
            consequence: Box::new(consequence),
            alternative: Box::new(alternative),
        }
    }

    pub fn catch(expr: Expr, codes: CatchCodes, handler: Option<Expr>) -> Self {
        Expr::Catch { expr: Box::new(expr), codes, handler: handler.map(Box::new) }
    }
}
