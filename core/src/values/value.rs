use alloc::sync::Arc;
use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Object number, as written `#123` in source.
pub type Objid = i64;

/// Built-in error values.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    None = 0,
    Type,
    Div,
    Perm,
    PropNf,
    VerbNf,
    VarNf,
    InvInd,
    RecMove,
    MaxRec,
    Range,
    Args,
    NAcc,
    InvArg,
    Quota,
    Float,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 16] = [
        ErrorCode::None,
        ErrorCode::Type,
        ErrorCode::Div,
        ErrorCode::Perm,
        ErrorCode::PropNf,
        ErrorCode::VerbNf,
        ErrorCode::VarNf,
        ErrorCode::InvInd,
        ErrorCode::RecMove,
        ErrorCode::MaxRec,
        ErrorCode::Range,
        ErrorCode::Args,
        ErrorCode::NAcc,
        ErrorCode::InvArg,
        ErrorCode::Quota,
        ErrorCode::Float,
    ];

    /// Source spelling, e.g. `E_PROPNF`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::None => "E_NONE",
            ErrorCode::Type => "E_TYPE",
            ErrorCode::Div => "E_DIV",
            ErrorCode::Perm => "E_PERM",
            ErrorCode::PropNf => "E_PROPNF",
            ErrorCode::VerbNf => "E_VERBNF",
            ErrorCode::VarNf => "E_VARNF",
            ErrorCode::InvInd => "E_INVIND",
            ErrorCode::RecMove => "E_RECMOVE",
            ErrorCode::MaxRec => "E_MAXREC",
            ErrorCode::Range => "E_RANGE",
            ErrorCode::Args => "E_ARGS",
            ErrorCode::NAcc => "E_NACC",
            ErrorCode::InvArg => "E_INVARG",
            ErrorCode::Quota => "E_QUOTA",
            ErrorCode::Float => "E_FLOAT",
        }
    }
}

/// A literal value as it appears in source and in a program's literal table.
///
/// Equality and hashing are exact: floats compare by bit pattern and strings
/// are case-sensitive, so two literals are shared only when they are the
/// same value of the same type.
#[derive(Clone, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Obj(Objid),
    Err(ErrorCode),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => a == b,
            (Value::Err(a), Value::Err(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Obj(o) => o.hash(state),
            Value::Err(e) => e.hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Obj(o) => write!(f, "#{}", o),
            Value::Err(e) => f.write_str(e.name()),
        }
    }
}
