//! Opcode table.
//!
//! # Layout
//!
//! One primary byte per instruction, optionally followed by operand fields:
//!
//! ```text
//!   0 ..=  49   named opcodes (`Opcode`), 49 = EXTENDED escape
//!  50 ..=  81   PUSH v        for the 32 ready variables
//!  82 ..= 113   PUT v
//! 114 ..= 145   PUSH_CLEAR v
//! 146 ..= 255   optimized integers -10 ..= 99
//! ```
//!
//! `EXTENDED` is followed by one `ExtOpcode` byte. Operand fields (labels,
//! literal/fork/variable indices, stack slots) are big-endian at the width
//! recorded in the vector's `FieldWidths`.
//!
//! The numbering is part of the persisted format; changing it requires a
//! `FormatVersion` bump.

use core::fmt;

use crate::ast::VarId;
use crate::errors::FormatError;
use crate::program::FormatVersion;

/// Primary opcodes.
///
/// Stack effect notation: `[..., a, b] -> [..., r]`
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ========================================================================
    // Control flow
    // ========================================================================
    /// Operand: label | Stack: [..., cond] -> [...], jumps when false
    If = 0,
    /// Operand: label | Stack: [..., cond] -> [...], jumps when false
    While,
    /// `elseif` arm. Same as `If`.
    Eif,
    /// Operand: fork | Stack: [..., delay] -> [...]
    Fork,
    /// Operands: fork, var | Stack: [..., delay] -> [...]
    ForkWithId,
    /// Operands: var, label | Stack: [..., list, index] -> same, or popped on exit
    ForList,
    /// Operands: var, label | Stack: [..., from, to] -> same, or popped on exit
    ForRange,

    // ========================================================================
    // Indexing and properties
    // ========================================================================
    /// Stack: [..., base, index, value] -> [..., new_base]
    IndexSet,
    /// Stack: [..., obj, name] -> [..., obj, name, value]
    PushGetProp,
    /// Stack: [..., obj, name] -> [..., value]
    GetProp,
    /// Stack: [..., obj, name, value] -> [..., value]
    PutProp,
    /// Stack: [..., obj, verb, args] -> [..., result]
    CallVerb,
    /// `? |` expression. Operand: label | Stack: [..., cond] -> [...]
    IfQues,
    /// Stack: [..., base, index] -> [..., element]
    Ref,
    /// Stack: [..., base, from, to] -> [..., slice]
    RangeRef,

    // ========================================================================
    // Lists and arithmetic
    // ========================================================================
    /// Stack: [..., a] -> [..., {a}]
    MakeSingletonList,
    /// Stack: [..., a] -> [..., a], checks `a` is a list
    CheckListForSplice,
    Mult,
    Div,
    Mod,
    Add,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    /// Operand: label | Stack: [..., a] -> [..., a] and jump, or [...]
    And,
    /// Operand: label | Stack: [..., a] -> [..., a] and jump, or [...]
    Or,
    UnaryMinus,
    Not,

    // ========================================================================
    // Variables and stack
    // ========================================================================
    /// Operand: var | Stack: [..., a] -> [..., a]
    GPut,
    /// Operand: var | Stack: [...] -> [..., value]
    GPush,
    /// Like `GPush`, and the variable's reference may be dropped afterwards.
    GPushClear,
    /// Operand: literal | Stack: [...] -> [..., literal]
    Imm,
    MakeEmptyList,
    /// Stack: [..., list, a] -> [..., list + {a}]
    ListAddTail,
    /// Stack: [..., list, l2] -> [..., list + l2]
    ListAppend,
    /// Stack: [..., base, index] -> [..., base, index, element]
    PushRef,
    /// Stack: [..., a] -> [..., a], saves `a` in the temp register
    PutTemp,
    /// Stack: [...] -> [..., temp]
    PushTemp,
    /// Operand: label
    Jump,
    /// Stack: [..., a] -> returns a
    Return,
    Return0,
    /// End of vector.
    Done,
    /// Stack: [..., a] -> [...]
    Pop,
    /// Operand: raw byte (builtin id) | Stack: [..., args] -> [..., result]
    BiFuncCall,
    /// Escape into the extended opcode space.
    Extended,
}

/// Number of variables with dedicated one-byte PUSH/PUT/PUSH_CLEAR opcodes.
pub const NUM_READY_VARS: u8 = 32;

const OP_PUSH: u8 = Opcode::Extended as u8 + 1;
const OP_PUT: u8 = OP_PUSH + NUM_READY_VARS;
const OP_PUSH_CLEAR: u8 = OP_PUT + NUM_READY_VARS;
const OP_OPTIM_NUM: u8 = OP_PUSH_CLEAR + NUM_READY_VARS;

/// Smallest integer with a dedicated opcode.
pub const OPTIM_NUM_LOW: i64 = -10;
/// Largest integer with a dedicated opcode.
pub const OPTIM_NUM_HI: i64 = OPTIM_NUM_LOW + (u8::MAX - OP_OPTIM_NUM) as i64;

static_assertions::const_assert_eq!(OP_PUSH, 50);
static_assertions::const_assert_eq!(OP_OPTIM_NUM, 146);
static_assertions::const_assert_eq!(OPTIM_NUM_HI, 99);

const PRIMARY: [Opcode; OP_PUSH as usize] = [
    Opcode::If,
    Opcode::While,
    Opcode::Eif,
    Opcode::Fork,
    Opcode::ForkWithId,
    Opcode::ForList,
    Opcode::ForRange,
    Opcode::IndexSet,
    Opcode::PushGetProp,
    Opcode::GetProp,
    Opcode::PutProp,
    Opcode::CallVerb,
    Opcode::IfQues,
    Opcode::Ref,
    Opcode::RangeRef,
    Opcode::MakeSingletonList,
    Opcode::CheckListForSplice,
    Opcode::Mult,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Add,
    Opcode::Minus,
    Opcode::Eq,
    Opcode::Ne,
    Opcode::Lt,
    Opcode::Le,
    Opcode::Gt,
    Opcode::Ge,
    Opcode::In,
    Opcode::And,
    Opcode::Or,
    Opcode::UnaryMinus,
    Opcode::Not,
    Opcode::GPut,
    Opcode::GPush,
    Opcode::GPushClear,
    Opcode::Imm,
    Opcode::MakeEmptyList,
    Opcode::ListAddTail,
    Opcode::ListAppend,
    Opcode::PushRef,
    Opcode::PutTemp,
    Opcode::PushTemp,
    Opcode::Jump,
    Opcode::Return,
    Opcode::Return0,
    Opcode::Done,
    Opcode::Pop,
    Opcode::BiFuncCall,
    Opcode::Extended,
];

impl Opcode {
    /// One-byte PUSH for a ready variable.
    pub fn push(id: VarId) -> Option<u8> {
        Self::ready(OP_PUSH, id)
    }

    pub fn put(id: VarId) -> Option<u8> {
        Self::ready(OP_PUT, id)
    }

    pub fn push_clear(id: VarId) -> Option<u8> {
        Self::ready(OP_PUSH_CLEAR, id)
    }

    fn ready(base: u8, id: VarId) -> Option<u8> {
        (id.0 < NUM_READY_VARS as u32).then(|| base + id.0 as u8)
    }

    /// Turns a push opcode byte into its push-and-clear twin.
    pub fn clearing_variant(byte: u8) -> Option<u8> {
        if (OP_PUSH..OP_PUT).contains(&byte) {
            Some(byte - OP_PUSH + OP_PUSH_CLEAR)
        } else if byte == Opcode::GPush as u8 {
            Some(Opcode::GPushClear as u8)
        } else {
            None
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::If => "IF",
            Opcode::While => "WHILE",
            Opcode::Eif => "EIF",
            Opcode::Fork => "FORK",
            Opcode::ForkWithId => "FORK_WITH_ID",
            Opcode::ForList => "FOR_LIST",
            Opcode::ForRange => "FOR_RANGE",
            Opcode::IndexSet => "INDEXSET",
            Opcode::PushGetProp => "PUSH_GET_PROP",
            Opcode::GetProp => "GET_PROP",
            Opcode::PutProp => "PUT_PROP",
            Opcode::CallVerb => "CALL_VERB",
            Opcode::IfQues => "IF_QUES",
            Opcode::Ref => "REF",
            Opcode::RangeRef => "RANGE_REF",
            Opcode::MakeSingletonList => "MAKE_SINGLETON_LIST",
            Opcode::CheckListForSplice => "CHECK_LIST_FOR_SPLICE",
            Opcode::Mult => "MULT",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Add => "ADD",
            Opcode::Minus => "MINUS",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Le => "LE",
            Opcode::Gt => "GT",
            Opcode::Ge => "GE",
            Opcode::In => "IN",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::UnaryMinus => "UNARY_MINUS",
            Opcode::Not => "NOT",
            Opcode::GPut => "G_PUT",
            Opcode::GPush => "G_PUSH",
            Opcode::GPushClear => "G_PUSH_CLEAR",
            Opcode::Imm => "IMM",
            Opcode::MakeEmptyList => "MAKE_EMPTY_LIST",
            Opcode::ListAddTail => "LIST_ADD_TAIL",
            Opcode::ListAppend => "LIST_APPEND",
            Opcode::PushRef => "PUSH_REF",
            Opcode::PutTemp => "PUT_TEMP",
            Opcode::PushTemp => "PUSH_TEMP",
            Opcode::Jump => "JUMP",
            Opcode::Return => "RETURN",
            Opcode::Return0 => "RETURN0",
            Opcode::Done => "DONE",
            Opcode::Pop => "POP",
            Opcode::BiFuncCall => "BI_FUNC_CALL",
            Opcode::Extended => "EXTENDED",
        }
    }
}

/// Opcodes reached through the `EXTENDED` escape.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtOpcode {
    /// Stack: [..., base, from, to, value] -> [..., new_base]
    RangeSet = 0,
    /// Operand: stack slot | Stack: [...] -> [..., length of slot]
    Length,
    Exp,
    /// Operands: nargs, nreq, rest, (var, label)*, done label
    Scatter,
    /// Operand: label | Stack: [...] -> [..., label]
    PushLabel,
    /// Operand: handler label | Stack: [...] -> [..., marker]
    TryFinally,
    /// Stack: [...] -> [..., marker]
    Catch,
    /// Operand: arm count byte | Stack: [...] -> [..., marker]
    TryExcept,
    /// Operand: end label | Stack: [..., codes, label, marker, value] -> [..., value]
    EndCatch,
    /// Operand: end label
    EndExcept,
    /// Stack: [..., marker] -> [..., reason, value]
    EndFinally,
    /// Stack: [..., reason, value] -> [...], resumes the pending completion
    Continue,
    /// Operands: var, label | Stack: [..., cond] -> [...]
    WhileId,
    /// Operands: var, stack slot, label
    ExitId,
    /// Operands: stack slot, label
    Exit,
    MakeMap,
    /// Stack: [..., map, key, value] -> [..., map']
    MapInsert,
}

const EXTENDED: [ExtOpcode; 17] = [
    ExtOpcode::RangeSet,
    ExtOpcode::Length,
    ExtOpcode::Exp,
    ExtOpcode::Scatter,
    ExtOpcode::PushLabel,
    ExtOpcode::TryFinally,
    ExtOpcode::Catch,
    ExtOpcode::TryExcept,
    ExtOpcode::EndCatch,
    ExtOpcode::EndExcept,
    ExtOpcode::EndFinally,
    ExtOpcode::Continue,
    ExtOpcode::WhileId,
    ExtOpcode::ExitId,
    ExtOpcode::Exit,
    ExtOpcode::MakeMap,
    ExtOpcode::MapInsert,
];

static_assertions::const_assert!(EXTENDED.len() <= u8::MAX as usize);

impl ExtOpcode {
    pub fn from_u8(byte: u8) -> Result<Self, FormatError> {
        EXTENDED
            .get(byte as usize)
            .copied()
            .ok_or(FormatError::InvalidExtendedOpcode(byte))
    }

    /// Oldest format version that knows this opcode.
    pub fn since(self) -> FormatVersion {
        match self {
            ExtOpcode::RangeSet | ExtOpcode::Length | ExtOpcode::Exp => FormatVersion::Prehistory,
            ExtOpcode::Scatter
            | ExtOpcode::PushLabel
            | ExtOpcode::TryFinally
            | ExtOpcode::Catch
            | ExtOpcode::TryExcept
            | ExtOpcode::EndCatch
            | ExtOpcode::EndExcept
            | ExtOpcode::EndFinally
            | ExtOpcode::Continue => FormatVersion::Exceptions,
            ExtOpcode::WhileId | ExtOpcode::ExitId | ExtOpcode::Exit => FormatVersion::BreakCont,
            ExtOpcode::MakeMap | ExtOpcode::MapInsert => FormatVersion::Maps,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ExtOpcode::RangeSet => "RANGESET",
            ExtOpcode::Length => "LENGTH",
            ExtOpcode::Exp => "EXP",
            ExtOpcode::Scatter => "SCATTER",
            ExtOpcode::PushLabel => "PUSH_LABEL",
            ExtOpcode::TryFinally => "TRY_FINALLY",
            ExtOpcode::Catch => "CATCH",
            ExtOpcode::TryExcept => "TRY_EXCEPT",
            ExtOpcode::EndCatch => "END_CATCH",
            ExtOpcode::EndExcept => "END_EXCEPT",
            ExtOpcode::EndFinally => "END_FINALLY",
            ExtOpcode::Continue => "CONTINUE",
            ExtOpcode::WhileId => "WHILE_ID",
            ExtOpcode::ExitId => "EXIT_ID",
            ExtOpcode::Exit => "EXIT",
            ExtOpcode::MakeMap => "MAKE_MAP",
            ExtOpcode::MapInsert => "MAP_INSERT",
        }
    }
}

/// Opcode byte for an optimized integer, if `i` has one.
pub fn optim_num_opcode(i: i64) -> Option<u8> {
    (OPTIM_NUM_LOW..=OPTIM_NUM_HI)
        .contains(&i)
        .then(|| OP_OPTIM_NUM + (i - OPTIM_NUM_LOW) as u8)
}

/// A decoded opcode, with the ready-variable and number ranges unpacked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Basic(Opcode),
    Push(VarId),
    Put(VarId),
    PushClear(VarId),
    Num(i64),
    Ext(ExtOpcode),
}

impl Op {
    /// Decodes a primary opcode byte. `EXTENDED` comes back as
    /// `Basic(Opcode::Extended)`; the caller reads the next byte.
    pub fn from_primary(byte: u8) -> Op {
        match byte {
            b if b < OP_PUSH => Op::Basic(PRIMARY[b as usize]),
            b if b < OP_PUT => Op::Push(VarId((b - OP_PUSH) as u32)),
            b if b < OP_PUSH_CLEAR => Op::Put(VarId((b - OP_PUT) as u32)),
            b if b < OP_OPTIM_NUM => Op::PushClear(VarId((b - OP_PUSH_CLEAR) as u32)),
            b => Op::Num((b - OP_OPTIM_NUM) as i64 + OPTIM_NUM_LOW),
        }
    }

    /// Encoded length of the opcode itself, not counting operands.
    pub fn opcode_len(self) -> usize {
        match self {
            Op::Ext(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Basic(op) => f.write_str(op.mnemonic()),
            Op::Push(id) => write!(f, "PUSH {}", id.0),
            Op::Put(id) => write!(f, "PUT {}", id.0),
            Op::PushClear(id) => write!(f, "PUSH_CLEAR {}", id.0),
            Op::Num(i) => write!(f, "NUM {}", i),
            Op::Ext(op) => write!(f, "X_{}", op.mnemonic()),
        }
    }
}
