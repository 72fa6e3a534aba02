//! Compiled programs.
//!
//! A [`Program`] is what the generator produces and every other consumer
//! (interpreter, decompiler, line resolver, database writer) reads:
//!
//! - one main [`Bytecodes`] vector and one per `fork` block
//! - a literal table shared by all vectors
//! - the variable-name table
//! - the format version and the reduce-ref flag
//!
//! Everything is fixed at construction. The only interior mutability is the
//! one-entry line memo used by [`Program::line_for`].

mod memo;
mod version;

pub use version::FormatVersion;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Vec;
use crate::ast::Names;
use crate::errors::FormatError;
use crate::values::Value;
use memo::LineMemo;

/// Width in bytes of a field that must hold values below `n`.
pub fn byte_width(n: usize) -> u8 {
    if n <= 1 << 8 {
        1
    } else if n <= 1 << 16 {
        2
    } else {
        4
    }
}

/// Encoded width of each kind of operand field in one vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWidths {
    pub label: u8,
    pub literal: u8,
    pub fork: u8,
    pub var_name: u8,
    pub stack: u8,
}

/// One finished, relocated bytecode vector.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bytecodes {
    widths: FieldWidths,
    max_stack: u32,
    vector: Vec<u8>,
}

impl Bytecodes {
    pub(crate) fn new(widths: FieldWidths, max_stack: u32, vector: Vec<u8>) -> Self {
        Self { widths, max_stack, vector }
    }

    pub fn widths(&self) -> FieldWidths {
        self.widths
    }

    /// Deepest operand stack the vector reaches.
    pub fn max_stack(&self) -> u32 {
        self.max_stack
    }

    pub fn bytes(&self) -> &[u8] {
        &self.vector
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }
}

impl fmt::Debug for Bytecodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bytecodes")
            .field("widths", &self.widths)
            .field("max_stack", &self.max_stack)
            .field("len", &self.vector.len())
            .finish()
    }
}

/// Which vector of a program a pc refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VectorId {
    Main,
    Fork(usize),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Program {
    version: FormatVersion,
    reduce_ref: bool,
    first_lineno: u32,
    literals: Vec<Value>,
    main_vector: Bytecodes,
    fork_vectors: Vec<Bytecodes>,
    var_names: Names,
    #[serde(skip)]
    line_memo: LineMemo,
}

impl Program {
    pub(crate) fn new(
        version: FormatVersion,
        reduce_ref: bool,
        first_lineno: u32,
        literals: Vec<Value>,
        main_vector: Bytecodes,
        fork_vectors: Vec<Bytecodes>,
        var_names: Names,
    ) -> Self {
        Self {
            version,
            reduce_ref,
            first_lineno,
            literals,
            main_vector,
            fork_vectors,
            var_names,
            line_memo: LineMemo::default(),
        }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Whether push-and-clear opcodes may appear in this program.
    pub fn reduce_ref(&self) -> bool {
        self.reduce_ref
    }

    pub fn first_lineno(&self) -> u32 {
        self.first_lineno
    }

    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    pub fn main_vector(&self) -> &Bytecodes {
        &self.main_vector
    }

    pub fn fork_vectors(&self) -> &[Bytecodes] {
        &self.fork_vectors
    }

    pub fn var_names(&self) -> &Names {
        &self.var_names
    }

    /// Looks up a vector, aborting on a fork index the program does not have.
    pub fn vector(&self, id: VectorId) -> &Bytecodes {
        match id {
            VectorId::Main => &self.main_vector,
            VectorId::Fork(n) => match self.fork_vectors.get(n) {
                Some(bc) => bc,
                None => fatal!("fork vector {} out of range ({})", n, self.fork_vectors.len()),
            },
        }
    }

    /// Source line executing at `pc` of `vector`.
    ///
    /// See [`crate::decompiler::find_line_number`].
    pub fn line_for(&self, vector: VectorId, pc: usize) -> u32 {
        if let Some(line) = self.line_memo.get(vector, pc) {
            tracing::trace!(?vector, pc, line, "line memo hit");
            return line;
        }
        let line = crate::decompiler::find_line_number(self, vector, pc);
        self.line_memo.set(vector, pc, line);
        line
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

impl Clone for Program {
    fn clone(&self) -> Self {
        Self::new(
            self.version,
            self.reduce_ref,
            self.first_lineno,
            self.literals.clone(),
            self.main_vector.clone(),
            self.fork_vectors.clone(),
            self.var_names.clone(),
        )
    }
}
