use super::{ExtOpcode, Op, Opcode};
use crate::ast::VarId;
use crate::errors::FormatError;
use crate::program::{Bytecodes, FieldWidths};

/// Cursor over a finished vector, decoding opcodes and operand fields at the
/// vector's widths.
///
/// Reading past the end or hitting an undefined extended opcode is an
/// internal error; [`Reader::try_read_op`] is the non-aborting variant.
#[derive(Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    widths: FieldWidths,
    pc: usize,
}

impl<'a> Reader<'a> {
    pub fn new(code: &'a Bytecodes) -> Self {
        Self::at(code, 0)
    }

    pub fn at(code: &'a Bytecodes, pc: usize) -> Self {
        Self {
            bytes: code.bytes(),
            widths: code.widths(),
            pc,
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn seek(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn is_at_end(&self) -> bool {
        self.pc >= self.bytes.len()
    }

    pub fn widths(&self) -> FieldWidths {
        self.widths
    }

    pub fn read_byte(&mut self) -> u8 {
        match self.bytes.get(self.pc) {
            Some(&b) => {
                self.pc += 1;
                b
            }
            None => fatal!("read past end of vector at {}", self.pc),
        }
    }

    pub fn try_read_op(&mut self) -> Result<Op, FormatError> {
        match Op::from_primary(self.read_byte()) {
            Op::Basic(Opcode::Extended) => Ok(Op::Ext(ExtOpcode::from_u8(self.read_byte())?)),
            op => Ok(op),
        }
    }

    pub fn read_op(&mut self) -> Op {
        let pc = self.pc;
        match self.try_read_op() {
            Ok(op) => op,
            Err(err) => fatal!("{} at pc {}", err, pc),
        }
    }

    /// Decodes the opcode at the cursor without advancing.
    pub fn peek_op(&self) -> Op {
        self.clone().read_op()
    }

    fn read_field(&mut self, width: u8) -> usize {
        let mut value = 0usize;
        for _ in 0..width {
            value = (value << 8) | self.read_byte() as usize;
        }
        value
    }

    pub fn read_label(&mut self) -> usize {
        self.read_field(self.widths.label)
    }

    pub fn read_literal(&mut self) -> usize {
        self.read_field(self.widths.literal)
    }

    pub fn read_fork(&mut self) -> usize {
        self.read_field(self.widths.fork)
    }

    pub fn read_var(&mut self) -> VarId {
        VarId(self.read_field(self.widths.var_name) as u32)
    }

    pub fn read_stack(&mut self) -> usize {
        self.read_field(self.widths.stack)
    }
}
