//! Instruction decoding and program listings.

#[cfg(test)]
#[path = "disasm_test.rs"]
mod disasm_test;

use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::ast::VarId;
use crate::program::{Bytecodes, Program};
use crate::vm::{ExtOpcode, Op, Opcode, Reader};
use crate::{Vec, format};

/// A decoded operand field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Label(usize),
    Literal(usize),
    Fork(usize),
    Var(VarId),
    Stack(usize),
    /// Counts, builtin ids, and scatter kind markers.
    Byte(u8),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub pc: usize,
    pub op: Op,
    pub operands: SmallVec<[Operand; 4]>,
}

impl Instruction {
    pub fn labels(&self) -> impl Iterator<Item = usize> + '_ {
        self.operands.iter().filter_map(|operand| match operand {
            Operand::Label(target) => Some(*target),
            _ => None,
        })
    }
}

/// Decodes every instruction of `code` in order.
pub fn instructions(code: &Bytecodes) -> Vec<Instruction> {
    let mut reader = Reader::new(code);
    let mut out = Vec::new();
    while !reader.is_at_end() {
        out.push(decode(&mut reader));
    }
    out
}

fn decode(reader: &mut Reader<'_>) -> Instruction {
    use Operand::*;

    let pc = reader.pc();
    let op = reader.read_op();
    let mut operands = SmallVec::new();
    match op {
        Op::Basic(
            Opcode::If
            | Opcode::While
            | Opcode::Eif
            | Opcode::IfQues
            | Opcode::And
            | Opcode::Or
            | Opcode::Jump,
        ) => operands.push(Label(reader.read_label())),
        Op::Basic(Opcode::Fork) => operands.push(Fork(reader.read_fork())),
        Op::Basic(Opcode::ForkWithId) => {
            operands.push(Fork(reader.read_fork()));
            operands.push(Var(reader.read_var()));
        }
        Op::Basic(Opcode::ForList | Opcode::ForRange) | Op::Ext(ExtOpcode::WhileId) => {
            operands.push(Var(reader.read_var()));
            operands.push(Label(reader.read_label()));
        }
        Op::Basic(Opcode::GPut | Opcode::GPush | Opcode::GPushClear) => {
            operands.push(Var(reader.read_var()))
        }
        Op::Basic(Opcode::Imm) => operands.push(Literal(reader.read_literal())),
        Op::Basic(Opcode::BiFuncCall) | Op::Ext(ExtOpcode::TryExcept) => {
            operands.push(Byte(reader.read_byte()))
        }
        Op::Ext(ExtOpcode::Length) => operands.push(Stack(reader.read_stack())),
        Op::Ext(
            ExtOpcode::PushLabel
            | ExtOpcode::TryFinally
            | ExtOpcode::EndCatch
            | ExtOpcode::EndExcept,
        ) => operands.push(Label(reader.read_label())),
        Op::Ext(ExtOpcode::ExitId) => {
            operands.push(Var(reader.read_var()));
            operands.push(Stack(reader.read_stack()));
            operands.push(Label(reader.read_label()));
        }
        Op::Ext(ExtOpcode::Exit) => {
            operands.push(Stack(reader.read_stack()));
            operands.push(Label(reader.read_label()));
        }
        Op::Ext(ExtOpcode::Scatter) => {
            let nargs = reader.read_byte();
            operands.push(Byte(nargs));
            operands.push(Byte(reader.read_byte()));
            operands.push(Byte(reader.read_byte()));
            for _ in 0..nargs {
                operands.push(Var(reader.read_var()));
                match reader.read_label() {
                    marker @ (0 | 1) => operands.push(Byte(marker as u8)),
                    target => operands.push(Label(target)),
                }
            }
            operands.push(Label(reader.read_label()));
        }
        _ => {}
    }
    Instruction { pc, op, operands }
}

struct Listing<'a> {
    code: &'a Bytecodes,
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instructions = instructions(self.code);

        // Number jump targets in address order.
        let mut targets: Vec<usize> = instructions.iter().flat_map(|i| i.labels()).collect();
        targets.sort_unstable();
        targets.dedup();
        let label_map: HashMap<usize, usize> =
            targets.into_iter().enumerate().map(|(n, pc)| (pc, n)).collect();

        for insn in &instructions {
            let label = label_map
                .get(&insn.pc)
                .map(|n| format!("L{}:", n))
                .unwrap_or_default();
            write!(f, "    {:4} {:>4}  {}", insn.pc, label, insn.op)?;
            for operand in &insn.operands {
                match operand {
                    Operand::Label(target) => match label_map.get(target) {
                        Some(n) => write!(f, " L{}", n)?,
                        None => write!(f, " @{}", target)?,
                    },
                    Operand::Literal(i) => write!(f, " lit[{}]", i)?,
                    Operand::Fork(i) => write!(f, " fork[{}]", i)?,
                    Operand::Var(id) => write!(f, " v{}", id.0)?,
                    Operand::Stack(slot) => write!(f, " s{}", slot)?,
                    Operand::Byte(b) => write!(f, " {}", b)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program {{")?;
        writeln!(f, "  version: {}", self.version())?;
        writeln!(f, "  reduce_ref: {}", self.reduce_ref())?;
        writeln!(f, "  first_lineno: {}", self.first_lineno())?;

        if self.literals().is_empty() {
            writeln!(f, "  literals: []")?;
        } else {
            writeln!(f, "  literals: [")?;
            for (i, literal) in self.literals().iter().enumerate() {
                writeln!(f, "    [{}] = {:?}", i, literal)?;
            }
            writeln!(f, "  ]")?;
        }

        writeln!(f, "  variables: [")?;
        for (i, name) in self.var_names().iter().enumerate() {
            writeln!(f, "    v{} = {}", i, name)?;
        }
        writeln!(f, "  ]")?;

        let main = self.main_vector();
        writeln!(f, "  main (max_stack {}):", main.max_stack())?;
        write!(f, "{}", Listing { code: main })?;
        for (i, fork) in self.fork_vectors().iter().enumerate() {
            writeln!(f, "  fork[{}] (max_stack {}):", i, fork.max_stack())?;
            write!(f, "{}", Listing { code: fork })?;
        }
        write!(f, "}}")
    }
}
