//! Experimental "reduce-ref" pass.
//!
//! Rewrites the last push of a variable before it is overwritten (or before
//! the verb ends) into its push-and-clear twin, so the interpreter can drop
//! the variable's reference and mutate the pushed value in place.
//!
//! The analysis is a backward scan over each basic block with a bitset of
//! variables that may still be read. Blocks end at every label target and
//! after every instruction that can transfer control, where all variables
//! are assumed live. Only slots below 64 are tracked.

use hashbrown::HashSet;
use smallvec::SmallVec;

use super::assembler::{Assembler, InsnOp};
use crate::ast::Names;
use crate::vm::{ExtOpcode, Opcode};

type LiveSet = u64;

const ALL: LiveSet = !0;

/// Call-environment variables, kept live across returns and verb calls.
fn reserved() -> LiveSet {
    Names::CALL_ENVIRONMENT
        .iter()
        .fold(0, |set, id| set | (1 << id.0))
}

fn bit(id: u32) -> Option<LiveSet> {
    (id < LiveSet::BITS).then(|| 1 << id)
}

/// Whether control can leave the straight line after this instruction.
fn ends_block(op: InsnOp) -> bool {
    match op {
        InsnOp::Basic(op) => matches!(
            op,
            Opcode::If
                | Opcode::While
                | Opcode::Eif
                | Opcode::Fork
                | Opcode::ForkWithId
                | Opcode::ForList
                | Opcode::ForRange
                | Opcode::IfQues
                | Opcode::And
                | Opcode::Or
                | Opcode::Jump
                | Opcode::Return
                | Opcode::Return0
                | Opcode::Done
        ),
        InsnOp::Ext(op) => matches!(
            op,
            ExtOpcode::Scatter
                | ExtOpcode::PushLabel
                | ExtOpcode::TryFinally
                | ExtOpcode::EndCatch
                | ExtOpcode::EndExcept
                | ExtOpcode::EndFinally
                | ExtOpcode::Continue
                | ExtOpcode::WhileId
                | ExtOpcode::ExitId
                | ExtOpcode::Exit
        ),
        InsnOp::Push(_) | InsnOp::Put(_) | InsnOp::Num => false,
    }
}

/// Runs the pass over one emitted, not yet relocated vector.
pub(crate) fn reduce_refs(asm: &mut Assembler) {
    let targets: HashSet<usize> = asm.targets().iter().copied().collect();
    let reserved = reserved();
    let insns = asm.insns();
    let end = asm.num_bytes();

    let mut rewrites: SmallVec<[usize; 16]> = SmallVec::new();
    let mut live = ALL;
    for (i, insn) in insns.iter().enumerate().rev() {
        let next = insns.get(i + 1).map_or(end, |next| next.pc);
        if targets.contains(&next) || ends_block(insn.op) {
            live = ALL;
        }
        match insn.op {
            InsnOp::Basic(Opcode::Return | Opcode::Return0 | Opcode::Done) => live = reserved,
            InsnOp::Basic(Opcode::CallVerb | Opcode::BiFuncCall) => live |= reserved,
            InsnOp::Push(id) => {
                if let Some(bit) = bit(id.0) {
                    if live & bit == 0 && !insn.protected {
                        rewrites.push(insn.pc);
                    }
                    live |= bit;
                }
            }
            InsnOp::Put(id) => {
                if let Some(bit) = bit(id.0) {
                    live &= !bit;
                }
            }
            _ => {}
        }
    }

    let bytes = asm.bytes_mut();
    for &pc in &rewrites {
        match Opcode::clearing_variant(bytes[pc]) {
            Some(clearing) => bytes[pc] = clearing,
            None => fatal!("no push-and-clear twin for byte {} at {}", bytes[pc], pc),
        }
    }
    tracing::debug!(cleared = rewrites.len(), "reduce-ref pass");
}
