//! Byte emission with deferred relocation.
//!
//! Operand fields whose final width is unknown while code is being emitted
//! (labels, literal/fork/variable indices, stack slots) are written as one
//! placeholder byte and recorded as a [`Fixup`]. Once the whole vector is
//! emitted, [`Assembler::finish`] picks the narrowest width for each field
//! kind and rewrites the buffer, widening every placeholder and shifting
//! every label by the growth of the placeholders in front of it.

use smallvec::SmallVec;

use crate::Vec;
use crate::ast::VarId;
use crate::program::{Bytecodes, FieldWidths, byte_width};
use crate::vm::{ExtOpcode, Opcode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FixupKind {
    Literal,
    Fork,
    Label,
    VarRef,
    Stack,
}

/// Number of placeholders of each kind emitted so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Counts {
    pub(crate) literals: usize,
    pub(crate) forks: usize,
    pub(crate) var_refs: usize,
    pub(crate) labels: usize,
    pub(crate) stacks: usize,
}

impl Counts {
    /// Bytes these placeholders grow by at the given widths.
    fn growth(&self, w: FieldWidths) -> usize {
        self.literals * (w.literal as usize - 1)
            + self.forks * (w.fork as usize - 1)
            + self.var_refs * (w.var_name as usize - 1)
            + self.labels * (w.label as usize - 1)
            + self.stacks * (w.stack as usize - 1)
    }

    fn bump(&mut self, kind: FixupKind) {
        match kind {
            FixupKind::Literal => self.literals += 1,
            FixupKind::Fork => self.forks += 1,
            FixupKind::Label => self.labels += 1,
            FixupKind::VarRef => self.var_refs += 1,
            FixupKind::Stack => self.stacks += 1,
        }
    }
}

const UNRESOLVED: usize = usize::MAX;

/// One placeholder byte awaiting its final field.
#[derive(Clone, Debug)]
pub(crate) struct Fixup {
    pub(crate) kind: FixupKind,
    /// Raw offset of the placeholder.
    pub(crate) pc: usize,
    /// Index for table references; raw target offset for labels.
    pub(crate) value: usize,
    /// Placeholders in front of `value` when it is a label.
    pub(crate) prev: Counts,
    /// Next fixup waiting for the same label.
    next: Option<usize>,
}

/// A jump target whose raw offset is already known.
#[derive(Clone, Copy, Debug)]
pub(crate) struct KnownLabel {
    value: usize,
    prev: Counts,
}

/// Chain of forward jumps that will all resolve to one position.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PendingLabel(usize);

/// What an emitted instruction is, as far as the reduce-ref pass cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InsnOp {
    Basic(Opcode),
    Ext(ExtOpcode),
    Push(VarId),
    Put(VarId),
    Num,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Insn {
    pub(crate) pc: usize,
    pub(crate) op: InsnOp,
    /// Inside a try body or catch expression.
    pub(crate) protected: bool,
}

/// Table sizes the field widths are derived from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Totals {
    pub(crate) literals: usize,
    pub(crate) forks: usize,
    pub(crate) var_names: usize,
    pub(crate) max_stack: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Assembler {
    bytes: Vec<u8>,
    fixups: Vec<Fixup>,
    counts: Counts,
    insns: Vec<Insn>,
    targets: Vec<usize>,
    protected: u32,
}

impl Assembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn num_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn insns(&self) -> &[Insn] {
        &self.insns
    }

    /// Raw offsets some label resolves to.
    pub(crate) fn targets(&self) -> &[usize] {
        &self.targets
    }

    #[cfg(test)]
    pub(crate) fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    pub(crate) fn enter_protected(&mut self) {
        self.protected += 1;
    }

    pub(crate) fn exit_protected(&mut self) {
        self.protected -= 1;
    }

    fn record(&mut self, op: InsnOp) {
        self.insns.push(Insn {
            pc: self.bytes.len(),
            op,
            protected: self.protected > 0,
        });
    }

    // ------------------------------------------------------------------------
    // Opcodes
    // ------------------------------------------------------------------------

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub(crate) fn emit(&mut self, op: Opcode) {
        self.record(InsnOp::Basic(op));
        self.emit_byte(op as u8);
    }

    pub(crate) fn emit_ext(&mut self, op: ExtOpcode) {
        self.record(InsnOp::Ext(op));
        self.emit_byte(Opcode::Extended as u8);
        self.emit_byte(op as u8);
    }

    pub(crate) fn emit_num(&mut self, opcode: u8) {
        self.record(InsnOp::Num);
        self.emit_byte(opcode);
    }

    /// `PUSH id`, or `G_PUSH id` past the ready variables.
    pub(crate) fn emit_push(&mut self, id: VarId) {
        self.record(InsnOp::Push(id));
        match Opcode::push(id) {
            Some(byte) => self.emit_byte(byte),
            None => {
                self.emit_byte(Opcode::GPush as u8);
                self.add_var_ref(id);
            }
        }
    }

    /// `PUT id`, or `G_PUT id` past the ready variables.
    pub(crate) fn emit_put(&mut self, id: VarId) {
        self.record(InsnOp::Put(id));
        match Opcode::put(id) {
            Some(byte) => self.emit_byte(byte),
            None => {
                self.emit_byte(Opcode::GPut as u8);
                self.add_var_ref(id);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Fixups
    // ------------------------------------------------------------------------

    fn add_known_fixup(&mut self, mut fixup: Fixup) -> usize {
        fixup.pc = self.bytes.len();
        self.fixups.push(fixup);
        self.emit_byte(0);
        self.fixups.len() - 1
    }

    fn add_linked_fixup(&mut self, kind: FixupKind, value: usize, next: Option<usize>) -> usize {
        let fixup = Fixup {
            kind,
            pc: 0,
            value,
            prev: self.counts,
            next,
        };
        self.counts.bump(kind);
        self.add_known_fixup(fixup)
    }

    pub(crate) fn add_literal(&mut self, index: usize) {
        self.add_linked_fixup(FixupKind::Literal, index, None);
    }

    pub(crate) fn add_fork(&mut self, index: usize) {
        self.add_linked_fixup(FixupKind::Fork, index, None);
    }

    pub(crate) fn add_var_ref(&mut self, id: VarId) {
        self.add_linked_fixup(FixupKind::VarRef, id.index(), None);
    }

    pub(crate) fn add_stack_ref(&mut self, slot: usize) {
        self.add_linked_fixup(FixupKind::Stack, slot, None);
    }

    // ------------------------------------------------------------------------
    // Labels
    // ------------------------------------------------------------------------

    /// Marks the current position as a backward jump target.
    pub(crate) fn capture_label(&mut self) -> KnownLabel {
        self.targets.push(self.bytes.len());
        KnownLabel {
            value: self.bytes.len(),
            prev: self.counts,
        }
    }

    /// Emits a jump field to an already captured position.
    pub(crate) fn add_known_label(&mut self, label: KnownLabel) {
        let fixup = Fixup {
            kind: FixupKind::Label,
            pc: 0,
            value: label.value,
            prev: label.prev,
            next: None,
        };
        self.counts.bump(FixupKind::Label);
        self.add_known_fixup(fixup);
    }

    /// Emits a forward jump field, resolved later by [`Self::define_label`].
    pub(crate) fn add_label(&mut self) -> PendingLabel {
        PendingLabel(self.add_linked_fixup(FixupKind::Label, UNRESOLVED, None))
    }

    /// Emits a forward jump field that resolves together with `chain`.
    pub(crate) fn add_linked_label(&mut self, chain: PendingLabel) -> PendingLabel {
        PendingLabel(self.add_linked_fixup(FixupKind::Label, UNRESOLVED, Some(chain.0)))
    }

    /// Emits a label-width field holding a literal marker value instead of
    /// an address. Nothing in front of it shifts the value.
    pub(crate) fn add_pseudo_label(&mut self, value: usize) {
        self.counts.bump(FixupKind::Label);
        self.add_known_fixup(Fixup {
            kind: FixupKind::Label,
            pc: 0,
            value,
            prev: Counts::default(),
            next: None,
        });
    }

    /// Resolves every jump in `chain` to the current position.
    pub(crate) fn define_label(&mut self, chain: PendingLabel) {
        let here = self.bytes.len();
        self.targets.push(here);
        let mut cursor = Some(chain.0);
        while let Some(i) = cursor {
            let fixup = &mut self.fixups[i];
            fixup.value = here;
            fixup.prev = self.counts;
            cursor = fixup.next;
        }
    }

    // ------------------------------------------------------------------------
    // Relocation
    // ------------------------------------------------------------------------

    /// Chooses field widths and rewrites the buffer into its final layout.
    pub(crate) fn finish(self, totals: Totals) -> Bytecodes {
        let mut widths = FieldWidths {
            label: 1,
            literal: byte_width(totals.literals),
            fork: byte_width(totals.forks),
            var_name: byte_width(totals.var_names),
            stack: byte_width(totals.max_stack),
        };
        let mut size = self.bytes.len() + self.counts.growth(widths);
        if size > 1 << 8 {
            widths.label = 2;
            size += self.counts.labels;
            if size > 1 << 16 {
                widths.label = 4;
                size += 2 * self.counts.labels;
            }
        }

        let mut vector = Vec::with_capacity(size);
        let mut src = 0;
        for fixup in &self.fixups {
            vector.extend_from_slice(&self.bytes[src..fixup.pc]);
            let (width, value) = match fixup.kind {
                FixupKind::Label => {
                    if fixup.value == UNRESOLVED {
                        fatal!("label at raw pc {} was never defined", fixup.pc);
                    }
                    (widths.label, fixup.value + fixup.prev.growth(widths))
                }
                FixupKind::Literal => (widths.literal, fixup.value),
                FixupKind::Fork => (widths.fork, fixup.value),
                FixupKind::VarRef => (widths.var_name, fixup.value),
                FixupKind::Stack => (widths.stack, fixup.value),
            };
            let be: SmallVec<[u8; 4]> = (0..width)
                .rev()
                .map(|shift| (value >> (8 * shift as usize)) as u8)
                .collect();
            vector.extend_from_slice(&be);
            src = fixup.pc + 1;
        }
        vector.extend_from_slice(&self.bytes[src..]);

        if vector.len() != size {
            fatal!("relocated size {} differs from computed {}", vector.len(), size);
        }
        Bytecodes::new(widths, totals.max_stack as u32, vector)
    }
}
