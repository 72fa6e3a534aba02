use core::sync::atomic::{AtomicU64, Ordering};

use super::VectorId;

const VALID: u64 = 1 << 63;
const VECTOR_BITS: u32 = 15;
const PC_BITS: u32 = 24;
const LINE_BITS: u32 = 24;

/// The last `(vector, pc) -> line` answer for one program.
///
/// One word, read and overwritten with relaxed atomics. Racing writers can
/// only cause a lookup to be recomputed: every stored word is a complete,
/// correct answer for the key packed into it.
#[derive(Debug, Default)]
pub(crate) struct LineMemo(AtomicU64);

impl LineMemo {
    pub(crate) fn get(&self, vector: VectorId, pc: usize) -> Option<u32> {
        let key = Self::key(vector, pc)?;
        let word = self.0.load(Ordering::Relaxed);
        (word & VALID != 0 && word >> LINE_BITS == key >> LINE_BITS)
            .then(|| (word & ((1 << LINE_BITS) - 1)) as u32)
    }

    pub(crate) fn set(&self, vector: VectorId, pc: usize, line: u32) {
        if (line as u64) >> LINE_BITS != 0 {
            return;
        }
        if let Some(key) = Self::key(vector, pc) {
            self.0.store(key | line as u64, Ordering::Relaxed);
        }
    }

    fn key(vector: VectorId, pc: usize) -> Option<u64> {
        let code = match vector {
            VectorId::Main => 0,
            VectorId::Fork(n) => n as u64 + 1,
        };
        if code >> VECTOR_BITS != 0 || (pc as u64) >> PC_BITS != 0 {
            return None;
        }
        Some(VALID | code << (PC_BITS + LINE_BITS) | (pc as u64) << LINE_BITS)
    }
}
