//! The opcode table shared with the interpreter, and a cursor for reading
//! instructions out of a finished vector.

mod opcode;
mod reader;

pub use opcode::{
    ExtOpcode, NUM_READY_VARS, OPTIM_NUM_HI, OPTIM_NUM_LOW, Op, Opcode, optim_num_opcode,
};
pub use reader::Reader;
