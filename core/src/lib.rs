#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

// Re-export for convenience so other modules don't need alloc:: prefix
#[allow(unused_imports)]
pub(crate) use alloc::{boxed::Box, format, string::String, string::ToString, vec, vec::Vec};

#[macro_use]
pub mod errors;

pub mod api;
pub mod ast;
pub mod compiler;
pub mod decompiler;
pub mod disasm;
pub mod program;
pub mod unparse;
pub mod values;
pub mod vm;
