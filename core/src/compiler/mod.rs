//! Code generator for verb programs.
//!
//! Turns a [`ParsedVerb`](crate::ast::ParsedVerb) into a relocatable
//! [`Program`](crate::program::Program).
//!
//! ## Design
//!
//! - One recursive walk over the AST emits opcodes and tracks operand stack
//!   depth; the depth must be back to zero at the end of every vector
//! - Operand fields are emitted as one-byte placeholders ("fixups") and
//!   widened to their final width in a single relocation pass
//! - Forward jumps that share a destination are chained, so every `break` of
//!   a loop or every arm of an `if` resolves at once
//! - `fork` bodies become separate vectors sharing one literal table
//! - The optional reduce-ref pass runs on the raw bytes before relocation

mod assembler;
mod codegen;
mod reduce_ref;


pub use codegen::{CodeGenerator, generate, generate_with_interner};
