//! Error types.
//!
//! Two very different kinds of failure exist here:
//!
//! - Internal invariant violations (unbalanced operand stack, jump landing in
//!   the wrong place, opcode the format version does not know). The generator
//!   and decompiler only ever see input they produced themselves, so these are
//!   bugs or corruption and abort through [`fatal!`].
//! - Format errors at the persistence boundary, reported as [`FormatError`].

use thiserror::Error;

/// Log an internal invariant violation and abort.
///
/// Accepts the same arguments as [`panic!`].
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
        panic!($($arg)*)
    }};
}

/// Recoverable errors raised when reading or writing persisted programs.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown bytecode format version {0}")]
    UnknownVersion(u8),

    #[error("invalid extended opcode byte 0x{0:02X}")]
    InvalidExtendedOpcode(u8),

    #[error("program encoding failed: {0}")]
    Encoding(postcard::Error),
}

impl From<postcard::Error> for FormatError {
    fn from(err: postcard::Error) -> Self {
        FormatError::Encoding(err)
    }
}
