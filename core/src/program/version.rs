use core::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::FormatError;

/// Bytecode format versions, oldest first.
///
/// Each version only ever adds constructs, so a program persisted under an
/// older version keeps decompiling and recompiling the same way.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FormatVersion {
    Prehistory = 0,
    /// try/except, try/finally, catch expressions, scatter assignment
    Exceptions = 1,
    /// break, continue, named while loops
    BreakCont = 2,
    /// float literals
    Float = 3,
    /// map literals
    Maps = 4,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion::Maps;

    /// Aborts if this version predates `needed`.
    pub(crate) fn require(self, needed: FormatVersion, what: &str) {
        if self < needed {
            fatal!("{} requires format {:?}, program is {:?}", what, needed, self);
        }
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = FormatError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(FormatVersion::Prehistory),
            1 => Ok(FormatVersion::Exceptions),
            2 => Ok(FormatVersion::BreakCont),
            3 => Ok(FormatVersion::Float),
            4 => Ok(FormatVersion::Maps),
            other => Err(FormatError::UnknownVersion(other)),
        }
    }
}

impl From<FormatVersion> for u8 {
    fn from(version: FormatVersion) -> u8 {
        version as u8
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, *self as u8)
    }
}
