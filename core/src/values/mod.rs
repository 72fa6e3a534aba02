//! Literal values and string interning.

mod intern;
mod value;

pub use intern::{Interner, StringPool};
pub use value::{ErrorCode, Objid, Value};
