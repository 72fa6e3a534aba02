//! Public configuration surface.

pub mod options;

pub use options::{CompilationOptions, UnparseOptions};
